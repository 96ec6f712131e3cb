use cranelift_codegen::control::ControlPlane;
use cranelift_codegen::ir::{ExternalName, Function, UserFuncName};
use cranelift_codegen::isa::OwnedTargetIsa;
use cranelift_codegen::settings::{self, Configurable};
use cranelift_codegen::{CodegenError, Context, FinalizedMachReloc, FinalizedRelocTarget};
use cranelift_reader::{parse_test, ParseOptions};
use rustc_hash::{FxHashMap, FxHashSet};
use target_lexicon::Architecture;

use crate::config::EngineConfig;
use crate::engine::{CompilerEngine, DiagnosticSink};
use crate::error::EngineError;
use crate::libcalls;
use crate::link::{CompiledFunction, LinkPlan, PendingReloc, RelocTarget};

/// A compiler engine for Cranelift IR text.
///
/// Each `compile_string` call parses one or more `function` definitions,
/// compiles them for the host and keeps the machine code until relocation.
/// Calls to `%name` external functions and `symbol %name` globals are
/// resolved by name when the code is relocated.
pub struct ClifEngine {
    isa: OwnedTargetIsa,
    ctrl_plane: ControlPlane,
    libcall_names: Box<dyn Fn(cranelift_codegen::ir::LibCall) -> String + Send + Sync>,
    functions: Vec<CompiledFunction>,
    imports: FxHashMap<String, usize>,
    plan: Option<LinkPlan>,
    /// Start of the buffer the code was materialized into.
    base: Option<usize>,
}

impl std::fmt::Debug for ClifEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClifEngine")
            .field("isa", &self.isa.triple().to_string())
            .field("functions", &self.functions.len())
            .field("imports", &self.imports.len())
            .field("base", &self.base)
            .finish()
    }
}

/// Strips the `%` sigil CLIF prints in front of test-case names.
fn plain_name(printed: String) -> String {
    match printed.strip_prefix('%') {
        Some(rest) => rest.to_string(),
        None => printed,
    }
}

impl ClifEngine {
    pub fn new() -> Result<Self, EngineError> {
        Self::with_config(&EngineConfig::default())
    }

    pub fn with_config(config: &EngineConfig) -> Result<Self, EngineError> {
        let mut flag_builder = settings::builder();
        // Code is placed at an address chosen after compilation, so every
        // call to something outside the function goes through an absolute
        // relocation.
        flag_builder.set("is_pic", "false")?;
        flag_builder.set("use_colocated_libcalls", "false")?;
        flag_builder.set("opt_level", config.opt_level.as_setting())?;
        flag_builder.set("enable_verifier", if config.verify { "true" } else { "false" })?;

        let isa_builder = cranelift_native::builder()
            .map_err(|e| EngineError::IsaSetupError(format!("Host target lookup failed: {}", e)))?;
        let isa = isa_builder
            .finish(settings::Flags::new(flag_builder))
            .map_err(|e| EngineError::IsaSetupError(format!("ISA construction failed: {}", e)))?;

        match isa.triple().architecture {
            Architecture::X86_64 | Architecture::Aarch64(_) => {}
            other => return Err(EngineError::UnsupportedHost(other.to_string())),
        }

        log::debug!(
            "created CLIF engine for {} (opt_level={})",
            isa.triple(),
            config.opt_level.as_setting()
        );
        Ok(Self {
            isa,
            ctrl_plane: ControlPlane::default(),
            libcall_names: cranelift_module::default_libcall_names(),
            functions: Vec::new(),
            imports: FxHashMap::default(),
            plan: None,
            base: None,
        })
    }

    /// Names of the functions compiled so far, in definition order.
    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.functions.iter().map(|f| f.name.as_str())
    }

    fn reloc_target(&self, func: &Function, reloc: &FinalizedMachReloc) -> RelocTarget {
        match &reloc.target {
            FinalizedRelocTarget::Func(offset) => RelocTarget::Local(*offset),
            FinalizedRelocTarget::ExternalName(name) => match name {
                ExternalName::TestCase(testcase) => RelocTarget::Symbol(plain_name(testcase.to_string())),
                ExternalName::User(reference) => {
                    let user = &func.params.user_named_funcs()[*reference];
                    RelocTarget::Symbol(format!("u{}:{}", user.namespace, user.index))
                }
                ExternalName::LibCall(libcall) => RelocTarget::Libcall((self.libcall_names)(*libcall)),
                ExternalName::KnownSymbol(symbol) => RelocTarget::Symbol(format!("{:?}", symbol)),
            },
        }
    }

    /// Compiles one parsed function, reporting failures to `sink`.
    fn compile_function(&mut self, func: Function, sink: &mut dyn DiagnosticSink) -> Option<CompiledFunction> {
        let name = match &func.name {
            UserFuncName::Testcase(_) => plain_name(func.name.to_string()),
            UserFuncName::User(_) => func.name.to_string(),
        };

        let mut ctx = Context::for_function(func);
        let compiled = match ctx.compile(&*self.isa, &mut self.ctrl_plane) {
            Ok(compiled) => compiled,
            Err(err) => {
                match err.inner {
                    CodegenError::Verifier(errors) => {
                        for e in errors.0 {
                            sink.emit(&format!("<source>: error: in function '{}': {}", name, e));
                        }
                    }
                    other => sink.emit(&format!("<source>: error: in function '{}': {}", name, other)),
                }
                return None;
            }
        };

        let code = compiled.code_buffer().to_vec();
        let raw_relocs: Vec<FinalizedMachReloc> = compiled.buffer.relocs().to_vec();
        let relocs = raw_relocs
            .iter()
            .map(|reloc| PendingReloc {
                offset: reloc.offset,
                kind: reloc.kind,
                target: self.reloc_target(&ctx.func, reloc),
                addend: reloc.addend,
            })
            .collect();

        log::debug!("compiled function '{}' ({} bytes)", name, code.len());
        Some(CompiledFunction { name, code, relocs })
    }

    fn resolve_external(&self, target: &RelocTarget) -> Option<usize> {
        match target {
            RelocTarget::Symbol(name) => self.imports.get(name).copied(),
            RelocTarget::Libcall(name) => self
                .imports
                .get(name)
                .copied()
                .or_else(|| libcalls::lookup(name).map(|p| p as usize)),
            RelocTarget::Local(_) => None,
        }
    }

    fn ensure_plan(&mut self, sink: &mut dyn DiagnosticSink) -> Result<&LinkPlan, EngineError> {
        let plan = match self.plan.take() {
            Some(plan) => plan,
            None => LinkPlan::build(&self.functions, |t| self.resolve_external(t), sink)?,
        };
        Ok(self.plan.insert(plan))
    }
}

impl CompilerEngine for ClifEngine {
    fn compile_string(&mut self, source: &str, sink: &mut dyn DiagnosticSink) -> Result<(), EngineError> {
        if self.base.is_some() {
            return Err(EngineError::AlreadyMaterialized);
        }

        let options = ParseOptions {
            default_calling_convention: self.isa.default_call_conv(),
            ..ParseOptions::default()
        };
        let parsed = match parse_test(source, options) {
            Ok(parsed) => parsed,
            Err(e) => {
                sink.emit(&format!("<source>:{}: error: {}", e.location.line_number, e.message));
                return Err(EngineError::CompilationFailed(1));
            }
        };

        let mut failures = 0;
        let mut compiled = Vec::new();
        for (func, _) in parsed.functions {
            match self.compile_function(func, sink) {
                Some(f) => compiled.push(f),
                None => failures += 1,
            }
        }

        let mut defined: FxHashSet<&str> = self.function_names().collect();
        for f in &compiled {
            if !defined.insert(f.name.as_str()) {
                sink.emit(&format!("<source>: error: redefinition of '{}'", f.name));
                failures += 1;
            }
        }

        if failures > 0 {
            return Err(EngineError::CompilationFailed(failures));
        }
        self.functions.extend(compiled);
        self.plan = None;
        Ok(())
    }

    fn add_symbol(&mut self, name: &str, address: *const u8) {
        log::trace!("engine symbol {} = {:p}", name, address);
        self.imports.insert(name.to_string(), address as usize);
        self.plan = None;
    }

    fn relocation_size(&mut self, sink: &mut dyn DiagnosticSink) -> Result<usize, EngineError> {
        self.ensure_plan(sink).map(LinkPlan::size)
    }

    fn relocate_into(&mut self, buffer: &mut [u8], sink: &mut dyn DiagnosticSink) -> Result<(), EngineError> {
        if self.base.is_some() {
            return Err(EngineError::AlreadyMaterialized);
        }
        let plan = self.ensure_plan(sink)?.clone();
        if let Err(e) = plan.apply(&self.functions, buffer) {
            sink.emit(&e.to_string());
            return Err(e);
        }
        self.base = Some(buffer.as_ptr() as usize);
        log::debug!("relocated {} bytes at {:p}", plan.size(), buffer.as_ptr());
        Ok(())
    }

    fn get_symbol(&self, name: &str) -> Option<*const u8> {
        let base = self.base?;
        let offset = self.plan.as_ref()?.symbol_offset(name)?;
        Some((base + offset) as *const u8)
    }
}
