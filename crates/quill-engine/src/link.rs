//! Lays compiled functions out in one buffer and patches their relocations.

use cranelift_codegen::binemit::Reloc;
use rustc_hash::FxHashMap;

use crate::engine::DiagnosticSink;
use crate::error::EngineError;

/// Every function starts on this boundary inside the code buffer.
pub const FUNCTION_ALIGNMENT: usize = 16;

/// What a relocation refers to before layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelocTarget {
    /// A named function or data symbol.
    Symbol(String),
    /// A runtime routine Cranelift called on its own, by C library name.
    Libcall(String),
    /// An offset inside the function that holds the relocation.
    Local(u32),
}

#[derive(Debug, Clone)]
pub struct PendingReloc {
    pub offset: u32,
    pub kind: Reloc,
    pub target: RelocTarget,
    pub addend: i64,
}

/// Machine code for one function, not yet placed.
#[derive(Debug, Clone)]
pub struct CompiledFunction {
    pub name: String,
    pub code: Vec<u8>,
    pub relocs: Vec<PendingReloc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolved {
    /// Offset from the start of the code buffer.
    Internal(usize),
    /// Absolute address outside the buffer.
    External(usize),
}

/// Placement of every function plus the resolved target of every relocation.
#[derive(Debug, Clone)]
pub struct LinkPlan {
    offsets: Vec<usize>,
    targets: Vec<Vec<Resolved>>,
    symbols: FxHashMap<String, usize>,
    size: usize,
}

fn align_up(value: usize, align: usize) -> usize {
    value.div_ceil(align) * align
}

/// Bytes a relocation of `kind` rewrites, `None` for kinds we cannot patch.
pub fn patch_width(kind: Reloc) -> Option<usize> {
    match kind {
        Reloc::Abs8 => Some(8),
        Reloc::Abs4
        | Reloc::X86PCRel4
        | Reloc::X86CallPCRel4
        | Reloc::X86CallPLTRel4
        | Reloc::Arm64Call => Some(4),
        _ => None,
    }
}

impl LinkPlan {
    /// Places `functions` back to back and resolves every relocation.
    ///
    /// Names defined by `functions` win over `external`. Every problem is
    /// reported to `sink` before the first error is returned.
    pub fn build(
        functions: &[CompiledFunction],
        external: impl Fn(&RelocTarget) -> Option<usize>,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<LinkPlan, EngineError> {
        let mut offsets = Vec::with_capacity(functions.len());
        let mut symbols = FxHashMap::default();
        let mut cursor = 0;
        for func in functions {
            let start = align_up(cursor, FUNCTION_ALIGNMENT);
            offsets.push(start);
            symbols.insert(func.name.clone(), start);
            cursor = start + func.code.len();
        }

        let mut unresolved: Vec<String> = Vec::new();
        let mut unsupported = None;
        let mut targets = Vec::with_capacity(functions.len());
        for (func, start) in functions.iter().zip(&offsets) {
            let mut resolved = Vec::with_capacity(func.relocs.len());
            for reloc in &func.relocs {
                let Some(width) = patch_width(reloc.kind) else {
                    sink.emit(&format!(
                        "unsupported relocation {} in function '{}'",
                        reloc.kind, func.name
                    ));
                    unsupported.get_or_insert(EngineError::RelocationFailed {
                        kind: reloc.kind.to_string(),
                        offset: start + reloc.offset as usize,
                        reason: format!("unsupported in function '{}'", func.name),
                    });
                    continue;
                };
                // A patch may only rewrite its own function's bytes.
                if reloc.offset as usize + width > func.code.len() {
                    sink.emit(&format!(
                        "relocation {} at offset {:#x} lies outside function '{}'",
                        reloc.kind, reloc.offset, func.name
                    ));
                    unsupported.get_or_insert(EngineError::RelocationFailed {
                        kind: reloc.kind.to_string(),
                        offset: start + reloc.offset as usize,
                        reason: format!("patch site lies outside function '{}'", func.name),
                    });
                    continue;
                }
                let target = match &reloc.target {
                    RelocTarget::Local(offset) => Some(Resolved::Internal(start + *offset as usize)),
                    RelocTarget::Symbol(name) => symbols
                        .get(name)
                        .map(|offset| Resolved::Internal(*offset))
                        .or_else(|| external(&reloc.target).map(Resolved::External)),
                    RelocTarget::Libcall(_) => external(&reloc.target).map(Resolved::External),
                };
                match target {
                    Some(target) => resolved.push(target),
                    None => {
                        let name = match &reloc.target {
                            RelocTarget::Symbol(name) | RelocTarget::Libcall(name) => name.clone(),
                            RelocTarget::Local(offset) => format!("<local {:#x}>", offset),
                        };
                        if !unresolved.contains(&name) {
                            sink.emit(&format!("undefined symbol '{}'", name));
                            unresolved.push(name);
                        }
                    }
                }
            }
            targets.push(resolved);
        }

        if let Some(err) = unsupported {
            return Err(err);
        }
        if !unresolved.is_empty() {
            return Err(EngineError::UnresolvedSymbols(unresolved));
        }

        Ok(LinkPlan {
            offsets,
            targets,
            symbols,
            size: cursor,
        })
    }

    /// Total bytes the placed code occupies.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Buffer offset of a function defined by this plan.
    pub fn symbol_offset(&self, name: &str) -> Option<usize> {
        self.symbols.get(name).copied()
    }

    /// Copies the code of `functions` into `buffer` and patches every
    /// relocation for the buffer's current address.
    pub fn apply(&self, functions: &[CompiledFunction], buffer: &mut [u8]) -> Result<(), EngineError> {
        if buffer.len() < self.size {
            return Err(EngineError::BufferTooSmall {
                needed: self.size,
                provided: buffer.len(),
            });
        }
        buffer.fill(0);
        let base = buffer.as_ptr() as usize;

        for ((func, start), targets) in functions.iter().zip(&self.offsets).zip(&self.targets) {
            buffer[*start..*start + func.code.len()].copy_from_slice(&func.code);
            for (reloc, target) in func.relocs.iter().zip(targets) {
                let at = start + reloc.offset as usize;
                let address = match *target {
                    Resolved::Internal(offset) => base + offset,
                    Resolved::External(address) => address,
                };
                let value = (address as i64).wrapping_add(reloc.addend);
                patch(buffer, base, at, reloc.kind, value)?;
            }
        }
        Ok(())
    }
}

fn write_bytes<const N: usize>(
    buffer: &mut [u8],
    at: usize,
    bytes: [u8; N],
    kind: Reloc,
) -> Result<(), EngineError> {
    let slot = buffer
        .get_mut(at..at + N)
        .ok_or_else(|| EngineError::RelocationFailed {
            kind: kind.to_string(),
            offset: at,
            reason: "patch site lies outside the buffer".to_string(),
        })?;
    slot.copy_from_slice(&bytes);
    Ok(())
}

fn patch(buffer: &mut [u8], base: usize, at: usize, kind: Reloc, value: i64) -> Result<(), EngineError> {
    let out_of_range = |reason: &str| EngineError::RelocationFailed {
        kind: kind.to_string(),
        offset: at,
        reason: reason.to_string(),
    };
    let pc = (base + at) as i64;

    match kind {
        Reloc::Abs4 => {
            let v = u32::try_from(value).map_err(|_| out_of_range("address does not fit in 32 bits"))?;
            write_bytes(buffer, at, v.to_le_bytes(), kind)
        }
        Reloc::Abs8 => write_bytes(buffer, at, (value as u64).to_le_bytes(), kind),
        Reloc::X86PCRel4 | Reloc::X86CallPCRel4 | Reloc::X86CallPLTRel4 => {
            let v = i32::try_from(value - pc)
                .map_err(|_| out_of_range("target is further than 2 GiB from the call site"))?;
            write_bytes(buffer, at, v.to_le_bytes(), kind)
        }
        Reloc::Arm64Call => {
            let diff = value - pc;
            if diff % 4 != 0 {
                return Err(out_of_range("branch target is not 4-byte aligned"));
            }
            let words = diff >> 2;
            if !(-(1 << 25)..(1 << 25)).contains(&words) {
                return Err(out_of_range("branch target is further than 128 MiB"));
            }
            let site = buffer
                .get(at..at + 4)
                .ok_or_else(|| out_of_range("patch site lies outside the buffer"))?;
            let insn = u32::from_le_bytes([site[0], site[1], site[2], site[3]]);
            let patched = insn | (words as u32 & 0x03ff_ffff);
            write_bytes(buffer, at, patched.to_le_bytes(), kind)
        }
        other => Err(EngineError::RelocationFailed {
            kind: other.to_string(),
            offset: at,
            reason: "unsupported relocation kind".to_string(),
        }),
    }
}
