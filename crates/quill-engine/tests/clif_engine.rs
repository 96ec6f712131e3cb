#![cfg(all(unix, any(target_arch = "x86_64", target_arch = "aarch64")))]

use quill_engine::{ClifEngine, CodeBuffer, CompilerEngine, EngineConfig, EngineError, OptLevel};

const ADD: &str = r#"
function %add(i64, i64) -> i64 {
block0(v0: i64, v1: i64):
    v2 = iadd v0, v1
    return v2
}
"#;

const TWICE: &str = r#"
function %twice(i64) -> i64 {
    fn0 = %host_add(i64, i64) -> i64
block0(v0: i64):
    v1 = call fn0(v0, v0)
    return v1
}
"#;

extern "C" fn host_add(a: i64, b: i64) -> i64 {
    a + b
}

static COUNTER: i64 = 41;

/// Sizes, fills and seals a buffer the way a session does.
fn materialize(engine: &mut ClifEngine) -> CodeBuffer {
    let mut sink = Vec::new();
    let size = engine.relocation_size(&mut sink).expect("size query");
    let mut buffer = CodeBuffer::new(size).expect("allocation");
    let slice = buffer.as_mut_slice().expect("writable");
    engine.relocate_into(slice, &mut sink).expect("relocation");
    buffer.make_executable().expect("seal");
    assert!(sink.is_empty(), "unexpected diagnostics: {:?}", sink);
    buffer
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn compiles_and_runs_a_function() {
    init_logging();
    let mut engine = ClifEngine::new().unwrap();
    let mut sink = Vec::new();
    engine.compile_string(ADD, &mut sink).unwrap();
    assert!(sink.is_empty());

    let buffer = materialize(&mut engine);
    let address = engine.get_symbol("add").expect("add is exported");
    assert_eq!(address, buffer.as_ptr());

    let add: extern "C" fn(i64, i64) -> i64 = unsafe { std::mem::transmute(address) };
    assert_eq!(add(40, 2), 42);
}

#[test]
fn calls_into_imported_symbols() {
    let mut engine = ClifEngine::new().unwrap();
    engine.add_symbol("host_add", host_add as *const u8);
    engine.compile_string(TWICE, &mut Vec::new()).unwrap();
    let _buffer = materialize(&mut engine);

    let twice: extern "C" fn(i64) -> i64 =
        unsafe { std::mem::transmute(engine.get_symbol("twice").unwrap()) };
    assert_eq!(twice(21), 42);
}

#[test]
fn reads_imported_data() {
    let source = r#"
function %load_counter() -> i64 {
    gv0 = symbol %counter
block0:
    v0 = symbol_value.i64 gv0
    v1 = load.i64 v0
    return v1
}
"#;
    let mut engine = ClifEngine::new().unwrap();
    engine.add_symbol("counter", &COUNTER as *const i64 as *const u8);
    engine.compile_string(source, &mut Vec::new()).unwrap();
    let _buffer = materialize(&mut engine);

    let load: extern "C" fn() -> i64 =
        unsafe { std::mem::transmute(engine.get_symbol("load_counter").unwrap()) };
    assert_eq!(load(), 41);
}

#[test]
fn functions_call_each_other_across_compiles() {
    let caller = r#"
function %add_three(i64) -> i64 {
    fn0 = %add(i64, i64) -> i64
block0(v0: i64):
    v1 = iconst.i64 3
    v2 = call fn0(v0, v1)
    return v2
}
"#;
    let mut engine = ClifEngine::with_config(&EngineConfig {
        opt_level: OptLevel::None,
        verify: true,
    })
    .unwrap();
    engine.compile_string(caller, &mut Vec::new()).unwrap();
    engine.compile_string(ADD, &mut Vec::new()).unwrap();
    assert_eq!(engine.function_names().collect::<Vec<_>>(), ["add_three", "add"]);

    let _buffer = materialize(&mut engine);
    let add_three: extern "C" fn(i64) -> i64 =
        unsafe { std::mem::transmute(engine.get_symbol("add_three").unwrap()) };
    assert_eq!(add_three(39), 42);
}

#[test]
fn parse_errors_become_diagnostics() {
    let mut engine = ClifEngine::new().unwrap();
    let mut sink = Vec::new();
    let err = engine
        .compile_string("function %broken(i64 {\n", &mut sink)
        .unwrap_err();
    assert!(matches!(err, EngineError::CompilationFailed(1)));
    assert_eq!(sink.len(), 1);
    assert!(sink[0].starts_with("<source>:1: error:"), "{}", sink[0]);
}

#[test]
fn verifier_errors_become_diagnostics() {
    let source = r#"
function %bad(i64) -> i32 {
block0(v0: i64):
    return v0
}
"#;
    let mut engine = ClifEngine::new().unwrap();
    let mut sink = Vec::new();
    assert!(engine.compile_string(source, &mut sink).is_err());
    assert!(!sink.is_empty());
    assert!(sink.iter().all(|d| d.contains("in function 'bad'")), "{:?}", sink);
}

#[test]
fn redefinitions_are_rejected() {
    let mut engine = ClifEngine::new().unwrap();
    engine.compile_string(ADD, &mut Vec::new()).unwrap();
    let mut sink = Vec::new();
    assert!(engine.compile_string(ADD, &mut sink).is_err());
    assert_eq!(sink, vec!["<source>: error: redefinition of 'add'".to_string()]);
}

#[test]
fn undefined_symbols_fail_the_size_query() {
    let mut engine = ClifEngine::new().unwrap();
    engine.compile_string(TWICE, &mut Vec::new()).unwrap();
    let mut sink = Vec::new();
    let err = engine.relocation_size(&mut sink).unwrap_err();
    assert!(matches!(err, EngineError::UnresolvedSymbols(_)));
    assert_eq!(sink, vec!["undefined symbol 'host_add'".to_string()]);
}

#[test]
fn symbols_are_absent_before_relocation() {
    let mut engine = ClifEngine::new().unwrap();
    engine.compile_string(ADD, &mut Vec::new()).unwrap();
    assert!(engine.get_symbol("add").is_none());
    let _buffer = materialize(&mut engine);
    assert!(engine.get_symbol("add").is_some());
    assert!(engine.get_symbol("sub").is_none());
}

#[test]
fn empty_programs_relocate_to_nothing() {
    let mut engine = ClifEngine::new().unwrap();
    engine.compile_string("", &mut Vec::new()).unwrap();
    let buffer = materialize(&mut engine);
    assert!(buffer.is_empty());
}

#[test]
fn materializing_twice_is_refused() {
    let mut engine = ClifEngine::new().unwrap();
    engine.compile_string(ADD, &mut Vec::new()).unwrap();
    let _buffer = materialize(&mut engine);
    let mut second = vec![0u8; 64];
    assert!(matches!(
        engine.relocate_into(&mut second, &mut Vec::new()),
        Err(EngineError::AlreadyMaterialized)
    ));
    assert!(matches!(
        engine.compile_string(ADD, &mut Vec::new()),
        Err(EngineError::AlreadyMaterialized)
    ));
}
