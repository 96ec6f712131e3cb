#![cfg(all(unix, any(target_arch = "x86_64", target_arch = "aarch64")))]

use std::ffi::CStr;

use quill_host::{HostError, HostState, Table, Value};
use quill_session::{open, CloseCause, Operation, SessionError, SessionState};

const ARITH: &str = r#"
function %add(i64, i64) -> i64 {
block0(v0: i64, v1: i64):
    v2 = iadd v0, v1
    return v2
}

function %mul(i64, i64) -> i64 {
block0(v0: i64, v1: i64):
    v2 = imul v0, v1
    return v2
}
"#;

/// `main(a, b)` returns `a + b` through the host stack API.
const MAIN: &str = r#"
function %main(i64) -> i32 {
    fn0 = %host_tonumberx(i64, i32, i64) -> f64
    fn1 = %host_pushnumber(i64, f64)
block0(v0: i64):
    v1 = iconst.i32 1
    v2 = iconst.i64 0
    v3 = call fn0(v0, v1, v2)
    v4 = iconst.i32 2
    v5 = call fn0(v0, v4, v2)
    v6 = fadd v3, v5
    call fn1(v0, v6)
    v7 = iconst.i32 1
    return v7
}
"#;

extern "C" fn host_add(a: i64, b: i64) -> i64 {
    a + b
}

static FAILURE: &CStr = c"refusing to run";
static KEY_X: &CStr = c"x";

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn source(text: &str) -> Value {
    Value::string(text)
}

#[test]
fn round_trip_through_a_routine() {
    init_logging();
    let mut session = open().unwrap();
    session.api().unwrap();
    session.compile(&source(MAIN)).unwrap();
    let size = session.relocate().unwrap();
    assert!(size > 0);
    assert_eq!(session.session().code_size(), Some(size));

    let main = session.routine(&source("main")).unwrap();
    let mut host = HostState::new();
    let results = host.call(&main, &[Value::Number(20.0), Value::string("22")]).unwrap();
    assert_eq!(results, vec![Value::Number(42.0)]);
}

#[test]
fn routines_build_host_tables() {
    let src = r#"
function %make(i64) -> i32 {
    gv0 = symbol %key_x
    fn0 = %host_createtable(i64, i32, i32)
    fn1 = %host_pushnumber(i64, f64)
    fn2 = %host_setfield(i64, i32, i64)
block0(v0: i64):
    v1 = iconst.i32 0
    call fn0(v0, v1, v1)
    v2 = f64const 0x1.cp2
    call fn1(v0, v2)
    v3 = iconst.i32 -2
    v4 = symbol_value.i64 gv0
    call fn2(v0, v3, v4)
    v5 = iconst.i32 1
    return v5
}
"#;
    let mut session = open().unwrap();
    session.api().unwrap();
    let imports = Table::new();
    imports.set_str("key_x", Value::pointer(KEY_X.as_ptr()));
    session.import(&Value::Table(imports)).unwrap();
    session.compile(&source(src)).unwrap();
    session.relocate().unwrap();

    let make = session.routine(&source("make")).unwrap();
    let results = HostState::new().call(&make, &[]).unwrap();
    let table = results[0].as_table().expect("a table");
    assert_eq!(table.get_str("x"), Value::Number(7.0));
}

#[test]
fn host_errors_surface_from_routines() {
    let src = r#"
function %fail(i64) -> i32 {
    gv0 = symbol %failure_message
    fn0 = %host_error(i64, i64) -> i32
block0(v0: i64):
    v1 = symbol_value.i64 gv0
    v2 = call fn0(v0, v1)
    return v2
}
"#;
    let mut session = open().unwrap();
    session.api().unwrap();
    let imports = Table::new();
    imports.set_str("failure_message", Value::pointer(FAILURE.as_ptr()));
    session.import(&Value::Table(imports)).unwrap();
    session.compile(&source(src)).unwrap();
    session.relocate().unwrap();

    let fail = session.routine(&source("fail")).unwrap();
    let err = HostState::new().call(&fail, &[]).unwrap_err();
    assert_eq!(err, HostError::Runtime("refusing to run".to_string()));
}

#[test]
fn imported_functions_are_callable() {
    let src = r#"
function %twice(i64) -> i64 {
    fn0 = %hostAdd(i64, i64) -> i64
block0(v0: i64):
    v1 = call fn0(v0, v0)
    return v1
}
"#;
    let mut session = open().unwrap();
    let imports = Table::new();
    imports.set_str("hostAdd", Value::pointer(host_add as *const u8));
    let imports = Value::Table(imports);
    session.import(&imports).unwrap();
    session.compile(&source(src)).unwrap();
    session.relocate().unwrap();

    let wanted = Table::new();
    wanted.set_str("twice", Value::Boolean(true));
    session.export(&Value::Table(wanted.clone())).unwrap();
    let address = wanted.get_str("twice").as_pointer().expect("written back");
    let twice: extern "C" fn(i64) -> i64 = unsafe { std::mem::transmute(address) };
    assert_eq!(twice(21), 42);

    assert!(matches!(
        session.import(&imports),
        Err(SessionError::RelocatedSession {
            operation: Operation::Import
        })
    ));
}

#[test]
fn missing_imports_fail_relocation() {
    let src = r#"
function %twice(i64) -> i64 {
    fn0 = %hostAdd(i64, i64) -> i64
block0(v0: i64):
    v1 = call fn0(v0, v0)
    return v1
}
"#;
    let mut session = open().unwrap();
    session.compile(&source(src)).unwrap();
    let err = session.relocate().unwrap_err();
    assert_eq!(err.to_string(), "undefined symbol 'hostAdd'");
    assert_eq!(session.state(), SessionState::Closed(CloseCause::RelocationFailed));
}

#[test]
fn export_keeps_partial_writes() {
    let mut session = open().unwrap();
    session.compile(&source(ARITH)).unwrap();
    session.relocate().unwrap();

    let wanted = Table::new();
    wanted.set_str("add", Value::Boolean(true));
    wanted.set_str("mul", Value::Boolean(true));
    session.export(&Value::Table(wanted.clone())).unwrap();
    for name in ["add", "mul"] {
        let address = wanted.get_str(name).as_pointer().expect("pointer");
        assert!(!address.is_null());
    }

    let partial = Table::new();
    partial.set_str("add", Value::Boolean(true));
    partial.set_str("sub", Value::Boolean(true));
    let err = session.export(&Value::Table(partial.clone())).unwrap_err();
    assert!(matches!(err, SessionError::SymbolNotFound { ref name } if name == "sub"));
    assert!(partial.get_str("add").as_pointer().is_some());
    assert_eq!(partial.get_str("sub"), Value::Boolean(true));
}

#[test]
fn argument_kinds_are_checked() {
    let mut session = open().unwrap();
    assert!(matches!(
        session.compile(&Value::Number(1.0)),
        Err(SessionError::Type(_))
    ));

    let bad_value = Table::new();
    bad_value.set_str("hostAdd", Value::Number(3.0));
    let err = session.import(&Value::Table(bad_value)).unwrap_err();
    assert_eq!(err.to_string(), "Type error: import: 'hostAdd' must map to a pointer, got number");

    let bad_key = Table::new();
    bad_key
        .set(Value::Number(1.0), Value::pointer(host_add as *const u8))
        .unwrap();
    assert!(matches!(
        session.import(&Value::Table(bad_key)),
        Err(SessionError::Type(_))
    ));
    assert_eq!(session.state(), SessionState::Fresh);
}

#[test]
fn compile_failure_closes_the_session() {
    let mut session = open().unwrap();
    let err = session.compile(&source("function %broken(i64 {\n")).unwrap_err();
    assert_eq!(err.diagnostics().len(), 1);
    assert_eq!(session.state(), SessionState::Closed(CloseCause::CompileFailed));

    assert!(matches!(
        session.close(),
        Err(SessionError::ClosedSession {
            operation: Operation::Close
        })
    ));
    assert!(matches!(
        session.compile(&source(ARITH)),
        Err(SessionError::ClosedSession {
            operation: Operation::Compile
        })
    ));
    assert!(matches!(
        session.routine(&source("add")),
        Err(SessionError::ClosedSession { .. })
    ));
}

#[test]
fn closing_twice_is_reported_and_drop_stays_silent() {
    let mut session = open().unwrap();
    session.compile(&source(ARITH)).unwrap();
    session.relocate().unwrap();
    session.close().unwrap();
    assert!(matches!(session.close(), Err(SessionError::DoubleClose)));
    assert!(matches!(
        session.export(&Value::Table(Table::new())),
        Err(SessionError::ClosedSession {
            operation: Operation::Export
        })
    ));
    drop(session);
}

#[test]
fn gates_follow_the_lifecycle() {
    let mut session = open().unwrap();
    assert!(matches!(
        session.routine(&source("add")),
        Err(SessionError::NotRelocated {
            operation: Operation::ExportRoutine
        })
    ));
    session.compile(&source(ARITH)).unwrap();
    session.relocate().unwrap();
    assert!(matches!(
        session.api(),
        Err(SessionError::RelocatedSession {
            operation: Operation::ImportApi
        })
    ));
    assert!(matches!(
        session.compile(&source(ARITH)),
        Err(SessionError::RelocatedSession { .. })
    ));
    assert_eq!(session.state(), SessionState::Relocated);
}
