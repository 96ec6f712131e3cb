use std::path::Path;

use quill_host::{HostState, Value};

use crate::commands::prepare;
use crate::error::CliError;
use crate::utils::parse_argument;

/// Compiles `file`, relocates it and calls its entry routine with `args`.
pub fn run_file(
    file: &Path,
    config_path: Option<&Path>,
    entry: Option<String>,
    no_api: bool,
    args: &[String],
) -> Result<Vec<Value>, CliError> {
    let mut prepared = prepare(file, config_path, no_api.then_some(false))?;
    let entry = entry.unwrap_or_else(|| prepared.config.run.entry.clone());

    let size = prepared.relocate()?;
    log::info!("{} relocated into {} bytes", file.display(), size);
    let routine = prepared.session.routine(&Value::string(&entry))?;

    let args: Vec<Value> = args.iter().map(|arg| parse_argument(arg)).collect();
    let mut host = HostState::with_config(&prepared.config.host);
    log::debug!("calling '{}' with {} arguments", entry, args.len());
    let results = host.call(&routine, &args)?;

    prepared.session.close()?;
    Ok(results)
}

pub fn handle_run(
    file: &Path,
    config_path: Option<&Path>,
    entry: Option<String>,
    no_api: bool,
    args: &[String],
) -> Result<(), CliError> {
    for value in run_file(file, config_path, entry, no_api, args)? {
        println!("{}", value);
    }
    Ok(())
}

#[cfg(all(test, unix, any(target_arch = "x86_64", target_arch = "aarch64")))]
mod tests {
    use super::*;
    use crate::commands::symbols::resolve_symbols;
    use expect_test::expect;
    use std::fs;

    const SUM: &str = r#"
function %sum(i64) -> i32 {
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

    fn write_program(dir: &Path, source: &str, config: Option<&str>) -> std::path::PathBuf {
        if let Some(config) = config {
            fs::write(dir.join("quill.toml"), config).unwrap();
        }
        let file = dir.join("prog.clif");
        fs::write(&file, source).unwrap();
        file
    }

    #[test]
    fn runs_the_configured_entry() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_program(dir.path(), SUM, Some("[run]\nentry = \"sum\"\n"));
        let results = run_file(&file, None, None, false, &["40".into(), "2".into()]).unwrap();
        assert_eq!(results, vec![Value::Number(42.0)]);
    }

    #[test]
    fn without_the_api_host_calls_do_not_link() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_program(dir.path(), SUM, None);
        let err = run_file(&file, None, Some("sum".into()), true, &[]).unwrap_err();
        assert!(matches!(err, CliError::SessionError(_)));
        assert!(err.to_string().contains("undefined symbol 'host_tonumberx'"), "{}", err);
    }

    #[test]
    fn compile_errors_carry_the_source() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_program(dir.path(), "function %f(i64 {\n", None);
        let err = run_file(&file, None, None, false, &[]).unwrap_err();
        match err {
            CliError::CompileError { span, .. } => assert!(span.is_some()),
            other => panic!("expected a compile error, got {:?}", other),
        }
    }

    #[test]
    fn symbols_resolve_in_request_order() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_program(dir.path(), SUM, None);
        let symbols = resolve_symbols(&file, None, &["sum".into()], false).unwrap();
        assert_eq!(symbols.keys().collect::<Vec<_>>(), ["sum"]);
        assert!(!symbols["sum"].is_null());

        let err = resolve_symbols(&file, None, &["sum".into(), "nope".into()], false).unwrap_err();
        expect!["Can't find symbol 'nope' in the session"].assert_eq(&err.to_string());
    }
}
