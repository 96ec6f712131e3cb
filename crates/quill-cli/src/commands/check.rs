use std::path::Path;

use crate::commands::prepare;
use crate::error::CliError;

pub fn handle_check(file: &Path, config_path: Option<&Path>) -> Result<(), CliError> {
    let prepared = prepare(file, config_path, None)?;
    let functions = prepared
        .session
        .session()
        .engine()
        .map_or(0, |engine| engine.function_names().count());
    println!("✅ {} checked successfully ({} functions).", file.display(), functions);
    Ok(())
}
