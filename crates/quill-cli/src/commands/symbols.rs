use std::path::Path;

use indexmap::IndexMap;

use crate::commands::prepare;
use crate::error::CliError;

/// Relocates `file` and resolves `names` to addresses, in order.
pub fn resolve_symbols(
    file: &Path,
    config_path: Option<&Path>,
    names: &[String],
    no_api: bool,
) -> Result<IndexMap<String, *const u8>, CliError> {
    let mut prepared = prepare(file, config_path, no_api.then_some(false))?;
    prepared.relocate()?;

    let mut symbols: IndexMap<String, *const u8> =
        names.iter().map(|name| (name.clone(), std::ptr::null())).collect();
    prepared.session.session().export(&mut symbols)?;
    Ok(symbols)
}

pub fn handle_symbols(
    file: &Path,
    config_path: Option<&Path>,
    names: &[String],
    no_api: bool,
) -> Result<(), CliError> {
    for (name, address) in resolve_symbols(file, config_path, names, no_api)? {
        println!("{}\t{:p}", name, address);
    }
    Ok(())
}
