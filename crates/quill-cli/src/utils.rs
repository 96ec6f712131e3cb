use std::path::{Path, PathBuf};

use miette::SourceSpan;
use quill_host::Value;

pub const CONFIG_FILE: &str = "quill.toml";

/// Finds the nearest `quill.toml` by searching upwards from `start_path`.
pub fn find_config(start_path: &Path) -> Option<PathBuf> {
    let mut current = if start_path.is_dir() {
        start_path.to_path_buf()
    } else {
        start_path
            .parent()
            .map_or_else(|| start_path.to_path_buf(), |p| p.to_path_buf())
    };
    if current.as_os_str().is_empty() {
        current = PathBuf::from(".");
    }
    let mut current = current.canonicalize().unwrap_or(current);

    loop {
        let config_path = current.join(CONFIG_FILE);
        if config_path.is_file() {
            return Some(config_path);
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Line number of a `<source>:LINE: error: ...` diagnostic.
pub fn diagnostic_line(diagnostic: &str) -> Option<usize> {
    let rest = diagnostic.strip_prefix("<source>:")?;
    let (line, _) = rest.split_once(':')?;
    line.parse().ok()
}

/// Byte span of the 1-based `line` in `source`.
pub fn line_span(source: &str, line: usize) -> Option<SourceSpan> {
    let mut offset = 0;
    for (number, text) in source.split_inclusive('\n').enumerate() {
        if number + 1 == line {
            let len = text.trim_end_matches(|c: char| c == '\n' || c == '\r').len();
            return Some((offset, len).into());
        }
        offset += text.len();
    }
    None
}

/// Command-line arguments become numbers when they parse as one.
pub fn parse_argument(arg: &str) -> Value {
    match arg.parse::<f64>() {
        Ok(n) => Value::Number(n),
        Err(_) => Value::string(arg),
    }
}
