pub mod file;
pub mod stdin;

use serde::de::DeserializeOwned;

/// Load a typed document from `--<flag> <file>` or, failing that, from piped stdin.
pub fn load<T: DeserializeOwned>(path: Option<&str>, flag: &str) -> Result<T, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        file::read_document(path)
    } else if let Some(data) = stdin::read_stdin()? {
        Ok(serde_json::from_value(data)?)
    } else {
        Err(format!("Provide --{flag} <file> or pipe JSON via stdin").into())
    }
}
