use std::path::PathBuf;
use thiserror::Error;

/// Core error type for spm operations outside the install engine.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to read config at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config value for '{key}' in {origin}: {message}")]
    ConfigInvalid {
        key: String,
        origin: String,
        message: String,
    },
}
