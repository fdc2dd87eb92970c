use std::path::PathBuf;
use thiserror::Error;

/// Core error type for loading configuration and project metadata.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to read manifest at {path}: {source}")]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse manifest at {path}: {source}")]
    ManifestParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("UI runtime '{package}' is not declared in the project dependencies")]
    RuntimeNotDeclared { package: String },
}
