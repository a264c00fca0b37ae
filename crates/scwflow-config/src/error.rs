use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config directory not found")]
    ConfigDirNotFound,

    #[error(
        "no credentials configured\n\nhint:\n  • set access_key and secret_key in the provider block\n  • or point profile_path at a scw config.yaml"
    )]
    MissingCredentials,

    #[error("profile '{profile}' not found in {path}")]
    ProfileNotFound { path: PathBuf, profile: String },

    #[error("invalid value for '{field}': {message}")]
    InvalidValue { field: &'static str, message: String },

    #[error("profile file error: {path}\nreason: {message}")]
    ProfileFile { path: PathBuf, message: String },

    #[error("invalid provider block: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
