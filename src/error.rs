//! Crate-wide error type.
//!
//! Refresh failures (`Database`) abort the whole refresh and leave the published
//! generation untouched. Lookup failures (`NotInitialized`, `ModelNotFound`,
//! `AmbiguousModel`, `TableNotMapped`) are per call and never affect the mapping.

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    /// A lookup ran before any refresh succeeded.
    #[error("automap is not initialized, call refresh() first")]
    NotInitialized,

    #[error("model '{0}' not found")]
    ModelNotFound(String),

    #[error("model name '{name}' is ambiguous across apps: {app_labels}. Use 'app_label.{name}' instead")]
    AmbiguousModel { name: String, app_labels: String },

    /// The model exists but its table was not reflected, usually because its
    /// migrations have not been applied yet.
    #[error("table '{0}' is not mapped in the current generation")]
    TableNotMapped(String),

    #[error("invalid model graph: {0}")]
    InvalidModelGraph(String),

    #[error("invalid page: {0}")]
    InvalidPage(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("notification error: {0}")]
    Notify(#[from] reqwest::Error),
}
