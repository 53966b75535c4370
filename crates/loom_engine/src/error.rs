//! Error types for the engine

use loom_core::TypeKey;
use loom_ecs::ResourceError;
use thiserror::Error;

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("stage '{0}' is declared more than once")]
    DuplicateStage(String),

    #[error("system '{system}' is assigned to unknown stage '{stage}'")]
    UnknownStage { system: String, stage: String },

    #[error("system '{0}' is requested more than once")]
    DuplicateSystem(String),

    #[error("invalid runner timestep: {0}")]
    InvalidTimestep(f64),
}

/// A unit could not be constructed from its dependencies
#[derive(Debug, Error)]
pub enum ConstructError {
    /// A declared resource is not registered (yet)
    #[error("resource {0} is not registered")]
    MissingResource(TypeKey),

    /// The constructor asked for a resource its descriptor does not declare
    #[error("resource {0} is not declared as a dependency")]
    UndeclaredResource(TypeKey),

    /// The constructor asked for a query shape its descriptor does not declare
    #[error("query {0} is not declared as a dependency")]
    UndeclaredQuery(String),

    /// Failure reported by the unit itself
    #[error("{0}")]
    Custom(String),
}

/// Top-level engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("resource error: {0}")]
    Resource(#[from] ResourceError),
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
