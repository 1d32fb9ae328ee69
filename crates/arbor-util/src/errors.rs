use miette::Diagnostic;
use thiserror::Error;

/// Unified error type for all Arbor operations.
#[derive(Debug, Error, Diagnostic)]
pub enum ArborError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or malformed resolver configuration.
    #[error("Configuration error: {message}")]
    #[diagnostic(help("Check your arbor.toml for syntax errors"))]
    Config { message: String },

    /// A version, version range or version constraint could not be parsed.
    #[error("Invalid version specification '{spec}': {message}")]
    #[diagnostic(help("Ranges look like [1.0,2.0), (,1.5] or [1.2]"))]
    VersionSpec { spec: String, message: String },

    /// Dependency graph collection or transformation failed.
    #[error("Dependency resolution failed: {message}")]
    Resolution { message: String },

    /// No version satisfies every range constraint of a conflict group.
    #[error("Could not resolve version conflict for {key} with requested versions {versions}")]
    #[diagnostic(help("Paths to the conflicting dependencies:\n{paths}"))]
    UnsolvableConflict {
        key: String,
        versions: String,
        paths: String,
    },

    /// An update check was handed to the manager without the data it needs.
    #[error("Invalid update check: {message}")]
    InvalidCheck { message: String },

    /// Reading or writing a tracking record failed.
    #[error("Tracking file error: {message}")]
    Tracking { message: String },

    /// Catch-all for miscellaneous errors.
    #[error("{message}")]
    Generic { message: String },
}
