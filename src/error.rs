use std::path::PathBuf;

use thiserror::Error;

use crate::model::Position;

/// Failures surfaced by the source file provider.
///
/// An import that cannot be resolved is not an error; see
/// [`Resolution::Unresolved`](crate::resolver::Resolution::Unresolved).
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The project configuration could not be read, parsed, or merged.
    /// Fatal: no provider exists without a valid configuration.
    #[error("invalid project configuration {}: {message}", path.display())]
    Configuration { path: PathBuf, message: String },

    /// A specific source file could not be read.
    #[error("cannot read source file {}: {source}", path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A specific source file could not be parsed.
    #[error("syntax error in {} at {position}: {message}", path.display())]
    Syntax {
        path: PathBuf,
        position: Position,
        message: String,
    },

    /// The caller passed a specifier or containing file the resolver cannot work with.
    #[error("invalid module specifier {specifier:?}: {reason}")]
    InvalidSpecifier { specifier: String, reason: String },

    /// The parsing service itself failed (as opposed to the file being malformed).
    #[error("parser failure for {}: {message}", path.display())]
    Parser { path: PathBuf, message: String },
}

impl ProviderError {
    pub(crate) fn configuration(path: impl Into<PathBuf>, err: &anyhow::Error) -> Self {
        ProviderError::Configuration {
            path: path.into(),
            message: format!("{:#}", err),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;
