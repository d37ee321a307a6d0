use std::path::PathBuf;
use thiserror::Error;

/// Shape and loading errors. The resolver turns these into notifications; none
/// of them ever escapes a resolution pass.
#[derive(Debug, Error)]
pub enum SpecError {
    #[error("invalid plugin spec: missing `url`, `repo` or `dir` in {0}")]
    MissingSource(String),

    #[error("you can't import modules from `{0}`, it is reserved")]
    ReservedImport(String),

    #[error("no specs found for module `{0}`")]
    NoSpecsFound(String),

    #[error("invalid field `{field}`: expected {expected}")]
    InvalidField {
        field: String,
        expected: &'static str,
    },

    #[error("module `{0}` not found")]
    ModuleNotFound(String),

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: {source}", .path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl SpecError {
    pub(crate) fn invalid(field: impl Into<String>, expected: &'static str) -> Self {
        Self::InvalidField {
            field: field.into(),
            expected,
        }
    }
}
