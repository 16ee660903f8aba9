use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvertError {
    /// Rejected before any file is touched.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("input file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("interim file holds {actual} bytes, expected {expected}")]
    InterimLength { expected: u64, actual: u64 },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ConvertError>;

impl ConvertError {
    pub fn config(msg: impl Into<String>) -> Self {
        ConvertError::Configuration(msg.into())
    }
}

/// Attaches an operation and path to a raw `io::Error`.
pub trait IoContext<T> {
    fn io_context(self, what: &str, path: &Path) -> Result<T>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn io_context(self, what: &str, path: &Path) -> Result<T> {
        self.map_err(|source| ConvertError::Io {
            context: format!("{} {}", what, path.display()),
            source,
        })
    }
}
