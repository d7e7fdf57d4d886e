use std::path::PathBuf;
use thiserror::Error;

use crate::classfile::ClassFileError;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed class file {}: {source}", path.display())]
    MalformedClassFile {
        path: PathBuf,
        #[source]
        source: ClassFileError,
    },
    #[error("malformed archive {}: {source}", path.display())]
    MalformedArchive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
}

impl ScanError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ScanError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
