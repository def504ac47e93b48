//! Error type shared by the library and the binary.
//!
//! Argument problems are detected before any tree is touched and carry the
//! process exit code the binary should use. Parse failures keep the message
//! produced by whichever parser rejected the input.

use crate::io::TreeFormat;
use phylotree::tree::TreeError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MapperError {
    /// A command-line value failed validation.
    #[error("{message}")]
    InvalidArgument { message: String, exit_code: i32 },

    /// Tree content does not match the declared format.
    #[error("could not parse {format} tree: {message}")]
    Parse { format: TreeFormat, message: String },

    /// Reading or writing a file failed.
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Structural error reported by `phylotree` while converting a tree.
    #[error(transparent)]
    Tree(#[from] TreeError),
}

pub type Result<T> = std::result::Result<T, MapperError>;

impl MapperError {
    /// Validation error exiting with code 1.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        MapperError::InvalidArgument { message: message.into(), exit_code: 1 }
    }

    /// Overrides the exit code of an `InvalidArgument`; other variants are returned unchanged.
    pub fn with_exit_code(self, code: i32) -> Self {
        match self {
            MapperError::InvalidArgument { message, .. } => {
                MapperError::InvalidArgument { message, exit_code: code }
            }
            other => other,
        }
    }

    pub fn parse(format: TreeFormat, message: impl Into<String>) -> Self {
        MapperError::Parse { format, message: message.into() }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MapperError::Io { path: path.into(), source }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            MapperError::InvalidArgument { exit_code, .. } => *exit_code,
            _ => 1,
        }
    }
}
