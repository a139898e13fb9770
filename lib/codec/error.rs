//! Errors produced while resolving, listing, opening and reading codec nodes.

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Everything that can go wrong between the source tree and a FUSE reply.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Nothing exists at the literal path and no mapping redirects it.
    #[error("no such entry: {}", .0.display())]
    NotFound(PathBuf),

    /// A directory-only operation was attempted on a file.
    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// A file-only operation was attempted on a directory.
    #[error("is a directory: {}", .0.display())]
    IsADirectory(PathBuf),

    /// Underlying filesystem failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The encoder program could not be started.
    #[error("failed to spawn encoder {program:?}: {source}")]
    EncoderSpawn {
        /// Program that was being spawned.
        program: String,
        /// Underlying OS failure.
        source: std::io::Error,
    },

    /// The encoder started but its stdout pipe was not handed to us.
    #[error("encoder {0:?} has no stdout pipe")]
    EncoderPipe(String),

    /// The encoder ran to completion and reported failure.
    #[error("encoder exited unsuccessfully: {0}")]
    EncoderExit(ExitStatus),
}

impl From<CodecError> for i32 {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::NotFound(_) => libc::ENOENT,
            CodecError::NotADirectory(_) => libc::ENOTDIR,
            CodecError::IsADirectory(_) => libc::EISDIR,
            CodecError::Io(io) => io.raw_os_error().unwrap_or(libc::EIO),
            CodecError::EncoderSpawn { .. }
            | CodecError::EncoderPipe(_)
            | CodecError::EncoderExit(_) => libc::EIO,
        }
    }
}

impl From<CodecError> for std::io::Error {
    fn from(e: CodecError) -> Self {
        Self::from_raw_os_error(i32::from(e))
    }
}
