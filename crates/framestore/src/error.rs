//! Errors surfaced by the frame store.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::codec::CodecError;
use crate::id::FrameId;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The storage directory cannot be created, reached or written.
    #[error("frame store at {path} is unusable: {source}")]
    Init {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// No frame is stored under this id.
    #[error("frame {id} not found")]
    NotFound { id: String },

    /// The stored bytes for this id do not decode.
    #[error("frame {id} is corrupt on disk: {source}")]
    CorruptData {
        id: FrameId,
        #[source]
        source: CodecError,
    },

    /// A new frame could not be persisted.
    #[error("failed to write frame to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("frame store is in read-only mode")]
    ReadOnly,
}

impl StoreError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;
