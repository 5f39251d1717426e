//! Error types for phylosig

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for phylosig operations
pub type Result<T> = std::result::Result<T, PhylosigError>;

/// Error types that can occur while building or comparing signatures
#[derive(Debug, Error)]
pub enum PhylosigError {
    /// I/O error opening or reading a proteome file, or writing the matrix
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed genome list file
    #[error("Malformed list file at line {line}: {msg}")]
    ListFormat {
        /// Line number where the error occurred
        line: usize,
        /// Error message
        msg: String,
    },

    /// A proteome body byte with no residue code ('J', 'O', or any
    /// non-letter). Indexing count arrays with the sentinel would be
    /// out of bounds, so the run stops here.
    #[error("Invalid residue byte 0x{:02x} in {}", .byte, .path.display())]
    InvalidResidue {
        /// File containing the offending byte
        path: PathBuf,
        /// The byte itself
        byte: u8,
    },

    /// Unreachable state; indicates a bug in the pipeline itself
    #[error("Internal invariant violated: {0}")]
    InternalInvariant(String),
}
