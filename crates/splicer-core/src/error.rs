//! Error types for include splicing.

use std::io;
use std::path::PathBuf;

/// Error produced while splicing a document.
///
/// A line that merely looks like a directive is never an error; it is passed
/// through as ordinary text. Missing include targets only surface here when
/// [`MissingInclude::Error`](crate::MissingInclude::Error) is configured.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SpliceError {
    /// The root document could not be opened.
    #[error("cannot open {}: {source}", path.display())]
    RootOpen {
        /// Path of the root document.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// An included file could not be opened.
    #[error("cannot open include {} (line {line}): {source}", path.display())]
    IncludeOpen {
        /// Resolved path of the included file.
        path: PathBuf,
        /// Line of the directive in the including file (1-indexed).
        line: usize,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// A file includes itself, directly or through other files.
    #[error("include cycle detected at {}", path.display())]
    IncludeCycle {
        /// Path that is already being spliced further up the chain.
        path: PathBuf,
    },

    /// Includes are nested deeper than the configured limit.
    #[error("maximum include depth ({limit}) exceeded at {}", path.display())]
    DepthExceeded {
        /// Path whose inclusion would exceed the limit.
        path: PathBuf,
        /// Configured nesting limit.
        limit: usize,
    },

    /// Reading or decoding a source failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<SpliceError> for io::Error {
    fn from(err: SpliceError) -> Self {
        let kind = match &err {
            SpliceError::RootOpen { source, .. } | SpliceError::IncludeOpen { source, .. } => {
                source.kind()
            }
            _ => io::ErrorKind::Other,
        };
        match err {
            SpliceError::Io(err) => err,
            other => io::Error::new(kind, other),
        }
    }
}
