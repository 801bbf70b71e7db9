//! Root document facade.
//!
//! [`Preprocessor`] opens the root file and exposes the merged stream as
//! characters, lines, or UTF-8 bytes through [`std::io::Read`].

use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::{ResolvedPath, SkippedInclude, SpliceError, SpliceOptions, SplicingReader};

/// Merged view of a root document and everything it includes.
///
/// Failing to open the root file is a hard error from [`open`](Self::open),
/// unlike included files, whose handling follows
/// [`MissingInclude`](crate::MissingInclude).
///
/// # Example
///
/// ```no_run
/// use splicer_core::{Preprocessor, SpliceOptions};
///
/// let mut pp = Preprocessor::open("notes/index.txt", SpliceOptions::universal())?;
/// let mut line = String::new();
/// while pp.read_line(&mut line)? > 0 {
///     line.clear();
/// }
/// for skipped in pp.skipped_includes() {
///     eprintln!("skipped {}", skipped.path.display());
/// }
/// # Ok::<(), splicer_core::SpliceError>(())
/// ```
pub struct Preprocessor {
    root: SplicingReader,
    path: PathBuf,
    /// UTF-8 bytes of a character partially handed out by `read`.
    pending: [u8; 4],
    pending_pos: usize,
    pending_len: usize,
    /// Error hit after `read` had already filled part of a buffer.
    deferred: Option<SpliceError>,
}

impl Preprocessor {
    /// Open a root document.
    ///
    /// A relative `path` is made absolute against the current working
    /// directory once, here.
    pub fn open(path: impl AsRef<Path>, options: SpliceOptions) -> Result<Self, SpliceError> {
        let path = path.as_ref();
        let resolved = ResolvedPath::root(path).map_err(|source| SpliceError::RootOpen {
            path: path.to_path_buf(),
            source,
        })?;

        let file = options
            .open(&resolved.path)
            .map_err(|source| SpliceError::RootOpen {
                path: resolved.path.clone(),
                source,
            })?;

        tracing::debug!(
            path = %resolved.path.display(),
            encoding = %options.encoding(),
            "Opened root document"
        );

        let source = options.encoding().prepare(file);
        let root = SplicingReader::new(source, resolved.base_dir, options).with_origin(&resolved.path);

        Ok(Self {
            root,
            path: resolved.path,
            pending: [0; 4],
            pending_pos: 0,
            pending_len: 0,
            deferred: None,
        })
    }

    /// Absolute path of the root document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return the next character without consuming it.
    pub fn peek(&mut self) -> Result<Option<char>, SpliceError> {
        self.root.peek()
    }

    /// Return and consume the next character.
    pub fn next_char(&mut self) -> Result<Option<char>, SpliceError> {
        self.root.take()
    }

    /// Whether the merged stream is exhausted.
    pub fn is_eof(&mut self) -> Result<bool, SpliceError> {
        Ok(self.peek()?.is_none())
    }

    /// Append the next line, terminator included, to `buf`.
    ///
    /// Returns the number of bytes appended; `0` means end of stream.
    pub fn read_line(&mut self, buf: &mut String) -> Result<usize, SpliceError> {
        let start = buf.len();
        while let Some(c) = self.root.take()? {
            buf.push(c);
            if c == '\n' {
                break;
            }
        }
        Ok(buf.len() - start)
    }

    /// Includes skipped because their target could not be opened.
    ///
    /// Complete once the stream has been read to the end.
    #[must_use]
    pub fn skipped_includes(&self) -> &[SkippedInclude] {
        self.root.skipped_includes()
    }
}

impl Iterator for Preprocessor {
    type Item = Result<char, SpliceError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_char().transpose()
    }
}

impl Read for Preprocessor {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(err) = self.deferred.take() {
            return Err(err.into());
        }

        let mut written = 0;
        while written < buf.len() {
            if self.pending_pos == self.pending_len {
                match self.root.take() {
                    Ok(Some(c)) => {
                        self.pending_len = c.encode_utf8(&mut self.pending).len();
                        self.pending_pos = 0;
                    }
                    Ok(None) => break,
                    Err(err) if written > 0 => {
                        self.deferred = Some(err);
                        break;
                    }
                    Err(err) => return Err(err.into()),
                }
            }

            let n = (self.pending_len - self.pending_pos).min(buf.len() - written);
            buf[written..written + n]
                .copy_from_slice(&self.pending[self.pending_pos..self.pending_pos + n]);
            self.pending_pos += n;
            written += n;
        }
        Ok(written)
    }
}
