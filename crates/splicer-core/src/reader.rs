//! Pull-based splicing reader.
//!
//! A [`SplicingReader`] produces the characters of one source with every
//! include directive replaced by the output of a nested reader over the
//! referenced file. Work happens lazily, one character at a time:
//!
//! 1. An active nested reader supplies characters until it is exhausted, at
//!    which point it is dropped along with its file handle.
//! 2. Otherwise the next character comes from the lookahead buffer, or from
//!    the source when the buffer is empty.
//! 3. A character equal to the grammar's trigger causes the rest of its line
//!    to be buffered and matched against the grammar's pattern. A match
//!    consumes the directive and installs a nested reader; anything else is
//!    emitted unchanged.

use std::collections::VecDeque;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{CharSource, MissingInclude, ResolvedPath, SpliceError, SpliceOptions};

/// An include directive whose target could not be opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedInclude {
    /// Resolved path of the missing file.
    pub path: PathBuf,
    /// File containing the directive, if known.
    pub included_from: Option<PathBuf>,
    /// Line of the directive (1-indexed).
    pub line: usize,
    /// Why opening failed.
    pub reason: String,
}

/// Reader that splices included files into a character stream.
///
/// Owns at most one nested reader at a time. Sibling directives are handled
/// strictly in sequence: the first include is exhausted and dropped before the
/// second is opened. Dropping a reader drops its whole nested chain.
///
/// # Example
///
/// ```
/// use std::io::Cursor;
/// use splicer_core::{SpliceOptions, SplicingReader};
///
/// let text = "no directives here\n";
/// let mut reader = SplicingReader::from_reader(Cursor::new(text), ".", SpliceOptions::universal());
///
/// let mut out = String::new();
/// while let Some(c) = reader.take()? {
///     out.push(c);
/// }
/// assert_eq!(out, text);
/// # Ok::<(), splicer_core::SpliceError>(())
/// ```
pub struct SplicingReader {
    source: Box<dyn CharSource>,
    source_done: bool,
    base_dir: PathBuf,
    /// Path of the file this reader splices, if known.
    origin: Option<PathBuf>,
    options: Arc<SpliceOptions>,
    /// Canonical paths of this file and every file including it.
    ancestors: Vec<PathBuf>,
    depth: usize,
    lookahead: VecDeque<char>,
    include: Option<Box<SplicingReader>>,
    /// Next character, already decided but not yet taken.
    next: Option<char>,
    line: usize,
    skipped: Vec<SkippedInclude>,
}

impl SplicingReader {
    /// Create a reader over a character source.
    ///
    /// Relative include paths are resolved against `base_dir`.
    #[must_use]
    pub fn new(
        source: Box<dyn CharSource>,
        base_dir: impl Into<PathBuf>,
        options: SpliceOptions,
    ) -> Self {
        Self::with_parts(source, base_dir.into(), Arc::new(options), Vec::new(), 0)
    }

    /// Create a reader over a byte stream, decoded with the configured encoding.
    #[must_use]
    pub fn from_reader<R: Read + 'static>(
        reader: R,
        base_dir: impl Into<PathBuf>,
        options: SpliceOptions,
    ) -> Self {
        let source = options.encoding().prepare(reader);
        Self::new(source, base_dir, options)
    }

    fn with_parts(
        source: Box<dyn CharSource>,
        base_dir: PathBuf,
        options: Arc<SpliceOptions>,
        ancestors: Vec<PathBuf>,
        depth: usize,
    ) -> Self {
        Self {
            source,
            source_done: false,
            base_dir,
            origin: None,
            options,
            ancestors,
            depth,
            lookahead: VecDeque::new(),
            include: None,
            next: None,
            line: 1,
            skipped: Vec::new(),
        }
    }

    /// Record the file this reader splices, for cycle detection and diagnostics.
    #[must_use]
    pub(crate) fn with_origin(mut self, path: &Path) -> Self {
        self.ancestors.push(canonical(path));
        self.origin = Some(path.to_path_buf());
        self
    }

    /// Return the next character without consuming it.
    ///
    /// Repeated calls without an intervening [`take`](Self::take) return the
    /// same character.
    pub fn peek(&mut self) -> Result<Option<char>, SpliceError> {
        if self.next.is_none() {
            self.next = self.produce()?;
        }
        Ok(self.next)
    }

    /// Return and consume the next character.
    pub fn take(&mut self) -> Result<Option<char>, SpliceError> {
        let c = self.peek()?;
        self.next = None;
        Ok(c)
    }

    /// Directory relative include paths are resolved against.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Nesting depth of this reader (0 for the root).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Includes skipped so far because their target could not be opened.
    ///
    /// Entries from a nested reader are added once it has been exhausted.
    #[must_use]
    pub fn skipped_includes(&self) -> &[SkippedInclude] {
        &self.skipped
    }

    fn produce(&mut self) -> Result<Option<char>, SpliceError> {
        loop {
            if let Some(include) = self.include.as_mut() {
                if let Some(c) = include.take()? {
                    return Ok(Some(c));
                }
                self.close_include();
            }

            let Some(c) = self.next_own()? else {
                return Ok(None);
            };

            if c == self.options.grammar().trigger() && self.try_directive()? {
                continue;
            }

            if c == '\n' {
                self.line += 1;
            }
            return Ok(Some(c));
        }
    }

    fn next_own(&mut self) -> io::Result<Option<char>> {
        match self.lookahead.pop_front() {
            Some(c) => Ok(Some(c)),
            None => self.read_raw(),
        }
    }

    fn read_raw(&mut self) -> io::Result<Option<char>> {
        if self.source_done {
            return Ok(None);
        }
        let c = self.source.next_char()?;
        self.source_done = c.is_none();
        Ok(c)
    }

    /// Buffer the rest of the current line, returning its length without the
    /// terminator.
    fn buffer_line(&mut self) -> io::Result<usize> {
        loop {
            match self.read_raw()? {
                Some('\n') => {
                    let len = self.lookahead.len();
                    self.lookahead.push_back('\n');
                    return Ok(len);
                }
                Some(c) => self.lookahead.push_back(c),
                None => return Ok(self.lookahead.len()),
            }
        }
    }

    /// Check whether the trigger just consumed starts a directive.
    ///
    /// On a match the directive text is removed from the lookahead buffer and
    /// the include is opened. Otherwise the buffer is left untouched.
    fn try_directive(&mut self) -> Result<bool, SpliceError> {
        let line_len = match self.lookahead.iter().position(|&c| c == '\n') {
            Some(pos) => pos,
            None => self.buffer_line()?,
        };
        let line: String = self.lookahead.iter().take(line_len).collect();

        let grammar = self.options.grammar();
        let Some(caps) = grammar.pattern().captures(&line) else {
            return Ok(false);
        };
        let (Some(whole), Some(raw)) = (caps.get(0), caps.get(grammar.path_group())) else {
            return Ok(false);
        };
        if whole.start() != 0 {
            return Ok(false);
        }
        let raw_path = grammar.unescape(&grammar.path_from_capture(raw.as_str()));

        let directive_line = self.line;
        if grammar.discard_trailing() {
            let with_terminator = line_len < self.lookahead.len();
            self.lookahead.drain(..line_len + usize::from(with_terminator));
            if with_terminator {
                self.line += 1;
            }
        } else {
            let matched = line[..whole.end()].chars().count();
            self.lookahead.drain(..matched);
        }

        let resolved = ResolvedPath::resolve(&self.base_dir, &raw_path);
        self.open_include(resolved, directive_line)?;
        Ok(true)
    }

    fn open_include(&mut self, resolved: ResolvedPath, line: usize) -> Result<(), SpliceError> {
        let canonical = canonical(&resolved.path);
        if self.ancestors.contains(&canonical) {
            return Err(SpliceError::IncludeCycle {
                path: resolved.path,
            });
        }

        let limit = self.options.max_depth();
        if self.depth >= limit {
            return Err(SpliceError::DepthExceeded {
                path: resolved.path,
                limit,
            });
        }

        let file = match self.options.open(&resolved.path) {
            Ok(file) => file,
            Err(source) => return self.skip_or_fail(resolved.path, line, source),
        };

        tracing::debug!(
            path = %resolved.path.display(),
            depth = self.depth + 1,
            line,
            "Opened include"
        );

        let mut ancestors = self.ancestors.clone();
        ancestors.push(canonical);
        let mut nested = Self::with_parts(
            self.options.encoding().prepare(file),
            resolved.base_dir,
            Arc::clone(&self.options),
            ancestors,
            self.depth + 1,
        );
        nested.origin = Some(resolved.path);
        self.include = Some(Box::new(nested));
        Ok(())
    }

    fn skip_or_fail(
        &mut self,
        path: PathBuf,
        line: usize,
        source: io::Error,
    ) -> Result<(), SpliceError> {
        match self.options.missing_include() {
            MissingInclude::Error => Err(SpliceError::IncludeOpen { path, line, source }),
            MissingInclude::Skip => {
                tracing::warn!(
                    path = %path.display(),
                    line,
                    error = %source,
                    "Skipping include that cannot be opened"
                );
                self.skipped.push(SkippedInclude {
                    path,
                    included_from: self.origin.clone(),
                    line,
                    reason: source.to_string(),
                });
                Ok(())
            }
        }
    }

    fn close_include(&mut self) {
        if let Some(mut include) = self.include.take() {
            if let Some(path) = &include.origin {
                tracing::debug!(path = %path.display(), "Closed include");
            }
            self.skipped.append(&mut include.skipped);
        }
    }
}

/// Canonical form of a path for cycle detection, or the path itself when it
/// cannot be canonicalized.
fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
