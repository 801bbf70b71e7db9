//! Splicing configuration shared by every reader in an include chain.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use crate::{DirectiveGrammar, Encoding, RegexGrammar};

/// Type alias for the file opening callback.
pub type OpenFileFn = dyn Fn(&Path) -> io::Result<Box<dyn Read>> + Send + Sync;

/// What to do when an included file cannot be opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum MissingInclude {
    /// Drop the directive, emit nothing for it and record a
    /// [`SkippedInclude`](crate::SkippedInclude).
    #[default]
    Skip,
    /// Fail the read with [`SpliceError::IncludeOpen`](crate::SpliceError::IncludeOpen).
    Error,
}

impl FromStr for MissingInclude {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "skip" => Ok(Self::Skip),
            "error" => Ok(Self::Error),
            _ => Err(format!("unknown missing include policy '{s}' (expected skip or error)")),
        }
    }
}

/// Configuration for splicing.
///
/// # Example
///
/// ```
/// use splicer_core::{Encoding, MissingInclude, SpliceOptions};
///
/// let options = SpliceOptions::universal()
///     .with_encoding(Encoding::Utf16)
///     .with_missing_include(MissingInclude::Error)
///     .with_max_depth(8);
/// assert_eq!(options.max_depth(), 8);
/// ```
#[derive(Clone)]
pub struct SpliceOptions {
    grammar: Arc<dyn DirectiveGrammar + Send + Sync>,
    encoding: Encoding,
    missing_include: MissingInclude,
    max_depth: usize,
    open_file: Arc<OpenFileFn>,
}

impl SpliceOptions {
    /// Default nesting limit.
    pub const DEFAULT_MAX_DEPTH: usize = 32;

    /// Create options for the given grammar.
    #[must_use]
    pub fn new<G: DirectiveGrammar + Send + Sync + 'static>(grammar: G) -> Self {
        Self {
            grammar: Arc::new(grammar),
            encoding: Encoding::default(),
            missing_include: MissingInclude::default(),
            max_depth: Self::DEFAULT_MAX_DEPTH,
            open_file: Arc::new(default_open_file),
        }
    }

    /// Options for the `[[ #includize "path" ]]` grammar.
    #[must_use]
    pub fn universal() -> Self {
        Self::new(RegexGrammar::universal())
    }

    /// Options for the `#[[include "path"]]` grammar.
    #[must_use]
    pub fn toml() -> Self {
        Self::new(RegexGrammar::toml())
    }

    /// Set the character encoding of every spliced file.
    #[must_use]
    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Set the policy for include targets that cannot be opened.
    #[must_use]
    pub fn with_missing_include(mut self, policy: MissingInclude) -> Self {
        self.missing_include = policy;
        self
    }

    /// Set the maximum include nesting depth.
    #[must_use]
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Set the file opening callback.
    ///
    /// Default: [`File::open`].
    #[must_use]
    pub fn with_open_file<F>(mut self, open_file: F) -> Self
    where
        F: Fn(&Path) -> io::Result<Box<dyn Read>> + Send + Sync + 'static,
    {
        self.open_file = Arc::new(open_file);
        self
    }

    /// Directive grammar.
    #[must_use]
    pub fn grammar(&self) -> &(dyn DirectiveGrammar + Send + Sync) {
        self.grammar.as_ref()
    }

    /// Character encoding.
    #[must_use]
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Policy for include targets that cannot be opened.
    #[must_use]
    pub fn missing_include(&self) -> MissingInclude {
        self.missing_include
    }

    /// Maximum include nesting depth.
    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Open a file through the configured callback.
    pub(crate) fn open(&self, path: &Path) -> io::Result<Box<dyn Read>> {
        (self.open_file)(path)
    }
}

impl fmt::Debug for SpliceOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpliceOptions")
            .field("trigger", &self.grammar.trigger())
            .field("pattern", &self.grammar.pattern().as_str())
            .field("encoding", &self.encoding)
            .field("missing_include", &self.missing_include)
            .field("max_depth", &self.max_depth)
            .finish_non_exhaustive()
    }
}

/// Open a regular file.
///
/// Directories open successfully on some platforms and only fail on the first
/// read, so they are rejected here where the missing include policy applies.
fn default_open_file(path: &Path) -> io::Result<Box<dyn Read>> {
    let file = File::open(path)?;
    if file.metadata()?.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::IsADirectory,
            format!("{} is a directory", path.display()),
        ));
    }
    Ok(Box::new(file))
}
