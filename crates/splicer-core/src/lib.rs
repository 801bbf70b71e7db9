//! Lazy recursive include splicing for text documents.
//!
//! This crate produces a single character stream from a root document in
//! which every include directive is replaced, in place, by the contents of the
//! file it names. Included files may include further files to any depth.
//! Nothing is materialized up front: characters are pulled one at a time and
//! included files are opened only when their directive is reached.
//!
//! # Architecture
//!
//! - [`DirectiveGrammar`]: how a directive looks (trigger character, line
//!   pattern, path unescaping). [`RegexGrammar`] ships the `universal` and
//!   `toml` grammars.
//! - [`Encoding`]: how the bytes of a file become characters.
//! - [`SplicingReader`]: the pull-based reader that detects directives and
//!   owns at most one nested reader at a time.
//! - [`Preprocessor`]: opens the root file and exposes the merged stream as a
//!   character iterator and as [`std::io::Read`].
//!
//! # Example
//!
//! ```no_run
//! use std::io::Read;
//! use splicer_core::{Preprocessor, SpliceOptions};
//!
//! let mut merged = String::new();
//! Preprocessor::open("config/base.toml", SpliceOptions::toml())?
//!     .read_to_string(&mut merged)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod encoding;
mod error;
mod grammar;
mod options;
mod path;
mod preprocessor;
mod reader;

pub use encoding::{CharSource, Encoding};
pub use error::SpliceError;
pub use grammar::{DirectiveGrammar, RegexGrammar};
pub use options::{MissingInclude, OpenFileFn, SpliceOptions};
pub use path::ResolvedPath;
pub use preprocessor::Preprocessor;
pub use reader::{SkippedInclude, SplicingReader};
