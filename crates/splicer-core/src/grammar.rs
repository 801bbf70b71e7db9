//! Include directive grammars.
//!
//! A grammar tells the reader which character may open a directive and how
//! to pull a file path out of the rest of that line. Two grammars ship with
//! the crate:
//!
//! - `universal`: `[[ #includize "path/to/file" ]]`, usable in arbitrary text.
//! - `toml`: `#[[include "path/to/file"]]`, a TOML comment shaped like an
//!   array-of-tables header, so parsers that do not preprocess ignore it.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// Quoted path with `\"` and `\\` escapes.
const QUOTED_PATH: &str = r#""((?:\\.|[^"\\])+)""#;

static UNIVERSAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^\[\s*#includize\s*{QUOTED_PATH}\s*\]\]")).unwrap()
});

static TOML_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"^\s*\[\[include\s*{QUOTED_PATH}\s*\]\]")).unwrap());

/// Recognition rules for include directives.
///
/// The reader consumes the trigger character first and then matches
/// [`pattern`](Self::pattern) against the remainder of the line. Only a match
/// starting at the first character of that remainder is a directive.
pub trait DirectiveGrammar {
    /// Character that can start a directive. Used as a cheap pre-filter.
    fn trigger(&self) -> char;

    /// Pattern matched against the line remainder after the trigger.
    fn pattern(&self) -> &Regex;

    /// Capture group holding the raw file path.
    fn path_group(&self) -> usize {
        1
    }

    /// Whether characters after a directive on the same line are dropped.
    fn discard_trailing(&self) -> bool {
        true
    }

    /// Convert captured text into a path string.
    fn path_from_capture(&self, raw: &str) -> String {
        raw.to_owned()
    }

    /// Resolve escape sequences inside a path string.
    fn unescape(&self, path: &str) -> String {
        unescape_quoted(path)
    }
}

/// Regex-backed [`DirectiveGrammar`].
///
/// # Example
///
/// ```
/// use splicer_core::{DirectiveGrammar, RegexGrammar};
///
/// let grammar = RegexGrammar::universal();
/// assert_eq!(grammar.trigger(), '[');
/// assert!(grammar.pattern().is_match(r#"[ #includize "part.txt" ]]"#));
/// ```
#[derive(Clone)]
pub struct RegexGrammar {
    name: String,
    trigger: char,
    pattern: Regex,
    path_group: usize,
    discard_trailing: bool,
}

impl RegexGrammar {
    /// Create a custom grammar.
    ///
    /// # Errors
    ///
    /// Returns an error if `pattern` is not a valid regular expression.
    pub fn new(trigger: char, pattern: &str, path_group: usize) -> Result<Self, regex::Error> {
        Ok(Self {
            name: "custom".to_owned(),
            trigger,
            pattern: Regex::new(pattern)?,
            path_group,
            discard_trailing: true,
        })
    }

    /// The `[[ #includize "path" ]]` grammar.
    #[must_use]
    pub fn universal() -> Self {
        Self {
            name: "universal".to_owned(),
            trigger: '[',
            pattern: UNIVERSAL_RE.clone(),
            path_group: 1,
            discard_trailing: true,
        }
    }

    /// The `#[[include "path"]]` grammar for TOML documents.
    #[must_use]
    pub fn toml() -> Self {
        Self {
            name: "toml".to_owned(),
            trigger: '#',
            pattern: TOML_RE.clone(),
            path_group: 1,
            discard_trailing: true,
        }
    }

    /// Keep or drop text following a directive on the same line.
    #[must_use]
    pub fn with_discard_trailing(mut self, discard: bool) -> Self {
        self.discard_trailing = discard;
        self
    }

    /// Grammar name (`universal`, `toml` or `custom`).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl DirectiveGrammar for RegexGrammar {
    fn trigger(&self) -> char {
        self.trigger
    }

    fn pattern(&self) -> &Regex {
        &self.pattern
    }

    fn path_group(&self) -> usize {
        self.path_group
    }

    fn discard_trailing(&self) -> bool {
        self.discard_trailing
    }
}

impl fmt::Debug for RegexGrammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegexGrammar")
            .field("name", &self.name)
            .field("trigger", &self.trigger)
            .field("pattern", &self.pattern.as_str())
            .field("path_group", &self.path_group)
            .field("discard_trailing", &self.discard_trailing)
            .finish()
    }
}

/// Replace `\"` with `"` and `\\` with `\`.
///
/// Any other backslash sequence is kept verbatim, so Windows-style paths pass
/// through unchanged.
fn unescape_quoted(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut chars = path.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(next @ ('"' | '\\')) => out.push(next),
            Some(next) => {
                out.push('\\');
                out.push(next);
            }
            None => out.push('\\'),
        }
    }
    out
}
