//! Include path resolution.

use std::io;
use std::path::{Path, PathBuf};

/// A file to splice together with the directory its own includes resolve
/// against.
///
/// # Example
///
/// ```
/// use std::path::Path;
/// use splicer_core::ResolvedPath;
///
/// let resolved = ResolvedPath::resolve(Path::new("/docs/sub"), "parts/a.txt");
/// assert_eq!(resolved.path, Path::new("/docs/sub/parts/a.txt"));
/// assert_eq!(resolved.base_dir, Path::new("/docs/sub/parts"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// File to open.
    pub path: PathBuf,
    /// Directory containing `path`.
    pub base_dir: PathBuf,
}

impl ResolvedPath {
    /// Resolve a path written inside a directive.
    ///
    /// Absolute paths are used verbatim. Relative paths are joined onto
    /// `base_dir`, the directory of the file containing the directive.
    #[must_use]
    pub fn resolve(base_dir: &Path, raw: &str) -> Self {
        let raw = Path::new(raw);
        let path = if raw.is_absolute() {
            raw.to_path_buf()
        } else {
            base_dir.join(raw)
        };
        Self::from_path(path)
    }

    /// Resolve the root document against the process working directory.
    pub fn root(path: impl AsRef<Path>) -> io::Result<Self> {
        std::path::absolute(path.as_ref()).map(Self::from_path)
    }

    fn from_path(path: PathBuf) -> Self {
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self { path, base_dir }
    }
}
