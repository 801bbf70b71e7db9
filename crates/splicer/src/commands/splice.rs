//! `splicer` command implementation.

use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::Args;
use splicer_config::{CliSettings, Config, GrammarKind};
use splicer_core::{Encoding, MissingInclude, Preprocessor, SkippedInclude};
use tempfile::NamedTempFile;

use crate::error::CliError;
use crate::output::Output;

/// Arguments for merging a root document.
#[derive(Args)]
pub(crate) struct SpliceArgs {
    /// Root document (overrides `input.root` in config).
    file: Option<PathBuf>,

    /// Path to configuration file (default: auto-discover splicer.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directive grammar: universal, toml or custom (overrides config).
    #[arg(short, long)]
    grammar: Option<GrammarKind>,

    /// Character encoding: utf-8, utf-16, utf-16be or utf-16le (overrides config).
    #[arg(short, long)]
    encoding: Option<Encoding>,

    /// Fail when an included file cannot be opened instead of skipping it.
    #[arg(long)]
    strict: bool,

    /// Maximum include nesting depth (overrides config).
    #[arg(long)]
    max_depth: Option<usize>,

    /// Write the merged document to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable verbose output (log every opened and closed include).
    #[arg(short, long)]
    pub verbose: bool,
}

impl SpliceArgs {
    /// Execute the command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails, the root document cannot be
    /// opened, or the merged stream cannot be read or written.
    pub(crate) fn execute(self, output: &Output) -> Result<(), CliError> {
        let config = Config::load(self.config.as_deref(), Some(&self.cli_settings()))?;
        let root = config.root.as_deref().ok_or_else(|| {
            CliError::Validation(
                "No root document: pass FILE or set input.root in splicer.toml".to_owned(),
            )
        })?;

        let mut preprocessor = Preprocessor::open(root, config.splice_options()?)?;

        match &self.output {
            Some(path) => {
                let bytes = splice_to_file(&mut preprocessor, path)?;
                output.info(&format!("Wrote {bytes} bytes to {}", path.display()));
            }
            None => {
                splice_into(&mut preprocessor, &mut io::stdout().lock())?;
            }
        }

        for skipped in preprocessor.skipped_includes() {
            output.warning(&describe_skipped(skipped));
        }

        Ok(())
    }

    /// Build config overrides from the arguments.
    fn cli_settings(&self) -> CliSettings {
        CliSettings {
            root: self.file.clone(),
            grammar: self.grammar,
            encoding: self.encoding,
            missing_include: self.strict.then_some(MissingInclude::Error),
            max_depth: self.max_depth,
        }
    }
}

/// Stream the merged document into `writer`.
fn splice_into(preprocessor: &mut Preprocessor, writer: &mut impl Write) -> Result<u64, CliError> {
    let bytes = io::copy(preprocessor, writer)?;
    writer.flush()?;
    Ok(bytes)
}

/// Stream the merged document into `path`.
///
/// Output goes to a temporary file next to `path` that replaces it only once
/// the whole document has been written.
fn splice_to_file(preprocessor: &mut Preprocessor, path: &Path) -> Result<u64, CliError> {
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;

    let bytes = splice_into(preprocessor, &mut BufWriter::new(&mut temp))?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(bytes)
}

fn describe_skipped(skipped: &SkippedInclude) -> String {
    match &skipped.included_from {
        Some(from) => format!(
            "Warning: skipped include {} ({}:{}): {}",
            skipped.path.display(),
            from.display(),
            skipped.line,
            skipped.reason
        ),
        None => format!(
            "Warning: skipped include {} (line {}): {}",
            skipped.path.display(),
            skipped.line,
            skipped.reason
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use clap::Parser;
    use pretty_assertions::assert_eq;
    use splicer_core::SpliceOptions;

    use super::*;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: SpliceArgs,
    }

    fn parse(args: &[&str]) -> SpliceArgs {
        TestCli::try_parse_from(std::iter::once("splicer").chain(args.iter().copied()))
            .unwrap()
            .args
    }

    #[test]
    fn test_cli_settings_from_flags() {
        let args = parse(&[
            "docs/base.toml",
            "-g",
            "toml",
            "-e",
            "utf-16le",
            "--strict",
            "--max-depth",
            "4",
        ]);
        let settings = args.cli_settings();

        assert_eq!(settings.root, Some(PathBuf::from("docs/base.toml")));
        assert_eq!(settings.grammar, Some(GrammarKind::Toml));
        assert_eq!(settings.encoding, Some(Encoding::Utf16Le));
        assert_eq!(settings.missing_include, Some(MissingInclude::Error));
        assert_eq!(settings.max_depth, Some(4));
    }

    #[test]
    fn test_cli_settings_default_to_config() {
        let settings = parse(&[]).cli_settings();

        assert!(settings.root.is_none());
        assert!(settings.grammar.is_none());
        assert!(settings.encoding.is_none());
        assert!(settings.missing_include.is_none());
        assert!(settings.max_depth.is_none());
    }

    #[test]
    fn test_unknown_encoding_is_rejected() {
        let result = TestCli::try_parse_from(["splicer", "-e", "latin-1"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_splice_into_writer() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("base.txt"),
            "head\n[[ #includize \"part.txt\" ]]\ntail\n",
        )
        .unwrap();
        fs::write(dir.path().join("part.txt"), "part\n").unwrap();

        let mut preprocessor =
            Preprocessor::open(dir.path().join("base.txt"), SpliceOptions::universal()).unwrap();
        let mut merged = Vec::new();
        let bytes = splice_into(&mut preprocessor, &mut merged).unwrap();

        assert_eq!(String::from_utf8(merged).unwrap(), "head\npart\ntail\n");
        assert_eq!(bytes, 15);
    }

    #[test]
    fn test_splice_into_surfaces_strict_miss() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("base.txt"), "[[ #includize \"gone.txt\" ]]\n").unwrap();

        let options = SpliceOptions::universal().with_missing_include(MissingInclude::Error);
        let mut preprocessor = Preprocessor::open(dir.path().join("base.txt"), options).unwrap();
        let err = splice_into(&mut preprocessor, &mut Vec::new()).unwrap_err();

        assert!(matches!(err, CliError::Io(_)));
        assert!(err.to_string().contains("gone.txt"));
    }

    #[test]
    fn test_splice_to_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("base.txt"), "a\n[[ #includize \"b.txt\" ]]\n").unwrap();
        fs::write(dir.path().join("b.txt"), "b\n").unwrap();
        let target = dir.path().join("merged.txt");
        fs::write(&target, "stale").unwrap();

        let mut preprocessor =
            Preprocessor::open(dir.path().join("base.txt"), SpliceOptions::universal()).unwrap();
        let bytes = splice_to_file(&mut preprocessor, &target).unwrap();

        assert_eq!(bytes, 4);
        assert_eq!(fs::read_to_string(&target).unwrap(), "a\nb\n");
    }

    #[test]
    fn test_failed_splice_leaves_no_output_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("base.txt"),
            "head\n[[ #includize \"gone.txt\" ]]\ntail\n",
        )
        .unwrap();
        let target = dir.path().join("merged.txt");

        let options = SpliceOptions::universal().with_missing_include(MissingInclude::Error);
        let mut preprocessor = Preprocessor::open(dir.path().join("base.txt"), options).unwrap();
        let err = splice_to_file(&mut preprocessor, &target).unwrap_err();

        assert!(err.to_string().contains("gone.txt"));
        assert!(!target.exists());
        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("base.txt")]);
    }

    #[test]
    fn test_failed_splice_keeps_existing_output_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("base.txt"), "[[ #includize \"base.txt\" ]]\n").unwrap();
        let target = dir.path().join("merged.txt");
        fs::write(&target, "previous\n").unwrap();

        let mut preprocessor =
            Preprocessor::open(dir.path().join("base.txt"), SpliceOptions::universal()).unwrap();
        assert!(splice_to_file(&mut preprocessor, &target).is_err());

        assert_eq!(fs::read_to_string(&target).unwrap(), "previous\n");
    }

    #[test]
    fn test_describe_skipped() {
        let skipped = SkippedInclude {
            path: PathBuf::from("/docs/gone.txt"),
            included_from: Some(PathBuf::from("/docs/base.txt")),
            line: 3,
            reason: "No such file or directory".to_owned(),
        };

        assert_eq!(
            describe_skipped(&skipped),
            "Warning: skipped include /docs/gone.txt (/docs/base.txt:3): No such file or directory"
        );
    }
}
