//! Configuration management for splicer.
//!
//! Parses `splicer.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! `input.root` supports environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default

mod expand;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;
use splicer_core::{DirectiveGrammar, Encoding, MissingInclude, RegexGrammar, SpliceOptions};

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override the root document.
    pub root: Option<PathBuf>,
    /// Override the directive grammar.
    pub grammar: Option<GrammarKind>,
    /// Override the character encoding.
    pub encoding: Option<Encoding>,
    /// Override the missing include policy.
    pub missing_include: Option<MissingInclude>,
    /// Override the maximum include depth.
    pub max_depth: Option<usize>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "splicer.toml";

/// Application configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Input configuration (paths are relative strings from TOML).
    input: InputConfigRaw,
    /// Preprocessing configuration.
    pub preprocess: PreprocessConfig,
    /// Custom grammar definition, used when `preprocess.grammar = "custom"`.
    pub grammar: Option<CustomGrammarConfig>,

    /// Resolved root document (set after loading).
    #[serde(skip)]
    pub root: Option<PathBuf>,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

/// Raw input configuration as parsed from TOML.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct InputConfigRaw {
    root: Option<String>,
}

/// Preprocessing configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Directive grammar.
    pub grammar: GrammarKind,
    /// Character encoding of every spliced file.
    pub encoding: Encoding,
    /// Policy for include targets that cannot be opened.
    pub missing_include: MissingInclude,
    /// Maximum include nesting depth.
    pub max_depth: usize,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            grammar: GrammarKind::default(),
            encoding: Encoding::default(),
            missing_include: MissingInclude::default(),
            max_depth: SpliceOptions::DEFAULT_MAX_DEPTH,
        }
    }
}

/// Built-in grammar selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrammarKind {
    /// `[[ #includize "path" ]]`
    #[default]
    Universal,
    /// `#[[include "path"]]`
    Toml,
    /// Defined by the `[grammar]` section.
    Custom,
}

impl fmt::Display for GrammarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Universal => "universal",
            Self::Toml => "toml",
            Self::Custom => "custom",
        })
    }
}

impl FromStr for GrammarKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "universal" => Ok(Self::Universal),
            "toml" => Ok(Self::Toml),
            "custom" => Ok(Self::Custom),
            _ => Err(format!(
                "unknown grammar '{s}' (expected universal, toml or custom)"
            )),
        }
    }
}

/// Custom grammar definition.
#[derive(Debug, Deserialize)]
pub struct CustomGrammarConfig {
    /// Character that can start a directive.
    pub trigger: Option<char>,
    /// Pattern matched against the line after the trigger.
    pub pattern: Option<String>,
    /// Capture group holding the file path.
    #[serde(default = "default_group")]
    pub group: usize,
    /// Whether text after a directive on the same line is dropped.
    #[serde(default = "default_discard_trailing")]
    pub discard_trailing: bool,
}

fn default_group() -> usize {
    1
}

fn default_discard_trailing() -> bool {
    true
}

impl CustomGrammarConfig {
    /// Build the grammar.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if a field is missing or the pattern
    /// does not compile.
    pub fn build(&self) -> Result<RegexGrammar, ConfigError> {
        let trigger = self
            .trigger
            .ok_or_else(|| ConfigError::Validation("grammar.trigger is required".to_owned()))?;
        let pattern = self
            .pattern
            .as_deref()
            .ok_or_else(|| ConfigError::Validation("grammar.pattern is required".to_owned()))?;
        if self.group == 0 {
            return Err(ConfigError::Validation(
                "grammar.group must be greater than 0".to_owned(),
            ));
        }

        let grammar = RegexGrammar::new(trigger, pattern, self.group)
            .map_err(|e| ConfigError::Validation(format!("grammar.pattern is invalid: {e}")))?;
        if self.group >= grammar.pattern().captures_len() {
            return Err(ConfigError::Validation(format!(
                "grammar.group {} does not exist in grammar.pattern",
                self.group
            )));
        }
        Ok(grammar.with_discard_trailing(self.discard_trailing))
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`input.root`").
        field: String,
        /// Error message (e.g., "${`DOCS_DIR`} not set").
        message: String,
    },
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `splicer.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails,
    /// or the result is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
            config.validate()?;
        }

        Ok(config)
    }

    /// Build splice options from the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if the custom grammar is missing or invalid.
    pub fn splice_options(&self) -> Result<SpliceOptions, ConfigError> {
        let options = match self.preprocess.grammar {
            GrammarKind::Universal => SpliceOptions::universal(),
            GrammarKind::Toml => SpliceOptions::toml(),
            GrammarKind::Custom => SpliceOptions::new(self.require_custom_grammar()?.build()?),
        };

        Ok(options
            .with_encoding(self.preprocess.encoding)
            .with_missing_include(self.preprocess.missing_include)
            .with_max_depth(self.preprocess.max_depth))
    }

    /// Validate configuration values.
    ///
    /// Called automatically after loading from file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.preprocess.max_depth == 0 {
            return Err(ConfigError::Validation(
                "preprocess.max_depth must be greater than 0".to_owned(),
            ));
        }

        if self.preprocess.grammar == GrammarKind::Custom {
            self.require_custom_grammar()?.build()?;
        }

        Ok(())
    }

    fn require_custom_grammar(&self) -> Result<&CustomGrammarConfig, ConfigError> {
        self.grammar.as_ref().ok_or_else(|| {
            ConfigError::Validation(
                "[grammar] section required when preprocess.grammar = \"custom\"".to_owned(),
            )
        })
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(root) = &settings.root {
            self.root = Some(root.clone());
        }
        if let Some(grammar) = settings.grammar {
            self.preprocess.grammar = grammar;
        }
        if let Some(encoding) = settings.encoding {
            self.preprocess.encoding = encoding;
        }
        if let Some(policy) = settings.missing_include {
            self.preprocess.missing_include = policy;
        }
        if let Some(max_depth) = settings.max_depth {
            self.preprocess.max_depth = max_depth;
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        // Expand environment variables before path resolution
        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        if let Some(ref root) = self.input.root {
            self.input.root = Some(expand::expand_env(root, "input.root")?);
        }
        Ok(())
    }

    /// Resolve relative paths against the config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        self.root = self.input.root.as_deref().map(|root| config_dir.join(root));
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.preprocess.grammar, GrammarKind::Universal);
        assert_eq!(config.preprocess.encoding, Encoding::Utf8);
        assert_eq!(config.preprocess.missing_include, MissingInclude::Skip);
        assert_eq!(config.preprocess.max_depth, SpliceOptions::DEFAULT_MAX_DEPTH);
        assert!(config.root.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.preprocess.grammar, GrammarKind::Universal);
        assert!(config.grammar.is_none());
    }

    #[test]
    fn test_parse_preprocess_config() {
        let toml = r#"
[preprocess]
grammar = "toml"
encoding = "utf-16le"
missing_include = "error"
max_depth = 4
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.preprocess.grammar, GrammarKind::Toml);
        assert_eq!(config.preprocess.encoding, Encoding::Utf16Le);
        assert_eq!(config.preprocess.missing_include, MissingInclude::Error);
        assert_eq!(config.preprocess.max_depth, 4);

        let options = config.splice_options().unwrap();
        assert_eq!(options.grammar().trigger(), '#');
        assert_eq!(options.encoding(), Encoding::Utf16Le);
        assert_eq!(options.max_depth(), 4);
    }

    #[test]
    fn test_parse_unknown_encoding_fails() {
        let toml = r#"
[preprocess]
encoding = "latin-1"
"#;
        assert!(toml::from_str::<Config>(toml).is_err());
    }

    #[test]
    fn test_custom_grammar() {
        let toml = r#"
[preprocess]
grammar = "custom"

[grammar]
trigger = "@"
pattern = '^include\s+"([^"]+)"'
discard_trailing = false
"#;
        let config: Config = toml::from_str(toml).unwrap();
        config.validate().unwrap();

        let options = config.splice_options().unwrap();
        let grammar = options.grammar();
        assert_eq!(grammar.trigger(), '@');
        assert_eq!(grammar.path_group(), 1);
        assert!(!grammar.discard_trailing());
    }

    #[test]
    fn test_custom_grammar_requires_section() {
        let toml = r#"
[preprocess]
grammar = "custom"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(
            matches!(err, ConfigError::Validation(_)),
            "Expected ConfigError::Validation, got {err:?}"
        );
        assert!(err.to_string().contains("[grammar]"));
    }

    #[test]
    fn test_custom_grammar_requires_trigger() {
        let toml = r#"
[preprocess]
grammar = "custom"

[grammar]
pattern = 'x'
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("grammar.trigger"));
    }

    #[test]
    fn test_custom_grammar_invalid_pattern() {
        let toml = r#"
[preprocess]
grammar = "custom"

[grammar]
trigger = "@"
pattern = '(unclosed'
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("grammar.pattern is invalid"));
    }

    #[test]
    fn test_custom_grammar_missing_group() {
        let toml = r#"
[preprocess]
grammar = "custom"

[grammar]
trigger = "@"
pattern = '^include\s+"[^"]+"'
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("grammar.group 1"));
    }

    #[test]
    fn test_max_depth_zero_is_invalid() {
        let toml = r"
[preprocess]
max_depth = 0
";
        let config: Config = toml::from_str(toml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_depth"));
    }

    #[test]
    fn test_resolve_paths() {
        let toml = r#"
[input]
root = "docs/base.toml"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.resolve_paths(Path::new("/project"));
        assert_eq!(config.root, Some(PathBuf::from("/project/docs/base.toml")));
    }

    #[test]
    fn test_load_from_file_expands_and_resolves_root() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(
            &path,
            r#"
[input]
root = "${SPLICER_TEST_SURELY_UNSET_VAR:-docs}/base.toml"

[preprocess]
grammar = "toml"
"#,
        )
        .unwrap();

        let config = Config::load(Some(&path), None).unwrap();
        assert_eq!(config.root, Some(dir.path().join("docs/base.toml")));
        assert_eq!(config.config_path, Some(path));
        assert_eq!(config.preprocess.grammar, GrammarKind::Toml);
    }

    #[test]
    fn test_load_missing_explicit_config() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = Config::load(Some(&missing), None).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(p) if p == missing));
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "[preprocess\n").unwrap();

        let err = Config::load(Some(&path), None).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_apply_cli_settings() {
        let mut config = Config::default();
        let overrides = CliSettings {
            root: Some(PathBuf::from("/custom/base.txt")),
            encoding: Some(Encoding::Utf16),
            max_depth: Some(3),
            ..Default::default()
        };

        config.apply_cli_settings(&overrides);

        assert_eq!(config.root, Some(PathBuf::from("/custom/base.txt")));
        assert_eq!(config.preprocess.encoding, Encoding::Utf16);
        assert_eq!(config.preprocess.max_depth, 3);
        assert_eq!(config.preprocess.grammar, GrammarKind::Universal); // Unchanged
        assert_eq!(config.preprocess.missing_include, MissingInclude::Skip); // Unchanged
    }

    #[test]
    fn test_cli_settings_are_validated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "").unwrap();
        let overrides = CliSettings {
            grammar: Some(GrammarKind::Custom),
            ..Default::default()
        };

        let err = Config::load(Some(&path), Some(&overrides)).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_grammar_kind_from_str() {
        assert_eq!("toml".parse::<GrammarKind>(), Ok(GrammarKind::Toml));
        assert_eq!("universal".parse::<GrammarKind>(), Ok(GrammarKind::Universal));
        assert!("markdown".parse::<GrammarKind>().is_err());
        assert_eq!(GrammarKind::Custom.to_string(), "custom");
    }
}
