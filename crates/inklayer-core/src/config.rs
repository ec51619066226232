//! Generator configuration management.

use std::{
    collections::{BTreeMap, HashSet},
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use globset::GlobBuilder;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
    content::{DeclaredFormat, Document},
    error::{CoreError, Result},
    schema::FieldSpec,
};

/// Default configuration file name.
pub const CONFIG_FILE: &str = "inklayer.toml";

/// Main configuration structure for inklayer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the source files.
    #[serde(default = "default_content_dir")]
    pub content_dir: PathBuf,

    /// Directory receiving the cache and generated artifacts.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Whether the change-detection cache is loaded and persisted.
    #[serde(default = "default_true")]
    pub caching: bool,

    /// Treat Markdown-family files as Markdoc.
    #[serde(default)]
    pub md_as_mdoc: bool,

    /// Ignore files honored during discovery, in addition to `.gitignore`.
    #[serde(default = "default_ignore_files")]
    pub ignore_files: Vec<String>,

    /// Asset output settings.
    #[serde(default)]
    pub output: OutputConfig,

    /// Settings handed to content transformers.
    #[serde(default)]
    pub plugins: PluginConfig,

    /// Collection definitions, processed in order.
    #[serde(default, rename = "definition")]
    pub definitions: Vec<DefinitionConfig>,
}

/// Where and how emitted assets are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving emitted images.
    #[serde(default = "default_assets_dir")]
    pub assets: PathBuf,

    /// Public URL prefix of the assets directory.
    #[serde(default = "default_assets_base")]
    pub base: String,

    /// File name template, supports `[name]`, `[hash]`, `[hash:N]` and `[ext]`.
    #[serde(default = "default_assets_format")]
    pub format: String,
}

/// Transformer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Syntax highlighting theme name.
    #[serde(default = "default_highlight_theme")]
    pub highlight_theme: String,

    /// Add `id` attributes to headings.
    #[serde(default = "default_true")]
    pub heading_anchors: bool,

    /// Settings for custom transformers.
    #[serde(default, flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Configuration for one named collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefinitionConfig {
    /// Unique collection name.
    #[serde(rename = "type")]
    pub name: String,

    /// Glob patterns relative to the content directory; `!` negates.
    #[serde(default)]
    pub patterns: Vec<String>,

    #[serde(default)]
    pub format: DeclaredFormat,

    /// Populate `gitInfo` in production runs.
    #[serde(default)]
    pub git: bool,

    /// Populate `tableOfContents`.
    #[serde(default)]
    pub toc: bool,

    /// Populate `readTime`.
    #[serde(default)]
    pub read_time: bool,

    /// Reading speed for `readTime`.
    #[serde(default = "default_words_per_minute")]
    pub words_per_minute: u32,

    /// Reject front matter keys not declared in `fields`.
    #[serde(default)]
    pub strict: bool,

    /// Schema fields by name.
    #[serde(default)]
    pub fields: BTreeMap<String, FieldSpec>,
}

/// Whether a run targets development or production.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    #[default]
    Development,
    Production,
}

impl GenerationMode {
    /// Version control metadata is only gathered in production.
    pub fn is_production(self) -> bool {
        self == Self::Production
    }
}

impl fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => f.write_str("development"),
            Self::Production => f.write_str("production"),
        }
    }
}

impl FromStr for GenerationMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(CoreError::config(format!(
                "unknown mode '{other}', expected 'development' or 'production'"
            ))),
        }
    }
}

// Default value functions
fn default_content_dir() -> PathBuf {
    PathBuf::from("content")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".inklayer")
}

fn default_true() -> bool {
    true
}

fn default_ignore_files() -> Vec<String> {
    vec![".inklayerignore".to_string()]
}

fn default_assets_dir() -> PathBuf {
    PathBuf::from("public/static")
}

fn default_assets_base() -> String {
    "/static/".to_string()
}

fn default_assets_format() -> String {
    "[name]-[hash:8].[ext]".to_string()
}

fn default_highlight_theme() -> String {
    "base16-ocean.dark".to_string()
}

fn default_words_per_minute() -> u32 {
    200
}

impl Default for Config {
    fn default() -> Self {
        Self {
            content_dir: default_content_dir(),
            output_dir: default_output_dir(),
            caching: true,
            md_as_mdoc: false,
            ignore_files: default_ignore_files(),
            output: OutputConfig::default(),
            plugins: PluginConfig::default(),
            definitions: Vec::new(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            assets: default_assets_dir(),
            base: default_assets_base(),
            format: default_assets_format(),
        }
    }
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            highlight_theme: default_highlight_theme(),
            heading_anchors: true,
            extra: BTreeMap::new(),
        }
    }
}

impl DefinitionConfig {
    /// Create a definition with the given name and patterns and default settings.
    pub fn new(name: impl Into<String>, patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            patterns: patterns.into_iter().map(Into::into).collect(),
            format: DeclaredFormat::Detect,
            git: false,
            toc: false,
            read_time: false,
            words_per_minute: default_words_per_minute(),
            strict: false,
            fields: BTreeMap::new(),
        }
    }

    /// Add a field to the schema.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.fields.insert(name.into(), spec);
        self
    }

    /// Validate the field table.
    fn validate_fields(&self) -> Result<()> {
        for (name, spec) in &self.fields {
            let expected = match name.as_str() {
                "id" => Some("id"),
                "slug" => Some("slug"),
                "body" => Some("body"),
                _ => None,
            };
            match expected {
                Some(kind) if spec.kind() != kind => {
                    return Err(CoreError::config(format!(
                        "definition '{}': field '{name}' must be of kind '{kind}', found '{}'",
                        self.name,
                        spec.kind()
                    )));
                }
                None if Document::is_reserved(name) => {
                    return Err(CoreError::config(format!(
                        "definition '{}': field name '{name}' is reserved",
                        self.name
                    )));
                }
                _ => {}
            }

            if let Some(pattern) = spec.pattern() {
                regex::Regex::new(pattern).map_err(|e| {
                    CoreError::config_with_source(
                        format!(
                            "definition '{}': invalid pattern for field '{name}'",
                            self.name
                        ),
                        e,
                    )
                })?;
            }

            if let FieldSpec::Enum { values, .. } = spec
                && values.is_empty()
            {
                return Err(CoreError::config(format!(
                    "definition '{}': enum field '{name}' has no values",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

/// Validate the parts every definition must satisfy: a unique type name
/// usable as a directory name and at least one valid glob pattern.
pub fn validate_definition_set<'a>(
    definitions: impl IntoIterator<Item = (&'a str, &'a [String])>,
) -> Result<()> {
    let mut seen = HashSet::new();
    let mut count = 0;

    for (name, patterns) in definitions {
        count += 1;
        if name.trim().is_empty() {
            return Err(CoreError::config("definition type cannot be empty"));
        }
        if name.contains(['/', '\\']) || name == "." || name.contains("..") {
            return Err(CoreError::config(format!(
                "invalid definition type '{name}': must not contain path separators or '..'"
            )));
        }
        if !seen.insert(name) {
            return Err(CoreError::config(format!(
                "duplicate definition type '{name}'"
            )));
        }
        if patterns.is_empty() {
            return Err(CoreError::config(format!(
                "definition '{name}' has no patterns"
            )));
        }
        for pattern in patterns {
            let glob = pattern.strip_prefix('!').unwrap_or(pattern);
            GlobBuilder::new(glob)
                .literal_separator(true)
                .build()
                .map_err(|e| {
                    CoreError::config_with_source(
                        format!("definition '{name}': invalid pattern '{pattern}'"),
                        e,
                    )
                })?;
        }
    }

    if count == 0 {
        return Err(CoreError::config("no definitions configured"));
    }
    Ok(())
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// Relative directories are resolved against the file's parent directory.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CoreError::config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content).map_err(|e| {
            CoreError::config_with_source(
                format!("Failed to parse config file: {}", path.display()),
                e,
            )
        })?;

        config.resolve_paths(path.parent().unwrap_or(Path::new("")));
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with `INKLAYER__*` environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CoreError::config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix("INKLAYER").separator("__"))
            .build()?;

        let mut config: Config = settings.try_deserialize()?;
        config.resolve_paths(path.parent().unwrap_or(Path::new("")));
        config.validate()?;
        Ok(config)
    }

    /// Make relative directories relative to `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        for dir in [
            &mut self.content_dir,
            &mut self.output_dir,
            &mut self.output.assets,
        ] {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
    }

    /// Validate the configuration.
    ///
    /// Checks run before any source file is touched.
    pub fn validate(&self) -> Result<()> {
        validate_definition_set(
            self.definitions
                .iter()
                .map(|d| (d.name.as_str(), d.patterns.as_slice())),
        )?;

        for definition in &self.definitions {
            definition.validate_fields()?;
            if definition.words_per_minute == 0 {
                return Err(CoreError::config(format!(
                    "definition '{}': words_per_minute must be positive",
                    definition.name
                )));
            }
        }

        if !self.output.base.ends_with('/') {
            tracing::warn!(base = %self.output.base, "output.base should end with a slash");
        }

        Ok(())
    }

    /// Look up a definition by type name.
    pub fn definition(&self, name: &str) -> Option<&DefinitionConfig> {
        self.definitions.iter().find(|d| d.name == name)
    }

    /// Stable hash of the resolved configuration.
    ///
    /// `extra` carries fingerprints of settings that are not part of the
    /// serialized configuration, such as programmatic schemas.
    pub fn hash_with(&self, extra: &[&str]) -> Result<String> {
        let mut hasher = Sha256::new();
        hasher.update(serde_json::to_vec(self)?);
        for item in extra {
            hasher.update(b"\0");
            hasher.update(item.as_bytes());
        }
        let digest = format!("{:x}", hasher.finalize());
        Ok(digest[..16].to_string())
    }
}
