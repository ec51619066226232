//! Declarative field specifications.
//!
//! A definition's `fields` table maps field names to a [`FieldSpec`]. The
//! generator turns each spec into a validator for every source file, so the
//! derived kinds (`id`, `slug`, `git`, `image`, `readtime`, `toc`, `body`) can
//! see the file they run against.

use serde::{Deserialize, Serialize};

use crate::content::DocumentFormat;

/// Scope in which an identifier must be unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UniqueScope {
    /// Unique among documents of the same definition.
    #[default]
    Definition,
    /// Unique across every definition.
    Global,
}

/// Which commit `git` fields report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GitAge {
    /// Most recent commit touching the file.
    #[default]
    Newest,
    /// Commit that added the file.
    Oldest,
}

/// Options for the `id` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdOptions {
    #[serde(default)]
    pub scope: UniqueScope,

    /// Minimum length in characters.
    #[serde(default = "default_id_min")]
    pub min: usize,
}

/// Options for the `slug` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlugOptions {
    #[serde(default)]
    pub scope: UniqueScope,

    /// Slugs that may not be used.
    #[serde(default)]
    pub reserved: Vec<String>,

    /// Format constraint; defaults to [`DEFAULT_SLUG_PATTERN`].
    #[serde(default)]
    pub pattern: Option<String>,

    /// Minimum length in characters.
    #[serde(default)]
    pub min: Option<usize>,

    /// Maximum length in characters.
    #[serde(default = "default_slug_max")]
    pub max: usize,
}

/// Default slug format: lowercase alphanumeric segments joined by `/`, each
/// internally hyphenated. The empty string is allowed for index documents.
pub const DEFAULT_SLUG_PATTERN: &str =
    r"^$|^[a-z0-9]+(?:-[a-z0-9]+)*(?:/[a-z0-9]+(?:-[a-z0-9]+)*)*$";

/// Options for `git` fields.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GitFieldOptions {
    #[serde(default)]
    pub age: GitAge,

    /// Value used when no metadata is available.
    #[serde(default)]
    pub default: Option<serde_json::Value>,
}

/// Options for `image` fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageOptions {
    /// Allow `http(s)://` references.
    #[serde(default)]
    pub remote: bool,

    /// Copy local images to the assets directory and use the public URL.
    #[serde(default = "default_true")]
    pub emit: bool,

    #[serde(default)]
    pub optional: bool,
}

/// Options for reading time fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadTimeOptions {
    #[serde(default = "default_words_per_minute")]
    pub words_per_minute: u32,
}

/// Options for table of contents fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocOptions {
    /// Deepest heading level to include.
    #[serde(default = "default_max_depth")]
    pub max_depth: u8,
}

/// Options for the `body` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BodyOptions {
    /// Explicit format, overriding the definition and file extension.
    #[serde(default)]
    pub format: Option<DocumentFormat>,
}

/// Declarative description of one schema field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FieldSpec {
    String {
        #[serde(default)]
        optional: bool,
        #[serde(default)]
        min: Option<usize>,
        #[serde(default)]
        max: Option<usize>,
        #[serde(default)]
        pattern: Option<String>,
        #[serde(default)]
        default: Option<String>,
    },
    Number {
        #[serde(default)]
        optional: bool,
        #[serde(default)]
        integer: bool,
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
        #[serde(default)]
        default: Option<f64>,
    },
    Boolean {
        #[serde(default)]
        optional: bool,
        #[serde(default)]
        default: Option<bool>,
    },
    /// RFC 3339 timestamp or `YYYY-MM-DD`, normalized to RFC 3339.
    Date {
        #[serde(default)]
        optional: bool,
    },
    /// List of strings.
    List {
        #[serde(default)]
        optional: bool,
        #[serde(default)]
        min: Option<usize>,
        #[serde(default)]
        max: Option<usize>,
    },
    /// One of a fixed set of strings.
    Enum {
        values: Vec<String>,
        #[serde(default)]
        optional: bool,
        #[serde(default)]
        default: Option<String>,
    },
    Id(IdOptions),
    Slug(SlugOptions),
    Git(GitFieldOptions),
    Image(ImageOptions),
    #[serde(rename = "readtime")]
    ReadTime(ReadTimeOptions),
    Toc(TocOptions),
    Body(BodyOptions),
}

impl FieldSpec {
    /// Short kind name, as written in configuration.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::String { .. } => "string",
            Self::Number { .. } => "number",
            Self::Boolean { .. } => "boolean",
            Self::Date { .. } => "date",
            Self::List { .. } => "list",
            Self::Enum { .. } => "enum",
            Self::Id(_) => "id",
            Self::Slug(_) => "slug",
            Self::Git(_) => "git",
            Self::Image(_) => "image",
            Self::ReadTime(_) => "readtime",
            Self::Toc(_) => "toc",
            Self::Body(_) => "body",
        }
    }

    /// Regular expression configured on this field, if any.
    pub fn pattern(&self) -> Option<&str> {
        match self {
            Self::String { pattern, .. } => pattern.as_deref(),
            Self::Slug(options) => options.pattern.as_deref(),
            _ => None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_id_min() -> usize {
    1
}

fn default_slug_max() -> usize {
    200
}

fn default_words_per_minute() -> u32 {
    200
}

fn default_max_depth() -> u8 {
    6
}

impl Default for IdOptions {
    fn default() -> Self {
        Self {
            scope: UniqueScope::default(),
            min: default_id_min(),
        }
    }
}

impl Default for SlugOptions {
    fn default() -> Self {
        Self {
            scope: UniqueScope::default(),
            reserved: Vec::new(),
            pattern: None,
            min: None,
            max: default_slug_max(),
        }
    }
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            remote: false,
            emit: true,
            optional: false,
        }
    }
}

impl Default for ReadTimeOptions {
    fn default() -> Self {
        Self {
            words_per_minute: default_words_per_minute(),
        }
    }
}

impl Default for TocOptions {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
        }
    }
}
