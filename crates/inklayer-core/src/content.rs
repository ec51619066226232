//! Content types and structures.

use std::{fmt, path::Path, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Markup dialect of a document body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    /// CommonMark with extensions.
    Md,
    /// Markdown with embedded components and ESM statements.
    Mdx,
    /// Markdoc.
    Mdoc,
}

/// Extensions treated as plain Markdown.
pub const MARKDOWN_EXTENSIONS: &[&str] = &[
    "md", "markdown", "mdown", "mkdn", "mkd", "mdwn", "mkdown", "ron",
];

impl DocumentFormat {
    /// All formats, in declaration order.
    pub const ALL: [Self; 3] = [Self::Md, Self::Mdx, Self::Mdoc];

    /// Determine the format from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_lowercase();
        if MARKDOWN_EXTENSIONS.contains(&ext.as_str()) {
            return Some(Self::Md);
        }
        match ext.as_str() {
            "mdx" => Some(Self::Mdx),
            "mdoc" => Some(Self::Mdoc),
            _ => None,
        }
    }

    /// Determine the format from a path's extension.
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Md => "md",
            Self::Mdx => "mdx",
            Self::Mdoc => "mdoc",
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "md" => Ok(Self::Md),
            "mdx" => Ok(Self::Mdx),
            "mdoc" => Ok(Self::Mdoc),
            other => Err(format!("unknown format '{other}'")),
        }
    }
}

/// Format setting of a definition: a fixed dialect or extension sniffing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclaredFormat {
    /// Infer from the file extension.
    #[default]
    Detect,
    Md,
    Mdx,
    Mdoc,
}

impl DeclaredFormat {
    /// The fixed format, or `None` for [`DeclaredFormat::Detect`].
    pub fn fixed(self) -> Option<DocumentFormat> {
        match self {
            Self::Detect => None,
            Self::Md => Some(DocumentFormat::Md),
            Self::Mdx => Some(DocumentFormat::Mdx),
            Self::Mdoc => Some(DocumentFormat::Mdoc),
        }
    }
}

/// Raw and compiled body of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentBody {
    /// Body text without front matter.
    pub raw: String,

    /// Output of the content transformer.
    pub compiled_code: String,
}

/// Table of contents entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocItem {
    /// Heading level (1-6).
    pub level: u8,

    /// Heading text.
    pub text: String,

    /// Anchor ID for linking.
    pub id: String,

    /// Fragment URL, `#` + id.
    pub url: String,
}

/// Estimated reading time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadTime {
    /// Human readable text, e.g. `"3 min read"`.
    pub text: String,

    /// Exact minutes.
    pub minutes: f64,

    /// Milliseconds.
    pub time: u64,

    /// Word count.
    pub words: usize,
}

/// Last-change metadata from version control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitInfo {
    /// RFC 3339 commit date.
    pub date: String,

    /// Unix timestamp in seconds.
    pub timestamp: i64,

    /// Commit author name.
    pub author: String,
}

/// Normalized image metadata produced by the image field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageData {
    /// Public URL or the original reference.
    pub src: String,

    /// Alternative text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,

    pub width: u32,
    pub height: u32,

    /// Lowercase image format, e.g. `png`.
    pub format: String,

    /// `width / height`.
    pub aspect_ratio: f64,

    /// Tiny blurred preview as a `data:` URL.
    pub blur_preview: String,
}

/// A compiled, validated document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Unique key, defaults to the normalized source path.
    pub id: String,

    /// URL-safe path.
    pub slug: String,

    /// Definition type that produced this document.
    #[serde(rename = "type")]
    pub doc_type: String,

    /// Effective markup format.
    pub format: DocumentFormat,

    /// Raw and compiled body.
    pub body: DocumentBody,

    /// Headings, when enabled for the definition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_of_contents: Option<Vec<TocItem>>,

    /// Reading time, when enabled for the definition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_time: Option<ReadTime>,

    /// Version control metadata, production runs only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_info: Option<GitInfo>,

    /// Schema-derived fields.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Document {
    /// Keys owned by the document itself; schema fields may not use them.
    pub const RESERVED_KEYS: &'static [&'static str] = &[
        "id",
        "slug",
        "type",
        "format",
        "body",
        "tableOfContents",
        "readTime",
        "gitInfo",
    ];

    /// Whether `key` collides with a document-level key.
    pub fn is_reserved(key: &str) -> bool {
        Self::RESERVED_KEYS.contains(&key)
    }

    /// Look up a schema-derived field.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        for ext in MARKDOWN_EXTENSIONS {
            assert_eq!(DocumentFormat::from_extension(ext), Some(DocumentFormat::Md));
        }
        assert_eq!(DocumentFormat::from_extension("MD"), Some(DocumentFormat::Md));
        assert_eq!(DocumentFormat::from_extension("mdx"), Some(DocumentFormat::Mdx));
        assert_eq!(DocumentFormat::from_extension("mdoc"), Some(DocumentFormat::Mdoc));
        assert_eq!(DocumentFormat::from_extension("txt"), None);
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            DocumentFormat::from_path("posts/hello.mdx"),
            Some(DocumentFormat::Mdx)
        );
        assert_eq!(DocumentFormat::from_path("posts/README"), None);
    }

    #[test]
    fn test_format_round_trip_str() {
        for format in DocumentFormat::ALL {
            assert_eq!(format.as_str().parse::<DocumentFormat>(), Ok(format));
        }
        assert!("typst".parse::<DocumentFormat>().is_err());
    }

    #[test]
    fn test_declared_format() {
        assert_eq!(DeclaredFormat::default(), DeclaredFormat::Detect);
        assert_eq!(DeclaredFormat::Detect.fixed(), None);
        assert_eq!(DeclaredFormat::Mdx.fixed(), Some(DocumentFormat::Mdx));
    }

    #[test]
    fn test_document_serialization_shape() {
        let mut fields = Map::new();
        fields.insert("title".to_string(), Value::from("Hello"));

        let doc = Document {
            id: "posts/hello.md".to_string(),
            slug: "posts/hello".to_string(),
            doc_type: "post".to_string(),
            format: DocumentFormat::Md,
            body: DocumentBody {
                raw: "# Hello".to_string(),
                compiled_code: "<h1>Hello</h1>".to_string(),
            },
            table_of_contents: None,
            read_time: None,
            git_info: None,
            fields,
        };

        let json = serde_json::to_value(&doc).expect("serialize");
        assert_eq!(json["type"], "post");
        assert_eq!(json["body"]["compiledCode"], "<h1>Hello</h1>");
        assert_eq!(json["title"], "Hello");
        assert!(json.get("tableOfContents").is_none());

        let back: Document = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, doc);
    }

    #[test]
    fn test_reserved_keys() {
        assert!(Document::is_reserved("slug"));
        assert!(Document::is_reserved("readTime"));
        assert!(!Document::is_reserved("title"));
    }
}
