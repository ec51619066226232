//! inklayer Transform Library
//!
//! Content transformers turn a document body into compiled output. The
//! generator treats that output as an opaque string.

pub mod markdown;
pub mod mdx;
pub mod syntax;

use std::{collections::BTreeMap, fmt, path::Path, sync::Arc};

use inklayer_core::{DocumentFormat, Frontmatter, PluginConfig};
pub use markdown::MarkdownTransformer;
pub use syntax::SyntaxHighlighter;
use thiserror::Error;

/// A problem reported by a transformer, optionally with a source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformDiagnostic {
    pub message: String,

    /// 1-based line in the body.
    pub line: Option<usize>,

    /// 1-based column.
    pub column: Option<usize>,
}

impl TransformDiagnostic {
    /// Diagnostic without a location.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: None,
            column: None,
        }
    }

    /// Diagnostic at a line and column.
    pub fn at(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            line: Some(line),
            column: Some(column),
        }
    }
}

impl fmt::Display for TransformDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.line, self.column) {
            (Some(line), Some(column)) => write!(f, "{} ({line}:{column})", self.message),
            (Some(line), None) => write!(f, "{} (line {line})", self.message),
            _ => f.write_str(&self.message),
        }
    }
}

/// Transformer errors.
#[derive(Debug, Error)]
pub enum TransformError {
    /// No transformer handles the format.
    #[error("no transformer registered for format '{0}'")]
    Unsupported(DocumentFormat),

    /// The transformer rejected the input.
    #[error("{}", join_diagnostics(.0))]
    Failed(Vec<TransformDiagnostic>),
}

impl TransformError {
    /// Diagnostics describing this error.
    pub fn diagnostics(&self) -> Vec<TransformDiagnostic> {
        match self {
            Self::Unsupported(_) => vec![TransformDiagnostic::new(self.to_string())],
            Self::Failed(diagnostics) => diagnostics.clone(),
        }
    }
}

fn join_diagnostics(diagnostics: &[TransformDiagnostic]) -> String {
    diagnostics
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for transform operations.
pub type Result<T> = std::result::Result<T, TransformError>;

/// Input of a transformation.
#[derive(Debug, Clone, Copy)]
pub struct TransformRequest<'a> {
    /// Body text without front matter.
    pub source: &'a str,

    /// Effective format.
    pub format: DocumentFormat,

    /// Transformer settings.
    pub plugins: &'a PluginConfig,

    /// Parsed front matter of the file.
    pub frontmatter: &'a Frontmatter,

    /// Path of the file relative to the content root.
    pub path: &'a Path,
}

/// Trait for content transformers.
///
/// Implementations must be deterministic: identical requests produce
/// identical output.
pub trait ContentTransformer: Send + Sync {
    /// Compile a document body.
    fn transform(&self, request: &TransformRequest<'_>) -> Result<String>;
}

/// Registry mapping formats to transformers.
#[derive(Clone)]
pub struct TransformerRegistry {
    transformers: BTreeMap<DocumentFormat, Arc<dyn ContentTransformer>>,
}

impl fmt::Debug for TransformerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformerRegistry")
            .field("formats", &self.formats())
            .finish()
    }
}

impl Default for TransformerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformerRegistry {
    /// Create a registry with the built-in Markdown transformer for `md` and `mdx`.
    pub fn new() -> Self {
        Self::with_transformer(MarkdownTransformer::new())
    }

    /// Create a registry whose built-in transformer uses a syntax theme.
    pub fn with_theme(theme: &str) -> Self {
        Self::with_transformer(MarkdownTransformer::with_theme(theme))
    }

    fn with_transformer(markdown: MarkdownTransformer) -> Self {
        let markdown: Arc<dyn ContentTransformer> = Arc::new(markdown);
        let mut transformers = BTreeMap::new();
        transformers.insert(DocumentFormat::Md, Arc::clone(&markdown));
        transformers.insert(DocumentFormat::Mdx, markdown);
        Self { transformers }
    }

    /// Create a registry without any transformer.
    pub fn empty() -> Self {
        Self {
            transformers: BTreeMap::new(),
        }
    }

    /// Register a transformer for a format, replacing any previous one.
    pub fn register(&mut self, format: DocumentFormat, transformer: Arc<dyn ContentTransformer>) {
        self.transformers.insert(format, transformer);
    }

    /// Builder form of [`TransformerRegistry::register`].
    #[must_use]
    pub fn with(mut self, format: DocumentFormat, transformer: Arc<dyn ContentTransformer>) -> Self {
        self.register(format, transformer);
        self
    }

    /// Whether a transformer handles `format`.
    pub fn supports(&self, format: DocumentFormat) -> bool {
        self.transformers.contains_key(&format)
    }

    /// Formats with a registered transformer.
    pub fn formats(&self) -> Vec<DocumentFormat> {
        self.transformers.keys().copied().collect()
    }
}

impl ContentTransformer for TransformerRegistry {
    fn transform(&self, request: &TransformRequest<'_>) -> Result<String> {
        let transformer = self
            .transformers
            .get(&request.format)
            .ok_or(TransformError::Unsupported(request.format))?;
        transformer.transform(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Shout;

    impl ContentTransformer for Shout {
        fn transform(&self, request: &TransformRequest<'_>) -> Result<String> {
            Ok(request.source.to_uppercase())
        }
    }

    fn request<'a>(
        source: &'a str,
        format: DocumentFormat,
        plugins: &'a PluginConfig,
        frontmatter: &'a Frontmatter,
    ) -> TransformRequest<'a> {
        TransformRequest {
            source,
            format,
            plugins,
            frontmatter,
            path: Path::new("test.md"),
        }
    }

    #[test]
    fn test_registry_markdown() {
        let registry = TransformerRegistry::new();
        let plugins = PluginConfig::default();
        let fm = Frontmatter::new();

        let html = registry
            .transform(&request("# Hello", DocumentFormat::Md, &plugins, &fm))
            .expect("transform");
        assert!(html.contains("<h1"));
        assert!(html.contains("Hello"));
    }

    #[test]
    fn test_registry_unsupported_format() {
        let registry = TransformerRegistry::new();
        let plugins = PluginConfig::default();
        let fm = Frontmatter::new();

        let result = registry.transform(&request("{% x %}", DocumentFormat::Mdoc, &plugins, &fm));
        let err = result.expect_err("mdoc is not built in");
        assert!(matches!(err, TransformError::Unsupported(DocumentFormat::Mdoc)));
        assert!(err.to_string().contains("'mdoc'"));
        assert_eq!(err.diagnostics().len(), 1);
    }

    #[test]
    fn test_registry_custom_transformer() {
        let registry = TransformerRegistry::new().with(DocumentFormat::Mdoc, Arc::new(Shout));
        let plugins = PluginConfig::default();
        let fm = Frontmatter::new();

        assert!(registry.supports(DocumentFormat::Mdoc));
        let out = registry
            .transform(&request("abc", DocumentFormat::Mdoc, &plugins, &fm))
            .expect("transform");
        assert_eq!(out, "ABC");
    }

    #[test]
    fn test_empty_registry() {
        let registry = TransformerRegistry::empty();
        assert!(registry.formats().is_empty());
        assert!(!registry.supports(DocumentFormat::Md));
    }

    #[test]
    fn test_diagnostic_display() {
        assert_eq!(
            TransformDiagnostic::at("unexpected tag", 3, 7).to_string(),
            "unexpected tag (3:7)"
        );
        assert_eq!(TransformDiagnostic::new("boom").to_string(), "boom");
        let err = TransformError::Failed(vec![
            TransformDiagnostic::new("a"),
            TransformDiagnostic::at("b", 1, 2),
        ]);
        assert_eq!(err.to_string(), "a; b (1:2)");
    }
}
