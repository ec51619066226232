//! Per-file compilation.
//!
//! A file ends in one of three states: cached, compiled or failed. The
//! compiler never touches the uniqueness registry; claims travel with the
//! cache entry and are committed by the collection generator.

use std::{
    fmt, fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};

use inklayer_core::{
    Document, DocumentBody, DocumentFormat,
    frontmatter::parse_frontmatter,
    schema::{BodyOptions, GitAge, IdOptions, SlugOptions},
};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, trace};

use crate::{
    cache::{CacheEntry, DataCache, mtime_hash},
    definition::Definition,
    registry::{Claim, DuplicateIdentifier},
    schema::{FileInfo, Issue, IssueKind, SchemaContext, Services, derived},
};

/// A source file read from disk.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// `/`-separated path relative to the content root.
    pub relative_path: String,
    pub absolute_path: PathBuf,
    pub raw_contents: String,

    /// Modification-time hash, see [`mtime_hash`].
    pub content_hash: String,
}

impl SourceFile {
    /// Read a file below `content_dir`.
    pub fn read(content_dir: &Path, relative_path: &str) -> std::io::Result<Self> {
        let absolute_path = content_dir.join(relative_path);
        let modified = fs::metadata(&absolute_path)?.modified()?;
        let raw_contents = fs::read_to_string(&absolute_path)?;

        Ok(Self {
            relative_path: relative_path.to_string(),
            absolute_path,
            raw_contents,
            content_hash: mtime_hash(modified),
        })
    }
}

/// Why a file failed.
#[derive(Debug, Error)]
pub enum FileError {
    /// The file could not be read.
    #[error("cannot read file: {0}")]
    Read(#[from] std::io::Error),

    /// The front matter block is malformed.
    #[error("{0}")]
    Frontmatter(String),

    /// The content transformer failed.
    #[error("bundling failed: {}", join_display(.issues))]
    Bundling { issues: Vec<Issue> },

    /// Front matter does not satisfy the schema.
    #[error("schema validation failed: {}", join_display(.issues))]
    Schema { issues: Vec<Issue> },

    /// An id or slug is owned by another file.
    #[error("{}", join_display(.0))]
    Duplicate(Vec<DuplicateIdentifier>),

    /// The definition's validate hook rejected the document.
    #[error("validate hook failed: {0}")]
    Hook(String),

    /// A referenced asset could not be copied to the asset output.
    #[error("cannot emit asset: {0}")]
    Asset(String),
}

impl FileError {
    /// Issues carried by the error, if any.
    pub fn issues(&self) -> &[Issue] {
        match self {
            Self::Bundling { issues } | Self::Schema { issues } => issues,
            _ => &[],
        }
    }

    fn from_issues(issues: Vec<Issue>) -> Self {
        if issues.iter().any(|i| i.kind == IssueKind::Bundling) {
            Self::Bundling { issues }
        } else {
            Self::Schema { issues }
        }
    }
}

fn join_display<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A failed file, tagged with its definition and path.
#[derive(Debug, Error)]
#[error("[{definition}] {path}: {error}")]
pub struct FileFailure {
    pub definition: String,
    pub path: String,
    pub error: FileError,
}

/// Terminal state of one file.
#[derive(Debug)]
pub enum FileOutcome {
    /// Reused from the cache.
    Cached(CacheEntry),
    /// Compiled in this run.
    Compiled(CacheEntry),
    Failed(FileError),
}

/// Compiles source files of one definition.
#[derive(Debug)]
pub struct DocumentCompiler<'a> {
    definition: &'a Definition,
    services: Arc<Services>,
}

impl<'a> DocumentCompiler<'a> {
    pub fn new(definition: &'a Definition, services: Arc<Services>) -> Self {
        Self {
            definition,
            services,
        }
    }

    /// Compile one file, consulting the cache first.
    pub fn compile(&self, source: &SourceFile, cache: &DataCache) -> FileOutcome {
        if let Some(entry) =
            cache.lookup(&source.relative_path, &source.content_hash, &self.definition.name)
        {
            trace!(path = %source.relative_path, "cache hit");
            return FileOutcome::Cached(entry.clone());
        }

        let start = Instant::now();
        match self.compile_fresh(source) {
            Ok((document, claims, assets)) => {
                let elapsed_ms = start.elapsed().as_millis() as u64;
                debug!(path = %source.relative_path, elapsed_ms, "compiled");
                FileOutcome::Compiled(CacheEntry {
                    hash: source.content_hash.clone(),
                    definition_type: self.definition.name.clone(),
                    document,
                    elapsed_ms,
                    claims,
                    assets,
                })
            }
            Err(e) => FileOutcome::Failed(e),
        }
    }

    fn compile_fresh(
        &self,
        source: &SourceFile,
    ) -> Result<(Document, Vec<Claim>, Vec<PathBuf>), FileError> {
        let (frontmatter, body) = parse_frontmatter(&source.raw_contents, &source.absolute_path)
            .map_err(|e| FileError::Frontmatter(e.to_string()))?;
        let body_line_offset = lines_before(&source.raw_contents, body);

        let cx = SchemaContext::new(
            Arc::clone(&self.services),
            Arc::new(FileInfo {
                doc_type: self.definition.name.clone(),
                relative_path: source.relative_path.clone(),
                absolute_path: source.absolute_path.clone(),
                frontmatter,
                body: body.to_string(),
                body_line_offset,
                declared_format: self.definition.format,
            }),
        );

        let mut schema = self.definition.schema.build(&cx);
        if !schema.contains("id") {
            schema.insert("id".to_string(), Box::new(cx.id(IdOptions::default())));
        }
        if !schema.contains("slug") {
            schema.insert("slug".to_string(), Box::new(cx.slug(SlugOptions::default())));
        }
        if !schema.contains("body") {
            schema.insert("body".to_string(), Box::new(cx.body(BodyOptions::default())));
        }

        let mut validation = schema.validate(cx.frontmatter());
        if !validation.is_ok() {
            return Err(FileError::from_issues(validation.issues));
        }

        let values = &mut validation.values;
        let id = take_string(values, "id");
        let slug = take_string(values, "slug");
        let body = values.remove("body").and_then(parse_body);
        let (Some(id), Some(slug), Some((body, format))) = (id, slug, body) else {
            return Err(FileError::Schema {
                issues: vec![Issue::new(
                    IssueKind::Schema,
                    None,
                    "schema did not produce id, slug and body",
                )],
            });
        };

        let definition = self.definition;
        let document = Document {
            id,
            slug,
            doc_type: definition.name.clone(),
            format,
            table_of_contents: definition
                .toc
                .then(|| derived::table_of_contents(&body.raw, 6)),
            read_time: definition
                .read_time
                .then(|| derived::read_time(&body.raw, definition.words_per_minute)),
            git_info: if definition.git {
                cx.git_info(GitAge::Newest)
            } else {
                None
            },
            body,
            fields: validation.values,
        };

        if let Some(hook) = &definition.validate {
            hook(&document).map_err(FileError::Hook)?;
        }

        Ok((document, validation.claims, validation.assets))
    }
}

/// Number of lines in `contents` before its suffix `body`.
fn lines_before(contents: &str, body: &str) -> usize {
    let start = contents.len().saturating_sub(body.len());
    contents[..start].matches('\n').count()
}

fn take_string(values: &mut serde_json::Map<String, Value>, key: &str) -> Option<String> {
    match values.remove(key) {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

fn parse_body(value: Value) -> Option<(DocumentBody, DocumentFormat)> {
    let format: DocumentFormat = serde_json::from_value(value.get("format")?.clone()).ok()?;
    let body: DocumentBody = serde_json::from_value(value).ok()?;
    Some((body, format))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use inklayer_core::{FieldSpec, GenerationMode, schema::TocOptions};
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::schema::{
        FieldCx, Schema, SchemaSource, context::tests::services, primitives::StringField,
    };

    fn write(root: &Path, rel: &str, contents: &str) -> SourceFile {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        fs::write(&path, contents).expect("write");
        SourceFile::read(root, rel).expect("read")
    }

    fn declared(fields: &[(&str, FieldSpec)]) -> Definition {
        let mut config = inklayer_core::DefinitionConfig::new("post", ["**/*.md"]);
        for (name, spec) in fields {
            config = config.with_field(*name, spec.clone());
        }
        Definition::from_config(&config)
    }

    fn title_spec() -> FieldSpec {
        FieldSpec::String {
            optional: false,
            min: Some(1),
            max: None,
            pattern: None,
            default: None,
        }
    }

    #[test]
    fn test_compile_document() {
        let dir = TempDir::new().expect("tempdir");
        let source = write(
            dir.path(),
            "posts/hello-world.md",
            "---\ntitle: Hello\ntags: [a]\n---\n# Hello\n\nBody text.\n",
        );
        let definition = declared(&[("title", title_spec())])
            .with_toc(true)
            .with_read_time(true);
        let compiler = DocumentCompiler::new(
            &definition,
            services(dir.path(), GenerationMode::Development),
        );

        let FileOutcome::Compiled(entry) = compiler.compile(&source, &DataCache::disabled()) else {
            panic!("expected compiled");
        };
        let doc = &entry.document;
        assert_eq!(doc.id, "posts/hello-world.md");
        assert_eq!(doc.slug, "posts/hello-world");
        assert_eq!(doc.doc_type, "post");
        assert_eq!(doc.format, DocumentFormat::Md);
        assert_eq!(doc.field("title"), Some(&json!("Hello")));
        assert_eq!(doc.field("tags"), Some(&json!(["a"])));
        assert!(doc.body.compiled_code.contains("<h1 id=\"hello\">Hello</h1>"));
        assert_eq!(doc.body.raw, "# Hello\n\nBody text.\n");
        assert_eq!(doc.table_of_contents.as_ref().map(Vec::len), Some(1));
        assert_eq!(doc.read_time.as_ref().map(|r| r.words), Some(4));
        assert!(doc.git_info.is_none());

        let keys: Vec<_> = entry.claims.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["id:post:posts/hello-world.md", "slug:post:posts/hello-world"]);
    }

    #[test]
    fn test_cache_hit_skips_compile() {
        let dir = TempDir::new().expect("tempdir");
        let source = write(dir.path(), "a.md", "---\ntitle: A\n---\nA\n");
        let definition = declared(&[("title", title_spec())]);
        let compiler = DocumentCompiler::new(
            &definition,
            services(dir.path(), GenerationMode::Development),
        );

        let mut cache = DataCache::load(&dir.path().join("cache.json"), "h");
        let FileOutcome::Compiled(entry) = compiler.compile(&source, &cache) else {
            panic!("expected compiled");
        };
        cache.record("a.md", entry.clone());

        let FileOutcome::Cached(cached) = compiler.compile(&source, &cache) else {
            panic!("expected cached");
        };
        assert_eq!(cached, entry);
    }

    #[test]
    fn test_schema_issues_are_collected() {
        let dir = TempDir::new().expect("tempdir");
        let source = write(dir.path(), "a.md", "---\nslug: Bad Slug\n---\nA\n");
        let definition = declared(&[("title", title_spec())]);
        let compiler = DocumentCompiler::new(
            &definition,
            services(dir.path(), GenerationMode::Development),
        );

        let FileOutcome::Failed(err) = compiler.compile(&source, &DataCache::disabled()) else {
            panic!("expected failure");
        };
        assert!(matches!(err, FileError::Schema { .. }));
        let fields: Vec<_> = err
            .issues()
            .iter()
            .filter_map(|i| i.field.as_deref())
            .collect();
        assert_eq!(fields, vec!["title", "slug"]);
    }

    #[test]
    fn test_frontmatter_error() {
        let dir = TempDir::new().expect("tempdir");
        let source = write(dir.path(), "a.md", "---\n- just\n- a list\n---\nA\n");
        let definition = declared(&[]);
        let compiler = DocumentCompiler::new(
            &definition,
            services(dir.path(), GenerationMode::Development),
        );

        let outcome = compiler.compile(&source, &DataCache::disabled());
        assert!(matches!(outcome, FileOutcome::Failed(FileError::Frontmatter(_))));
    }

    #[test]
    fn test_bundling_error() {
        let dir = TempDir::new().expect("tempdir");
        let source = write(dir.path(), "a.mdx", "<Open>\n\nnever closed\n");
        let definition = declared(&[]);
        let compiler = DocumentCompiler::new(
            &definition,
            services(dir.path(), GenerationMode::Development),
        );

        let FileOutcome::Failed(err) = compiler.compile(&source, &DataCache::disabled()) else {
            panic!("expected failure");
        };
        assert!(matches!(err, FileError::Bundling { .. }));
        assert_eq!(err.issues()[0].line, Some(1));
    }

    #[test]
    fn test_bundling_error_line_counts_frontmatter() {
        let dir = TempDir::new().expect("tempdir");
        let source = write(
            dir.path(),
            "a.mdx",
            "---\ntitle: T\nauthor: X\n---\n<Open>\n\nnever closed\n",
        );
        let definition = declared(&[]);
        let compiler = DocumentCompiler::new(
            &definition,
            services(dir.path(), GenerationMode::Development),
        );

        let FileOutcome::Failed(err) = compiler.compile(&source, &DataCache::disabled()) else {
            panic!("expected failure");
        };
        assert!(matches!(err, FileError::Bundling { .. }));
        assert_eq!(err.issues()[0].line, Some(5));
    }

    #[test]
    fn test_lines_before_body() {
        assert_eq!(lines_before("---\na: 1\n---\nbody\n", "body\n"), 3);
        assert_eq!(lines_before("body\n", "body\n"), 0);
    }

    #[test]
    fn test_validate_hook() {
        let dir = TempDir::new().expect("tempdir");
        let source = write(dir.path(), "a.md", "short\n");
        let definition = declared(&[]).with_validate(|doc| {
            if doc.body.raw.len() < 10 {
                Err("body too short".to_string())
            } else {
                Ok(())
            }
        });
        let compiler = DocumentCompiler::new(
            &definition,
            services(dir.path(), GenerationMode::Development),
        );

        let FileOutcome::Failed(err) = compiler.compile(&source, &DataCache::disabled()) else {
            panic!("expected failure");
        };
        assert_eq!(err.to_string(), "validate hook failed: body too short");
    }

    #[test]
    fn test_factory_schema() {
        let dir = TempDir::new().expect("tempdir");
        let source = write(dir.path(), "notes/n1.md", "---\ntitle: Note\n---\n## First\n");
        let definition = Definition::new("note", ["notes/*.md"], "notes-v1", |cx| {
            let upper = cx.relative_path().to_uppercase();
            Schema::new()
                .field("title", StringField::required())
                .field("slug", cx.slug(SlugOptions::default()))
                .field("headings", cx.toc(TocOptions::default()))
                .field("source", move |_: Option<&Value>, c: &mut FieldCx<'_>| {
                    c.claim(Claim::new("source", inklayer_core::UniqueScope::Global, "note", &upper));
                    Some(Value::String(upper.clone()))
                })
        });
        let compiler = DocumentCompiler::new(
            &definition,
            services(dir.path(), GenerationMode::Development),
        );

        let FileOutcome::Compiled(entry) = compiler.compile(&source, &DataCache::disabled()) else {
            panic!("expected compiled");
        };
        assert_eq!(entry.document.slug, "notes/n1");
        assert_eq!(entry.document.field("source"), Some(&json!("NOTES/N1.MD")));
        assert_eq!(entry.document.field("headings").map(|h| h[0]["id"].clone()), Some(json!("first")));
        assert!(entry.claims.iter().any(|c| c.key == "source:global:NOTES/N1.MD"));
        assert!(matches!(definition.schema, SchemaSource::Factory { .. }));
    }

    #[test]
    fn test_failure_display() {
        let failure = FileFailure {
            definition: "post".to_string(),
            path: "a.md".to_string(),
            error: FileError::Hook("nope".to_string()),
        };
        assert_eq!(failure.to_string(), "[post] a.md: validate hook failed: nope");
    }
}
