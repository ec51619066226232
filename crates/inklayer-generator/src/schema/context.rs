//! Per-file schema context and the derived-field builders.

use std::{
    fmt, fs,
    path::{Path, PathBuf},
    sync::{Arc, LazyLock},
};

use inklayer_core::{
    DeclaredFormat, DocumentFormat, FieldSpec, Frontmatter, GenerationMode, GitInfo, ImageData,
    OutputConfig, PluginConfig,
    frontmatter::value_kind,
    schema::{
        BodyOptions, DEFAULT_SLUG_PATTERN, GitAge, GitFieldOptions, IdOptions, ImageOptions,
        ReadTimeOptions, SlugOptions, TocOptions,
    },
    slug,
};
use inklayer_transform::{ContentTransformer, TransformDiagnostic, TransformRequest};
use regex::Regex;
use serde_json::{Value, json};

use super::{
    FieldCx, FieldValidator, Issue,
    derived,
    primitives::{
        BooleanField, DateField, EnumField, InvalidField, ListField, NumberField, StringField,
    },
};
use crate::{
    providers::{AssetProcessor, VcsProvider, WarnOnce},
    registry::Claim,
};

static DEFAULT_SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(DEFAULT_SLUG_PATTERN).expect("valid default slug pattern"));

/// Collaborators and settings shared by every file of a run.
pub struct Services {
    pub transformer: Arc<dyn ContentTransformer>,
    pub vcs: Arc<dyn VcsProvider>,
    pub assets: Arc<dyn AssetProcessor>,
    pub plugins: PluginConfig,
    pub output: OutputConfig,
    pub content_dir: PathBuf,
    pub md_as_mdoc: bool,
    pub mode: GenerationMode,
    pub vcs_warnings: WarnOnce,
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services")
            .field("vcs", &self.vcs)
            .field("assets", &self.assets)
            .field("content_dir", &self.content_dir)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

/// The file a schema is resolved against.
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub doc_type: String,

    /// `/`-separated path relative to the content root.
    pub relative_path: String,

    pub absolute_path: PathBuf,
    pub frontmatter: Frontmatter,

    /// Body without front matter.
    pub body: String,

    /// Lines of front matter before the body.
    pub body_line_offset: usize,

    /// Format declared by the definition.
    pub declared_format: DeclaredFormat,
}

/// Builder functions for schema fields, bound to one file.
#[derive(Debug, Clone)]
pub struct SchemaContext {
    services: Arc<Services>,
    file: Arc<FileInfo>,
}

impl SchemaContext {
    pub fn new(services: Arc<Services>, file: Arc<FileInfo>) -> Self {
        Self { services, file }
    }

    pub fn doc_type(&self) -> &str {
        &self.file.doc_type
    }

    pub fn relative_path(&self) -> &str {
        &self.file.relative_path
    }

    pub fn absolute_path(&self) -> &Path {
        &self.file.absolute_path
    }

    pub fn frontmatter(&self) -> &Frontmatter {
        &self.file.frontmatter
    }

    pub fn raw_body(&self) -> &str {
        &self.file.body
    }

    pub fn mode(&self) -> GenerationMode {
        self.services.mode
    }

    /// Document id: front matter value or the normalized path.
    pub fn id(&self, options: IdOptions) -> IdField {
        IdField {
            options,
            file: Arc::clone(&self.file),
        }
    }

    /// Document slug: front matter value or the path-derived slug.
    pub fn slug(&self, options: SlugOptions) -> SlugField {
        let pattern = options
            .pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| format!("invalid pattern: {e}"));
        SlugField {
            pattern,
            options,
            file: Arc::clone(&self.file),
        }
    }

    /// Version control metadata, production runs only.
    pub fn git(&self, options: GitFieldOptions) -> GitField {
        GitField {
            options,
            cx: self.clone(),
        }
    }

    /// Image reference resolved to metadata.
    pub fn image(&self, options: ImageOptions) -> ImageField {
        ImageField {
            options,
            cx: self.clone(),
        }
    }

    /// Reading time of the raw body.
    pub fn readtime(&self, options: ReadTimeOptions) -> impl FieldValidator + use<> {
        let body = self.file.body.clone();
        move |_: Option<&Value>, cx: &mut FieldCx<'_>| {
            to_json(derived::read_time(&body, options.words_per_minute), cx)
        }
    }

    /// Headings of the raw body.
    pub fn toc(&self, options: TocOptions) -> impl FieldValidator + use<> {
        let body = self.file.body.clone();
        move |_: Option<&Value>, cx: &mut FieldCx<'_>| {
            to_json(derived::table_of_contents(&body, options.max_depth), cx)
        }
    }

    /// Compiled body.
    pub fn body(&self, options: BodyOptions) -> BodyField {
        BodyField {
            options,
            cx: self.clone(),
        }
    }

    /// Validator for a declarative field specification.
    pub fn field(&self, spec: &FieldSpec) -> Box<dyn FieldValidator> {
        if let Some(pattern) = spec.pattern()
            && let Err(e) = Regex::new(pattern)
        {
            return Box::new(InvalidField(format!("invalid pattern: {e}")));
        }

        match spec.clone() {
            FieldSpec::String {
                optional,
                min,
                max,
                pattern,
                default,
            } => Box::new(StringField {
                optional,
                min,
                max,
                pattern: pattern.as_deref().and_then(|p| Regex::new(p).ok()),
                default,
            }),
            FieldSpec::Number {
                optional,
                integer,
                min,
                max,
                default,
            } => Box::new(NumberField {
                optional,
                integer,
                min,
                max,
                default,
            }),
            FieldSpec::Boolean { optional, default } => {
                Box::new(BooleanField { optional, default })
            }
            FieldSpec::Date { optional } => Box::new(DateField { optional }),
            FieldSpec::List { optional, min, max } => {
                Box::new(ListField { optional, min, max })
            }
            FieldSpec::Enum {
                values,
                optional,
                default,
            } => Box::new(EnumField {
                values,
                optional,
                default,
            }),
            FieldSpec::Id(options) => Box::new(self.id(options)),
            FieldSpec::Slug(options) => Box::new(self.slug(options)),
            FieldSpec::Git(options) => Box::new(self.git(options)),
            FieldSpec::Image(options) => Box::new(self.image(options)),
            FieldSpec::ReadTime(options) => Box::new(self.readtime(options)),
            FieldSpec::Toc(options) => Box::new(self.toc(options)),
            FieldSpec::Body(options) => Box::new(self.body(options)),
        }
    }

    /// Effective body format: explicit, then declared, then the extension.
    /// With `md_as_mdoc`, a resolved `md` becomes `mdoc` whatever its source.
    pub fn effective_format(&self, explicit: Option<DocumentFormat>) -> Option<DocumentFormat> {
        let format = explicit
            .or_else(|| self.file.declared_format.fixed())
            .or_else(|| DocumentFormat::from_path(&self.file.relative_path))?;
        if self.services.md_as_mdoc && format == DocumentFormat::Md {
            Some(DocumentFormat::Mdoc)
        } else {
            Some(format)
        }
    }

    /// Query the VCS provider. Outside production, or when the provider
    /// fails, returns `None`; failures are logged once per class.
    pub fn git_info(&self, age: GitAge) -> Option<GitInfo> {
        if !self.services.mode.is_production() {
            return None;
        }
        match self.services.vcs.last_change(&self.file.absolute_path, age) {
            Ok(info) => Some(info),
            Err(failure) => {
                self.services
                    .vcs_warnings
                    .report(&failure, &self.file.absolute_path);
                None
            }
        }
    }
}

fn to_json<T: serde::Serialize>(value: T, cx: &mut FieldCx<'_>) -> Option<Value> {
    match serde_json::to_value(value) {
        Ok(value) => Some(value),
        Err(e) => {
            cx.error(format!("cannot serialize value: {e}"));
            None
        }
    }
}

/// String value from front matter, or an issue for other kinds.
fn string_value<'v>(value: Option<&'v Value>, cx: &mut FieldCx<'_>) -> Result<Option<&'v str>, ()> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => {
            cx.error(format!("expected string, found {}", value_kind(other)));
            Err(())
        }
    }
}

/// `id` field validator.
#[derive(Debug, Clone)]
pub struct IdField {
    options: IdOptions,
    file: Arc<FileInfo>,
}

impl FieldValidator for IdField {
    fn validate(&self, value: Option<&Value>, cx: &mut FieldCx<'_>) -> Option<Value> {
        let id = match string_value(value, cx).ok()? {
            Some(id) => id.to_string(),
            None => slug::default_id(&self.file.relative_path),
        };

        if id.chars().count() < self.options.min {
            cx.error(format!("must be at least {} characters", self.options.min));
            return None;
        }

        cx.claim(Claim::new(
            cx.field(),
            self.options.scope,
            &self.file.doc_type,
            &id,
        ));
        Some(Value::String(id))
    }
}

/// `slug` field validator.
#[derive(Debug, Clone)]
pub struct SlugField {
    options: SlugOptions,
    pattern: Result<Option<Regex>, String>,
    file: Arc<FileInfo>,
}

impl FieldValidator for SlugField {
    fn validate(&self, value: Option<&Value>, cx: &mut FieldCx<'_>) -> Option<Value> {
        let pattern = match &self.pattern {
            Ok(pattern) => pattern.as_ref().unwrap_or(&DEFAULT_SLUG),
            Err(message) => {
                cx.error(message.clone());
                return None;
            }
        };

        let slug = match string_value(value, cx).ok()? {
            Some(slug) => slug.to_string(),
            None => slug::generate(&self.file.relative_path),
        };

        let len = slug.chars().count();
        let mut valid = true;
        if let Some(min) = self.options.min
            && len < min
        {
            cx.error(format!("slug must be at least {min} characters"));
            valid = false;
        }
        if len > self.options.max {
            cx.error(format!("slug must be at most {} characters", self.options.max));
            valid = false;
        }

        if !pattern.is_match(&slug) {
            cx.error(format!("invalid slug '{slug}'"));
            valid = false;
        }
        if self.options.reserved.iter().any(|r| *r == slug) {
            cx.error(format!("reserved slug '{slug}'"));
            valid = false;
        }

        if !valid {
            return None;
        }

        cx.claim(Claim::new(
            cx.field(),
            self.options.scope,
            &self.file.doc_type,
            &slug,
        ));
        Some(Value::String(slug))
    }
}

/// `git` field validator.
#[derive(Debug, Clone)]
pub struct GitField {
    options: GitFieldOptions,
    cx: SchemaContext,
}

impl FieldValidator for GitField {
    fn validate(&self, value: Option<&Value>, cx: &mut FieldCx<'_>) -> Option<Value> {
        if let Some(value) = value.filter(|v| !v.is_null()) {
            return Some(value.clone());
        }
        match self.cx.git_info(self.options.age) {
            Some(info) => to_json(info, cx),
            None => self.options.default.clone(),
        }
    }
}

/// `image` field validator.
#[derive(Debug, Clone)]
pub struct ImageField {
    options: ImageOptions,
    cx: SchemaContext,
}

impl ImageField {
    fn resolve(&self, src: &str) -> PathBuf {
        match src.strip_prefix('/') {
            Some(rooted) => self.cx.services.content_dir.join(rooted),
            None => self
                .cx
                .file
                .absolute_path
                .parent()
                .unwrap_or(Path::new(""))
                .join(src),
        }
    }

    fn load(&self, src: &str, cx: &mut FieldCx<'_>) -> Result<ImageData, String> {
        let services = &self.cx.services;

        if src.starts_with("http://") || src.starts_with("https://") {
            if !self.options.remote {
                return Err("remote images must be explicitly allowed".to_string());
            }
            let bytes = services.assets.fetch(src).map_err(|e| e.to_string())?;
            let meta = services
                .assets
                .metadata(&bytes)
                .map_err(|e| format!("failed to read image metadata from {src}: {e}"))?;
            return Ok(image_data(src.to_string(), meta));
        }

        let path = self.resolve(src);
        let bytes = fs::read(&path)
            .map_err(|_| format!("image {src} does not exist. Is the path correct?"))?;
        let meta = services
            .assets
            .metadata(&bytes)
            .map_err(|e| format!("failed to read image metadata from {}: {e}", path.display()))?;

        let public = if self.options.emit {
            let url = services
                .assets
                .public_url(&path, &services.output.format)
                .map_err(|e| format!("failed to name {}: {e}", path.display()))?;
            cx.emit_asset(path);
            url
        } else {
            src.to_string()
        };
        Ok(image_data(public, meta))
    }
}

fn image_data(src: String, meta: crate::providers::ImageMetadata) -> ImageData {
    ImageData {
        src,
        alt: None,
        width: meta.width,
        height: meta.height,
        format: meta.format,
        aspect_ratio: meta.aspect_ratio,
        blur_preview: meta.blur_preview,
    }
}

impl FieldValidator for ImageField {
    fn validate(&self, value: Option<&Value>, cx: &mut FieldCx<'_>) -> Option<Value> {
        let (src, alt) = match value {
            None | Some(Value::Null) => {
                if !self.options.optional {
                    cx.error("required");
                }
                return None;
            }
            Some(Value::String(src)) => (src.as_str(), None),
            Some(Value::Object(map)) => match (map.get("src"), map.get("alt")) {
                (Some(Value::String(src)), None | Some(Value::Null)) => (src.as_str(), None),
                (Some(Value::String(src)), Some(Value::String(alt))) => {
                    (src.as_str(), Some(alt.clone()))
                }
                _ => {
                    cx.error("expected { src: string, alt?: string }");
                    return None;
                }
            },
            Some(other) => {
                cx.error(format!("expected image, found {}", value_kind(other)));
                return None;
            }
        };

        match self.load(src, cx) {
            Ok(mut data) => {
                data.alt = alt;
                to_json(data, cx)
            }
            Err(message) => {
                cx.error(message);
                None
            }
        }
    }
}

/// `body` field validator.
///
/// Produces `{raw, compiledCode, format}`.
#[derive(Debug, Clone)]
pub struct BodyField {
    options: BodyOptions,
    cx: SchemaContext,
}

impl FieldValidator for BodyField {
    fn validate(&self, _value: Option<&Value>, cx: &mut FieldCx<'_>) -> Option<Value> {
        let file = &self.cx.file;
        let Some(format) = self.cx.effective_format(self.options.format) else {
            cx.error(format!(
                "cannot determine the format of '{}'",
                file.relative_path
            ));
            return None;
        };

        let request = TransformRequest {
            source: &file.body,
            format,
            plugins: &self.cx.services.plugins,
            frontmatter: &file.frontmatter,
            path: Path::new(&file.relative_path),
        };

        match self.cx.services.transformer.transform(&request) {
            Ok(code) if code.trim().is_empty() => {
                cx.push(Issue::bundling(
                    cx.field(),
                    TransformDiagnostic::new("content transformer returned empty output"),
                ));
                None
            }
            Ok(code) => Some(json!({
                "raw": file.body,
                "compiledCode": code,
                "format": format,
            })),
            Err(e) => {
                for mut diagnostic in e.diagnostics() {
                    diagnostic.line = diagnostic.line.map(|line| line + file.body_line_offset);
                    let issue = Issue::bundling(cx.field(), diagnostic);
                    cx.push(issue);
                }
                None
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Cursor;

    use image::{DynamicImage, ImageFormat, RgbImage};
    use inklayer_core::{UniqueScope, schema::GitAge};
    use inklayer_transform::TransformerRegistry;
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::{
        providers::{ImageAssets, VcsFailure},
        schema::{IssueKind, Schema},
    };

    #[derive(Debug)]
    pub(crate) struct FixedVcs(pub Result<GitInfo, VcsFailure>);

    impl VcsProvider for FixedVcs {
        fn last_change(&self, _path: &Path, _age: GitAge) -> Result<GitInfo, VcsFailure> {
            self.0.clone()
        }
    }

    pub(crate) fn services(root: &Path, mode: GenerationMode) -> Arc<Services> {
        Arc::new(Services {
            transformer: Arc::new(TransformerRegistry::new()),
            vcs: Arc::new(FixedVcs(Err(VcsFailure::ToolMissing))),
            assets: Arc::new(ImageAssets::new(root.join("public"), "/static/")),
            plugins: PluginConfig::default(),
            output: OutputConfig {
                format: "[name].[ext]".to_string(),
                ..OutputConfig::default()
            },
            content_dir: root.to_path_buf(),
            md_as_mdoc: false,
            mode,
            vcs_warnings: WarnOnce::new(),
        })
    }

    pub(crate) fn context(
        services: Arc<Services>,
        relative_path: &str,
        frontmatter: Value,
        body: &str,
    ) -> SchemaContext {
        let Value::Object(frontmatter) = frontmatter else {
            panic!("front matter must be an object");
        };
        let absolute_path = services.content_dir.join(relative_path);
        SchemaContext::new(
            services,
            Arc::new(FileInfo {
                doc_type: "post".to_string(),
                relative_path: relative_path.to_string(),
                absolute_path,
                frontmatter,
                body: body.to_string(),
                body_line_offset: 0,
                declared_format: DeclaredFormat::Detect,
            }),
        )
    }

    fn run(cx: &SchemaContext, schema: Schema) -> crate::schema::Validation {
        schema.validate(cx.frontmatter())
    }

    #[test]
    fn test_slug_defaults_to_path() {
        let dir = TempDir::new().expect("tempdir");
        let cx = context(
            services(dir.path(), GenerationMode::Development),
            "en/posts/Hello World.md",
            json!({}),
            "",
        );

        let v = run(&cx, Schema::new().field("slug", cx.slug(SlugOptions::default())));
        assert!(v.is_ok(), "{:?}", v.issues);
        assert_eq!(v.values["slug"], "en/posts/hello-world");
        assert_eq!(v.claims[0].key, "slug:post:en/posts/hello-world");
    }

    #[test]
    fn test_slug_rules() {
        let dir = TempDir::new().expect("tempdir");
        let services = services(dir.path(), GenerationMode::Development);

        let options = SlugOptions {
            reserved: vec!["admin".to_string()],
            scope: UniqueScope::Global,
            ..SlugOptions::default()
        };

        let cx = context(Arc::clone(&services), "a.md", json!({"slug": "admin"}), "");
        let v = run(&cx, Schema::new().field("slug", cx.slug(options.clone())));
        assert_eq!(v.issues[0].message, "reserved slug 'admin'");
        assert!(v.claims.is_empty());

        let cx = context(Arc::clone(&services), "a.md", json!({"slug": "Not Valid"}), "");
        let v = run(&cx, Schema::new().field("slug", cx.slug(options.clone())));
        assert_eq!(v.issues[0].message, "invalid slug 'Not Valid'");

        let cx = context(services, "a.md", json!({"slug": "fine/one"}), "");
        let v = run(&cx, Schema::new().field("slug", cx.slug(options)));
        assert!(v.is_ok());
        assert_eq!(v.claims[0].key, "slug:global:fine/one");
    }

    #[test]
    fn test_index_slug_is_empty() {
        let dir = TempDir::new().expect("tempdir");
        let cx = context(
            services(dir.path(), GenerationMode::Development),
            "index.md",
            json!({}),
            "",
        );
        let v = run(&cx, Schema::new().field("slug", cx.slug(SlugOptions::default())));
        assert!(v.is_ok());
        assert_eq!(v.values["slug"], "");
    }

    #[test]
    fn test_id_default_and_override() {
        let dir = TempDir::new().expect("tempdir");
        let services = services(dir.path(), GenerationMode::Development);

        let cx = context(Arc::clone(&services), "./en//a.md", json!({}), "");
        let v = run(&cx, Schema::new().field("id", cx.id(IdOptions::default())));
        assert_eq!(v.values["id"], "en/a.md");

        let cx = context(services, "a.md", json!({"id": 7}), "");
        let v = run(&cx, Schema::new().field("id", cx.id(IdOptions::default())));
        assert_eq!(v.issues[0].message, "expected string, found number");
    }

    #[test]
    fn test_git_only_in_production() {
        let dir = TempDir::new().expect("tempdir");
        let options = GitFieldOptions {
            default: Some(json!("unknown")),
            ..GitFieldOptions::default()
        };

        let cx = context(
            services(dir.path(), GenerationMode::Development),
            "a.md",
            json!({}),
            "",
        );
        let v = run(&cx, Schema::new().field("updated", cx.git(options.clone())));
        assert_eq!(v.values["updated"], "unknown");

        let mut prod = services(dir.path(), GenerationMode::Production);
        Arc::get_mut(&mut prod).expect("unique").vcs = Arc::new(FixedVcs(Ok(GitInfo {
            date: "2024-01-01T00:00:00Z".to_string(),
            timestamp: 1_704_067_200,
            author: "Ada".to_string(),
        })));
        let cx = context(prod, "a.md", json!({}), "");
        let v = run(&cx, Schema::new().field("updated", cx.git(options)));
        assert_eq!(v.values["updated"]["author"], "Ada");
    }

    #[test]
    fn test_git_failure_falls_back() {
        let dir = TempDir::new().expect("tempdir");
        let cx = context(
            services(dir.path(), GenerationMode::Production),
            "a.md",
            json!({}),
            "",
        );
        let v = run(
            &cx,
            Schema::new().field("updated", cx.git(GitFieldOptions::default())),
        );
        assert!(v.is_ok());
        assert!(!v.values.contains_key("updated"));
    }

    #[test]
    fn test_body_compiles_markdown() {
        let dir = TempDir::new().expect("tempdir");
        let cx = context(
            services(dir.path(), GenerationMode::Development),
            "a.md",
            json!({}),
            "# Hello\n",
        );
        let v = run(&cx, Schema::new().field("body", cx.body(BodyOptions::default())));
        assert!(v.is_ok(), "{:?}", v.issues);
        assert_eq!(v.values["body"]["raw"], "# Hello\n");
        assert_eq!(v.values["body"]["format"], "md");
        assert!(
            v.values["body"]["compiledCode"]
                .as_str()
                .is_some_and(|c| c.contains("<h1 id=\"hello\">Hello</h1>"))
        );
    }

    #[test]
    fn test_body_format_precedence() {
        let dir = TempDir::new().expect("tempdir");
        let mut services = services(dir.path(), GenerationMode::Development);
        Arc::get_mut(&mut services).expect("unique").md_as_mdoc = true;

        let cx = context(Arc::clone(&services), "a.md", json!({}), "x");
        assert_eq!(cx.effective_format(None), Some(DocumentFormat::Mdoc));
        assert_eq!(
            cx.effective_format(Some(DocumentFormat::Mdx)),
            Some(DocumentFormat::Mdx)
        );

        let cx = context(Arc::clone(&services), "a.txt", json!({}), "x");
        assert_eq!(cx.effective_format(None), None);

        let declared = SchemaContext::new(
            services,
            Arc::new(FileInfo {
                declared_format: DeclaredFormat::Md,
                ..(*cx.file).clone()
            }),
        );
        assert_eq!(declared.effective_format(None), Some(DocumentFormat::Mdoc));
        assert_eq!(
            declared.effective_format(Some(DocumentFormat::Md)),
            Some(DocumentFormat::Mdoc)
        );
    }

    #[test]
    fn test_body_bundling_error_has_location() {
        let dir = TempDir::new().expect("tempdir");
        let cx = context(
            services(dir.path(), GenerationMode::Development),
            "a.mdx",
            json!({}),
            "# T\n\n</Note>\n",
        );
        let v = run(&cx, Schema::new().field("body", cx.body(BodyOptions::default())));
        assert_eq!(v.issues.len(), 1);
        assert_eq!(v.issues[0].kind, IssueKind::Bundling);
        assert_eq!(v.issues[0].line, Some(3));
    }

    #[test]
    fn test_body_unregistered_format() {
        let dir = TempDir::new().expect("tempdir");
        let cx = context(
            services(dir.path(), GenerationMode::Development),
            "a.mdoc",
            json!({}),
            "{% x %}",
        );
        let v = run(&cx, Schema::new().field("body", cx.body(BodyOptions::default())));
        assert_eq!(v.issues[0].kind, IssueKind::Bundling);
        assert!(v.issues[0].message.contains("'mdoc'"));
    }

    #[test]
    fn test_readtime_and_toc() {
        let dir = TempDir::new().expect("tempdir");
        let cx = context(
            services(dir.path(), GenerationMode::Development),
            "a.md",
            json!({}),
            "## One two\nthree four\n",
        );
        let schema = Schema::new()
            .field("minutes", cx.readtime(ReadTimeOptions::default()))
            .field("headings", cx.toc(TocOptions::default()));
        let v = run(&cx, schema);

        assert_eq!(v.values["minutes"]["words"], 5);
        assert_eq!(v.values["headings"][0]["id"], "one-two");
    }

    fn write_png(path: &Path) {
        let img = RgbImage::from_fn(20, 10, |x, _| image::Rgb([x as u8, 0, 0]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Png)
            .expect("encode");
        fs::write(path, out.into_inner()).expect("write png");
    }

    #[test]
    fn test_image_local() {
        let dir = TempDir::new().expect("tempdir");
        fs::create_dir_all(dir.path().join("posts")).expect("mkdir");
        write_png(&dir.path().join("posts/cover.png"));

        let cx = context(
            services(dir.path(), GenerationMode::Development),
            "posts/a.md",
            json!({"cover": {"src": "cover.png", "alt": "A cover"}}),
            "",
        );
        let v = run(&cx, Schema::new().field("cover", cx.image(ImageOptions::default())));
        assert!(v.is_ok(), "{:?}", v.issues);
        assert_eq!(v.values["cover"]["src"], "/static/cover.png");
        assert_eq!(v.values["cover"]["alt"], "A cover");
        assert_eq!(v.values["cover"]["width"], 20);
        assert_eq!(v.values["cover"]["aspectRatio"], 2.0);
        assert_eq!(v.assets, vec![dir.path().join("posts/cover.png")]);
        assert!(!dir.path().join("public").exists());
    }

    #[test]
    fn test_image_without_emit_schedules_nothing() {
        let dir = TempDir::new().expect("tempdir");
        write_png(&dir.path().join("cover.png"));

        let cx = context(
            services(dir.path(), GenerationMode::Development),
            "a.md",
            json!({"cover": "cover.png"}),
            "",
        );
        let options = ImageOptions {
            emit: false,
            ..ImageOptions::default()
        };
        let v = run(&cx, Schema::new().field("cover", cx.image(options)));
        assert!(v.is_ok(), "{:?}", v.issues);
        assert_eq!(v.values["cover"]["src"], "cover.png");
        assert!(v.assets.is_empty());
    }

    #[test]
    fn test_image_errors() {
        let dir = TempDir::new().expect("tempdir");
        let services = services(dir.path(), GenerationMode::Development);

        let cx = context(Arc::clone(&services), "a.md", json!({"cover": "missing.png"}), "");
        let v = run(&cx, Schema::new().field("cover", cx.image(ImageOptions::default())));
        assert!(v.issues[0].message.contains("does not exist"));

        let cx = context(
            Arc::clone(&services),
            "a.md",
            json!({"cover": "https://example.com/a.png"}),
            "",
        );
        let v = run(&cx, Schema::new().field("cover", cx.image(ImageOptions::default())));
        assert_eq!(v.issues[0].message, "remote images must be explicitly allowed");

        let cx = context(services, "a.md", json!({}), "");
        let optional = ImageOptions {
            optional: true,
            ..ImageOptions::default()
        };
        let v = run(&cx, Schema::new().field("cover", cx.image(optional)));
        assert!(v.is_ok());
    }

    #[test]
    fn test_field_from_spec_with_bad_pattern() {
        let dir = TempDir::new().expect("tempdir");
        let cx = context(
            services(dir.path(), GenerationMode::Development),
            "a.md",
            json!({"title": "x"}),
            "",
        );
        let spec = FieldSpec::String {
            optional: false,
            min: None,
            max: None,
            pattern: Some("(".to_string()),
            default: None,
        };
        let mut schema = Schema::new();
        schema.insert("title".to_string(), cx.field(&spec));
        let v = run(&cx, schema);
        assert!(v.issues[0].message.starts_with("invalid pattern"));
    }

    #[test]
    fn test_slug_with_bad_pattern_reports_issue() {
        let dir = TempDir::new().expect("tempdir");
        let cx = context(
            services(dir.path(), GenerationMode::Development),
            "a.md",
            json!({"slug": "a"}),
            "",
        );
        let options = SlugOptions {
            pattern: Some("[".to_string()),
            ..SlugOptions::default()
        };
        let v = run(&cx, Schema::new().field("slug", cx.slug(options)));
        assert_eq!(v.issues.len(), 1);
        assert!(v.issues[0].message.starts_with("invalid pattern"));
        assert!(v.claims.is_empty());
        assert!(!v.values.contains_key("slug"));
    }

    #[test]
    fn test_body_bundling_error_counts_frontmatter_lines() {
        let dir = TempDir::new().expect("tempdir");
        let cx = context(
            services(dir.path(), GenerationMode::Development),
            "a.mdx",
            json!({}),
            "<Open>\n\nnever closed\n",
        );
        let cx = SchemaContext::new(
            Arc::clone(&cx.services),
            Arc::new(FileInfo {
                body_line_offset: 4,
                ..(*cx.file).clone()
            }),
        );
        let v = run(&cx, Schema::new().field("body", cx.body(BodyOptions::default())));
        assert_eq!(v.issues[0].kind, IssueKind::Bundling);
        assert_eq!(v.issues[0].line, Some(5));
    }
}
