//! Runtime collection definitions.

use std::{fmt, sync::Arc};

use inklayer_core::{DeclaredFormat, DefinitionConfig, Document};

use crate::schema::{Schema, SchemaContext, SchemaSource};

/// Last-chance check run on every compiled document.
pub type ValidateHook = Arc<dyn Fn(&Document) -> Result<(), String> + Send + Sync>;

/// A named collection: which files belong to it and how they are compiled.
#[derive(Clone)]
pub struct Definition {
    pub name: String,

    /// Glob patterns relative to the content root; `!` negates.
    pub patterns: Vec<String>,

    pub format: DeclaredFormat,
    pub schema: SchemaSource,

    /// Populate `gitInfo` in production runs.
    pub git: bool,

    /// Populate `tableOfContents`.
    pub toc: bool,

    /// Populate `readTime`.
    pub read_time: bool,

    pub words_per_minute: u32,

    pub validate: Option<ValidateHook>,
}

impl fmt::Debug for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Definition")
            .field("name", &self.name)
            .field("patterns", &self.patterns)
            .field("format", &self.format)
            .field("schema", &self.schema)
            .field("git", &self.git)
            .field("toc", &self.toc)
            .field("read_time", &self.read_time)
            .field("validate", &self.validate.is_some())
            .finish()
    }
}

impl Definition {
    /// Definition with a schema factory and default settings.
    pub fn new(
        name: impl Into<String>,
        patterns: impl IntoIterator<Item = impl Into<String>>,
        fingerprint: impl Into<String>,
        schema: impl Fn(&SchemaContext) -> Schema + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            patterns: patterns.into_iter().map(Into::into).collect(),
            format: DeclaredFormat::Detect,
            schema: SchemaSource::factory(fingerprint, schema),
            git: false,
            toc: false,
            read_time: false,
            words_per_minute: 200,
            validate: None,
        }
    }

    /// Definition described by configuration.
    pub fn from_config(config: &DefinitionConfig) -> Self {
        Self {
            name: config.name.clone(),
            patterns: config.patterns.clone(),
            format: config.format,
            schema: SchemaSource::Declared {
                fields: config
                    .fields
                    .iter()
                    .map(|(name, spec)| (name.clone(), spec.clone()))
                    .collect(),
                strict: config.strict,
            },
            git: config.git,
            toc: config.toc,
            read_time: config.read_time,
            words_per_minute: config.words_per_minute,
            validate: None,
        }
    }

    #[must_use]
    pub fn with_format(mut self, format: DeclaredFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_git(mut self, git: bool) -> Self {
        self.git = git;
        self
    }

    #[must_use]
    pub fn with_toc(mut self, toc: bool) -> Self {
        self.toc = toc;
        self
    }

    #[must_use]
    pub fn with_read_time(mut self, read_time: bool) -> Self {
        self.read_time = read_time;
        self
    }

    /// Attach a validate hook.
    #[must_use]
    pub fn with_validate(
        mut self,
        hook: impl Fn(&Document) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.validate = Some(Arc::new(hook));
        self
    }

    /// Stable description of settings that are not part of the serialized
    /// configuration.
    pub fn fingerprint(&self) -> String {
        format!(
            "{}|{}|{:?}|{}|git={},toc={},read_time={},wpm={}",
            self.name,
            self.patterns.join(","),
            self.format,
            self.schema.fingerprint().unwrap_or("declared"),
            self.git,
            self.toc,
            self.read_time,
            self.words_per_minute,
        )
    }
}

#[cfg(test)]
mod tests {
    use inklayer_core::{FieldSpec, schema::TocOptions};

    use super::*;

    #[test]
    fn test_from_config() {
        let config = DefinitionConfig::new("post", ["posts/**/*.md"])
            .with_field("headings", FieldSpec::Toc(TocOptions::default()));
        let definition = Definition::from_config(&config);

        assert_eq!(definition.name, "post");
        assert!(definition.schema.fingerprint().is_none());
        assert!(matches!(
            &definition.schema,
            SchemaSource::Declared { fields, strict: false } if fields.len() == 1
        ));
    }

    #[test]
    fn test_fingerprint_tracks_factory() {
        let a = Definition::new("note", ["notes/*.md"], "v1", |_| Schema::new());
        let b = Definition::new("note", ["notes/*.md"], "v2", |_| Schema::new());

        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint(), a.clone().fingerprint());
        assert_ne!(a.fingerprint(), a.clone().with_toc(true).fingerprint());
    }
}
