//! Schema resolution.
//!
//! A [`Schema`] is an ordered list of named [`FieldValidator`]s. Validators for
//! derived fields are produced per file by a [`SchemaContext`], which knows the
//! file's path, raw body and front matter and holds the collaborators.

pub mod context;
pub mod derived;
pub mod primitives;

use std::{fmt, path::PathBuf, sync::Arc};

pub use context::{FileInfo, SchemaContext, Services};
use inklayer_core::{Document, Frontmatter, FieldSpec};
use inklayer_transform::TransformDiagnostic;
use serde_json::{Map, Value};
use tracing::debug;

use crate::registry::Claim;

/// Category of a validation issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueKind {
    /// Front matter could not be parsed.
    Frontmatter,
    /// A field failed validation.
    Schema,
    /// The content transformer failed.
    Bundling,
    /// An id or slug is already claimed.
    Duplicate,
    /// The definition's validate hook rejected the document.
    Hook,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Frontmatter => "front matter",
            Self::Schema => "schema",
            Self::Bundling => "bundling",
            Self::Duplicate => "duplicate",
            Self::Hook => "validate",
        })
    }
}

/// One problem found while compiling a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub kind: IssueKind,

    /// Field the issue belongs to.
    pub field: Option<String>,

    pub message: String,

    /// 1-based location in the source file, for bundling issues.
    pub line: Option<usize>,
    pub column: Option<usize>,
}

impl Issue {
    pub fn new(kind: IssueKind, field: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            kind,
            field: field.map(str::to_string),
            message: message.into(),
            line: None,
            column: None,
        }
    }

    /// Bundling issue from a transformer diagnostic.
    pub fn bundling(field: &str, diagnostic: TransformDiagnostic) -> Self {
        Self {
            kind: IssueKind::Bundling,
            field: Some(field.to_string()),
            message: diagnostic.message,
            line: diagnostic.line,
            column: diagnostic.column,
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(field) = &self.field {
            write!(f, "{field}: ")?;
        }
        f.write_str(&self.message)?;
        match (self.line, self.column) {
            (Some(line), Some(column)) => write!(f, " ({line}:{column})"),
            (Some(line), None) => write!(f, " (line {line})"),
            _ => Ok(()),
        }
    }
}

/// Per-field state handed to a validator.
#[derive(Debug)]
pub struct FieldCx<'a> {
    field: &'a str,
    issues: &'a mut Vec<Issue>,
    claims: &'a mut Vec<Claim>,
    assets: &'a mut Vec<PathBuf>,
}

impl<'a> FieldCx<'a> {
    pub fn new(
        field: &'a str,
        issues: &'a mut Vec<Issue>,
        claims: &'a mut Vec<Claim>,
        assets: &'a mut Vec<PathBuf>,
    ) -> Self {
        Self {
            field,
            issues,
            claims,
            assets,
        }
    }

    /// Name of the field being validated.
    pub fn field(&self) -> &str {
        self.field
    }

    /// Report a schema issue on this field.
    pub fn error(&mut self, message: impl Into<String>) {
        self.issues
            .push(Issue::new(IssueKind::Schema, Some(self.field), message));
    }

    /// Report an issue with full detail.
    pub fn push(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    /// Request ownership of a unique key.
    pub fn claim(&mut self, claim: Claim) {
        self.claims.push(claim);
    }

    /// Schedule a file for the asset output. Emitted only once the document
    /// is accepted, and only by runs that write.
    pub fn emit_asset(&mut self, source: PathBuf) {
        if !self.assets.contains(&source) {
            self.assets.push(source);
        }
    }
}

/// Validates and transforms one front matter value.
///
/// Returning `None` omits the field from the document.
pub trait FieldValidator: Send + Sync {
    fn validate(&self, value: Option<&Value>, cx: &mut FieldCx<'_>) -> Option<Value>;
}

impl<F> FieldValidator for F
where
    F: Fn(Option<&Value>, &mut FieldCx<'_>) -> Option<Value> + Send + Sync,
{
    fn validate(&self, value: Option<&Value>, cx: &mut FieldCx<'_>) -> Option<Value> {
        self(value, cx)
    }
}

/// Result of running a schema over front matter.
#[derive(Debug, Default)]
pub struct Validation {
    pub values: Map<String, Value>,
    pub issues: Vec<Issue>,
    pub claims: Vec<Claim>,

    /// Asset sources to emit when the document is accepted.
    pub assets: Vec<PathBuf>,
}

impl Validation {
    pub fn is_ok(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Ordered set of field validators.
#[derive(Default)]
pub struct Schema {
    fields: Vec<(String, Box<dyn FieldValidator>)>,
    strict: bool,
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("fields", &self.names().collect::<Vec<_>>())
            .field("strict", &self.strict)
            .finish()
    }
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field. A later field with the same name replaces the earlier one.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, validator: impl FieldValidator + 'static) -> Self {
        self.insert(name.into(), Box::new(validator));
        self
    }

    /// Add a boxed validator.
    pub fn insert(&mut self, name: String, validator: Box<dyn FieldValidator>) {
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = validator,
            None => self.fields.push((name, validator)),
        }
    }

    /// Reject front matter keys that are not fields.
    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|(n, _)| n == name)
    }

    /// Field names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    /// Run every validator against the front matter.
    ///
    /// Keys without a validator are copied through unless the schema is
    /// strict; document-level keys are never copied.
    pub fn validate(&self, frontmatter: &Frontmatter) -> Validation {
        let mut validation = Validation::default();

        for (name, validator) in &self.fields {
            let mut cx = FieldCx::new(
                name,
                &mut validation.issues,
                &mut validation.claims,
                &mut validation.assets,
            );
            if let Some(value) = validator.validate(frontmatter.get(name), &mut cx) {
                validation.values.insert(name.clone(), value);
            }
        }

        for (key, value) in frontmatter {
            if self.contains(key) {
                continue;
            }
            if self.strict {
                validation.issues.push(Issue::new(
                    IssueKind::Schema,
                    Some(key),
                    "unknown field",
                ));
            } else if Document::is_reserved(key) {
                debug!(key = %key, "dropping reserved front matter key");
            } else {
                validation.values.insert(key.clone(), value.clone());
            }
        }

        validation
    }
}

/// Where a definition's schema comes from.
#[derive(Clone)]
pub enum SchemaSource {
    /// Fields declared in configuration.
    Declared {
        fields: Vec<(String, FieldSpec)>,
        strict: bool,
    },

    /// A function building the schema for each file.
    Factory {
        /// Stable description of the factory; part of the configuration hash.
        fingerprint: String,
        build: Arc<dyn Fn(&SchemaContext) -> Schema + Send + Sync>,
    },
}

impl fmt::Debug for SchemaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Declared { fields, strict } => f
                .debug_struct("Declared")
                .field("fields", &fields.iter().map(|(n, _)| n).collect::<Vec<_>>())
                .field("strict", strict)
                .finish(),
            Self::Factory { fingerprint, .. } => f
                .debug_struct("Factory")
                .field("fingerprint", fingerprint)
                .finish(),
        }
    }
}

impl SchemaSource {
    /// Schema source wrapping a factory function.
    pub fn factory(
        fingerprint: impl Into<String>,
        build: impl Fn(&SchemaContext) -> Schema + Send + Sync + 'static,
    ) -> Self {
        Self::Factory {
            fingerprint: fingerprint.into(),
            build: Arc::new(build),
        }
    }

    /// Build the schema for one file.
    pub fn build(&self, cx: &SchemaContext) -> Schema {
        match self {
            Self::Declared { fields, strict } => {
                let mut schema = Schema::new().strict(*strict);
                for (name, spec) in fields {
                    schema.insert(name.clone(), cx.field(spec));
                }
                schema
            }
            Self::Factory { build, .. } => build(cx),
        }
    }

    /// Fingerprint contributing to the configuration hash, if any.
    pub fn fingerprint(&self) -> Option<&str> {
        match self {
            Self::Declared { .. } => None,
            Self::Factory { fingerprint, .. } => Some(fingerprint),
        }
    }
}
