//! inklayer Generator Library
//!
//! Incremental content compilation: source files matched by each collection
//! definition are validated against a schema, compiled by a content
//! transformer and written as JSON documents. Unchanged files are served
//! from a change-detection cache.
//!
//! # Modules
//!
//! - [`registry`] - Uniqueness of ids and slugs within a run
//! - [`cache`] - Persisted change-detection cache
//! - [`schema`] - Field validators and the per-file schema context
//! - [`providers`] - Version control and asset collaborators
//! - [`definition`] - Runtime collection definitions
//! - [`compiler`] - Per-file compilation
//! - [`discover`] - Content file discovery
//! - [`collection`] - Per-definition generation
//! - [`output`] - Generated artifacts
//! - [`generator`] - Run orchestration

pub mod cache;
pub mod collection;
pub mod compiler;
pub mod definition;
pub mod discover;
pub mod generator;
pub mod output;
pub mod providers;
pub mod registry;
pub mod schema;

pub use cache::{CacheEntry, CacheError, DataCache, PIPELINE_VERSION};
pub use collection::{CollectionCounts, CollectionResult, Collision, DuplicateReport};
pub use compiler::{FileError, FileFailure, FileOutcome, SourceFile};
pub use definition::Definition;
pub use generator::{GenerateError, GenerateOptions, GenerationReport, Generator};
pub use output::ArtifactWriter;
pub use providers::{AssetProcessor, GitCli, ImageAssets, VcsFailure, VcsProvider};
pub use registry::{Claim, DuplicateIdentifier, UniquenessRegistry};
pub use schema::{FieldCx, FieldValidator, Issue, IssueKind, Schema, SchemaContext};
