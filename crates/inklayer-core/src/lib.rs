//! inklayer Core Library
//!
//! Core types, configuration, front matter and identifier derivation for the
//! inklayer content compiler.

pub mod config;
pub mod content;
pub mod error;
pub mod frontmatter;
pub mod schema;
pub mod slug;

pub use config::{Config, DefinitionConfig, GenerationMode, OutputConfig, PluginConfig};
pub use content::{
    DeclaredFormat, Document, DocumentBody, DocumentFormat, GitInfo, ImageData, ReadTime, TocItem,
};
pub use error::{CoreError, Result};
pub use frontmatter::Frontmatter;
pub use schema::{FieldSpec, UniqueScope};
