//! Collaborators the schema builders delegate to.

pub mod assets;
pub mod vcs;

pub use assets::{AssetError, AssetProcessor, ImageAssets, ImageMetadata};
pub use vcs::{GitCli, VcsFailure, VcsProvider, WarnOnce};
