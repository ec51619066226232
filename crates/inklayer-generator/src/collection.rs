//! Per-definition generation.
//!
//! Files are compiled in parallel; claims are committed afterwards in sorted
//! path order so duplicate detection is deterministic.

use std::{
    collections::{BTreeMap, HashSet},
    fmt,
    path::Path,
    sync::Arc,
};

use inklayer_core::Document;
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    cache::{CacheEntry, DataCache},
    compiler::{DocumentCompiler, FileError, FileFailure, FileOutcome, SourceFile},
    definition::Definition,
    discover::{DiscoverError, discover},
    output::{ArtifactWriter, OutputError},
    registry::{DuplicateIdentifier, UniquenessRegistry},
    schema::Services,
};

#[derive(Debug, Error)]
pub enum CollectionError {
    #[error(transparent)]
    Discover(#[from] DiscoverError),

    #[error(transparent)]
    Output(#[from] OutputError),
}

/// File counts of one collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CollectionCounts {
    pub cached: usize,
    pub compiled: usize,
    pub total: usize,
    pub failed: usize,
}

impl std::ops::AddAssign for CollectionCounts {
    fn add_assign(&mut self, other: Self) {
        self.cached += other.cached;
        self.compiled += other.compiled;
        self.total += other.total;
        self.failed += other.failed;
    }
}

/// One key claimed by more than one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    pub key: String,
    pub field: String,
    pub value: String,

    /// Every claimant, the winning file first.
    pub paths: Vec<String>,
}

/// All collisions found while generating one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateReport {
    pub definition: String,
    pub collisions: Vec<Collision>,
}

impl DuplicateReport {
    fn from_conflicts(definition: &str, conflicts: &[DuplicateIdentifier]) -> Option<Self> {
        let mut by_key: BTreeMap<&str, Collision> = BTreeMap::new();
        for conflict in conflicts {
            let collision = by_key.entry(&conflict.key).or_insert_with(|| Collision {
                key: conflict.key.clone(),
                field: conflict.field.clone(),
                value: conflict.value.clone(),
                paths: Vec::new(),
            });
            for path in [&conflict.existing, &conflict.claimant] {
                let path = path.to_string_lossy().into_owned();
                if !collision.paths.contains(&path) {
                    collision.paths.push(path);
                }
            }
        }

        (!by_key.is_empty()).then(|| Self {
            definition: definition.to_string(),
            collisions: by_key.into_values().collect(),
        })
    }
}

impl fmt::Display for DuplicateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] duplicate identifiers:", self.definition)?;
        for collision in &self.collisions {
            write!(
                f,
                "\n  {} '{}' claimed by {}",
                collision.field,
                collision.value,
                collision.paths.join(", ")
            )?;
        }
        Ok(())
    }
}

/// Outcome of generating one collection.
#[derive(Debug)]
pub struct CollectionResult {
    pub counts: CollectionCounts,
    pub failures: Vec<FileFailure>,
    pub duplicates: Option<DuplicateReport>,

    /// Successful documents in path order.
    pub documents: Vec<Document>,

    /// Whether the collection's artifacts needed rewriting.
    pub changed: bool,
}

/// Where a collection reads and writes.
#[derive(Debug, Clone, Copy)]
pub struct CollectionPaths<'a> {
    pub ignore_files: &'a [String],

    /// Directory never scanned for content, usually the output directory.
    pub exclude: Option<&'a Path>,
}

/// Generates the documents of one definition.
#[derive(Debug)]
pub struct CollectionGenerator<'a> {
    definition: &'a Definition,
    services: Arc<Services>,
    paths: CollectionPaths<'a>,
    writer: &'a ArtifactWriter,
}

impl<'a> CollectionGenerator<'a> {
    pub fn new(
        definition: &'a Definition,
        services: Arc<Services>,
        paths: CollectionPaths<'a>,
        writer: &'a ArtifactWriter,
    ) -> Self {
        Self {
            definition,
            services,
            paths,
            writer,
        }
    }

    /// Discover, compile and commit every file of the collection. Artifacts
    /// are rewritten only when `write` is set and something changed.
    pub fn run(
        &self,
        cache: &mut DataCache,
        registry: &mut UniquenessRegistry,
        write: bool,
    ) -> Result<CollectionResult, CollectionError> {
        let name = self.definition.name.as_str();
        let content_dir = self.services.content_dir.as_path();
        let files = discover(
            content_dir,
            &self.definition.patterns,
            self.paths.ignore_files,
            self.paths.exclude,
        )?;
        debug!(doc_type = name, count = files.len(), "matched files");

        let compiler = DocumentCompiler::new(self.definition, Arc::clone(&self.services));
        let outcomes: Vec<FileOutcome> = {
            let cache: &DataCache = cache;
            files
                .par_iter()
                .map(|rel| match SourceFile::read(content_dir, rel) {
                    Ok(source) => compiler.compile(&source, cache),
                    Err(e) => FileOutcome::Failed(FileError::Read(e)),
                })
                .collect()
        };

        let mut counts = CollectionCounts {
            total: files.len(),
            ..CollectionCounts::default()
        };
        let mut failures = Vec::new();
        let mut conflicts = Vec::new();
        let mut documents = Vec::new();

        for (rel, outcome) in files.iter().zip(outcomes) {
            let (entry, fresh) = match outcome {
                FileOutcome::Cached(entry) => (entry, false),
                FileOutcome::Compiled(entry) => (entry, true),
                FileOutcome::Failed(error) => {
                    cache.remove(rel);
                    counts.failed += 1;
                    failures.push(self.failure(rel, error));
                    continue;
                }
            };

            if let Err(error) = self.accept(registry, &entry, rel, write) {
                if let FileError::Duplicate(dups) = &error {
                    conflicts.extend(dups.iter().cloned());
                }
                cache.remove(rel);
                counts.failed += 1;
                failures.push(self.failure(rel, error));
                continue;
            }

            if fresh {
                counts.compiled += 1;
                documents.push(entry.document.clone());
                cache.record(rel.as_str(), entry);
            } else {
                counts.cached += 1;
                documents.push(entry.document);
            }
        }

        let matched: HashSet<&str> = files.iter().map(String::as_str).collect();
        let mut removed = 0;
        for path in cache.paths_for_type(name) {
            if !matched.contains(path.as_str()) {
                debug!(doc_type = name, path = %path, "source removed");
                cache.remove(&path);
                removed += 1;
            }
        }

        let changed = counts.compiled > 0
            || removed > 0
            || !failures.is_empty()
            || self.writer.collection_changed(name, &documents)?;
        if changed && write {
            self.writer.write_collection(name, &documents)?;
        }

        info!(
            doc_type = name,
            cached = counts.cached,
            compiled = counts.compiled,
            total = counts.total,
            failed = counts.failed,
            removed,
            changed,
            "generated collection"
        );

        Ok(CollectionResult {
            counts,
            failures,
            duplicates: DuplicateReport::from_conflicts(name, &conflicts),
            documents,
            changed,
        })
    }

    /// Claim the document's keys and emit its assets, all or nothing.
    /// Assets are only emitted by runs that write.
    fn accept(
        &self,
        registry: &mut UniquenessRegistry,
        entry: &CacheEntry,
        rel: &str,
        write: bool,
    ) -> Result<(), FileError> {
        let claimant = Path::new(rel);
        registry
            .check_all(&entry.claims, claimant)
            .map_err(FileError::Duplicate)?;

        if write {
            let template = &self.services.output.format;
            for source in &entry.assets {
                self.services
                    .assets
                    .emit(source, template)
                    .map_err(|e| FileError::Asset(format!("{}: {e}", source.display())))?;
            }
        }

        registry
            .commit_all(&entry.claims, claimant)
            .map_err(FileError::Duplicate)
    }

    fn failure(&self, path: &str, error: FileError) -> FileFailure {
        FileFailure {
            definition: self.definition.name.clone(),
            path: path.to_string(),
            error,
        }
    }
}
