//! Generation orchestration.
//!
//! Coordinates a full run: configuration checks, cache load, every
//! collection in definition order, cache persistence and the
//! cross-collection artifacts.

use std::{
    collections::BTreeMap,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Instant,
};

use inklayer_core::{Config, CoreError, GenerationMode, config::validate_definition_set};
use inklayer_transform::{ContentTransformer, TransformerRegistry};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    cache::{CacheError, DataCache, PIPELINE_VERSION, cache_file_path},
    collection::{
        CollectionCounts, CollectionError, CollectionGenerator, CollectionPaths, DuplicateReport,
    },
    compiler::FileFailure,
    definition::Definition,
    output::{ArtifactWriter, OutputError, Summary},
    providers::{AssetProcessor, GitCli, ImageAssets, VcsProvider, WarnOnce},
    registry::UniquenessRegistry,
    schema::Services,
};

/// Generation errors.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// Invalid configuration; nothing was read or written.
    #[error("config error: {0}")]
    Config(#[from] CoreError),

    /// Cache error.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// A collection could not be generated.
    #[error("collection '{definition}': {source}")]
    Collection {
        definition: String,
        #[source]
        source: CollectionError,
    },

    /// Artifact error.
    #[error("output error: {0}")]
    Output(#[from] OutputError),

    /// Another run on the same generator is in progress.
    #[error("a generation is already running")]
    AlreadyRunning,

    /// The run finished but some files failed.
    #[error("{0}")]
    Failed(Box<GenerationReport>),
}

/// Result type for generation.
pub type Result<T> = std::result::Result<T, GenerateError>;

/// Options for one run.
#[derive(Debug, Clone, Copy)]
pub struct GenerateOptions {
    pub mode: GenerationMode,

    /// Write artifacts and the cache.
    pub write: bool,

    /// Consult the cache; ignored when caching is disabled in configuration.
    pub use_cache: bool,
}

impl GenerateOptions {
    pub fn new(mode: GenerationMode) -> Self {
        Self {
            mode,
            write: true,
            use_cache: true,
        }
    }

    /// Compile everything and write nothing.
    pub fn check() -> Self {
        Self {
            mode: GenerationMode::Development,
            write: false,
            use_cache: false,
        }
    }
}

/// Outcome of a run.
#[derive(Debug)]
pub struct GenerationReport {
    pub mode: GenerationMode,
    pub config_hash: String,
    pub per_type: BTreeMap<String, CollectionCounts>,
    pub failures: Vec<FileFailure>,
    pub duplicates: Vec<DuplicateReport>,

    /// Whether any collection's artifacts changed.
    pub changed: bool,

    pub elapsed_ms: u64,
}

impl GenerationReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Counts summed over every collection.
    pub fn totals(&self) -> CollectionCounts {
        let mut totals = CollectionCounts::default();
        for counts in self.per_type.values() {
            totals += *counts;
        }
        totals
    }
}

impl fmt::Display for GenerationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let totals = self.totals();
        write!(
            f,
            "generated {} documents ({} cached, {} compiled) in {} ms",
            totals.total - totals.failed,
            totals.cached,
            totals.compiled,
            self.elapsed_ms
        )?;
        if !self.failures.is_empty() {
            write!(f, "\n{} file(s) failed:", self.failures.len())?;
            for failure in &self.failures {
                write!(f, "\n  {failure}")?;
            }
        }
        for report in &self.duplicates {
            write!(f, "\n{report}")?;
        }
        Ok(())
    }
}

/// Resets the running flag on drop.
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| GenerateError::AlreadyRunning)?;
        Ok(Self(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs every collection of a configuration.
pub struct Generator {
    config: Config,
    definitions: Vec<Definition>,
    transformer: Arc<dyn ContentTransformer>,
    vcs: Arc<dyn VcsProvider>,
    assets: Arc<dyn AssetProcessor>,
    running: AtomicBool,
}

impl fmt::Debug for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generator")
            .field("config", &self.config)
            .field("definitions", &self.definitions)
            .field("vcs", &self.vcs)
            .field("assets", &self.assets)
            .field("running", &self.running)
            .finish_non_exhaustive()
    }
}

impl Generator {
    /// Create a generator for the definitions declared in `config`, with the
    /// built-in transformers, `git` and the image processor.
    pub fn new(config: Config) -> Self {
        let definitions = config.definitions.iter().map(Definition::from_config).collect();
        let transformer = Arc::new(TransformerRegistry::with_theme(
            &config.plugins.highlight_theme,
        ));
        let assets = Arc::new(ImageAssets::new(
            config.output.assets.clone(),
            config.output.base.clone(),
        ));
        Self {
            config,
            definitions,
            transformer,
            vcs: Arc::new(GitCli::new()),
            assets,
            running: AtomicBool::new(false),
        }
    }

    /// Add a programmatic definition.
    #[must_use]
    pub fn with_definition(mut self, definition: Definition) -> Self {
        self.definitions.push(definition);
        self
    }

    #[must_use]
    pub fn with_transformers(mut self, transformer: Arc<dyn ContentTransformer>) -> Self {
        self.transformer = transformer;
        self
    }

    #[must_use]
    pub fn with_vcs(mut self, vcs: Arc<dyn VcsProvider>) -> Self {
        self.vcs = vcs;
        self
    }

    #[must_use]
    pub fn with_assets(mut self, assets: Arc<dyn AssetProcessor>) -> Self {
        self.assets = assets;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn definitions(&self) -> &[Definition] {
        &self.definitions
    }

    /// Check every definition before any file is touched.
    pub fn validate(&self) -> Result<()> {
        validate_definition_set(
            self.definitions
                .iter()
                .map(|d| (d.name.as_str(), d.patterns.as_slice())),
        )?;
        if !self.config.definitions.is_empty() {
            self.config.validate()?;
        }
        Ok(())
    }

    /// Hash namespacing the cache: configuration, mode and programmatic
    /// definition fingerprints.
    pub fn config_hash(&self, mode: GenerationMode) -> Result<String> {
        let mut extra = vec![format!("mode={mode}")];
        extra.extend(self.definitions.iter().map(Definition::fingerprint));
        let extra: Vec<&str> = extra.iter().map(String::as_str).collect();
        Ok(self.config.hash_with(&extra)?)
    }

    /// Generate and write everything.
    pub fn generate(&self, mode: GenerationMode) -> Result<GenerationReport> {
        self.generate_with(GenerateOptions::new(mode))
    }

    /// Like [`Generator::generate`], but a run with failed files is an error.
    pub fn generate_strict(&self, mode: GenerationMode) -> Result<GenerationReport> {
        let report = self.generate(mode)?;
        if report.is_success() {
            Ok(report)
        } else {
            Err(GenerateError::Failed(Box::new(report)))
        }
    }

    /// Run with explicit options.
    pub fn generate_with(&self, options: GenerateOptions) -> Result<GenerationReport> {
        let _guard = RunGuard::acquire(&self.running)?;
        let start = Instant::now();
        let config = &self.config;

        self.validate()?;
        let config_hash = self.config_hash(options.mode)?;
        let cache_path = cache_file_path(&config.output_dir, &config_hash);

        info!(
            mode = %options.mode,
            content = %config.content_dir.display(),
            output = %config.output_dir.display(),
            config_hash = %config_hash,
            "starting generation"
        );

        let mut cache = if options.use_cache && config.caching {
            DataCache::load(&cache_path, &config_hash)
        } else {
            debug!("cache disabled");
            DataCache::disabled()
        };

        let services = Arc::new(Services {
            transformer: Arc::clone(&self.transformer),
            vcs: Arc::clone(&self.vcs),
            assets: Arc::clone(&self.assets),
            plugins: config.plugins.clone(),
            output: config.output.clone(),
            content_dir: config.content_dir.clone(),
            md_as_mdoc: config.md_as_mdoc,
            mode: options.mode,
            vcs_warnings: WarnOnce::new(),
        });
        let writer = ArtifactWriter::new(&config.output_dir);
        let paths = CollectionPaths {
            ignore_files: &config.ignore_files,
            exclude: Some(config.output_dir.as_path()),
        };

        let mut registry = UniquenessRegistry::new();
        let mut summary = Summary::new(PIPELINE_VERSION, &config_hash);
        let mut report = GenerationReport {
            mode: options.mode,
            config_hash: config_hash.clone(),
            per_type: BTreeMap::new(),
            failures: Vec::new(),
            duplicates: Vec::new(),
            changed: false,
            elapsed_ms: 0,
        };
        let mut documents = Vec::new();

        for definition in &self.definitions {
            let result = CollectionGenerator::new(
                definition,
                Arc::clone(&services),
                paths,
                &writer,
            )
            .run(&mut cache, &mut registry, options.write)
            .map_err(|source| GenerateError::Collection {
                definition: definition.name.clone(),
                source,
            })?;

            summary.add(&definition.name, &result.documents);
            report.per_type.insert(definition.name.clone(), result.counts);
            report.failures.extend(result.failures);
            report.duplicates.extend(result.duplicates);
            report.changed |= result.changed;
            documents.extend(result.documents);
        }

        report.elapsed_ms = start.elapsed().as_millis() as u64;
        cache.set_uniques(registry.snapshot());
        cache.set_elapsed(report.elapsed_ms);

        if options.write {
            cache.save(&cache_path)?;
            if report.changed || !writer.summary_path().exists() {
                writer.write_summary(&summary, &documents)?;
            }
        }

        for failure in &report.failures {
            warn!(
                doc_type = %failure.definition,
                path = %failure.path,
                error = %failure.error,
                "file failed"
            );
        }
        let totals = report.totals();
        info!(
            cached = totals.cached,
            compiled = totals.compiled,
            total = totals.total,
            failed = totals.failed,
            changed = report.changed,
            elapsed_ms = report.elapsed_ms,
            "generation complete"
        );

        Ok(report)
    }
}
