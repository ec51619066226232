//! Content file discovery.

use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum DiscoverError {
    #[error("content directory not found: {0}")]
    MissingRoot(PathBuf),

    #[error("invalid glob pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

/// Compiled include and exclude globs.
#[derive(Debug, Clone)]
pub struct PatternSet {
    include: GlobSet,
    exclude: GlobSet,
}

impl PatternSet {
    /// Build from patterns; a leading `!` marks an exclusion.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, DiscoverError> {
        let mut include = GlobSetBuilder::new();
        let mut exclude = GlobSetBuilder::new();

        for pattern in patterns {
            let pattern = pattern.as_ref();
            let (builder, raw) = match pattern.strip_prefix('!') {
                Some(negated) => (&mut exclude, negated),
                None => (&mut include, pattern),
            };
            let glob = GlobBuilder::new(raw.trim_start_matches("./"))
                .literal_separator(true)
                .build()
                .map_err(|source| DiscoverError::Pattern {
                    pattern: pattern.to_string(),
                    source,
                })?;
            builder.add(glob);
        }

        let build = |builder: GlobSetBuilder| {
            builder.build().map_err(|source| DiscoverError::Pattern {
                pattern: patterns
                    .iter()
                    .map(AsRef::as_ref)
                    .collect::<Vec<_>>()
                    .join(", "),
                source,
            })
        };
        Ok(Self {
            include: build(include)?,
            exclude: build(exclude)?,
        })
    }

    /// Whether a `/`-separated relative path is selected.
    pub fn is_match(&self, relative_path: &str) -> bool {
        self.include.is_match(relative_path) && !self.exclude.is_match(relative_path)
    }
}

/// List files under `root` matching `patterns`, sorted and `/`-separated.
///
/// Hidden entries and anything listed in `.gitignore` or one of
/// `ignore_files` are skipped, as is the `exclude` directory when it lies
/// inside `root`.
pub fn discover<S: AsRef<str>>(
    root: &Path,
    patterns: &[S],
    ignore_files: &[String],
    exclude: Option<&Path>,
) -> Result<Vec<String>, DiscoverError> {
    if !root.is_dir() {
        return Err(DiscoverError::MissingRoot(root.to_path_buf()));
    }
    let set = PatternSet::new(patterns)?;

    let mut builder = WalkBuilder::new(root);
    builder
        .hidden(true)
        .git_ignore(true)
        .git_exclude(false)
        .git_global(false)
        .require_git(false)
        .sort_by_file_name(|a, b| a.cmp(b));
    for name in ignore_files {
        builder.add_custom_ignore_filename(name);
    }
    if let Some(exclude) = exclude {
        let exclude = exclude.to_path_buf();
        builder.filter_entry(move |entry| !entry.path().starts_with(&exclude));
    }

    let mut files = Vec::new();
    for entry in builder.build() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if set.is_match(&relative) {
            files.push(relative);
        }
    }

    files.sort();
    debug!(root = %root.display(), count = files.len(), "discovered files");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, "x").expect("write");
    }

    #[test]
    fn test_discover_matches_patterns() {
        let dir = TempDir::new().expect("tempdir");
        for rel in ["posts/b.md", "posts/a.mdx", "posts/deep/c.md", "docs/d.md", "notes.txt"] {
            touch(dir.path(), rel);
        }

        let files = discover(dir.path(), &["posts/**/*.{md,mdx}"], &[], None).expect("discover");
        assert_eq!(files, vec!["posts/a.mdx", "posts/b.md", "posts/deep/c.md"]);

        let files = discover(dir.path(), &["posts/*.md"], &[], None).expect("discover");
        assert_eq!(files, vec!["posts/b.md"]);
    }

    #[test]
    fn test_negated_patterns() {
        let dir = TempDir::new().expect("tempdir");
        touch(dir.path(), "a.md");
        touch(dir.path(), "drafts/b.md");

        let files = discover(dir.path(), &["**/*.md", "!drafts/**"], &[], None).expect("discover");
        assert_eq!(files, vec!["a.md"]);
    }

    #[test]
    fn test_ignore_files_and_hidden() {
        let dir = TempDir::new().expect("tempdir");
        touch(dir.path(), "a.md");
        touch(dir.path(), "skip/b.md");
        touch(dir.path(), "private.md");
        touch(dir.path(), ".hidden/c.md");
        fs::write(dir.path().join(".gitignore"), "skip/\n").expect("write");
        fs::write(dir.path().join(".inklayerignore"), "private.md\n").expect("write");

        let files = discover(
            dir.path(),
            &["**/*.md"],
            &[".inklayerignore".to_string()],
            None,
        )
        .expect("discover");
        assert_eq!(files, vec!["a.md"]);
    }

    #[test]
    fn test_excludes_output_dir() {
        let dir = TempDir::new().expect("tempdir");
        touch(dir.path(), "a.md");
        touch(dir.path(), "out/generated/x.md");

        let out = dir.path().join("out");
        let files = discover(dir.path(), &["**/*.md"], &[], Some(&out)).expect("discover");
        assert_eq!(files, vec!["a.md"]);
    }

    #[test]
    fn test_missing_root_and_bad_pattern() {
        let dir = TempDir::new().expect("tempdir");
        let missing = dir.path().join("nope");
        assert!(matches!(
            discover(&missing, &["*.md"], &[], None),
            Err(DiscoverError::MissingRoot(_))
        ));
        assert!(matches!(
            discover(dir.path(), &["posts/[.md"], &[], None),
            Err(DiscoverError::Pattern { .. })
        ));
    }
}
