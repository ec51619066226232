//! Version control metadata.

use std::{
    collections::HashSet,
    fmt,
    path::Path,
    process::Command,
    sync::{Mutex, PoisonError},
};

use chrono::{DateTime, SecondsFormat};
use inklayer_core::{GitInfo, schema::GitAge};
use thiserror::Error;
use tracing::{debug, warn};

/// Why metadata could not be produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VcsFailure {
    #[error("git is not installed")]
    ToolMissing,

    #[error("file is not tracked by git")]
    FileUntracked,

    #[error("file does not exist")]
    FileMissing,

    #[error("{0}")]
    Other(String),
}

impl VcsFailure {
    /// Failure class, used to warn once per class.
    pub fn class(&self) -> &'static str {
        match self {
            Self::ToolMissing => "toolMissing",
            Self::FileUntracked => "fileUntracked",
            Self::FileMissing => "fileMissing",
            Self::Other(_) => "other",
        }
    }
}

/// Source of last-change metadata for files.
pub trait VcsProvider: Send + Sync + fmt::Debug {
    /// Commit metadata for the file at `path`.
    fn last_change(&self, path: &Path, age: GitAge) -> Result<GitInfo, VcsFailure>;
}

/// Provider that shells out to `git log`.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

impl GitCli {
    pub fn new() -> Self {
        Self::with_program("git")
    }

    /// Use a different executable.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl VcsProvider for GitCli {
    fn last_change(&self, path: &Path, age: GitAge) -> Result<GitInfo, VcsFailure> {
        if !path.is_file() {
            return Err(VcsFailure::FileMissing);
        }
        let (Some(dir), Some(name)) = (path.parent(), path.file_name()) else {
            return Err(VcsFailure::FileMissing);
        };

        let mut command = Command::new(&self.program);
        command.arg("log").arg("--format=%ct,%an").arg("--max-count=1");
        if age == GitAge::Oldest {
            command.arg("--follow").arg("--diff-filter=A");
        }
        // Commit dates rather than author dates, so amended commits update.
        command.arg("--").arg(name).current_dir(dir);

        let output = command.output().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => VcsFailure::ToolMissing,
            _ => VcsFailure::Other(e.to_string()),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("not a git repository") {
                return Err(VcsFailure::FileUntracked);
            }
            return Err(VcsFailure::Other(stderr.trim().to_string()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let line = stdout.lines().rev().find(|l| !l.trim().is_empty());
        match line {
            None => Err(VcsFailure::FileUntracked),
            Some(line) => parse_log_line(line).ok_or_else(|| {
                VcsFailure::Other(format!("unexpected git log output '{}'", line.trim()))
            }),
        }
    }
}

/// Parse a `%ct,%an` line.
pub fn parse_log_line(line: &str) -> Option<GitInfo> {
    let (timestamp, author) = line.trim().split_once(',')?;
    let timestamp: i64 = timestamp.parse().ok()?;
    let date = DateTime::from_timestamp(timestamp, 0)?;
    Some(GitInfo {
        date: date.to_rfc3339_opts(SecondsFormat::Secs, true),
        timestamp,
        author: author.to_string(),
    })
}

/// Logs one warning per failure class.
#[derive(Debug, Default)]
pub struct WarnOnce {
    seen: Mutex<HashSet<&'static str>>,
}

impl WarnOnce {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a failure; returns whether a warning was logged.
    pub fn report(&self, failure: &VcsFailure, path: &Path) -> bool {
        let first = self
            .seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(failure.class());

        if first {
            warn!(
                class = failure.class(),
                path = %path.display(),
                "cannot read git metadata: {failure}; using fallback values"
            );
        } else {
            debug!(class = failure.class(), path = %path.display(), "git metadata unavailable");
        }
        first
    }
}
