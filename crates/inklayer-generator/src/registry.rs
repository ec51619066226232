//! Uniqueness registry for ids and slugs.
//!
//! A fresh registry is created for every generation run. Documents are
//! compiled without touching it; their claims are committed afterwards in
//! sorted path order so the outcome does not depend on compile order.

use std::{
    collections::{BTreeMap, HashMap},
    path::{Path, PathBuf},
};

use inklayer_core::UniqueScope;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A scoped identifier a document wants to own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Claim {
    /// Scoped key, `field:type:value` or `field:global:value`.
    pub key: String,

    /// Field name, e.g. `slug`.
    pub field: String,

    /// Claimed value.
    pub value: String,
}

impl Claim {
    /// Build a claim for `value` of `field` in the given scope.
    pub fn new(field: &str, scope: UniqueScope, doc_type: &str, value: &str) -> Self {
        let scope_part = match scope {
            UniqueScope::Definition => doc_type,
            UniqueScope::Global => "global",
        };
        Self {
            key: format!("{field}:{scope_part}:{value}"),
            field: field.to_string(),
            value: value.to_string(),
        }
    }
}

/// Two files claimed the same scoped key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "duplicate {field} '{value}': {} conflicts with {}",
    claimant.display(),
    existing.display()
)]
pub struct DuplicateIdentifier {
    pub key: String,
    pub field: String,
    pub value: String,

    /// File whose claim was rejected.
    pub claimant: PathBuf,

    /// File that owns the key.
    pub existing: PathBuf,
}

/// Map from scoped key to the file that claimed it.
#[derive(Debug, Default)]
pub struct UniquenessRegistry {
    claims: HashMap<String, PathBuf>,
}

impl UniquenessRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a single key. Re-claiming by the same file succeeds.
    pub fn claim(&mut self, claim: &Claim, claimant: &Path) -> Result<(), DuplicateIdentifier> {
        self.check(claim, claimant)?;
        self.claims.insert(claim.key.clone(), claimant.to_path_buf());
        Ok(())
    }

    /// Test whether `claimant` could claim the key, without claiming it.
    pub fn check(&self, claim: &Claim, claimant: &Path) -> Result<(), DuplicateIdentifier> {
        match self.claims.get(&claim.key) {
            Some(existing) if existing.as_path() != claimant => Err(DuplicateIdentifier {
                key: claim.key.clone(),
                field: claim.field.clone(),
                value: claim.value.clone(),
                claimant: claimant.to_path_buf(),
                existing: existing.clone(),
            }),
            _ => Ok(()),
        }
    }

    /// Check every claim of one document without committing any.
    pub fn check_all(
        &self,
        claims: &[Claim],
        claimant: &Path,
    ) -> Result<(), Vec<DuplicateIdentifier>> {
        let conflicts: Vec<_> = claims
            .iter()
            .filter_map(|claim| self.check(claim, claimant).err())
            .collect();
        if conflicts.is_empty() {
            Ok(())
        } else {
            Err(conflicts)
        }
    }

    /// Commit every claim of one document, or none of them.
    pub fn commit_all(
        &mut self,
        claims: &[Claim],
        claimant: &Path,
    ) -> Result<(), Vec<DuplicateIdentifier>> {
        self.check_all(claims, claimant)?;

        for claim in claims {
            self.claims.insert(claim.key.clone(), claimant.to_path_buf());
        }
        Ok(())
    }

    /// Owner of a key, if claimed.
    pub fn claimed_by(&self, key: &str) -> Option<&Path> {
        self.claims.get(key).map(PathBuf::as_path)
    }

    /// Sorted copy of every claim, as persisted next to the cache.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.claims
            .iter()
            .map(|(key, path)| (key.clone(), path.to_string_lossy().replace('\\', "/")))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}
