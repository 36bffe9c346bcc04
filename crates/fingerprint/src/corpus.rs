//! Immutable set of reference fingerprints.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::FeatureVector;

/// One reference recording reduced to its fingerprint.
#[derive(Debug, Clone)]
pub struct Reference {
    path: PathBuf,
    category: String,
    fingerprint: FeatureVector,
}

impl Reference {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Event category the recording is an example of (e.g. "sneeze").
    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn fingerprint(&self) -> &FeatureVector {
        &self.fingerprint
    }
}

/// Collects references before the corpus is frozen.
#[derive(Debug, Default)]
pub struct CorpusBuilder {
    entries: Vec<Reference>,
    labels: HashSet<String>,
}

impl CorpusBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a reference. Returns false and keeps the existing entry when a
    /// fingerprint with the same label is already present.
    pub fn insert(
        &mut self,
        path: impl Into<PathBuf>,
        category: impl Into<String>,
        fingerprint: FeatureVector,
    ) -> bool {
        if !self.labels.insert(fingerprint.label().to_string()) {
            return false;
        }
        self.entries.push(Reference {
            path: path.into(),
            category: category.into(),
            fingerprint,
        });
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn build(self) -> ReferenceCorpus {
        ReferenceCorpus {
            entries: self.entries.into(),
        }
    }
}

/// Read-only reference set, cheap to clone and share across threads.
#[derive(Debug, Clone, Default)]
pub struct ReferenceCorpus {
    entries: Arc<[Reference]>,
}

impl ReferenceCorpus {
    pub fn iter(&self) -> impl Iterator<Item = &Reference> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a reference by its source path.
    pub fn get(&self, path: &Path) -> Option<&Reference> {
        self.entries.iter().find(|r| r.path == path)
    }

    /// Number of references in a category.
    pub fn count_category(&self, category: &str) -> usize {
        self.entries.iter().filter(|r| r.category == category).count()
    }
}
