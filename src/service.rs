//! Query side: ranking, display projection and the hot-swappable model handle.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;

use crate::corpus::AttrValue;
use crate::engine::Model;
use crate::errors::{Error, Result};

/// Display projection of a recommended item.
///
/// A field is absent when its column is not part of the corpus schema and
/// `null` when the cell is unknown.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DisplayRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<AttrValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<AttrValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<AttrValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredCandidate {
    pub row: usize,
    pub score: f32,
}

/// Read-only recommendation queries over one model generation.
pub struct RecommendationService {
    model: Arc<Model>,
    /// Display field -> corpus column
    display: BTreeMap<String, String>,
    max_top_n: usize,
}

impl RecommendationService {
    pub fn new(model: Arc<Model>, display: BTreeMap<String, String>) -> Self {
        Self {
            model,
            display,
            max_top_n: usize::MAX,
        }
    }

    /// Reject requests asking for more than `max_top_n` results.
    pub fn with_max_top_n(mut self, max_top_n: usize) -> Self {
        self.max_top_n = max_top_n;
        self
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Most similar items to `title`, best first, the queried item excluded.
    ///
    /// Equal scores are ordered by ascending row.
    pub fn rank(&self, title: &str, top_n: usize) -> Result<Vec<ScoredCandidate>> {
        if title.trim().is_empty() {
            return Err(Error::InvalidRequest("title must not be empty".to_string()));
        }
        if top_n == 0 {
            return Err(Error::InvalidRequest("top_n must be at least 1".to_string()));
        }
        if top_n > self.max_top_n {
            return Err(Error::InvalidRequest(format!(
                "top_n must be at most {}",
                self.max_top_n
            )));
        }

        let row = self
            .model
            .title_index()
            .resolve(title)
            .ok_or_else(|| Error::NotFound(title.to_string()))?;

        let scores = self.model.matrix().row(row).ok_or_else(|| {
            Error::CorruptArtifact(format!("title '{title}' points outside the matrix"))
        })?;

        let mut candidates: Vec<ScoredCandidate> = scores
            .iter()
            .enumerate()
            .filter(|(candidate, _)| *candidate != row)
            .map(|(candidate, score)| ScoredCandidate {
                row: candidate,
                score: *score,
            })
            .collect();

        candidates.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.row.cmp(&b.row)));
        candidates.truncate(top_n);

        Ok(candidates)
    }

    pub fn recommend(&self, title: &str, top_n: usize) -> Result<Vec<DisplayRecord>> {
        Ok(self
            .rank(title, top_n)?
            .iter()
            .map(|candidate| self.project(candidate.row))
            .collect())
    }

    pub fn project(&self, row: usize) -> DisplayRecord {
        let field = |name: &str| {
            self.display
                .get(name)
                .and_then(|column| self.model.corpus().value(row, column))
        };

        DisplayRecord {
            name: field("name"),
            genre: field("genre"),
            rating: field("rating"),
        }
    }
}

/// The active model generation.
///
/// Readers clone the `Arc` and work without holding the lock, so a swap never
/// changes the model under an in-flight query.
pub struct ModelHandle {
    current: RwLock<Arc<Model>>,
}

impl ModelHandle {
    pub fn new(model: Model) -> Self {
        Self {
            current: RwLock::new(Arc::new(model)),
        }
    }

    pub fn current(&self) -> Arc<Model> {
        // the guarded value is only ever replaced whole, so a poisoned lock
        // still holds a consistent model
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Install `model` as the active generation, returning the previous one.
    pub fn swap(&self, model: Model) -> Arc<Model> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *current, Arc::new(model))
    }
}
