//! The immutable bundle served to queries.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::corpus::Corpus;
use crate::engine::similarity::{compute_similarity, SimilarityMatrix};
use crate::engine::title_index::TitleIndex;
use crate::engine::vectorizer::{self, VectorSpace};
use crate::errors::{Error, Result};

/// Version of the artifact layout this build writes and reads.
pub const FORMAT_VERSION: u8 = 1;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelMeta {
    pub format_version: u8,
    /// RFC 3339, UTC
    pub built_at: String,
    pub rows: usize,
    pub vocabulary_size: usize,
    /// SHA-256 of the dataset file the model was built from
    pub dataset_sha256: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    meta: ModelMeta,
    corpus: Corpus,
    vector_space: VectorSpace,
    matrix: SimilarityMatrix,
    title_index: TitleIndex,
}

impl Model {
    /// Run the full build pipeline: vectorize, score all pairs, index titles.
    pub fn build(
        corpus: Corpus,
        threads: Option<usize>,
        dataset_sha256: Option<String>,
    ) -> Result<Self> {
        let started = Instant::now();

        let vector_space = vectorizer::fit(&corpus)?;
        log::info!(
            "vectorized {} items, vocabulary of {} terms in {:?}",
            corpus.len(),
            vector_space.vocabulary.len(),
            started.elapsed()
        );

        let matrix_started = Instant::now();
        let matrix = compute_similarity(&vector_space, threads)?;
        log::info!(
            "computed {n}x{n} similarity matrix in {:?}",
            matrix_started.elapsed(),
            n = matrix.dimension()
        );

        let title_index = TitleIndex::build(&corpus);
        log::debug!("indexed {} distinct titles", title_index.len());

        let meta = ModelMeta {
            format_version: FORMAT_VERSION,
            built_at: chrono::Utc::now().to_rfc3339(),
            rows: corpus.len(),
            vocabulary_size: vector_space.vocabulary.len(),
            dataset_sha256,
        };

        let model = Self {
            meta,
            corpus,
            vector_space,
            matrix,
            title_index,
        };
        model.validate().map_err(Error::BuildFailure)?;

        log::info!("model built in {:?}", started.elapsed());
        Ok(model)
    }

    /// Reassemble a model from stored parts, checking that every part agrees
    /// on the row count.
    pub fn from_parts(
        meta: ModelMeta,
        corpus: Corpus,
        vector_space: VectorSpace,
        matrix: SimilarityMatrix,
        title_index: TitleIndex,
    ) -> std::result::Result<Self, String> {
        let model = Self {
            meta,
            corpus,
            vector_space,
            matrix,
            title_index,
        };
        model.validate()?;
        Ok(model)
    }

    pub fn meta(&self) -> &ModelMeta {
        &self.meta
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn vector_space(&self) -> &VectorSpace {
        &self.vector_space
    }

    pub fn matrix(&self) -> &SimilarityMatrix {
        &self.matrix
    }

    pub fn title_index(&self) -> &TitleIndex {
        &self.title_index
    }

    pub fn rows(&self) -> usize {
        self.corpus.len()
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        let rows = self.corpus.len();

        self.corpus.validate()?;
        self.vector_space.validate()?;

        if self.meta.rows != rows {
            return Err(format!(
                "metadata says {} rows, corpus has {rows}",
                self.meta.rows
            ));
        }
        if self.meta.vocabulary_size != self.vector_space.vocabulary.len() {
            return Err(format!(
                "metadata says {} terms, vocabulary has {}",
                self.meta.vocabulary_size,
                self.vector_space.vocabulary.len()
            ));
        }
        if self.vector_space.len() != rows {
            return Err(format!(
                "{} weight vectors for {rows} rows",
                self.vector_space.len()
            ));
        }
        if self.matrix.dimension() != rows {
            return Err(format!(
                "matrix is {n}x{n}, corpus has {rows} rows",
                n = self.matrix.dimension()
            ));
        }
        self.title_index.validate(rows)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn corpus() -> Corpus {
        let mut corpus = Corpus::new("title", "description", vec![]);
        corpus.push("A", "space opera robots", BTreeMap::new());
        corpus.push("B", "space opera aliens", BTreeMap::new());
        corpus.push("C", "cooking show", BTreeMap::new());
        corpus
    }

    #[test]
    fn test_build_populates_every_part() {
        let model = Model::build(corpus(), Some(2), Some("abc".to_string())).unwrap();

        assert_eq!(model.rows(), 3);
        assert_eq!(model.matrix().dimension(), 3);
        assert_eq!(model.vector_space().len(), 3);
        assert_eq!(model.title_index().resolve("C"), Some(2));
        assert_eq!(model.meta().rows, 3);
        assert_eq!(model.meta().vocabulary_size, 5);
        assert_eq!(model.meta().format_version, FORMAT_VERSION);
        assert_eq!(model.meta().dataset_sha256.as_deref(), Some("abc"));
        assert!(chrono::DateTime::parse_from_rfc3339(&model.meta().built_at).is_ok());
    }

    #[test]
    fn test_build_empty_corpus_fails() {
        let corpus = Corpus::new("title", "description", vec![]);
        assert!(matches!(
            Model::build(corpus, None, None),
            Err(Error::BuildFailure(_))
        ));
    }

    #[test]
    fn test_from_parts_rejects_mismatched_matrix() {
        let model = Model::build(corpus(), None, None).unwrap();
        let small = SimilarityMatrix::from_cells(2, vec![1.0, 0.0, 0.0, 1.0]).unwrap();

        let result = Model::from_parts(
            model.meta().clone(),
            model.corpus().clone(),
            model.vector_space().clone(),
            small,
            model.title_index().clone(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_from_parts_rejects_mismatched_meta() {
        let model = Model::build(corpus(), None, None).unwrap();
        let mut meta = model.meta().clone();
        meta.rows = 7;

        let result = Model::from_parts(
            meta,
            model.corpus().clone(),
            model.vector_space().clone(),
            model.matrix().clone(),
            model.title_index().clone(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_from_parts_rejects_missing_weight_vector() {
        let model = Model::build(corpus(), None, None).unwrap();
        let mut vector_space = model.vector_space().clone();
        vector_space.weights.pop();

        let err = Model::from_parts(
            model.meta().clone(),
            model.corpus().clone(),
            vector_space,
            model.matrix().clone(),
            model.title_index().clone(),
        )
        .unwrap_err();
        assert!(err.contains("2 weight vectors for 3 rows"), "{err}");
    }

    #[test]
    fn test_from_parts_rejects_corpus_length_mismatch() {
        let model = Model::build(corpus(), None, None).unwrap();
        let mut longer = corpus();
        longer.push("D", "space robots", BTreeMap::new());

        // meta, weights, matrix and index all still describe 3 rows
        let err = Model::from_parts(
            model.meta().clone(),
            longer,
            model.vector_space().clone(),
            model.matrix().clone(),
            model.title_index().clone(),
        )
        .unwrap_err();
        assert!(err.contains("metadata says 3 rows, corpus has 4"), "{err}");
    }
}
