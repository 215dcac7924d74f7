//! Term weighting over the corpus descriptions.
//!
//! weight(t, d) = tf(t, d) * idf(t), idf(t) = ln((1 + N) / (1 + df(t))) + 1,
//! then every document vector is scaled to unit length.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::corpus::Corpus;
use crate::engine::tokenize::tokenize;
use crate::errors::{Error, Result};

/// Sparse document vector: `(term index, weight)` pairs in ascending term order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TermVector {
    pub entries: Vec<(u32, f64)>,
}

impl TermVector {
    pub fn is_zero(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn norm(&self) -> f64 {
        self.entries.iter().map(|(_, w)| w * w).sum::<f64>().sqrt()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorSpace {
    /// Sorted terms; a term's position is its index
    pub vocabulary: Vec<String>,
    /// One vector per corpus item, in corpus order
    pub weights: Vec<TermVector>,
}

impl VectorSpace {
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Structural checks used when a vector space is read back from an artifact.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.vocabulary.windows(2).any(|w| w[0] >= w[1]) {
            return Err("vocabulary is not strictly sorted".to_string());
        }

        let size = self.vocabulary.len();
        for (row, vector) in self.weights.iter().enumerate() {
            if vector.entries.windows(2).any(|w| w[0].0 >= w[1].0) {
                return Err(format!("weights of row {row} are not in term order"));
            }
            if let Some((term, _)) = vector.entries.iter().find(|(t, _)| *t as usize >= size) {
                return Err(format!(
                    "row {row} references term {term}, vocabulary has {size} terms"
                ));
            }
        }
        Ok(())
    }
}

/// Fit term weights for every item description in `corpus`.
pub fn fit(corpus: &Corpus) -> Result<VectorSpace> {
    if corpus.is_empty() {
        return Err(Error::BuildFailure("corpus is empty".to_string()));
    }

    let documents: Vec<Vec<String>> = corpus
        .items()
        .iter()
        .map(|item| tokenize(&item.description))
        .collect();

    let vocabulary: Vec<String> = documents
        .iter()
        .flatten()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    if vocabulary.is_empty() {
        return Err(Error::BuildFailure(
            "empty vocabulary: descriptions contain only stop words or nothing".to_string(),
        ));
    }

    let positions: HashMap<&str, u32> = vocabulary
        .iter()
        .enumerate()
        .map(|(idx, term)| (term.as_str(), idx as u32))
        .collect();

    // raw term counts per document, keyed by term index
    let counts: Vec<BTreeMap<u32, u32>> = documents
        .iter()
        .map(|terms| {
            let mut tf = BTreeMap::new();
            for term in terms {
                *tf.entry(positions[term.as_str()]).or_insert(0) += 1;
            }
            tf
        })
        .collect();

    let mut df = vec![0u32; vocabulary.len()];
    for tf in &counts {
        for term in tf.keys() {
            df[*term as usize] += 1;
        }
    }

    let n = corpus.len() as f64;
    let idf: Vec<f64> = df
        .iter()
        .map(|df| ((1.0 + n) / (1.0 + *df as f64)).ln() + 1.0)
        .collect();

    let weights = counts
        .into_iter()
        .map(|tf| {
            let mut vector = TermVector {
                entries: tf
                    .into_iter()
                    .map(|(term, count)| (term, count as f64 * idf[term as usize]))
                    .collect(),
            };

            let norm = vector.norm();
            if norm > 0.0 {
                for (_, weight) in vector.entries.iter_mut() {
                    *weight /= norm;
                }
            }
            vector
        })
        .collect();

    Ok(VectorSpace {
        vocabulary,
        weights,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus(descriptions: &[&str]) -> Corpus {
        let mut corpus = Corpus::new("title", "description", vec![]);
        for (idx, description) in descriptions.iter().enumerate() {
            corpus.push(format!("T{idx}"), *description, BTreeMap::new());
        }
        corpus
    }

    fn weight(space: &VectorSpace, row: usize, term: &str) -> f64 {
        let idx = space
            .vocabulary
            .binary_search_by(|t| t.as_str().cmp(term))
            .unwrap() as u32;
        space.weights[row]
            .entries
            .iter()
            .find(|(t, _)| *t == idx)
            .map(|(_, w)| *w)
            .unwrap_or(0.0)
    }

    #[test]
    fn test_vocabulary_sorted_without_stop_words() {
        let space = fit(&corpus(&["the robots of space", "space opera"])).unwrap();
        assert_eq!(space.vocabulary, vec!["opera", "robots", "space"]);
        assert_eq!(space.len(), 2);
    }

    #[test]
    fn test_rare_terms_weigh_more() {
        let space = fit(&corpus(&["space robots", "space aliens", "space cooking"])).unwrap();
        assert!(weight(&space, 0, "robots") > weight(&space, 0, "space"));
    }

    #[test]
    fn test_vectors_are_unit_length() {
        let space = fit(&corpus(&["space opera robots robots", "cooking"])).unwrap();
        for vector in &space.weights {
            assert!((vector.norm() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_empty_description_is_zero_vector() {
        let space = fit(&corpus(&["space opera", "", "the of and"])).unwrap();
        assert!(space.weights[1].is_zero());
        assert!(space.weights[2].is_zero());
        assert_eq!(space.weights[1].norm(), 0.0);
    }

    #[test]
    fn test_smoothed_idf_values() {
        // N = 2, "space" df = 2, "opera" df = 1
        let space = fit(&corpus(&["space opera", "space"])).unwrap();
        let idf_space = 1.0f64;
        let idf_opera = (3.0f64 / 2.0).ln() + 1.0;
        let norm = (idf_space.powi(2) + idf_opera.powi(2)).sqrt();

        assert!((weight(&space, 0, "space") - idf_space / norm).abs() < 1e-12);
        assert!((weight(&space, 0, "opera") - idf_opera / norm).abs() < 1e-12);
        assert!((weight(&space, 1, "space") - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let docs = ["space opera robots", "space opera aliens", "cooking show"];
        assert_eq!(fit(&corpus(&docs)).unwrap(), fit(&corpus(&docs)).unwrap());
    }

    #[test]
    fn test_empty_corpus_is_build_failure() {
        assert!(matches!(fit(&corpus(&[])), Err(Error::BuildFailure(_))));
    }

    #[test]
    fn test_no_terms_is_build_failure() {
        assert!(matches!(fit(&corpus(&["", "the"])), Err(Error::BuildFailure(_))));
    }

    #[test]
    fn test_validate_rejects_out_of_range_term() {
        let mut space = fit(&corpus(&["space opera"])).unwrap();
        assert!(space.validate().is_ok());

        space.weights[0].entries.push((99, 0.5));
        assert!(space.validate().is_err());
    }
}
