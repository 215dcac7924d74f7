//! Dense pairwise cosine similarity.

use rayon::prelude::*;

use crate::engine::vectorizer::{TermVector, VectorSpace};
use crate::errors::{Error, Result};

/// Row-major `n x n` matrix of cosine scores.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatrix {
    n: usize,
    cells: Vec<f32>,
}

impl SimilarityMatrix {
    /// Wrap raw cells.
    ///
    /// The matrix must be square and symmetric, with every cell a finite
    /// score in `[-1, 1]`.
    pub fn from_cells(n: usize, cells: Vec<f32>) -> std::result::Result<Self, String> {
        let expected = n
            .checked_mul(n)
            .ok_or_else(|| format!("matrix dimension {n} overflows"))?;
        if cells.len() != expected {
            return Err(format!(
                "matrix has {} cells, expected {n}x{n}",
                cells.len()
            ));
        }

        // NaN fails the range check too
        if let Some(pos) = cells.iter().position(|s| !(-1.0..=1.0).contains(s)) {
            return Err(format!(
                "cell ({}, {}) = {} is not a cosine score",
                pos / n,
                pos % n,
                cells[pos]
            ));
        }

        for i in 0..n {
            for j in (i + 1)..n {
                if cells[i * n + j] != cells[j * n + i] {
                    return Err(format!("matrix is not symmetric at ({i}, {j})"));
                }
            }
        }

        Ok(Self { n, cells })
    }

    pub fn dimension(&self) -> usize {
        self.n
    }

    pub fn row(&self, i: usize) -> Option<&[f32]> {
        if i >= self.n {
            return None;
        }
        Some(&self.cells[i * self.n..(i + 1) * self.n])
    }

    pub fn get(&self, i: usize, j: usize) -> Option<f32> {
        self.row(i).and_then(|row| row.get(j).copied())
    }

    pub fn cells(&self) -> &[f32] {
        &self.cells
    }
}

/// Cosine of two sparse vectors; 0.0 when either has zero magnitude.
///
/// Products are summed in ascending term order so the result does not depend
/// on which vector is passed first.
pub fn cosine(a: &TermVector, b: &TermVector, norm_a: f64, norm_b: f64) -> f32 {
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let (mut i, mut j) = (0, 0);
    let mut dot = 0.0f64;
    while i < a.entries.len() && j < b.entries.len() {
        let (ta, wa) = a.entries[i];
        let (tb, wb) = b.entries[j];
        match ta.cmp(&tb) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                dot += wa * wb;
                i += 1;
                j += 1;
            }
        }
    }

    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0) as f32
}

/// Compute every cell of the similarity matrix.
///
/// Rows are filled in parallel; each cell is computed on its own from two
/// read-only vectors, so the output is the same for any thread count.
pub fn compute_similarity(space: &VectorSpace, threads: Option<usize>) -> Result<SimilarityMatrix> {
    let n = space.len();
    if n == 0 {
        return Err(Error::BuildFailure("vector space is empty".to_string()));
    }

    let norms: Vec<f64> = space.weights.iter().map(TermVector::norm).collect();
    let mut cells = vec![0.0f32; n * n];

    let fill = |cells: &mut [f32]| {
        cells.par_chunks_mut(n).enumerate().for_each(|(i, row)| {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = cosine(&space.weights[i], &space.weights[j], norms[i], norms[j]);
            }
        });
    };

    match threads {
        Some(threads) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|err| Error::BuildFailure(format!("cannot start thread pool: {err}")))?;
            pool.install(|| fill(&mut cells));
        }
        None => fill(&mut cells),
    }

    SimilarityMatrix::from_cells(n, cells).map_err(Error::BuildFailure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Corpus;
    use crate::engine::vectorizer::fit;
    use std::collections::BTreeMap;

    fn space(descriptions: &[&str]) -> VectorSpace {
        let mut corpus = Corpus::new("title", "description", vec![]);
        for (idx, description) in descriptions.iter().enumerate() {
            corpus.push(format!("T{idx}"), *description, BTreeMap::new());
        }
        fit(&corpus).unwrap()
    }

    #[test]
    fn test_cosine_of_identical_vectors() {
        let v = TermVector {
            entries: vec![(0, 3.0), (2, 4.0)],
        };
        assert!((cosine(&v, &v, 5.0, 5.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_of_disjoint_vectors() {
        let a = TermVector {
            entries: vec![(0, 1.0)],
        };
        let b = TermVector {
            entries: vec![(1, 1.0)],
        };
        assert_eq!(cosine(&a, &b, 1.0, 1.0), 0.0);
    }

    #[test]
    fn test_cosine_zero_magnitude() {
        let a = TermVector::default();
        let b = TermVector {
            entries: vec![(1, 1.0)],
        };
        assert_eq!(cosine(&a, &b, 0.0, 1.0), 0.0);
        assert_eq!(cosine(&a, &a, 0.0, 0.0), 0.0);
    }

    #[test]
    fn test_matrix_is_symmetric() {
        let space = space(&[
            "space opera robots",
            "space opera aliens",
            "cooking show",
            "robots cooking in space",
            "",
        ]);
        let matrix = compute_similarity(&space, None).unwrap();

        for i in 0..matrix.dimension() {
            for j in 0..matrix.dimension() {
                assert_eq!(matrix.get(i, j), matrix.get(j, i));
            }
        }
    }

    #[test]
    fn test_diagonal() {
        let space = space(&["space opera", "cooking", ""]);
        let matrix = compute_similarity(&space, None).unwrap();

        assert!((matrix.get(0, 0).unwrap() - 1.0).abs() < 1e-6);
        assert!((matrix.get(1, 1).unwrap() - 1.0).abs() < 1e-6);
        assert_eq!(matrix.get(2, 2), Some(0.0));
    }

    #[test]
    fn test_thread_count_does_not_change_result() {
        let docs: Vec<String> = (0..40)
            .map(|i| format!("term{} shared common{} word{}", i % 7, i % 3, i % 11))
            .collect();
        let refs: Vec<&str> = docs.iter().map(String::as_str).collect();
        let space = space(&refs);

        let single = compute_similarity(&space, Some(1)).unwrap();
        let many = compute_similarity(&space, Some(4)).unwrap();
        let auto = compute_similarity(&space, None).unwrap();

        assert_eq!(single, many);
        assert_eq!(single, auto);
    }

    #[test]
    fn test_scores_in_range() {
        let space = space(&["alpha beta", "beta gamma", "gamma delta alpha"]);
        let matrix = compute_similarity(&space, None).unwrap();
        assert!(matrix.cells().iter().all(|s| (-1.0..=1.0).contains(s)));
    }

    #[test]
    fn test_from_cells_rejects_non_square() {
        assert!(SimilarityMatrix::from_cells(2, vec![0.0; 3]).is_err());
        assert!(SimilarityMatrix::from_cells(2, vec![0.0; 4]).is_ok());
    }

    #[test]
    fn test_from_cells_rejects_bad_scores() {
        for bad in [f32::NAN, f32::INFINITY, 7.5, -3.0] {
            let err = SimilarityMatrix::from_cells(2, vec![1.0, bad, bad, 1.0]).unwrap_err();
            assert!(err.contains("not a cosine score"), "{err}");
        }
        assert!(SimilarityMatrix::from_cells(2, vec![1.0, -1.0, -1.0, 1.0]).is_ok());
    }

    #[test]
    fn test_from_cells_rejects_asymmetric() {
        let err = SimilarityMatrix::from_cells(2, vec![1.0, 0.5, 0.25, 1.0]).unwrap_err();
        assert!(err.contains("not symmetric at (0, 1)"), "{err}");
    }

    #[test]
    fn test_row_out_of_range() {
        let matrix = SimilarityMatrix::from_cells(1, vec![1.0]).unwrap();
        assert!(matrix.row(1).is_none());
        assert_eq!(matrix.row(0), Some(&[1.0f32][..]));
    }
}
