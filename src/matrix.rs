use crate::similarity::overall_similarity;
use itertools::Itertools;
use rayon::prelude::*;
use serde::Serialize;

/// Square, symmetric all-pairs similarity matrix with a unit diagonal.
/// Built once per analysis and never mutated afterwards.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct SimilarityMatrix {
    scores: Vec<Vec<f64>>,
}

impl SimilarityMatrix {
    /// Evaluates `overall_similarity` once per unordered pair and mirrors.
    /// O(n^2 * L^2) overall; fine for tens to low hundreds of responses,
    /// not for large corpora.
    pub fn build(responses: &[String]) -> Self {
        let n = responses.len();
        let mut scores = vec![vec![0.0; n]; n];
        for (i, row) in scores.iter_mut().enumerate() {
            row[i] = 1.0;
        }

        let pairs: Vec<(usize, usize)> = (0..n).tuple_combinations().collect();
        let computed: Vec<f64> = pairs
            .par_iter()
            .map(|&(i, j)| overall_similarity(&responses[i], &responses[j]))
            .collect();
        for (&(i, j), s) in pairs.iter().zip(computed) {
            scores[i][j] = s;
            scores[j][i] = s;
        }

        SimilarityMatrix { scores }
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn score(&self, i: usize, j: usize) -> f64 {
        self.scores[i][j]
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.scores
    }

    /// Mean similarity over all unordered pairs. A matrix with zero or one
    /// response has no pairs and counts as perfectly consistent.
    pub fn average(&self) -> f64 {
        let n = self.len();
        if n <= 1 {
            return 1.0;
        }
        let mut total = 0.0;
        let mut count = 0usize;
        for i in 0..n {
            for j in (i + 1)..n {
                total += self.scores[i][j];
                count += 1;
            }
        }
        total / count as f64
    }

    /// Mean similarity of response `i` to every other response.
    /// Returns 1.0 when there are no others.
    pub fn mean_to_others(&self, i: usize) -> f64 {
        let n = self.len();
        if n <= 1 {
            return 1.0;
        }
        let total: f64 = (0..n).filter(|&j| j != i).map(|j| self.scores[i][j]).sum();
        total / (n - 1) as f64
    }
}
