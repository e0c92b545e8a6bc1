use crate::matrix::SimilarityMatrix;

/// Index of the response with the lowest mean similarity to all others,
/// plus its abnormality score (1 minus that mean). With fewer than two
/// responses there is no meaningful outlier and this returns `None`.
/// Ties keep the first index encountered; callers must not read any
/// significance into which of several equally-distant responses wins.
pub fn most_abnormal(matrix: &SimilarityMatrix) -> Option<(usize, f64)> {
    let n = matrix.len();
    if n <= 1 {
        return None;
    }

    let mut min_mean = f64::INFINITY;
    let mut abnormal = 0usize;
    for i in 0..n {
        let mean = matrix.mean_to_others(i);
        if mean < min_mean {
            min_mean = mean;
            abnormal = i;
        }
    }

    Some((abnormal, 1.0 - min_mean))
}
