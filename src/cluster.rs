use crate::matrix::SimilarityMatrix;
use serde::Serialize;

/// Similarity at or above which two responses land in the same cluster.
pub const DEFAULT_THRESHOLD: f64 = 0.7;

/// A group of mutually similar responses. `centroid` is the text of the
/// first response added, `members` are indices into the analyzed list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseCluster {
    pub members: Vec<usize>,
    pub centroid: String,
    pub size: usize,
}

/// Greedy single-link pass: the first unvisited index opens a cluster and
/// pulls in every later unvisited index within `threshold` of it. The
/// resulting partition depends on scan order when several responses sit
/// near the threshold boundary; that is the intended policy, kept for
/// compatibility with existing reports. Clusters come back sorted by size
/// descending, ties in scan order.
pub fn cluster_responses(
    responses: &[String],
    matrix: &SimilarityMatrix,
    threshold: f64,
) -> Vec<ResponseCluster> {
    let n = responses.len();
    let mut visited = vec![false; n];
    let mut clusters = Vec::new();

    for i in 0..n {
        if visited[i] {
            continue;
        }
        visited[i] = true;
        let mut members = vec![i];
        for j in (i + 1)..n {
            if !visited[j] && matrix.score(i, j) >= threshold {
                members.push(j);
                visited[j] = true;
            }
        }
        clusters.push(ResponseCluster {
            size: members.len(),
            centroid: responses[i].clone(),
            members,
        });
    }

    // Stable sort keeps scan order among equal sizes.
    clusters.sort_by(|a, b| b.size.cmp(&a.size));
    clusters
}

/// The largest cluster's representative text and member count.
/// `None` when there are no clusters (empty input).
pub fn most_common_pattern(clusters: &[ResponseCluster]) -> Option<(String, usize)> {
    clusters
        .first()
        .map(|c| (c.centroid.clone(), c.size))
}
