use crate::anomaly::most_abnormal;
use crate::cluster::{self, cluster_responses, most_common_pattern, ResponseCluster};
use crate::matrix::SimilarityMatrix;
use crate::parser::{parse_log_file, LoopRecord, ParseError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::Path;

/// Qualitative reliability verdict derived from average similarity,
/// abnormality score and consistency (most-common-count / total).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Reliability {
    Excellent,
    Good,
    Moderate,
    Poor,
    VeryPoor,
}

impl Reliability {
    /// Fixed decision table; thresholds are compatibility constants.
    pub fn assess(avg_similarity: f64, abnormality: f64, consistency: f64) -> Self {
        if avg_similarity >= 0.9 && abnormality <= 0.2 && consistency >= 0.8 {
            Reliability::Excellent
        } else if avg_similarity >= 0.7 && abnormality <= 0.4 && consistency >= 0.6 {
            Reliability::Good
        } else if avg_similarity >= 0.5 && abnormality <= 0.6 && consistency >= 0.4 {
            Reliability::Moderate
        } else if avg_similarity >= 0.3 && abnormality <= 0.8 {
            Reliability::Poor
        } else {
            Reliability::VeryPoor
        }
    }

    pub fn summary(&self) -> &'static str {
        match self {
            Reliability::Excellent => "EXCELLENT - Highly consistent responses",
            Reliability::Good => "GOOD - Generally consistent with minor variations",
            Reliability::Moderate => "MODERATE - Some inconsistency present",
            Reliability::Poor => "POOR - Significant inconsistencies detected",
            Reliability::VeryPoor => "VERY POOR - Highly unreliable responses",
        }
    }
}

impl fmt::Display for Reliability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.summary())
    }
}

/// The single most-abnormal response of a channel.
#[derive(Debug, Clone, Serialize)]
pub struct Outlier {
    pub loop_index: usize,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Per-channel aggregate. All fields are zero-valued/empty for a channel
/// with no responses; check `total_responses` before reading further.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub total_responses: usize,
    pub average_similarity: f64,
    pub most_common_pattern: String,
    pub most_common_count: usize,
    pub most_abnormal: Option<Outlier>,
    pub abnormality_score: f64,
    pub clusters: Vec<ResponseCluster>,
    pub matrix: SimilarityMatrix,
    pub verdict: Option<Reliability>,
}

impl AnalysisResult {
    fn empty() -> Self {
        AnalysisResult {
            total_responses: 0,
            average_similarity: 0.0,
            most_common_pattern: String::new(),
            most_common_count: 0,
            most_abnormal: None,
            abnormality_score: 0.0,
            clusters: Vec::new(),
            matrix: SimilarityMatrix::build(&[]),
            verdict: None,
        }
    }
}

/// Union of the two per-channel analyses. Immutable once produced;
/// its lifetime is the single analysis invocation.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub total_records: usize,
    pub instruction: AnalysisResult,
    pub reply: AnalysisResult,
}

/// Runs the full analysis over parsed records at the default clustering
/// threshold.
pub fn analyze_records(records: &[LoopRecord]) -> Report {
    analyze_records_with(records, cluster::DEFAULT_THRESHOLD)
}

/// The two channels are independent; running them on both sides of a
/// `rayon::join` is an optimization, not a correctness requirement.
pub fn analyze_records_with(records: &[LoopRecord], threshold: f64) -> Report {
    let instruction_responses: Vec<(usize, String)> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| !r.instruction.is_empty())
        .map(|(i, r)| (i, r.instruction.clone()))
        .collect();
    let reply_responses: Vec<(usize, String)> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| !r.reply.is_empty())
        .map(|(i, r)| (i, r.reply.clone()))
        .collect();

    let (instruction, reply) = rayon::join(
        || analyze_channel(&instruction_responses, records, threshold),
        || analyze_channel(&reply_responses, records, threshold),
    );

    Report {
        total_records: records.len(),
        instruction,
        reply,
    }
}

/// Convenience entry point: read, parse, analyze.
pub fn analyze_log_file(path: impl AsRef<Path>) -> Result<Report, ParseError> {
    let records = parse_log_file(path)?;
    Ok(analyze_records(&records))
}

fn analyze_channel(
    responses: &[(usize, String)],
    records: &[LoopRecord],
    threshold: f64,
) -> AnalysisResult {
    if responses.is_empty() {
        return AnalysisResult::empty();
    }

    let texts: Vec<String> = responses.iter().map(|(_, t)| t.clone()).collect();
    let matrix = SimilarityMatrix::build(&texts);
    let average_similarity = matrix.average();

    let clusters = cluster_responses(&texts, &matrix, threshold);
    let (most_common_pattern, most_common_count) =
        most_common_pattern(&clusters).unwrap_or_default();

    let (most_abnormal, abnormality_score) = match most_abnormal(&matrix) {
        Some((idx, score)) => {
            let record_idx = responses[idx].0;
            let record = &records[record_idx];
            let outlier = Outlier {
                loop_index: record.loop_index,
                text: texts[idx].clone(),
                timestamp: record.timestamp,
            };
            (Some(outlier), score)
        }
        None => (None, 0.0),
    };

    let consistency = most_common_count as f64 / texts.len() as f64;
    let verdict = Some(Reliability::assess(
        average_similarity,
        abnormality_score,
        consistency,
    ));

    AnalysisResult {
        total_responses: texts.len(),
        average_similarity,
        most_common_pattern,
        most_common_count,
        most_abnormal,
        abnormality_score,
        clusters,
        matrix,
        verdict,
    }
}
