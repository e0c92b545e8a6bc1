use crate::channels::{ChannelExtractor, MarkerExtractor};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read log file: {0}")]
    Io(#[from] std::io::Error),
}

/// One run's observation, as recorded in the log.
#[derive(Debug, Clone, Default)]
pub struct LoopRecord {
    /// 1-based loop number from the record header. 0 is the unset sentinel;
    /// such records are never emitted.
    pub loop_index: usize,
    pub timestamp: DateTime<Utc>,
    pub prompt: String,
    /// The "What I told the agent" echo. May be empty.
    pub instruction: String,
    /// The "Agent's response" text. May be empty.
    pub reply: String,
    /// Full unsplit response body, kept as a fallback.
    pub raw_response: String,
    /// Diagnostic text from the `Errors:` section, if any.
    pub errors: String,
    /// Wall time of the run; `None` when the value did not parse.
    pub execution_time: Option<Duration>,
}

impl LoopRecord {
    /// The text to show for this record: whichever channel carried it.
    pub fn response_text(&self) -> &str {
        if !self.instruction.is_empty() {
            &self.instruction
        } else if !self.reply.is_empty() {
            &self.reply
        } else {
            &self.raw_response
        }
    }
}

static RE_HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^=== Loop (\d+)/\d+ - (.+) ===").unwrap());
static RE_PROMPT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Prompt: (.+)").unwrap());
static RE_RESPONSE_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Response:").unwrap());
static RE_ERROR_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Errors:").unwrap());
static RE_EXEC_TIME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Execution time: (.+)").unwrap());
static RE_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^---").unwrap());

const HEADER_TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

enum Section {
    Outside,
    Response,
    Errors,
}

/// Parses raw log text into records with the default channel extractor.
/// Records come back in encounter order, not sorted by timestamp.
pub fn parse_log(text: &str) -> Vec<LoopRecord> {
    parse_log_with(text, &MarkerExtractor)
}

pub fn parse_log_with(text: &str, extractor: &dyn ChannelExtractor) -> Vec<LoopRecord> {
    let mut records = Vec::new();
    let mut current = LoopRecord::default();
    let mut section = Section::Outside;
    let mut response_buf = String::new();
    let mut error_buf = String::new();

    for line in text.lines() {
        if let Some(caps) = RE_HEADER.captures(line) {
            finalize(&mut current, &mut response_buf, &mut error_buf, extractor, &mut records);

            let loop_index = caps[1].parse().unwrap_or(0);
            let timestamp = parse_header_timestamp(&caps[2]);
            current = LoopRecord {
                loop_index,
                timestamp,
                ..LoopRecord::default()
            };
            section = Section::Outside;
        } else if let Some(caps) = RE_PROMPT.captures(line) {
            current.prompt = caps[1].to_string();
        } else if RE_RESPONSE_START.is_match(line) {
            section = Section::Response;
            response_buf.clear();
        } else if RE_ERROR_START.is_match(line) {
            section = Section::Errors;
            error_buf.clear();
        } else if let Some(caps) = RE_EXEC_TIME.captures(line) {
            current.execution_time = parse_duration(&caps[1]);
            section = Section::Outside;
        } else if RE_SEPARATOR.is_match(line) {
            section = Section::Outside;
        } else if !line.trim().is_empty() {
            match section {
                Section::Response => {
                    if !response_buf.is_empty() {
                        response_buf.push('\n');
                    }
                    response_buf.push_str(line);
                }
                Section::Errors => {
                    if !error_buf.is_empty() {
                        error_buf.push('\n');
                    }
                    error_buf.push_str(line);
                }
                Section::Outside => {}
            }
        }
    }

    // The last record has no trailing header to close it.
    finalize(&mut current, &mut response_buf, &mut error_buf, extractor, &mut records);
    records
}

/// Reads the whole file up front, then parses. An unreadable file is the
/// only fatal error; malformed content degrades per record instead.
pub fn parse_log_file(path: impl AsRef<Path>) -> Result<Vec<LoopRecord>, ParseError> {
    let text = std::fs::read_to_string(path)?;
    Ok(parse_log(&text))
}

fn finalize(
    current: &mut LoopRecord,
    response_buf: &mut String,
    error_buf: &mut String,
    extractor: &dyn ChannelExtractor,
    records: &mut Vec<LoopRecord>,
) {
    if current.loop_index == 0 {
        response_buf.clear();
        error_buf.clear();
        return;
    }

    let raw = response_buf.trim().to_string();
    let split = extractor.extract(&raw);
    current.instruction = split.instruction;
    current.reply = split.reply;
    // Never analyze a record with zero text: unstructured bodies count as
    // the primary reply.
    if current.instruction.is_empty() && current.reply.is_empty() {
        current.reply = raw.clone();
    }
    current.raw_response = raw;
    current.errors = std::mem::take(error_buf).trim().to_string();
    response_buf.clear();

    records.push(std::mem::take(current));
}

fn parse_header_timestamp(s: &str) -> DateTime<Utc> {
    match NaiveDateTime::parse_from_str(s.trim(), HEADER_TS_FORMAT) {
        Ok(ndt) => Utc.from_utc_datetime(&ndt),
        // Low-confidence fallback; the record still participates in analysis.
        Err(_) => Utc::now(),
    }
}

static RE_DURATION_PART: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([0-9]+(?:\.[0-9]+)?)(ns|µs|us|ms|s|m|h)").unwrap());

/// Parses duration strings of the form the runner writes (and Go's
/// `time.Duration` formatting produces): `1h2m3.5s`, `450ms`, `1.234µs`.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    let mut secs = 0.0f64;
    let mut matched_len = 0usize;
    for caps in RE_DURATION_PART.captures_iter(s) {
        let value: f64 = caps[1].parse().ok()?;
        let unit = &caps[2];
        secs += match unit {
            "h" => value * 3600.0,
            "m" => value * 60.0,
            "s" => value,
            "ms" => value / 1e3,
            "µs" | "us" => value / 1e6,
            "ns" => value / 1e9,
            _ => return None,
        };
        matched_len += caps[0].len();
    }
    if matched_len == 0 || matched_len != s.len() {
        return None;
    }
    Some(Duration::from_secs_f64(secs))
}
