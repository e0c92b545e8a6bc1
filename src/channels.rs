use once_cell::sync::Lazy;
use regex::Regex;

/// The two logical sub-responses inside one raw response block: the
/// instruction echo ("what was asked of the agent") and the agent reply
/// ("what came back"). Either may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitResponse {
    pub instruction: String,
    pub reply: String,
}

/// Strategy for splitting a raw response body into its two channels.
/// The parser only depends on this seam; alternate heuristics can be
/// swapped in without touching the record-boundary state machine.
pub trait ChannelExtractor {
    fn extract(&self, raw: &str) -> SplitResponse;
}

/// Default extractor keyed on the bolded markers the agent harness emits:
/// `**What I told the agent:**` introduces the instruction echo and
/// `**Agent's response:**` (case-insensitive, arbitrary words between
/// "Agent" and "response") introduces the reply. Quoted text right after a
/// marker wins, same line or next line; otherwise free lines up to the
/// opposite marker are joined with single spaces, each shedding one layer
/// of surrounding quotes.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkerExtractor;

static RE_INSTRUCTION_QUOTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\*\*What I told the agent:\*\*\s*"([^"]+)""#).unwrap());
static RE_REPLY_QUOTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\*\*Agent[^:]*response[^:]*:\*\*\s*"([^"]+)""#).unwrap());
static RE_REPLY_MARKER_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Agent[^:]*response[^:]*:").unwrap());

impl ChannelExtractor for MarkerExtractor {
    fn extract(&self, raw: &str) -> SplitResponse {
        SplitResponse {
            instruction: extract_instruction(raw),
            reply: extract_reply(raw),
        }
    }
}

fn extract_instruction(raw: &str) -> String {
    if let Some(c) = RE_INSTRUCTION_QUOTED.captures(raw) {
        return c[1].trim().to_string();
    }

    // Fallback: collect lines after the marker up to the reply marker.
    let mut found = false;
    let mut collected: Vec<&str> = Vec::new();
    for line in raw.lines() {
        let line = line.trim();
        if line.contains("What I told the agent") {
            found = true;
            if let Some((_, rest)) = line.split_once("What I told the agent:") {
                let rest = strip_decoration(rest);
                if !rest.is_empty() {
                    collected.push(rest);
                }
            }
            continue;
        }
        if found && !line.is_empty() {
            if is_reply_marker_line(line) {
                break;
            }
            collected.push(line.trim_matches('"'));
        }
    }
    collected.join(" ").trim().to_string()
}

fn extract_reply(raw: &str) -> String {
    if let Some(c) = RE_REPLY_QUOTED.captures(raw) {
        return c[1].trim().to_string();
    }

    let mut found = false;
    let mut collected: Vec<&str> = Vec::new();
    for line in raw.lines() {
        let line = line.trim();
        if is_reply_marker_line(line) {
            found = true;
            if let Some(m) = RE_REPLY_MARKER_PREFIX.find(line) {
                let rest = strip_decoration(&line[m.end()..]);
                if !rest.is_empty() {
                    collected.push(rest);
                }
            }
            continue;
        }
        if found && !line.is_empty() {
            if line.contains("What I told the agent") {
                break;
            }
            collected.push(line.trim_matches('"'));
        }
    }
    collected.join(" ").trim().to_string()
}

fn is_reply_marker_line(line: &str) -> bool {
    let lower = line.to_lowercase();
    lower.contains("agent") && lower.contains("response")
}

/// Drops the bold-marker leftovers and one quote layer from the text
/// trailing a marker on the same line.
fn strip_decoration(rest: &str) -> &str {
    rest.trim()
        .trim_matches(|c| c == '*' || c == '"')
        .trim()
}
