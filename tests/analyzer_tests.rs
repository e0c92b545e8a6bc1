use reliscope::analyzer::{analyze_records, analyze_records_with, Reliability};
use reliscope::parser::parse_log;

fn block(loop_num: usize, total: usize, minute: usize, instruction: &str, reply: &str) -> String {
    format!(
        "=== Loop {loop_num}/{total} - 2024-01-01 00:{minute:02}:00 UTC ===\n\
         Prompt: test prompt\n\
         Response:\n\
         **What I told the agent:** \"{instruction}\"\n\
         **Agent's response:** \"{reply}\"\n\
         Execution time: 2s\n\
         ---\n\n"
    )
}

#[test]
fn verdict_decision_table_boundaries() {
    assert_eq!(Reliability::assess(0.95, 0.1, 0.9), Reliability::Excellent);
    assert_eq!(Reliability::assess(0.9, 0.2, 0.8), Reliability::Excellent);
    assert_eq!(Reliability::assess(0.89, 0.2, 0.8), Reliability::Good);
    assert_eq!(Reliability::assess(0.7, 0.4, 0.6), Reliability::Good);
    assert_eq!(Reliability::assess(0.5, 0.6, 0.4), Reliability::Moderate);
    assert_eq!(Reliability::assess(0.3, 0.8, 0.0), Reliability::Poor);
    assert_eq!(Reliability::assess(0.2, 0.9, 0.0), Reliability::VeryPoor);
    assert_eq!(Reliability::assess(0.95, 0.9, 0.9), Reliability::VeryPoor);
}

#[test]
fn verdict_summaries_spell_out_the_level() {
    assert_eq!(
        Reliability::Excellent.to_string(),
        "EXCELLENT - Highly consistent responses"
    );
    assert_eq!(
        Reliability::VeryPoor.to_string(),
        "VERY POOR - Highly unreliable responses"
    );
}

#[test]
fn empty_input_yields_zeroed_report() {
    let report = analyze_records(&[]);
    assert_eq!(report.total_records, 0);
    for channel in [&report.instruction, &report.reply] {
        assert_eq!(channel.total_responses, 0);
        assert_eq!(channel.average_similarity, 0.0);
        assert_eq!(channel.most_common_count, 0);
        assert!(channel.most_common_pattern.is_empty());
        assert!(channel.most_abnormal.is_none());
        assert_eq!(channel.abnormality_score, 0.0);
        assert!(channel.clusters.is_empty());
        assert!(channel.verdict.is_none());
    }
}

#[test]
fn single_record_is_perfectly_consistent() {
    let records = parse_log(&block(1, 1, 0, "Say hello", "Hello!"));
    let report = analyze_records(&records);
    assert_eq!(report.total_records, 1);
    let reply = &report.reply;
    assert_eq!(reply.total_responses, 1);
    assert_eq!(reply.average_similarity, 1.0);
    assert_eq!(reply.most_common_count, 1);
    assert!(reply.most_abnormal.is_none());
    assert_eq!(reply.abnormality_score, 0.0);
    assert_eq!(reply.verdict, Some(Reliability::Excellent));
}

#[test]
fn consistent_runs_with_one_outlier_are_reported_per_channel() {
    let mut log = String::new();
    log.push_str(&block(1, 3, 0, "Say hello", "Hello! How can I help?"));
    log.push_str(&block(2, 3, 1, "Say hello", "Hello! How can I help?"));
    log.push_str(&block(3, 3, 2, "Say hello", "Bananas are yellow fruit"));
    let records = parse_log(&log);
    assert_eq!(records.len(), 3);

    let report = analyze_records(&records);

    // Instruction channel: three identical echoes.
    let instruction = &report.instruction;
    assert_eq!(instruction.total_responses, 3);
    assert_eq!(instruction.average_similarity, 1.0);
    assert_eq!(instruction.most_common_pattern, "Say hello");
    assert_eq!(instruction.most_common_count, 3);
    assert_eq!(instruction.abnormality_score, 0.0);
    assert_eq!(instruction.verdict, Some(Reliability::Excellent));

    // Reply channel: two matching replies, one stray.
    let reply = &report.reply;
    assert_eq!(reply.total_responses, 3);
    assert!(reply.average_similarity < 1.0);
    assert_eq!(reply.most_common_pattern, "Hello! How can I help?");
    assert_eq!(reply.most_common_count, 2);
    let outlier = reply.most_abnormal.as_ref().unwrap();
    assert_eq!(outlier.loop_index, 3);
    assert_eq!(outlier.text, "Bananas are yellow fruit");
    assert!(reply.abnormality_score > 0.0);
}

#[test]
fn records_with_one_empty_channel_only_count_where_present() {
    // No markers at all: the raw body lands on the reply channel.
    let log = "=== Loop 1/1 - 2024-01-01 00:00:00 UTC ===\n\
               Prompt: p\n\
               Response:\n\
               plain unstructured reply\n\
               ---\n";
    let records = parse_log(log);
    let report = analyze_records(&records);
    assert_eq!(report.instruction.total_responses, 0);
    assert!(report.instruction.verdict.is_none());
    assert_eq!(report.reply.total_responses, 1);
}

#[test]
fn threshold_is_configurable() {
    let mut log = String::new();
    log.push_str(&block(1, 2, 0, "alpha one", "alpha one"));
    log.push_str(&block(2, 2, 1, "bravo two", "bravo two"));
    let records = parse_log(&log);

    let strict = analyze_records_with(&records, 1.0);
    assert_eq!(strict.reply.clusters.len(), 2);

    let loose = analyze_records_with(&records, 0.0);
    assert_eq!(loose.reply.clusters.len(), 1);
}

#[test]
fn report_serializes_with_expected_shape() {
    let records = parse_log(&block(1, 1, 0, "Say hello", "Hello!"));
    let report = analyze_records(&records);
    let v = serde_json::to_value(&report).unwrap();

    assert_eq!(v["total_records"], 1);
    assert!(v["instruction"].is_object());
    assert!(v["reply"].is_object());
    assert_eq!(v["reply"]["total_responses"], 1);
    assert!(v["reply"]["clusters"].is_array());
    assert!(v["reply"]["matrix"].is_array());
    assert_eq!(v["reply"]["verdict"], "EXCELLENT");
}
