use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use reliscope::analyzer::{self, AnalysisResult, Report};
use reliscope::cluster;
use reliscope::parser::parse_log_file;
use reliscope::runner::{self, ExecMode, FileSink, RunConfig};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "reliscope", version, about = "Agent response reliability analysis")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Run an agent repeatedly and record one log block per loop
    Run {
        /// Agent name substituted into the prompt
        agent: String,
        /// Number of times to run the test
        #[arg(short, long, default_value_t = 1)]
        loops: usize,
        /// Base name for the output file (<name>_<unix_timestamp>.log)
        #[arg(short, long, default_value = "chat")]
        filename: String,
        /// Run loops in parallel batches
        #[arg(short, long, conflicts_with = "queue")]
        parallel: bool,
        /// Batch size for --parallel
        #[arg(long, default_value_t = 5)]
        batch: usize,
        /// Worker count for queue mode (0 = off)
        #[arg(short, long, default_value_t = 0, conflicts_with = "parallel")]
        queue: usize,
        /// Agent executable to invoke
        #[arg(long, default_value = "claude")]
        command: String,
        /// Custom prompt; `{agent}` expands to the agent name
        #[arg(long)]
        prompt: Option<String>,
    },
    /// Analyze a recorded log and report response reliability
    Analyze {
        log_file: PathBuf,
        /// Include the similarity matrix and detailed clusters
        #[arg(short, long)]
        verbose: bool,
        /// Save the text report to a file
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Show the extracted per-loop responses
        #[arg(short, long)]
        debug: bool,
        /// Emit the full report as JSON instead of text
        #[arg(long)]
        json: bool,
        /// Clustering similarity threshold
        #[arg(long, default_value_t = cluster::DEFAULT_THRESHOLD)]
        threshold: f64,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Run {
            agent,
            loops,
            filename,
            parallel,
            batch,
            queue,
            command,
            prompt,
        } => run_session(agent, loops, filename, parallel, batch, queue, command, prompt),
        Cmd::Analyze {
            log_file,
            verbose,
            output,
            debug,
            json,
            threshold,
        } => run_analysis(log_file, verbose, output, debug, json, threshold),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_session(
    agent: String,
    loops: usize,
    filename: String,
    parallel: bool,
    batch: usize,
    queue: usize,
    command: String,
    prompt: Option<String>,
) -> anyhow::Result<()> {
    let mode = if queue > 0 {
        ExecMode::Queue {
            workers: queue.min(num_cpus::get()),
        }
    } else if parallel {
        ExecMode::Batched { batch }
    } else {
        ExecMode::Sequential
    };

    let config = RunConfig {
        agent,
        loops,
        command,
        prompt,
        mode,
    };

    let output_file = format!("{}_{}.log", filename, Utc::now().timestamp());
    let sink = FileSink::new(&output_file);

    let mode_desc = match mode {
        ExecMode::Queue { workers } => format!("queue (workers: {workers})"),
        ExecMode::Batched { batch } => format!("parallel (batch: {batch})"),
        ExecMode::Sequential => "sequential".to_string(),
    };
    println!(
        "Running {} loop(s) with agent: {} ({} mode)",
        config.loops, config.agent, mode_desc
    );
    println!("Output file: {output_file}");

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        let _ = ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst));
    }

    let outcome = runner::run_loops(&config, &sink, &stop);
    if stop.load(Ordering::SeqCst) {
        eprintln!("Interrupted; partial results in {output_file}");
    }
    if outcome.failures > 0 {
        eprintln!("{} loop(s) failed; see {output_file}", outcome.failures);
    }
    println!("Test completed. Results saved to: {output_file}");
    println!("Total duration: {}", runner::format_duration(outcome.duration));
    Ok(())
}

fn run_analysis(
    log_file: PathBuf,
    verbose: bool,
    output: Option<PathBuf>,
    debug: bool,
    json: bool,
    threshold: f64,
) -> anyhow::Result<()> {
    let records = parse_log_file(&log_file)
        .with_context(|| format!("cannot analyze {}", log_file.display()))?;

    if atty::is(atty::Stream::Stdout) && !json {
        println!("Analyzing log file: {}", log_file.display());
        println!("Processing...");
    }

    let report = analyzer::analyze_records_with(&records, threshold);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if report.total_records == 0 {
        println!("No log entries found in log file");
        return Ok(());
    }

    if debug {
        print_debug_extraction(&records);
    }

    print_report(&report);
    if verbose {
        print_verbose(&report);
    }

    if let Some(path) = output {
        if let Err(e) = save_report(&report, &path) {
            eprintln!("Warning: failed to save results to file: {e}");
        } else {
            println!("\nDetailed results saved to: {}", path.display());
        }
    }
    Ok(())
}

fn print_debug_extraction(records: &[reliscope::parser::LoopRecord]) {
    println!("\n=== DEBUG: EXTRACTED RESPONSES ===");
    for record in records {
        println!("Loop {}:", record.loop_index);
        if record.instruction.is_empty() {
            println!("  Instruction: [none]");
        } else {
            println!("  Instruction: \"{}\"", truncate(&record.instruction, 100));
        }
        if record.reply.is_empty() {
            println!("  Reply:       [none]");
        } else {
            println!("  Reply:       \"{}\"", truncate(&record.reply, 100));
        }
        if !record.errors.is_empty() {
            println!("  Errors:      \"{}\"", truncate(&record.errors, 100));
        }
        println!();
    }
}

fn print_report(report: &Report) {
    println!("=== AGENT RELIABILITY ANALYSIS ===");
    println!("Total Log Entries: {}", report.total_records);
    println!("Instruction Responses: {}", report.instruction.total_responses);
    println!("Reply Responses: {}", report.reply.total_responses);

    print_channel(&report.instruction, "INSTRUCTION CHANNEL (\"What I told the agent\")");
    print_channel(&report.reply, "REPLY CHANNEL (\"Agent's response\")");
}

fn print_channel(result: &AnalysisResult, title: &str) {
    println!("\n{}", "=".repeat(60));
    println!("{title}");
    println!("{}", "=".repeat(60));

    if result.total_responses == 0 {
        println!("No responses found");
        return;
    }

    println!("Total Responses: {}", result.total_responses);
    println!(
        "Average Similarity: {:.3} ({:.1}%)",
        result.average_similarity,
        result.average_similarity * 100.0
    );

    println!("\n--- CLUSTERING ANALYSIS ---");
    println!("Found {} distinct response clusters", result.clusters.len());
    for (i, cluster) in result.clusters.iter().take(3).enumerate() {
        let percentage = cluster.size as f64 / result.total_responses as f64 * 100.0;
        println!(
            "Cluster {}: {} responses ({:.1}%) - \"{}\"",
            i + 1,
            cluster.size,
            percentage,
            truncate(&cluster.centroid, 50)
        );
    }

    println!("\n--- MOST COMMON PATTERN ---");
    if result.most_common_pattern.is_empty() {
        println!("No dominant pattern found");
    } else {
        let percentage = result.most_common_count as f64 / result.total_responses as f64 * 100.0;
        println!("Pattern: \"{}\"", result.most_common_pattern);
        println!(
            "Frequency: {}/{} ({:.1}%)",
            result.most_common_count, result.total_responses, percentage
        );
    }

    println!("\n--- MOST ABNORMAL RESPONSE ---");
    match &result.most_abnormal {
        Some(outlier) if result.abnormality_score > 0.0 => {
            println!(
                "Abnormality Score: {:.3} ({:.1}%)",
                result.abnormality_score,
                result.abnormality_score * 100.0
            );
            println!("Loop: {}", outlier.loop_index);
            println!("Response: \"{}\"", truncate(&outlier.text, 200));
            println!("Timestamp: {}", outlier.timestamp.format("%Y-%m-%d %H:%M:%S UTC"));
        }
        _ => println!("No significantly abnormal responses found"),
    }

    println!("\n--- RELIABILITY ASSESSMENT ---");
    match result.verdict {
        Some(v) => println!("Reliability: {v}"),
        None => println!("Reliability: not assessed"),
    }
}

fn print_verbose(report: &Report) {
    print_verbose_channel(&report.instruction, "INSTRUCTION");
    print_verbose_channel(&report.reply, "REPLY");
}

fn print_verbose_channel(result: &AnalysisResult, name: &str) {
    if result.total_responses == 0 {
        return;
    }

    println!("\n--- {name} SIMILARITY MATRIX ---");
    let n = result.matrix.len();
    let shown = if n > 10 {
        println!("Matrix too large ({n}x{n}), showing first 10x10 subset:");
        10
    } else {
        n
    };

    print!("     ");
    for j in 0..shown {
        print!("{:6}", j + 1);
    }
    println!();
    for i in 0..shown {
        print!("{:3}: ", i + 1);
        for j in 0..shown {
            print!("{:6.3}", result.matrix.score(i, j));
        }
        println!();
    }

    println!("\n--- {name} DETAILED CLUSTERS ---");
    for (i, cluster) in result.clusters.iter().take(5).enumerate() {
        println!("Cluster {} ({} responses):", i + 1, cluster.size);
        println!("  Representative: \"{}\"", truncate(&cluster.centroid, 100));
        println!("  Response indices: {:?}", cluster.members);
    }
    if result.clusters.len() > 5 {
        println!("... and {} more clusters", result.clusters.len() - 5);
    }
}

fn save_report(report: &Report, path: &std::path::Path) -> anyhow::Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }
    let mut file = std::fs::File::create(path)?;

    writeln!(file, "Agent Reliability Analysis Report")?;
    writeln!(file, "=================================\n")?;
    writeln!(file, "Total Log Entries: {}", report.total_records)?;
    writeln!(file, "Instruction Responses: {}", report.instruction.total_responses)?;
    writeln!(file, "Reply Responses: {}\n", report.reply.total_responses)?;

    save_channel(&mut file, &report.instruction, "INSTRUCTION CHANNEL")?;
    save_channel(&mut file, &report.reply, "REPLY CHANNEL")?;
    Ok(())
}

fn save_channel(
    file: &mut std::fs::File,
    result: &AnalysisResult,
    title: &str,
) -> anyhow::Result<()> {
    writeln!(file, "=== {title} ===")?;
    if result.total_responses == 0 {
        writeln!(file, "No responses found\n")?;
        return Ok(());
    }

    writeln!(file, "Total Responses: {}", result.total_responses)?;
    writeln!(file, "Average Similarity: {:.4}", result.average_similarity)?;
    writeln!(file, "Most Common Pattern Count: {}", result.most_common_count)?;
    writeln!(file, "Abnormality Score: {:.4}\n", result.abnormality_score)?;
    writeln!(file, "Most Common Pattern:\n{}\n", result.most_common_pattern)?;

    if let Some(outlier) = &result.most_abnormal {
        writeln!(
            file,
            "Most Abnormal Response (Loop {}):\n{}\n",
            outlier.loop_index, outlier.text
        )?;
    }

    writeln!(file, "Similarity Matrix:")?;
    for (i, row) in result.matrix.rows().iter().enumerate() {
        write!(file, "Row {}: ", i + 1)?;
        for val in row {
            write!(file, "{val:.4} ")?;
        }
        writeln!(file)?;
    }

    writeln!(file, "\nClusters:")?;
    for (i, cluster) in result.clusters.iter().enumerate() {
        writeln!(
            file,
            "Cluster {}: {} responses - {:?}",
            i + 1,
            cluster.size,
            cluster.members
        )?;
        writeln!(file, "  Centroid: {}", cluster.centroid)?;
    }
    writeln!(file)?;
    Ok(())
}

/// Char-safe truncation with an ellipsis.
fn truncate(s: &str, max_len: usize) -> String {
    let s = s.trim();
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{cut}...")
}
