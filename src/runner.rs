use chrono::{DateTime, Utc};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to spawn agent command: {0}")]
    Spawn(#[source] io::Error),
    #[error("agent command exited with failure status")]
    Failed,
}

/// How loops are dispatched across the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    /// One loop at a time, with a short pause between iterations.
    Sequential,
    /// Fixed-size batches of concurrent loops.
    Batched { batch: usize },
    /// A pool of workers draining a shared queue of loop numbers.
    Queue { workers: usize },
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Agent name substituted into the prompt.
    pub agent: String,
    pub loops: usize,
    /// Executable to invoke; the production harness is the `claude` CLI.
    pub command: String,
    /// Custom prompt; `{agent}` expands to the agent name. `None` uses the
    /// stock hello-round-trip prompt.
    pub prompt: Option<String>,
    pub mode: ExecMode,
}

impl RunConfig {
    pub fn new(agent: impl Into<String>, loops: usize) -> Self {
        RunConfig {
            agent: agent.into(),
            loops,
            command: "claude".to_string(),
            prompt: None,
            mode: ExecMode::Sequential,
        }
    }

    pub fn prompt_for(&self) -> String {
        match &self.prompt {
            Some(template) => template.replace("{agent}", &self.agent),
            None => format!(
                "use the {} agent and ask it to say 'hello', return what you told \
                 the agent, and just its response to you asking it to say 'hello'",
                self.agent
            ),
        }
    }
}

#[derive(Debug)]
pub struct RunOutcome {
    pub duration: Duration,
    pub failures: usize,
}

/// Append-only destination for finished log blocks. Appends from concurrent
/// workers are serialized through the sink's own exclusive section, so a
/// block is never interleaved with another.
pub trait LogSink: Send + Sync {
    fn append(&self, block: &str) -> io::Result<()>;
}

/// Opens, appends and closes the file under a scoped lock acquisition.
pub struct FileSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileSink {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl LogSink for FileSink {
    fn append(&self, block: &str) -> io::Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;
        file.write_all(block.as_bytes())
    }
}

/// In-memory sink for exercising the writer without a filesystem.
#[derive(Default)]
pub struct MemorySink {
    buf: Mutex<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        self.buf.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl LogSink for MemorySink {
    fn append(&self, block: &str) -> io::Result<()> {
        self.buf
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_str(block);
        Ok(())
    }
}

/// Runs all configured loops, appending one block per loop through the
/// sink. A loop that fails is counted and logged, not fatal; `stop` ends
/// dispatch before the next loop would start.
pub fn run_loops(config: &RunConfig, sink: &dyn LogSink, stop: &AtomicBool) -> RunOutcome {
    let started = Instant::now();
    let failures = AtomicUsize::new(0);

    match config.mode {
        ExecMode::Sequential => {
            for loop_num in 1..=config.loops {
                if stop.load(Ordering::SeqCst) {
                    break;
                }
                run_one_counted(loop_num, config, sink, &failures);
                if loop_num < config.loops {
                    std::thread::sleep(Duration::from_secs(1));
                }
            }
        }
        ExecMode::Batched { batch } => {
            let batch = batch.max(1);
            let mut next = 1usize;
            while next <= config.loops && !stop.load(Ordering::SeqCst) {
                let end = (next + batch - 1).min(config.loops);
                std::thread::scope(|scope| {
                    for loop_num in next..=end {
                        let failures = &failures;
                        scope.spawn(move || run_one_counted(loop_num, config, sink, failures));
                    }
                });
                next = end + 1;
            }
        }
        ExecMode::Queue { workers } => {
            let workers = workers.max(1);
            let dispenser = AtomicUsize::new(1);
            std::thread::scope(|scope| {
                for _ in 0..workers {
                    let dispenser = &dispenser;
                    let failures = &failures;
                    scope.spawn(move || loop {
                        if stop.load(Ordering::SeqCst) {
                            break;
                        }
                        let loop_num = dispenser.fetch_add(1, Ordering::SeqCst);
                        if loop_num > config.loops {
                            break;
                        }
                        run_one_counted(loop_num, config, sink, failures);
                    });
                }
            });
        }
    }

    RunOutcome {
        duration: started.elapsed(),
        failures: failures.load(Ordering::SeqCst),
    }
}

fn run_one_counted(loop_num: usize, config: &RunConfig, sink: &dyn LogSink, failures: &AtomicUsize) {
    if let Err(e) = execute_loop(loop_num, config, sink) {
        eprintln!("loop {loop_num}: {e}");
        failures.fetch_add(1, Ordering::SeqCst);
    }
}

/// One agent invocation: spawn the command with piped output and no stdin
/// (an attached stdin would hang on interactive prompts), time it, and log
/// the block whether or not the command succeeded.
pub fn execute_loop(loop_num: usize, config: &RunConfig, sink: &dyn LogSink) -> Result<(), RunError> {
    let prompt = config.prompt_for();
    let started = Instant::now();

    let output = Command::new(&config.command)
        .args(["-p", "--permission-mode", "acceptEdits"])
        .arg(&prompt)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(RunError::Spawn)?;

    let elapsed = started.elapsed();
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    let block = format_block(
        loop_num,
        config.loops,
        Utc::now(),
        &prompt,
        &stdout,
        &stderr,
        elapsed,
    );
    if let Err(e) = sink.append(&block) {
        eprintln!("loop {loop_num}: failed to append log block: {e}");
    }

    if output.status.success() {
        Ok(())
    } else {
        Err(RunError::Failed)
    }
}

/// Renders one log block in exactly the format the parser consumes.
pub fn format_block(
    loop_num: usize,
    total: usize,
    finished_at: DateTime<Utc>,
    prompt: &str,
    stdout: &str,
    stderr: &str,
    elapsed: Duration,
) -> String {
    let mut block = format!(
        "=== Loop {}/{} - {} ===\n",
        loop_num,
        total,
        finished_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    block.push_str(&format!("Prompt: {prompt}\n"));
    block.push_str(&format!("Response:\n{}\n", stdout.trim()));
    if !stderr.trim().is_empty() {
        block.push_str(&format!("Errors:\n{}\n", stderr.trim()));
    }
    block.push_str(&format!("Execution time: {}\n", format_duration(elapsed)));
    block.push_str("---\n\n");
    block
}

/// Formats a duration the way the log records it: `1h2m3.456s`, `450ms`.
/// `crate::parser::parse_duration` accepts everything this produces.
pub fn format_duration(d: Duration) -> String {
    let total = d.as_secs_f64();
    if total < 1.0 {
        return format!("{}ms", (total * 1000.0).round() as u64);
    }
    let hours = (total / 3600.0) as u64;
    let minutes = ((total % 3600.0) / 60.0) as u64;
    let seconds = total % 60.0;
    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if minutes > 0 || hours > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    let secs = format!("{seconds:.3}");
    let secs = secs.trim_end_matches('0').trim_end_matches('.');
    out.push_str(&format!("{secs}s"));
    out
}
