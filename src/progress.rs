//! Indexing progress reporting.
//!
//! Reports progress during `energichain index` (and the automatic indexing
//! that runs before `serve`) so operators can see how much of the corpus is
//! embedded. Progress is emitted on **stderr** so stdout remains parseable.

use std::io::Write;

/// A single progress event for indexing.
#[derive(Clone, Debug)]
pub enum IndexProgressEvent {
    /// Documents needing embeddings have been counted.
    Planned { pending: u64, total: u64 },
    /// `n` of `total` pending documents processed (embedded or failed).
    Embedding { n: u64, total: u64 },
    /// A batch failed and is being retried one document at a time.
    BatchFallback { size: u64 },
}

/// Reports indexing progress. Implementations write to stderr (human or JSON).
pub trait IndexProgressReporter: Send + Sync {
    fn report(&self, event: IndexProgressEvent);
}

/// Human-friendly progress on stderr: "index  embedding  12 / 25 documents".
pub struct StderrProgress;

impl IndexProgressReporter for StderrProgress {
    fn report(&self, event: IndexProgressEvent) {
        let line = match &event {
            IndexProgressEvent::Planned { pending, total } => {
                format!(
                    "index  planned  {} of {} documents need embeddings\n",
                    format_number(*pending),
                    format_number(*total)
                )
            }
            IndexProgressEvent::Embedding { n, total } => {
                format!(
                    "index  embedding  {} / {} documents\n",
                    format_number(*n),
                    format_number(*total)
                )
            }
            IndexProgressEvent::BatchFallback { size } => {
                format!(
                    "index  batch of {} failed, retrying per document\n",
                    format_number(*size)
                )
            }
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl IndexProgressReporter for JsonProgress {
    fn report(&self, event: IndexProgressEvent) {
        let obj = match &event {
            IndexProgressEvent::Planned { pending, total } => serde_json::json!({
                "event": "progress",
                "phase": "planned",
                "pending": pending,
                "total": total
            }),
            IndexProgressEvent::Embedding { n, total } => serde_json::json!({
                "event": "progress",
                "phase": "embedding",
                "n": n,
                "total": total
            }),
            IndexProgressEvent::BatchFallback { size } => serde_json::json!({
                "event": "batch_fallback",
                "size": size
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl IndexProgressReporter for NoProgress {
    fn report(&self, _event: IndexProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Parse a `--progress` value; `None` means "pick by TTY".
    pub fn from_flag(flag: Option<&str>) -> anyhow::Result<Self> {
        match flag {
            None => Ok(Self::default_for_tty()),
            Some("off") => Ok(ProgressMode::Off),
            Some("human") => Ok(ProgressMode::Human),
            Some("json") => Ok(ProgressMode::Json),
            Some(other) => anyhow::bail!(
                "Unknown progress mode: {}. Use off, human, or json.",
                other
            ),
        }
    }

    pub fn reporter(&self) -> Box<dyn IndexProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
