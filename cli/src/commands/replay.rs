//! Replay command implementation
//!
//! Reads a JSON array of stream events and feeds them to a [`StreamFilter`]
//! bound through a registry, the same way a decoder would:
//!
//! ```json
//! [
//!   {"event": "enter"},
//!   {"event": "bytes", "count": 128},
//!   {"event": "class", "class": "com.acme.Order"},
//!   {"event": "array", "class": "[B", "length": 1024},
//!   {"event": "reference"},
//!   {"event": "metrics"},
//!   {"event": "exit"}
//! ]
//! ```

use crate::commands::load_registry;
use crate::output;
use anyhow::{Context, Result};
use clap::Args;
use serde::{Deserialize, Serialize};
use serialguard_engine::{metrics, StreamError, StreamFilter};
use serialguard_shared::{SerialClass, Status};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// JSON file with the event script
    pub events: PathBuf,

    /// Pattern string for the stream (overrides the settings filter)
    #[arg(short, long)]
    pub pattern: Option<String>,

    /// TOML settings file (filter, filter_factory, set_filter_after_read)
    #[arg(short, long)]
    pub settings: Option<PathBuf>,

    /// Stop at the first rejection
    #[arg(long)]
    pub fail_fast: bool,

    /// Print outcomes as JSON
    #[arg(long)]
    pub json: bool,

    /// Print filter check metrics after the replay
    #[arg(long)]
    pub metrics: bool,
}

/// One step of a recorded stream.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReplayEvent {
    /// A nested object starts
    Enter,
    /// The innermost object completed
    Exit,
    /// An object or back-reference was read
    Reference,
    /// Bytes consumed from the stream
    Bytes { count: u64 },
    /// An object of `class` is about to be created
    Class { class: SerialClass },
    /// An array of `class` with `length` elements is about to be created
    Array { class: SerialClass, length: i64 },
    /// Graph metrics check without a class
    Metrics,
}

/// Result of one check step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub step: usize,
    pub class: Option<SerialClass>,
    pub status: Status,
    pub depth: i64,
    pub references: i64,
    pub bytes: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn read_events(path: &Path) -> Result<Vec<ReplayEvent>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read event script {}", path.display()))?;
    serde_json::from_str(&text).context("Failed to parse event script")
}

/// Apply `events` to `stream`, collecting an outcome for every check.
pub fn replay(stream: &mut StreamFilter, events: &[ReplayEvent], fail_fast: bool) -> Vec<Outcome> {
    let mut outcomes = Vec::new();
    for (step, event) in events.iter().enumerate() {
        let (class, result) = match event {
            ReplayEvent::Enter => {
                stream.enter_object();
                continue;
            }
            ReplayEvent::Exit => {
                stream.exit_object();
                continue;
            }
            ReplayEvent::Reference => {
                stream.record_reference();
                continue;
            }
            ReplayEvent::Bytes { count } => {
                stream.record_bytes(*count);
                continue;
            }
            ReplayEvent::Class { class } => (Some(class), stream.check_class(class)),
            ReplayEvent::Array { class, length } => {
                (Some(class), stream.check_array(class, *length))
            }
            ReplayEvent::Metrics => (None, stream.check_metrics()),
        };

        let (status, error) = match result {
            Ok(status) => (status, None),
            Err(StreamError::Rejected { status, .. }) => (status, None),
            Err(e) => (Status::Rejected, Some(e.to_string())),
        };
        debug!(step, status = %status, "replayed check");
        outcomes.push(Outcome {
            step,
            class: class.cloned(),
            status,
            depth: stream.depth(),
            references: stream.references(),
            bytes: stream.stream_bytes(),
            error,
        });
        if fail_fast && status.is_rejected() {
            break;
        }
    }
    outcomes
}

pub fn run(args: ReplayArgs) -> Result<()> {
    let events = read_events(&args.events)?;
    let registry = load_registry(args.settings.as_deref(), args.pattern.as_deref())?;
    let mut stream = StreamFilter::new(&registry);
    info!(
        events = events.len(),
        filter = %stream.filter().map(ToString::to_string).unwrap_or_default(),
        "replaying event script"
    );

    let outcomes = replay(&mut stream, &events, args.fail_fast);
    let rejected = outcomes.iter().filter(|o| o.status.is_rejected()).count();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcomes)?);
    } else {
        for o in &outcomes {
            let subject = o
                .class
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "(metrics only)".to_string());
            let detail = o.error.as_deref().map(|e| format!(" [{}]", e)).unwrap_or_default();
            output::decision(
                o.status,
                &format!(
                    "#{} {} depth={} refs={} bytes={}{}",
                    o.step, subject, o.depth, o.references, o.bytes, detail
                ),
            );
        }
    }

    if args.metrics {
        print!("{}", metrics::gather()?);
    }

    if rejected > 0 {
        output::error(&format!("{} of {} checks rejected", rejected, outcomes.len()));
        anyhow::bail!("event script rejected by filter");
    }
    output::success(&format!("{} checks passed", outcomes.len()));
    Ok(())
}
