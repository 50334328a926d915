//! Emission sinks.
//!
//! Every family task holds an `Arc<dyn Sink>` and pushes finished records
//! into it. Emission is fire-and-forget: sinks report nothing back and
//! records from different families may interleave in any order.

use crate::snapshot::Fields;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::io::{self, Write};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    CpuDiff,
    Memory,
    DiskUsage,
    DiskIoDiff,
    NetDiff,
    PingResult,
    PingFailed,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::CpuDiff => "cpu stats (diff)",
            RecordKind::Memory => "mem stats",
            RecordKind::DiskUsage => "disk usage stats",
            RecordKind::DiskIoDiff => "disk io stats (diff)",
            RecordKind::NetDiff => "net stats (diff)",
            RecordKind::PingResult => "ping result",
            RecordKind::PingFailed => "ping failed",
        }
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, RecordKind::PingFailed)
    }

    fn level(&self) -> &'static str {
        if self.is_warning() {
            "WARN"
        } else {
            "INFO"
        }
    }
}

impl Serialize for RecordKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One emitted datapoint.
#[derive(Debug, Clone, Serialize)]
pub struct Record {
    pub kind: RecordKind,
    pub recorded_at: DateTime<Utc>,
    pub fields: Fields,
}

impl Record {
    pub fn new(kind: RecordKind, fields: Fields) -> Self {
        Self {
            kind,
            recorded_at: Utc::now(),
            fields,
        }
    }
}

pub trait Sink: Send + Sync {
    /// Best-effort; must tolerate concurrent callers.
    fn emit(&self, record: Record);
}

/// Writes records as human-readable `tracing` events.
///
/// The message is the record kind followed by its fields as `key=value`
/// pairs; the subscriber supplies the timestamp.
pub struct TracingSink {
    agent_id: String,
}

impl TracingSink {
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
        }
    }
}

fn render_pairs(fields: &Fields) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(" ")
}

impl Sink for TracingSink {
    fn emit(&self, record: Record) {
        let pairs = render_pairs(&record.fields);
        if record.kind.is_warning() {
            tracing::warn!(
                target: "cricket::record",
                agent_id = %self.agent_id,
                "{} {}",
                record.kind.as_str(),
                pairs
            );
        } else {
            tracing::info!(
                target: "cricket::record",
                agent_id = %self.agent_id,
                "{} {}",
                record.kind.as_str(),
                pairs
            );
        }
    }
}

/// One output line of [`JsonSink`]: envelope keys plus the record's fields
/// at the top level.
#[derive(Serialize)]
struct JsonLine<'a> {
    level: &'static str,
    kind: RecordKind,
    agent_id: &'a str,
    recorded_at: &'a DateTime<Utc>,
    #[serde(flatten)]
    fields: &'a Fields,
}

/// Writes each record as one flat JSON object per line.
pub struct JsonSink<W: Write + Send> {
    agent_id: String,
    writer: Mutex<W>,
}

impl JsonSink<io::Stdout> {
    pub fn stdout(agent_id: impl Into<String>) -> Self {
        Self::new(agent_id, io::stdout())
    }
}

impl<W: Write + Send> JsonSink<W> {
    pub fn new(agent_id: impl Into<String>, writer: W) -> Self {
        Self {
            agent_id: agent_id.into(),
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn encode(&self, record: &Record) -> serde_json::Result<Vec<u8>> {
        let mut line = serde_json::to_vec(&JsonLine {
            level: record.kind.level(),
            kind: record.kind,
            agent_id: &self.agent_id,
            recorded_at: &record.recorded_at,
            fields: &record.fields,
        })?;
        line.push(b'\n');
        Ok(line)
    }
}

impl<W: Write + Send> Sink for JsonSink<W> {
    fn emit(&self, record: Record) {
        let line = match self.encode(&record) {
            Ok(line) => line,
            Err(e) => {
                tracing::debug!(error = %e, kind = record.kind.as_str(), "record not encodable");
                return;
            }
        };
        // one write per line so concurrent families never interleave mid-record
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.write_all(&line).and_then(|_| writer.flush());
        }
    }
}

/// Keeps every record in memory. Used by tests and dry runs.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<Record>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<Record> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn count(&self, kind: RecordKind) -> usize {
        self.records().iter().filter(|r| r.kind == kind).count()
    }
}

impl Sink for MemorySink {
    fn emit(&self, record: Record) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record);
        }
    }
}
