//! Host reachability probing.
//!
//! Runs on the same scheduler as the metric families. Each tick fans out one
//! probe per host and waits for all of them; a host that fails is reported
//! as a warning record and has no effect on the other hosts or later ticks.

use crate::errors::{ProbeError, SamplerError};
use crate::scheduler::{Family, FamilyKind, TickOutcome};
use crate::sink::{Record, RecordKind, Sink};
use crate::snapshot::Fields;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::task::JoinSet;
use tracing::debug;

#[async_trait]
pub trait Prober: Send + Sync {
    /// Send `count` echo requests to `host`, returning the average round trip.
    async fn probe(&self, host: &str, count: u32) -> Result<Duration, ProbeError>;
}

/// Probes through the system `ping` binary.
pub struct PingProber {
    program: String,
}

impl PingProber {
    pub fn new() -> Self {
        Self::with_program("ping")
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Pull the average out of the summary line, e.g.
    /// `rtt min/avg/max/mdev = 0.031/0.045/0.062/0.012 ms`.
    fn parse_avg_rtt(output: &str) -> Result<Duration, ProbeError> {
        let summary = output
            .lines()
            .find(|l| l.contains("min/avg/max"))
            .ok_or(ProbeError::NoReplies)?;

        let avg_ms = summary
            .split('=')
            .nth(1)
            .and_then(|values| values.trim().split('/').nth(1))
            .and_then(|avg| avg.trim().parse::<f64>().ok())
            .ok_or_else(|| ProbeError::UnparsableOutput(summary.to_string()))?;

        Ok(Duration::from_secs_f64(avg_ms / 1000.0))
    }

    /// Decide the probe result from a finished ping run.
    ///
    /// A summary line wins even on non-zero exit (partial replies). Without
    /// one, a run that got as far as sending packets means no replies; any
    /// other failure carries ping's own stderr.
    fn interpret(stdout: &str, stderr: &str, success: bool) -> Result<Duration, ProbeError> {
        match Self::parse_avg_rtt(stdout) {
            Err(ProbeError::NoReplies) if !success && !stdout.contains("transmitted") => {
                let reason = stderr.trim();
                Err(ProbeError::Failed(if reason.is_empty() {
                    "ping exited with an error status".to_string()
                } else {
                    reason.to_string()
                }))
            }
            result => result,
        }
    }
}

impl Default for PingProber {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Prober for PingProber {
    async fn probe(&self, host: &str, count: u32) -> Result<Duration, ProbeError> {
        let output = Command::new(&self.program)
            .arg("-q")
            .arg("-c")
            .arg(count.to_string())
            // a host starting with '-' must not be read as an option
            .arg("--")
            .arg(host)
            .output()
            .await?;

        Self::interpret(
            &String::from_utf8_lossy(&output.stdout),
            &String::from_utf8_lossy(&output.stderr),
            output.status.success(),
        )
    }
}

/// Pings every configured host once per tick.
pub struct PingFamily {
    hosts: Vec<String>,
    count: u32,
    prober: Arc<dyn Prober>,
}

impl PingFamily {
    pub fn new(hosts: Vec<String>, count: u32, prober: Arc<dyn Prober>) -> Self {
        Self {
            hosts,
            count,
            prober,
        }
    }

    fn result_record(host: &str, result: Result<Duration, ProbeError>) -> Record {
        let mut fields = Fields::new();
        fields.insert("host".into(), Value::from(host));
        match result {
            Ok(rtt) => {
                // whole milliseconds keep the log line short
                fields.insert("tookMSAvg".into(), Value::from(rtt.as_millis() as u64));
                Record::new(RecordKind::PingResult, fields)
            }
            Err(e) => {
                fields.insert("error".into(), Value::from(e.to_string()));
                Record::new(RecordKind::PingFailed, fields)
            }
        }
    }
}

#[async_trait]
impl Family for PingFamily {
    fn name(&self) -> &'static str {
        "ping"
    }

    fn kind(&self) -> FamilyKind {
        FamilyKind::Gauge
    }

    async fn tick(&mut self, sink: &dyn Sink) -> Result<TickOutcome, SamplerError> {
        let mut probes = JoinSet::new();
        for (idx, host) in self.hosts.iter().enumerate() {
            let prober = self.prober.clone();
            let host = host.clone();
            let count = self.count;
            probes.spawn(async move { (idx, prober.probe(&host, count).await) });
        }

        let mut results: Vec<Option<Result<Duration, ProbeError>>> =
            (0..self.hosts.len()).map(|_| None).collect();
        while let Some(joined) = probes.join_next().await {
            match joined {
                Ok((idx, result)) => results[idx] = Some(result),
                Err(e) => debug!(error = %e, "probe task did not complete"),
            }
        }

        // report in configured host order
        let mut emitted = 0;
        for (host, result) in self.hosts.iter().zip(results) {
            if let Some(result) = result {
                sink.emit(Self::result_record(host, result));
                emitted += 1;
            }
        }
        Ok(TickOutcome::Emitted(emitted))
    }
}
