//! Multi-family polling scheduler.
//!
//! Each enabled family runs as its own tokio task on its own fixed-cadence
//! ticker. Tasks share nothing but the sink. The scheduler is the single
//! join point: it waits for every bounded task to exhaust its budget and
//! tears everything down as soon as one task reports a fatal sampler error.

use crate::errors::{FatalError, SamplerError};
use crate::samplers::{Gauge, Sampler};
use crate::sink::{Record, RecordKind, Sink};
use crate::snapshot::{Diffable, Fields};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info};

/// How a family's samples turn into emissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FamilyKind {
    /// Cumulative counters, emitted as deltas between consecutive samples.
    Counter,
    /// Point-in-time values, emitted as sampled.
    Gauge,
}

/// Tick-count limit shared by all families. Zero or negative is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickLimit(Option<u64>);

impl TickLimit {
    pub fn from_count(count: i64) -> Self {
        Self(u64::try_from(count).ok().filter(|n| *n > 0))
    }

    pub fn unbounded() -> Self {
        Self(None)
    }

    /// The number of emissions each family is allowed.
    pub fn emissions(&self) -> Option<u64> {
        self.0
    }

    /// Samples a family must take to reach its emission limit.
    ///
    /// The first sample of a counter family only seeds the baseline, so
    /// `N` emissions cost `N + 1` samples there.
    pub fn sample_budget(&self, kind: FamilyKind) -> Option<u64> {
        self.0.map(|n| match kind {
            FamilyKind::Counter => n + 1,
            FamilyKind::Gauge => n,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Records were handed to the sink.
    Emitted(usize),
    /// Nothing to emit this tick: no baseline yet, or a counter reset.
    Suppressed,
}

/// One scheduled unit of work: sample, maybe diff, maybe emit.
#[async_trait]
pub trait Family: Send {
    fn name(&self) -> &'static str;

    fn kind(&self) -> FamilyKind;

    async fn tick(&mut self, sink: &dyn Sink) -> Result<TickOutcome, SamplerError>;
}

fn emit_all(sink: &dyn Sink, kind: RecordKind, records: Vec<Fields>) -> TickOutcome {
    let count = records.len();
    for fields in records {
        sink.emit(Record::new(kind, fields));
    }
    TickOutcome::Emitted(count)
}

/// Emits the delta between each sample and the one before it.
pub struct CounterFamily<S>
where
    S: Sampler,
    S::Output: Diffable,
{
    sampler: S,
    record: RecordKind,
    previous: Option<S::Output>,
}

impl<S> CounterFamily<S>
where
    S: Sampler,
    S::Output: Diffable,
{
    pub fn new(sampler: S, record: RecordKind) -> Self {
        Self {
            sampler,
            record,
            previous: None,
        }
    }
}

#[async_trait]
impl<S> Family for CounterFamily<S>
where
    S: Sampler,
    S::Output: Diffable,
{
    fn name(&self) -> &'static str {
        self.sampler.name()
    }

    fn kind(&self) -> FamilyKind {
        FamilyKind::Counter
    }

    async fn tick(&mut self, sink: &dyn Sink) -> Result<TickOutcome, SamplerError> {
        let current = self.sampler.sample().await?;

        let outcome = match self.previous.as_ref() {
            // first sample of the process: baseline only
            None => TickOutcome::Suppressed,
            Some(previous) => match current.diff_from(previous) {
                Some(diff) => emit_all(sink, self.record, diff.records()),
                None => {
                    debug!(family = self.sampler.name(), "counter reset, skipping tick");
                    TickOutcome::Suppressed
                }
            },
        };

        self.previous = Some(current);
        Ok(outcome)
    }
}

/// Emits every sample as-is.
pub struct GaugeFamily<S>
where
    S: Sampler,
    S::Output: Gauge,
{
    sampler: S,
    record: RecordKind,
}

impl<S> GaugeFamily<S>
where
    S: Sampler,
    S::Output: Gauge,
{
    pub fn new(sampler: S, record: RecordKind) -> Self {
        Self { sampler, record }
    }
}

#[async_trait]
impl<S> Family for GaugeFamily<S>
where
    S: Sampler,
    S::Output: Gauge,
{
    fn name(&self) -> &'static str {
        self.sampler.name()
    }

    fn kind(&self) -> FamilyKind {
        FamilyKind::Gauge
    }

    async fn tick(&mut self, sink: &dyn Sink) -> Result<TickOutcome, SamplerError> {
        let reading = self.sampler.sample().await?;
        Ok(emit_all(sink, self.record, reading.records()))
    }
}

/// What a family task did before it finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyReport {
    pub family: &'static str,
    pub samples: u64,
    pub emissions: u64,
}

/// Drive one family on a fixed cadence until its budget runs out.
///
/// The first tick fires immediately. A tick that comes due while the
/// previous sample is still running is skipped, never fired twice.
pub async fn run_family(
    mut family: Box<dyn Family>,
    every: Duration,
    limit: TickLimit,
    sink: Arc<dyn Sink>,
) -> Result<FamilyReport, FatalError> {
    let budget = limit.sample_budget(family.kind());
    let mut report = FamilyReport {
        family: family.name(),
        samples: 0,
        emissions: 0,
    };

    let mut ticker = time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    while budget.map_or(true, |b| report.samples < b) {
        ticker.tick().await;
        report.samples += 1;

        match family.tick(sink.as_ref()).await {
            Ok(TickOutcome::Emitted(_)) => report.emissions += 1,
            Ok(TickOutcome::Suppressed) => {}
            Err(e) => {
                error!(family = report.family, error = %e, "sampling failed, shutting down");
                return Err(FatalError {
                    family: report.family,
                    source: e,
                });
            }
        }
    }

    Ok(report)
}

/// Owns every family task and is the single point the agent waits on.
pub struct Scheduler {
    sink: Arc<dyn Sink>,
    limit: TickLimit,
    tasks: JoinSet<Result<FamilyReport, FatalError>>,
}

impl Scheduler {
    pub fn new(sink: Arc<dyn Sink>, limit: TickLimit) -> Self {
        Self {
            sink,
            limit,
            tasks: JoinSet::new(),
        }
    }

    /// Start a family on its own task. A missing or zero interval leaves the
    /// family disabled; returns whether it was started.
    pub fn spawn(&mut self, family: Box<dyn Family>, every: Option<Duration>) -> bool {
        let Some(every) = every.filter(|d| !d.is_zero()) else {
            debug!(family = family.name(), "no interval configured, family disabled");
            return false;
        };

        info!(
            family = family.name(),
            interval_ms = every.as_millis() as u64,
            limit = ?self.limit.emissions(),
            "starting family"
        );
        self.tasks
            .spawn(run_family(family, every, self.limit, self.sink.clone()));
        true
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for all families. Never returns while any family is unbounded,
    /// unless one of them fails, in which case the rest are aborted.
    pub async fn wait(mut self) -> Result<Vec<FamilyReport>, FatalError> {
        let mut reports = Vec::with_capacity(self.tasks.len());
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(Ok(report)) => {
                    info!(
                        family = report.family,
                        samples = report.samples,
                        emissions = report.emissions,
                        "family finished"
                    );
                    reports.push(report);
                }
                Ok(Err(fatal)) => {
                    self.tasks.abort_all();
                    return Err(fatal);
                }
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(_) => {}
            }
        }
        Ok(reports)
    }
}
