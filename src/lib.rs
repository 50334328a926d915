pub mod config;
pub mod errors;
pub mod logging;
pub mod probe;
pub mod samplers;
pub mod scheduler;
pub mod sink;
pub mod snapshot;

use crate::config::Intervals;
use crate::probe::{PingFamily, PingProber};
use crate::samplers::cpu::CpuSampler;
use crate::samplers::disk::{DiskIoSampler, DiskUsageSampler};
use crate::samplers::memory::MemorySampler;
use crate::samplers::net::NetSampler;
use crate::scheduler::{CounterFamily, GaugeFamily, Scheduler};
use crate::sink::RecordKind;
use std::path::Path;
use std::sync::Arc;

/// Register every enabled family with the scheduler.
pub fn schedule_families(
    scheduler: &mut Scheduler,
    intervals: &Intervals,
    proc_root: &Path,
    ping_hosts: Vec<String>,
    ping_count: u32,
) {
    scheduler.spawn(
        Box::new(CounterFamily::new(CpuSampler::new(proc_root), RecordKind::CpuDiff)),
        intervals.cpu,
    );
    scheduler.spawn(
        Box::new(GaugeFamily::new(MemorySampler::new(proc_root), RecordKind::Memory)),
        intervals.mem,
    );
    scheduler.spawn(
        Box::new(GaugeFamily::new(DiskUsageSampler::new(proc_root), RecordKind::DiskUsage)),
        intervals.disk,
    );
    scheduler.spawn(
        Box::new(CounterFamily::new(DiskIoSampler::new(proc_root), RecordKind::DiskIoDiff)),
        intervals.disk_io,
    );
    scheduler.spawn(
        Box::new(CounterFamily::new(NetSampler::new(proc_root), RecordKind::NetDiff)),
        intervals.net,
    );
    if !ping_hosts.is_empty() {
        scheduler.spawn(
            Box::new(PingFamily::new(ping_hosts, ping_count, Arc::new(PingProber::new()))),
            intervals.ping,
        );
    }
}
