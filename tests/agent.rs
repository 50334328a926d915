mod common;

use cricket::config::Intervals;
use cricket::samplers::net::NetSampler;
use cricket::scheduler::{CounterFamily, Family, Scheduler, TickLimit, TickOutcome};
use cricket::sink::{MemorySink, RecordKind};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

fn every(ms: u64) -> Option<Duration> {
    Some(Duration::from_millis(ms))
}

#[tokio::test]
async fn test_all_families_against_fixture_tree() {
    let proc = common::proc_tree();
    let sink = Arc::new(MemorySink::new());
    let mut scheduler = Scheduler::new(sink.clone(), TickLimit::from_count(2));

    let intervals = Intervals {
        cpu: every(10),
        mem: every(10),
        disk: every(10),
        disk_io: every(10),
        net: every(10),
        ping: None,
    };
    cricket::schedule_families(&mut scheduler, &intervals, proc.path(), Vec::new(), 3);
    assert_eq!(scheduler.len(), 5);

    let reports = scheduler.wait().await.unwrap();
    assert_eq!(reports.len(), 5);

    assert_eq!(sink.count(RecordKind::CpuDiff), 2);
    assert_eq!(sink.count(RecordKind::Memory), 2);
    assert_eq!(sink.count(RecordKind::DiskUsage), 2);
    // one record per mounted device per emission
    assert_eq!(sink.count(RecordKind::DiskIoDiff), 2);
    // one record per interface per emission
    assert_eq!(sink.count(RecordKind::NetDiff), 4);

    let cpu = sink
        .records()
        .into_iter()
        .find(|r| r.kind == RecordKind::CpuDiff)
        .unwrap();
    // counters did not move between samples
    assert_eq!(cpu.fields["cpuUser"], Value::from(0u64));
    assert_eq!(cpu.fields.len(), 7);

    let mem = sink
        .records()
        .into_iter()
        .find(|r| r.kind == RecordKind::Memory)
        .unwrap();
    assert_eq!(mem.fields["memUsedPer"], Value::from(75u64));
}

#[tokio::test]
async fn test_missing_source_is_fatal() {
    let proc = common::proc_tree();
    std::fs::remove_file(proc.path().join("diskstats")).unwrap();

    let sink = Arc::new(MemorySink::new());
    let mut scheduler = Scheduler::new(sink, TickLimit::unbounded());
    let intervals = Intervals {
        mem: every(10),
        disk_io: every(10),
        ..Intervals::default()
    };
    cricket::schedule_families(&mut scheduler, &intervals, proc.path(), Vec::new(), 3);

    let err = scheduler.wait().await.unwrap_err();
    assert_eq!(err.family, "disk-io");
}

#[tokio::test]
async fn test_interfaces_appearing_and_vanishing() {
    let proc = common::proc_tree();
    let sink = MemorySink::new();
    let mut net = CounterFamily::new(NetSampler::new(proc.path()), RecordKind::NetDiff);

    common::write_netdev(proc.path(), &[("eth0", 1000), ("wlan0", 10)]);
    assert_eq!(net.tick(&sink).await.unwrap(), TickOutcome::Suppressed);

    // wlan0 gone, tun0 new
    common::write_netdev(proc.path(), &[("eth0", 1500), ("tun0", 7)]);
    assert_eq!(net.tick(&sink).await.unwrap(), TickOutcome::Emitted(1));

    // tun0 now has a baseline
    common::write_netdev(proc.path(), &[("eth0", 1600), ("tun0", 9)]);
    assert_eq!(net.tick(&sink).await.unwrap(), TickOutcome::Emitted(2));

    let devs: Vec<_> = sink
        .records()
        .iter()
        .map(|r| (r.fields["dev"].clone(), r.fields["rcvBytes"].clone()))
        .collect();
    assert_eq!(
        devs,
        vec![
            (Value::from("eth0"), Value::from(500u64)),
            (Value::from("eth0"), Value::from(100u64)),
            (Value::from("tun0"), Value::from(2u64)),
        ]
    );
}

#[tokio::test]
async fn test_reset_on_one_interface_suppresses_the_whole_tick() {
    let proc = common::proc_tree();
    let sink = MemorySink::new();
    let mut net = CounterFamily::new(NetSampler::new(proc.path()), RecordKind::NetDiff);

    common::write_netdev(proc.path(), &[("eth0", 1000), ("eth1", 1000)]);
    net.tick(&sink).await.unwrap();

    // eth1 driver reloaded, eth0 kept counting
    common::write_netdev(proc.path(), &[("eth0", 2000), ("eth1", 3)]);
    assert_eq!(net.tick(&sink).await.unwrap(), TickOutcome::Suppressed);
    assert!(sink.records().is_empty());

    common::write_netdev(proc.path(), &[("eth0", 2100), ("eth1", 13)]);
    assert_eq!(net.tick(&sink).await.unwrap(), TickOutcome::Emitted(2));
}
