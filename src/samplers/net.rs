use super::*;
use crate::snapshot::{CounterName, Snapshot, SnapshotSet};
use std::path::PathBuf;

/// Cumulative per-interface counters from /proc/net/dev.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NetCounter {
    RcvBytes,
    RcvPackets,
    RcvErrs,
    RcvDrop,
    TxBytes,
    TxPackets,
    TxErrs,
    TxDrop,
}

impl CounterName for NetCounter {
    fn as_str(&self) -> &'static str {
        match self {
            NetCounter::RcvBytes => "rcvBytes",
            NetCounter::RcvPackets => "rcvPackets",
            NetCounter::RcvErrs => "rcvErrs",
            NetCounter::RcvDrop => "rcvDrop",
            NetCounter::TxBytes => "txBytes",
            NetCounter::TxPackets => "txPackets",
            NetCounter::TxErrs => "txErrs",
            NetCounter::TxDrop => "txDrop",
        }
    }
}

// Value columns after the `iface:` label. Receive fifo/frame/compressed/
// multicast (4..=7) are skipped.
const NETDEV_COLUMNS: [(usize, NetCounter); 8] = [
    (0, NetCounter::RcvBytes),
    (1, NetCounter::RcvPackets),
    (2, NetCounter::RcvErrs),
    (3, NetCounter::RcvDrop),
    (8, NetCounter::TxBytes),
    (9, NetCounter::TxPackets),
    (10, NetCounter::TxErrs),
    (11, NetCounter::TxDrop),
];

/// Network interface sampler reading directly from /proc/net/dev.
pub struct NetSampler {
    netdev_path: PathBuf,
}

impl NetSampler {
    pub fn new(proc_root: &Path) -> Self {
        Self {
            netdev_path: proc_root.join("net").join("dev"),
        }
    }

    fn parse_error(&self, field: &str, raw: &str) -> SamplerError {
        SamplerError::ParseError {
            path: self.netdev_path.display().to_string(),
            field: field.into(),
            raw: raw.to_string(),
        }
    }

    fn parse_netdev(&self, content: &str) -> Result<SnapshotSet<NetCounter>, SamplerError> {
        let mut lines = content.lines();
        // two header lines
        for _ in 0..2 {
            lines
                .next()
                .ok_or_else(|| self.parse_error("header", "missing header lines"))?;
        }

        let mut set = SnapshotSet::new("dev");
        for line in lines.filter(|l| !l.trim().is_empty()) {
            // counters may run into the colon once they get wide
            let (iface, values) = line
                .split_once(':')
                .ok_or_else(|| self.parse_error("interface", line))?;
            let parts: Vec<&str> = values.split_whitespace().collect();
            if parts.len() < 12 {
                return Err(self.parse_error("counters", line));
            }

            let snapshot = NETDEV_COLUMNS
                .iter()
                .map(|(idx, counter)| {
                    parse_u64(parts[*idx], &self.netdev_path, counter.as_str())
                        .map(|v| (*counter, v))
                })
                .collect::<Result<Snapshot<_>, _>>()?;
            set.insert(iface.trim(), snapshot);
        }
        Ok(set)
    }
}

#[async_trait]
impl Sampler for NetSampler {
    type Output = SnapshotSet<NetCounter>;

    fn name(&self) -> &'static str {
        "net"
    }

    async fn sample(&mut self) -> Result<Self::Output, SamplerError> {
        let content = read_proc(&self.netdev_path).await?;
        self.parse_netdev(&content)
    }
}
