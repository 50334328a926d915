use super::*;
use crate::snapshot::{CounterName, Snapshot};
use std::path::PathBuf;

/// Time buckets of the aggregate `cpu` line in /proc/stat, in clock ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CpuCounter {
    User,
    Nice,
    System,
    Idle,
    IoWait,
    Irq,
    SoftIrq,
}

impl CpuCounter {
    /// column order after the `cpu` label
    pub const ALL: [CpuCounter; 7] = [
        CpuCounter::User,
        CpuCounter::Nice,
        CpuCounter::System,
        CpuCounter::Idle,
        CpuCounter::IoWait,
        CpuCounter::Irq,
        CpuCounter::SoftIrq,
    ];
}

impl CounterName for CpuCounter {
    fn as_str(&self) -> &'static str {
        match self {
            CpuCounter::User => "cpuUser",
            CpuCounter::Nice => "cpuNice",
            CpuCounter::System => "cpuSystem",
            CpuCounter::Idle => "cpuIdle",
            CpuCounter::IoWait => "cpuIOWait",
            CpuCounter::Irq => "cpuIRQ",
            CpuCounter::SoftIrq => "cpuSoftIRQ",
        }
    }
}

/// CPU time sampler reading directly from /proc/stat.
pub struct CpuSampler {
    stat_path: PathBuf,
}

impl CpuSampler {
    pub fn new(proc_root: &Path) -> Self {
        Self {
            stat_path: proc_root.join("stat"),
        }
    }

    /// Parse the aggregate CPU line out of the whole /proc/stat content.
    fn parse_stat(&self, content: &str) -> Result<Snapshot<CpuCounter>, SamplerError> {
        let line = content
            .lines()
            .find(|line| line.starts_with("cpu "))
            .ok_or_else(|| SamplerError::ParseError {
                path: self.stat_path.display().to_string(),
                field: "cpu".into(),
                raw: "no aggregate cpu line".into(),
            })?;

        let parts: Vec<&str> = line.split_whitespace().skip(1).collect();
        if parts.len() < CpuCounter::ALL.len() {
            return Err(SamplerError::ParseError {
                path: self.stat_path.display().to_string(),
                field: "cpu".into(),
                raw: line.to_string(),
            });
        }

        CpuCounter::ALL
            .iter()
            .zip(parts)
            .map(|(counter, raw)| {
                parse_u64(raw, &self.stat_path, counter.as_str()).map(|v| (*counter, v))
            })
            .collect()
    }
}

#[async_trait]
impl Sampler for CpuSampler {
    type Output = Snapshot<CpuCounter>;

    fn name(&self) -> &'static str {
        "cpu"
    }

    async fn sample(&mut self) -> Result<Self::Output, SamplerError> {
        let content = read_proc(&self.stat_path).await?;
        self.parse_stat(&content)
    }
}
