use super::*;
use std::collections::HashMap;
use std::path::PathBuf;

/// Memory gauge, in kB as reported by the kernel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryUsage {
    #[serde(rename = "memTotalKB")]
    pub total_kb: u64,
    #[serde(rename = "memAvailKB")]
    pub available_kb: u64,
    #[serde(rename = "memUsedKB")]
    pub used_kb: u64,
    /// whole percent of total in use
    #[serde(rename = "memUsedPer")]
    pub used_pct: u64,
}

impl Gauge for MemoryUsage {
    fn records(&self) -> Vec<Fields> {
        vec![struct_fields(self)]
    }
}

/// Memory sampler reading directly from /proc/meminfo.
pub struct MemorySampler {
    meminfo_path: PathBuf,
}

impl MemorySampler {
    pub fn new(proc_root: &Path) -> Self {
        Self {
            meminfo_path: proc_root.join("meminfo"),
        }
    }

    /// Parse /proc/meminfo into a key-value map of kB values.
    fn parse_meminfo(content: &str) -> HashMap<String, u64> {
        let mut map = HashMap::new();
        for line in content.lines() {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() >= 2 {
                let key = parts[0].trim_end_matches(':').to_string();
                if let Ok(val) = parts[1].parse::<u64>() {
                    map.insert(key, val);
                }
            }
        }
        map
    }

    fn get_kb(&self, map: &HashMap<String, u64>, field: &str) -> Result<u64, SamplerError> {
        map.get(field)
            .copied()
            .ok_or_else(|| SamplerError::ParseError {
                path: self.meminfo_path.display().to_string(),
                field: field.into(),
                raw: "field not found".into(),
            })
    }

    fn usage(&self, content: &str) -> Result<MemoryUsage, SamplerError> {
        let map = Self::parse_meminfo(content);
        let total = self.get_kb(&map, "MemTotal")?;
        let available = self.get_kb(&map, "MemAvailable")?;

        let used = total.saturating_sub(available);
        let used_pct = if total > 0 { used * 100 / total } else { 0 };

        Ok(MemoryUsage {
            total_kb: total,
            available_kb: available,
            used_kb: used,
            used_pct,
        })
    }
}

#[async_trait]
impl Sampler for MemorySampler {
    type Output = MemoryUsage;

    fn name(&self) -> &'static str {
        "mem"
    }

    async fn sample(&mut self) -> Result<Self::Output, SamplerError> {
        let content = read_proc(&self.meminfo_path).await?;
        self.usage(&content)
    }
}
