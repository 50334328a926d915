use crate::errors::ConfigError;
use crate::scheduler::TickLimit;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "cricket", version, about)]
pub struct Config {
    /// Unique identifier for this agent instance.
    /// if none provided, default to hostname.
    #[arg(long, env = "CRICKET_AGENT_ID")]
    pub agent_id: Option<String>,

    /// Number of times to print each metric. Less than 1 means no limit.
    #[arg(long, env = "CRICKET_LIMIT", default_value_t = -1, allow_negative_numbers = true)]
    pub limit: i64,

    /// Interval at which to emit cpu stats. Blank to not show.
    #[arg(long, env = "CRICKET_CPU_INTERVAL", default_value = "1s")]
    pub cpu_interval: String,

    /// Interval at which to emit memory stats. Blank to not show.
    #[arg(long, env = "CRICKET_MEM_INTERVAL", default_value = "1s")]
    pub mem_interval: String,

    /// Interval at which to emit disk usage stats. Blank to not show.
    #[arg(long, env = "CRICKET_DISK_INTERVAL", default_value = "1s")]
    pub disk_interval: String,

    /// Interval at which to emit disk io stats. Blank to not show.
    #[arg(long, env = "CRICKET_DISK_IO_INTERVAL", default_value = "1s")]
    pub disk_io_interval: String,

    /// Interval at which to emit network interface stats. Blank to not show.
    #[arg(long, env = "CRICKET_NET_INTERVAL", default_value = "1s")]
    pub net_interval: String,

    /// Interval at which to ping hosts. Blank to not ping.
    #[arg(long, env = "CRICKET_PING_INTERVAL", default_value = "1s")]
    pub ping_interval: String,

    /// Comma-separated list of hostnames or ips to ping. Blank to not ping.
    #[arg(long, env = "CRICKET_PING_HOSTS", value_delimiter = ',')]
    pub ping_hosts: Vec<String>,

    /// Number of pings to send per interval.
    #[arg(long, env = "CRICKET_PING_COUNT", default_value_t = 3)]
    pub ping_count: u32,

    /// Root of the procfs tree counters are read from.
    #[arg(long, env = "CRICKET_PROC_ROOT", default_value = "/proc")]
    pub proc_root: PathBuf,

    /// Enable JSON structured logging.
    #[arg(long, env = "CRICKET_JSON_LOGS", default_value_t = false)]
    pub json_logs: bool,
}

/// Validated intervals; `None` means the family is disabled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Intervals {
    pub cpu: Option<Duration>,
    pub mem: Option<Duration>,
    pub disk: Option<Duration>,
    pub disk_io: Option<Duration>,
    pub net: Option<Duration>,
    pub ping: Option<Duration>,
}

impl Config {
    /// get agent ID, upon failure fallback to hostname.
    pub fn resolved_agent_id(&self) -> String {
        self.agent_id.clone().unwrap_or_else(|| {
            hostname::get()
                .map(|h| h.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "unknown-agent".to_string())
        })
    }

    pub fn tick_limit(&self) -> TickLimit {
        TickLimit::from_count(self.limit)
    }

    /// Hosts to ping, with blanks from stray commas removed.
    pub fn ping_targets(&self) -> Vec<String> {
        self.ping_hosts
            .iter()
            .map(|h| h.trim())
            .filter(|h| !h.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Parse every interval up front so a typo fails before anything runs.
    pub fn intervals(&self) -> Result<Intervals, ConfigError> {
        if self.ping_count == 0 {
            return Err(ConfigError::InvalidPingCount(self.ping_count));
        }

        let mut ping = parse_interval("--ping-interval", &self.ping_interval)?;
        if self.ping_targets().is_empty() {
            ping = None;
        }

        Ok(Intervals {
            cpu: parse_interval("--cpu-interval", &self.cpu_interval)?,
            mem: parse_interval("--mem-interval", &self.mem_interval)?,
            disk: parse_interval("--disk-interval", &self.disk_interval)?,
            disk_io: parse_interval("--disk-io-interval", &self.disk_io_interval)?,
            net: parse_interval("--net-interval", &self.net_interval)?,
            ping,
        })
    }
}

/// Blank or zero disables the family.
pub fn parse_interval(param: &'static str, raw: &str) -> Result<Option<Duration>, ConfigError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let d = parse_duration(raw).ok_or_else(|| ConfigError::InvalidDuration {
        param,
        raw: raw.to_string(),
    })?;
    Ok(Some(d).filter(|d| !d.is_zero()))
}

/// Parse a duration such as `500ms`, `1.5s` or `1h30m`.
///
/// Units: `ns`, `us` (or `µs`), `ms`, `s`, `m`, `h`. A bare `0` is accepted.
pub fn parse_duration(input: &str) -> Option<Duration> {
    if input == "0" {
        return Some(Duration::ZERO);
    }

    let mut rest = input;
    let mut total = 0f64;
    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if num_len == 0 {
            return None;
        }
        let value: f64 = rest[..num_len].parse().ok()?;
        rest = &rest[num_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let nanos_per_unit = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            _ => return None,
        };
        rest = &rest[unit_len..];
        total += value * nanos_per_unit;
    }

    if !total.is_finite() || total > u64::MAX as f64 {
        return None;
    }
    Some(Duration::from_nanos(total.round() as u64))
}
