pub mod cpu;
pub mod disk;
pub mod memory;
pub mod net;

use crate::errors::SamplerError;
use crate::snapshot::Fields;
use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;
use tokio::fs;

/// Reads one metric family from its OS source.
#[async_trait]
pub trait Sampler: Send + Sync {
    type Output: Send + Sync + 'static;

    /// family name as used in logs
    fn name(&self) -> &'static str;

    /// take a fresh, independent reading. Errors are fatal to the agent.
    async fn sample(&mut self) -> Result<Self::Output, SamplerError>;
}

/// A point-in-time reading emitted as-is on every tick.
pub trait Gauge: Send + Sync + 'static {
    fn records(&self) -> Vec<Fields>;
}

impl<T: Gauge> Gauge for Vec<T> {
    fn records(&self) -> Vec<Fields> {
        self.iter().flat_map(Gauge::records).collect()
    }
}

/// Flatten a serializable struct into record fields.
pub(crate) fn struct_fields<T: Serialize>(value: &T) -> Fields {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::Object(map)) => map.into_iter().collect(),
        _ => Fields::new(),
    }
}

pub(crate) async fn read_proc(path: &Path) -> Result<String, SamplerError> {
    fs::read_to_string(path)
        .await
        .map_err(|e| SamplerError::ProcReadError {
            path: path.display().to_string(),
            source: e,
        })
}

/// Parse one whitespace-separated column as a counter.
pub(crate) fn parse_u64(raw: &str, path: &Path, field: &str) -> Result<u64, SamplerError> {
    raw.parse::<u64>().map_err(|_| SamplerError::ParseError {
        path: path.display().to_string(),
        field: field.into(),
        raw: raw.to_string(),
    })
}
