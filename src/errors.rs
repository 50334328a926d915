use thiserror::Error;

// typed errors per failure domain for easy testability

/// Counter source could not be read or understood. Always fatal.
#[derive(Error, Debug)]
pub enum SamplerError {
    #[error("failed to read {path}: {source}")]
    ProcReadError {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse {field} from {path}: {raw}")]
    ParseError {
        path: String,
        field: String,
        raw: String,
    },

    #[error("{call} failed on {path}: {source}")]
    SyscallError {
        call: &'static str,
        path: String,
        source: nix::Error,
    },
}

/// Rejected at startup, before any family task is spawned.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("could not parse duration for {param}: {raw:?}")]
    InvalidDuration { param: &'static str, raw: String },

    #[error("--ping-count must be at least 1, got {0}")]
    InvalidPingCount(u32),
}

/// One host failed one probe round. Reported, never fatal.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("failed to run ping: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("no pings completed")]
    NoReplies,

    #[error("ping failed: {0}")]
    Failed(String),

    #[error("unexpected ping output: {0}")]
    UnparsableOutput(String),
}

/// A family task hit a sampler error and the agent must stop.
#[derive(Error, Debug)]
#[error("{family} sampler failed: {source}")]
pub struct FatalError {
    pub family: &'static str,
    #[source]
    pub source: SamplerError,
}
