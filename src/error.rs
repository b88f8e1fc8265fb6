use std::path::PathBuf;
use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `chorewarden`.
///
/// Each collaborator defines its own error variant. The decision engine
/// matches on these to pick a fail-safe path; the orchestrator uses
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum WardenError {
    // ── Config ──────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Task oracle (Todoist) ───────────────────────────────────────────
    #[error("todoist: {0}")]
    Oracle(#[from] OracleError),

    // ── Rule actuator (Sophos) ─────────────────────────────────────────
    #[error("sophos: {0}")]
    Firewall(#[from] FirewallError),

    // ── State persistence ───────────────────────────────────────────────
    #[error("state: {0}")]
    State(#[from] StateError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(String),

    #[error("invalid value for {var}: {message}")]
    Invalid { var: String, message: String },

    #[error("unknown timezone '{0}'")]
    UnknownTimezone(String),
}

// ─── Task oracle errors ─────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("todoist configuration: {0}")]
    Configuration(String),

    /// API or transport failure that persisted through the retry budget.
    #[error("todoist api failed after {attempts} attempts: {message}")]
    Api { attempts: u32, message: String },

    /// Malformed input or internal processing fault. Not retried.
    #[error("todoist client: {0}")]
    Client(String),
}

// ─── Rule actuator errors ───────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum FirewallError {
    #[error("sophos configuration: {0}")]
    Configuration(String),

    #[error("sophos connection to {endpoint} failed: {message}")]
    Connection { endpoint: String, message: String },

    #[error("sophos api: {message}")]
    Api { message: String },

    #[error("firewall rule '{0}' not found")]
    RuleNotFound(String),
}

// ─── State persistence errors ───────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to write state file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),
}

// ─── Scheduled-time parse errors ────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ScheduleTimeError {
    #[error("scheduled time '{0}' is not in HH:MM format")]
    Format(String),

    #[error("hour {0} out of range 0-23")]
    HourRange(u32),

    #[error("minute {0} out of range 0-59")]
    MinuteRange(u32),
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, WardenError>;
