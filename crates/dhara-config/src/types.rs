//! Configuration types for the DharaHIL client.
//!
//! These types carry no dependency on `dhara-hil`; the client and engine
//! convert from them at construction time. Every struct implements
//! [`Default`] so that a bare `[section]` header in TOML produces a working
//! configuration.

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where the approval gateway lives and who we are to it.
    pub gateway: GatewaySection,
    /// Polling cadence and deadline defaults for the approval loop.
    pub approval: ApprovalSection,
    /// Logging level, format, and per-crate directives.
    pub logging: LoggingSection,
}

// ---------------------------------------------------------------------------
// GatewaySection
// ---------------------------------------------------------------------------

/// Gateway endpoint and tenant identity.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct GatewaySection {
    /// Base URL of the gateway, without a trailing `/v1`.
    pub base_url: String,
    /// API key sent as `X-DHARA-API-KEY`. Prefer `DHARA_API_KEY` over
    /// storing this in a file.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Tenant the requests are filed under.
    pub tenant_id: String,
    /// Application identifier within the tenant.
    pub app_id: String,
    /// Deployment environment label (`dev`, `staging`, `prod`, ...).
    pub environment: String,
    /// Per-request HTTP timeout in seconds.
    pub request_timeout_secs: u64,
}

impl std::fmt::Debug for GatewaySection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewaySection")
            .field("base_url", &self.base_url)
            .field("has_api_key", &self.api_key.is_some())
            .field("tenant_id", &self.tenant_id)
            .field("app_id", &self.app_id)
            .field("environment", &self.environment)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl Serialize for GatewaySection {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("GatewaySection", 5)?;
        state.serialize_field("base_url", &self.base_url)?;
        // api_key is intentionally omitted.
        state.serialize_field("tenant_id", &self.tenant_id)?;
        state.serialize_field("app_id", &self.app_id)?;
        state.serialize_field("environment", &self.environment)?;
        state.serialize_field("request_timeout_secs", &self.request_timeout_secs)?;
        state.end()
    }
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:4990".to_owned(),
            api_key: None,
            tenant_id: String::new(),
            app_id: String::new(),
            environment: "dev".to_owned(),
            request_timeout_secs: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// ApprovalSection
// ---------------------------------------------------------------------------

/// Approval loop tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalSection {
    /// Fixed delay between status fetches, in milliseconds.
    pub poll_interval_ms: u64,
    /// Deadline used when neither an explicit timeout nor `expires_at` is known.
    pub default_timeout_secs: u64,
    /// Floor for a deadline derived from `expires_at`.
    pub min_timeout_secs: u64,
    /// Added to a derived deadline to tolerate clock skew with the gateway.
    pub clock_skew_margin_secs: u64,
    /// Risk level sent when the caller's context does not specify one.
    pub default_risk_level: String,
}

impl Default for ApprovalSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
            default_timeout_secs: 600,
            min_timeout_secs: 10,
            clock_skew_margin_secs: 5,
            default_risk_level: "MEDIUM".to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// LoggingSection
// ---------------------------------------------------------------------------

/// Logging configuration mirrored from `dhara-telemetry`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Level filter (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
    /// Output format.
    pub format: LogFormat,
    /// Extra `tracing` directives such as `dhara_hil=debug`.
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: LogFormat::default(),
            directives: Vec::new(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// Single-line output.
    Compact,
    /// Structured JSON lines.
    Json,
    /// The default `tracing-subscriber` full format.
    Full,
}
