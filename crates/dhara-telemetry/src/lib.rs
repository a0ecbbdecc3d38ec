//! Dhara Telemetry - Logging and correlation spans for the DharaHIL client.
//!
//! This crate provides:
//! - Configurable logging setup with multiple formats and targets
//! - A correlation context that ties every log line of one approval flow
//!   to the same span
//!
//! # Example
//!
//! ```rust,no_run
//! use dhara_telemetry::{LogConfig, LogFormat, RequestContext, setup_logging};
//!
//! # fn main() -> Result<(), dhara_telemetry::TelemetryError> {
//! let config = LogConfig::new("info")
//!     .with_format(LogFormat::Compact)
//!     .with_directive("dhara_hil=debug");
//! setup_logging(&config)?;
//!
//! let ctx = RequestContext::new("engine").with_tool("send_email");
//! let _guard = ctx.span().entered();
//! tracing::info!("registering action");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod context;
mod error;
mod logging;

pub use context::RequestContext;
pub use error::{TelemetryError, TelemetryResult};
pub use logging::{
    FileRotation, LogConfig, LogFormat, LogTarget, setup_default_logging, setup_logging,
};
