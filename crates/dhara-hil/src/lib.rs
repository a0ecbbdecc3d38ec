//! Dhara HIL - Human-in-the-loop approval client for agent tool calls.
//!
//! Before an agent runs a risky tool, this crate registers the call with a
//! remote approval gateway and waits for the verdict. When a reviewer asks
//! for changes instead of a yes/no, it negotiates revised proposals until a
//! terminal outcome is reached.
//!
//! # Components
//!
//! - [`redaction`]: masks secret-looking argument values before they leave
//!   the process
//! - [`GatewayClient`]: register, fetch status, submit proposal over HTTP
//! - [`ApprovalEngine`]: the polling approval/revision loop
//! - [`SuspendResumeAdapter`]: the same transitions, driven by a host that
//!   suspends and re-enters the caller
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use dhara_hil::{ApprovalEngine, EngineSettings, GatewayClient, ToolContext};
//! use serde_json::{Map, Value, json};
//!
//! # async fn example() -> Result<(), dhara_hil::HilError> {
//! let client = GatewayClient::new("https://hil.example.com")?
//!     .with_api_key("key")
//!     .with_tenant("acme", "support-bot");
//! let engine = ApprovalEngine::new(Arc::new(client), EngineSettings::default());
//!
//! let mut args = Map::new();
//! args.insert("to".to_owned(), json!("bob@example.com"));
//! let ctx = ToolContext::new("support-bot", "run-42").with_risk_level("HIGH");
//!
//! let outcome = engine.run("send_email", args, &ctx, None).await?;
//! if let Some(args) = outcome.approved_args() {
//!     println!("running with {}", Value::Object(args.clone()));
//! }
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

pub mod adapter;
pub mod client;
pub mod context;
pub mod engine;
/// Error types and results for the approval client.
pub mod error;
pub mod gateway;
pub mod redaction;
pub mod timeout;
pub mod types;

pub use adapter::{ResumePayload, SuspendPayload, SuspendResumeAdapter, Suspender};
pub use client::{API_KEY_HEADER, GatewayClient};
pub use context::{DisplayHints, ToolContext};
pub use engine::{ApprovalEngine, EngineSettings, FnReviser, Reviser, WaitOptions, reviser_fn};
pub use error::{BoxError, HilError, HilResult};
pub use gateway::{DecisionGateway, ToolInterceptor};
pub use redaction::{MASK, RedactedField, RedactionReason, RedactionReport, redact};
pub use timeout::{TimeoutPolicy, effective_timeout};
pub use types::{
    AUTO_DENIED_REASON, ApprovalOutcome, Decision, NegotiationState, ProposalUpdate,
    RequestSnapshot, RequestStatus, Verdict,
};
