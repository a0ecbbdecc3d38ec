//! Polling approval engine.
//!
//! The engine drives one tool call from registration to a terminal outcome:
//!
//! ```text
//! register ──► Allow / Deny ───────────────────────────────► outcome
//!    │
//!    └─► RequireApproval ─► wait ─► approve / reject / auto / expired ─► outcome
//!                            ▲   │
//!                            │   └─► revise ─► callback ─► submit proposal
//!                            │                                 │
//!                            └──────── version += 1 ◄──────────┘
//! ```
//!
//! Once a revision has been accepted, a snapshot that is still `PENDING` or
//! `REVISE_REQUESTED` at or after the submitted version carries a decision
//! from the previous round and is skipped.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dhara_config::ApprovalSection;
use dhara_telemetry::RequestContext;
use serde_json::{Map, Value};
use tokio::time::Instant;
use tracing::{Instrument, debug, info, warn};

use crate::context::ToolContext;
use crate::error::{BoxError, HilError, HilResult};
use crate::gateway::DecisionGateway;
use crate::timeout::{TimeoutPolicy, effective_timeout};
use crate::types::{
    AUTO_DENIED_REASON, ApprovalOutcome, Decision, NegotiationState, ProposalUpdate,
    RequestSnapshot, RequestStatus, Verdict,
};

/// Computes new arguments from a reviewer's revision instruction.
#[async_trait]
pub trait Reviser: Send + Sync {
    /// Return replacement arguments.
    ///
    /// `patch` is whatever structured patch the gateway supplied; it is
    /// empty when the gateway only returned free text.
    async fn revise(
        &self,
        current_args: &Map<String, Value>,
        instruction: &str,
        patch: &Map<String, Value>,
    ) -> Result<Map<String, Value>, BoxError>;
}

/// A [`Reviser`] backed by an async closure.
pub struct FnReviser<F>(F);

/// Wrap an async closure as a [`Reviser`].
///
/// ```rust
/// use dhara_hil::reviser_fn;
/// use serde_json::{Map, Value};
///
/// let reviser = reviser_fn(|mut args: Map<String, Value>, instruction: String, _patch| async move {
///     args.insert("note".to_owned(), Value::String(instruction));
///     Ok::<_, dhara_hil::BoxError>(args)
/// });
/// # let _ = reviser;
/// ```
pub fn reviser_fn<F, Fut>(f: F) -> FnReviser<F>
where
    F: Fn(Map<String, Value>, String, Map<String, Value>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Map<String, Value>, BoxError>> + Send,
{
    FnReviser(f)
}

#[async_trait]
impl<F, Fut> Reviser for FnReviser<F>
where
    F: Fn(Map<String, Value>, String, Map<String, Value>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Map<String, Value>, BoxError>> + Send,
{
    async fn revise(
        &self,
        current_args: &Map<String, Value>,
        instruction: &str,
        patch: &Map<String, Value>,
    ) -> Result<Map<String, Value>, BoxError> {
        (self.0)(current_args.clone(), instruction.to_owned(), patch.clone()).await
    }
}

/// Engine tuning.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Fixed delay between status fetches.
    pub poll_interval: Duration,
    /// Explicit per-round timeout; overrides any expiry when set.
    pub timeout: Option<Duration>,
    /// Bounds for expiry-derived timeouts.
    pub policy: TimeoutPolicy,
    /// Risk level registered and proposed when the context has none.
    pub default_risk_level: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            timeout: None,
            policy: TimeoutPolicy::default(),
            default_risk_level: "MEDIUM".to_owned(),
        }
    }
}

impl EngineSettings {
    /// Build from the `[approval]` config section.
    #[must_use]
    pub fn from_config(section: &ApprovalSection) -> Self {
        Self {
            poll_interval: Duration::from_millis(section.poll_interval_ms),
            timeout: None,
            policy: TimeoutPolicy::from_config(section),
            default_risk_level: section.default_risk_level.clone(),
        }
    }

    /// Set the poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set an explicit timeout for every wait round.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Parameters for a single [`ApprovalEngine::wait_for_decision`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WaitOptions {
    /// Explicit timeout; wins over `expires_at`.
    pub timeout: Option<Duration>,
    /// ISO-8601 expiry of the pending action.
    pub expires_at: Option<String>,
    /// Skip stale decisions reported at or after this version.
    pub after_version: Option<u64>,
}

impl WaitOptions {
    /// Set the explicit timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the expiry.
    #[must_use]
    pub fn with_expires_at(mut self, expires_at: impl Into<String>) -> Self {
        self.expires_at = Some(expires_at.into());
        self
    }

    /// Set the version filter.
    #[must_use]
    pub fn after_version(mut self, version: u64) -> Self {
        self.after_version = Some(version);
        self
    }
}

/// Whether `snapshot` carries a decision the caller has not acted on yet.
fn has_fresh_decision(snapshot: &RequestSnapshot, after_version: Option<u64>) -> bool {
    if snapshot.last_decision.is_none() {
        return false;
    }
    let Some(after) = after_version else {
        return true;
    };
    let still_on_previous_round = snapshot.is_waiting() && snapshot.version_or(1) >= after;
    !still_on_previous_round
}

/// Drives tool calls through registration, polling and revision rounds.
pub struct ApprovalEngine {
    gateway: Arc<dyn DecisionGateway>,
    settings: EngineSettings,
}

impl ApprovalEngine {
    /// Create an engine over `gateway`.
    #[must_use]
    pub fn new(gateway: Arc<dyn DecisionGateway>, settings: EngineSettings) -> Self {
        Self { gateway, settings }
    }

    /// Engine settings.
    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Poll until a decision is present, the request leaves the waiting
    /// states, or the deadline passes.
    ///
    /// The settings' explicit timeout applies when `options` has none.
    ///
    /// # Errors
    ///
    /// Returns [`HilError::DeadlineExceeded`] when the deadline passes, or
    /// any error from the status fetch.
    pub async fn wait_for_decision(
        &self,
        request_id: &str,
        options: &WaitOptions,
    ) -> HilResult<RequestSnapshot> {
        let timeout = effective_timeout(
            options.timeout.or(self.settings.timeout),
            options.expires_at.as_deref(),
            Utc::now(),
            &self.settings.policy,
        );
        let started = Instant::now();
        debug!(
            request_id,
            timeout_secs = timeout.as_secs(),
            after_version = options.after_version,
            "waiting for decision"
        );

        while started.elapsed() < timeout {
            let snapshot = self.gateway.fetch_status(request_id).await?;

            if has_fresh_decision(&snapshot, options.after_version) || !snapshot.is_waiting() {
                return Ok(snapshot);
            }

            if snapshot.last_decision.is_some() {
                debug!(
                    request_id,
                    version = snapshot.version,
                    status = %snapshot.status_label(),
                    "skipping decision from a previous round"
                );
            } else {
                debug!(request_id, status = %snapshot.status_label(), "no decision yet");
            }
            tokio::time::sleep(self.settings.poll_interval).await;
        }

        warn!(request_id, timeout_secs = timeout.as_secs(), "approval deadline exceeded");
        Err(HilError::DeadlineExceeded {
            request_id: request_id.to_owned(),
            timeout_secs: timeout.as_secs(),
        })
    }

    /// Run the full approval lifecycle for one tool call.
    ///
    /// Without a `reviser`, a revision request ends the run with
    /// [`ApprovalOutcome::RevisionRequested`].
    ///
    /// # Errors
    ///
    /// Returns gateway errors, [`HilError::DeadlineExceeded`] when a round
    /// times out, and [`HilError::Revision`] when the reviser fails.
    pub async fn run(
        &self,
        tool_name: &str,
        args: Map<String, Value>,
        context: &ToolContext,
        reviser: Option<&dyn Reviser>,
    ) -> HilResult<ApprovalOutcome> {
        let mut flow = RequestContext::new("engine")
            .with_operation("run")
            .with_tool(tool_name);
        let span = flow.span();
        let result = self
            .run_inner(&mut flow, &span, tool_name, args, context, reviser)
            .instrument(span.clone())
            .await;
        span.in_scope(|| match &result {
            Ok(outcome) => {
                info!(outcome = outcome.tag(), elapsed_ms = flow.elapsed_ms(), "flow completed");
            },
            Err(e) => warn!(error = %e, elapsed_ms = flow.elapsed_ms(), "flow failed"),
        });
        result
    }

    async fn run_inner(
        &self,
        flow: &mut RequestContext,
        span: &tracing::Span,
        tool_name: &str,
        args: Map<String, Value>,
        context: &ToolContext,
        reviser: Option<&dyn Reviser>,
    ) -> HilResult<ApprovalOutcome> {
        let context = &context.with_resolved_risk_level(&self.settings.default_risk_level);
        let (request_id, mut expires_at) =
            match self.gateway.evaluate(tool_name, &args, context).await? {
                Verdict::Allow { .. } => return Ok(ApprovalOutcome::Allow { tool_args: args }),
                Verdict::Deny { reason } => return Ok(ApprovalOutcome::Deny { reason }),
                Verdict::RequireApproval {
                    request_id,
                    expires_at,
                } => (request_id, expires_at),
            };
        flow.record_request_id(span, &request_id);

        let mut state = NegotiationState::new(request_id, args);

        loop {
            let options = WaitOptions {
                timeout: None,
                expires_at: expires_at.clone(),
                after_version: state.after_version(),
            };
            let snapshot = self.wait_for_decision(&state.request_id, &options).await?;
            let version = snapshot.version_or(state.current_version);

            if snapshot.has_decision(&Decision::Approve)
                || snapshot.has_status(&RequestStatus::Approved)
            {
                info!(version, "approved");
                return Ok(ApprovalOutcome::Approved {
                    request_id: state.request_id,
                    tool_args: state.current_args,
                    version,
                });
            }

            if snapshot.has_decision(&Decision::Reject)
                || snapshot.has_status(&RequestStatus::Rejected)
            {
                info!(version, "rejected");
                return Ok(ApprovalOutcome::Rejected {
                    request_id: state.request_id,
                    note: snapshot.last_decision_note.unwrap_or_default(),
                    version,
                });
            }

            match snapshot.status {
                Some(RequestStatus::AutoAllowed) => {
                    return Ok(ApprovalOutcome::AutoAllowed {
                        request_id: state.request_id,
                        tool_args: state.current_args,
                    });
                },
                Some(RequestStatus::AutoDenied) => {
                    return Ok(ApprovalOutcome::AutoDenied {
                        request_id: state.request_id,
                        reason: AUTO_DENIED_REASON.to_owned(),
                    });
                },
                Some(RequestStatus::Expired) => {
                    info!("request expired");
                    return Ok(ApprovalOutcome::Expired {
                        request_id: state.request_id,
                    });
                },
                _ => {},
            }

            if !(snapshot.has_decision(&Decision::Revise)
                || snapshot.has_status(&RequestStatus::ReviseRequested))
            {
                warn!(status = %snapshot.status_label(), "unrecognized request status");
                return Ok(ApprovalOutcome::Unknown {
                    status: snapshot.status_label(),
                    request_id: state.request_id,
                    raw: snapshot,
                });
            }

            let instruction = snapshot.last_decision_revise_input.unwrap_or_default();
            // Status reads never carry a structured patch.
            let patch = Map::new();

            let Some(reviser) = reviser else {
                info!(version = state.current_version, "revision requested, no reviser configured");
                return Ok(ApprovalOutcome::RevisionRequested {
                    request_id: state.request_id,
                    revise_input: instruction,
                    current_args: state.current_args,
                    version: state.current_version,
                });
            };

            state.current_args = reviser
                .revise(&state.current_args, &instruction, &patch)
                .await
                .map_err(HilError::Revision)?;

            let update = ProposalUpdate::from_context(
                state.current_version,
                tool_name,
                state.current_args.clone(),
                context,
                &self.settings.default_risk_level,
            );
            let response = self
                .gateway
                .submit_proposal(&state.request_id, &update)
                .await?;

            let previous = state.current_version;
            state.adopt_version(response.version);
            if state.current_version <= previous {
                warn!(
                    previous,
                    reported = state.current_version,
                    "proposal accepted without a version increase"
                );
            }
            info!(
                version_from = previous,
                version = state.current_version,
                "proposal accepted"
            );
            if response.expires_at.is_some() {
                expires_at = response.expires_at;
            }

            match response.status {
                Some(RequestStatus::AutoAllowed) => {
                    info!("revised proposal auto-allowed by policy");
                    return Ok(ApprovalOutcome::AutoAllowed {
                        request_id: state.request_id,
                        tool_args: state.current_args,
                    });
                },
                Some(RequestStatus::AutoDenied) => {
                    info!("revised proposal auto-denied by policy");
                    return Ok(ApprovalOutcome::AutoDenied {
                        request_id: state.request_id,
                        reason: AUTO_DENIED_REASON.to_owned(),
                    });
                },
                _ => {},
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(value: Value) -> RequestSnapshot {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn no_decision_is_never_fresh() {
        let s = snapshot(json!({"status": "PENDING", "version": 1}));
        assert!(!has_fresh_decision(&s, None));
        assert!(!has_fresh_decision(&s, Some(2)));
    }

    #[test]
    fn any_decision_is_fresh_without_version_filter() {
        let s = snapshot(json!({"status": "REVISE_REQUESTED", "version": 5, "last_decision": "revise"}));
        assert!(has_fresh_decision(&s, None));
    }

    #[test]
    fn waiting_snapshot_at_submitted_version_is_stale() {
        let revise = snapshot(json!({"status": "REVISE_REQUESTED", "version": 2, "last_decision": "revise"}));
        let pending = snapshot(json!({"status": "PENDING", "version": 3, "last_decision": "revise"}));
        assert!(!has_fresh_decision(&revise, Some(2)));
        assert!(!has_fresh_decision(&pending, Some(2)));
    }

    #[test]
    fn older_version_or_resolved_status_is_fresh() {
        let older = snapshot(json!({"status": "REVISE_REQUESTED", "version": 1, "last_decision": "revise"}));
        let approved = snapshot(json!({"status": "APPROVED", "version": 2, "last_decision": "approve"}));
        assert!(has_fresh_decision(&older, Some(2)));
        assert!(has_fresh_decision(&approved, Some(2)));
    }

    #[test]
    fn settings_from_config() {
        let section = ApprovalSection {
            poll_interval_ms: 250,
            default_risk_level: "LOW".to_owned(),
            ..ApprovalSection::default()
        };
        let settings = EngineSettings::from_config(&section);
        assert_eq!(settings.poll_interval, Duration::from_millis(250));
        assert_eq!(settings.default_risk_level, "LOW");
        assert_eq!(settings.policy.default, Duration::from_secs(600));
        assert!(settings.timeout.is_none());
    }

    #[tokio::test]
    async fn closure_reviser_receives_instruction() {
        let reviser = reviser_fn(|mut args: Map<String, Value>, instruction: String, patch: Map<String, Value>| async move {
            assert!(patch.is_empty());
            args.insert("instruction".to_owned(), Value::String(instruction));
            Ok::<_, BoxError>(args)
        });
        let out = reviser
            .revise(&Map::new(), "be polite", &Map::new())
            .await
            .unwrap();
        assert_eq!(out["instruction"], "be polite");
    }
}
