//! Suspend/resume driver for hosts that re-enter the caller with a decision.
//!
//! Where the engine would poll, the adapter hands a [`SuspendPayload`] to the
//! host's [`Suspender`] and continues with whatever [`ResumePayload`] comes
//! back. There is no polling in this mode. Revised arguments are computed
//! by whoever produces the resume payload, not by a callback here.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use dhara_config::ApprovalSection;
use dhara_telemetry::RequestContext;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{Instrument, info, warn};

use crate::context::ToolContext;
use crate::error::{HilError, HilResult};
use crate::gateway::DecisionGateway;
use crate::types::{
    AUTO_DENIED_REASON, ApprovalOutcome, Decision, NegotiationState, ProposalUpdate,
    RequestStatus, Verdict,
};

/// What the caller is suspended waiting for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SuspendPayload {
    /// A freshly registered call needs a human decision.
    ApprovalRequired {
        /// Request id.
        request_id: String,
        /// Gated tool.
        tool_name: String,
        /// Context the call was registered with.
        context: ToolContext,
        /// Gateway expiry, if any.
        expires_at: Option<String>,
    },
    /// A reviewer asked for changes; new arguments are needed.
    RevisionRequested {
        /// Request id.
        request_id: String,
        /// Gated tool.
        tool_name: String,
        /// Reviewer instruction.
        revise_input: String,
        /// Structured patch, possibly empty.
        revise_patch: Map<String, Value>,
        /// Arguments the instruction applies to.
        current_args: Map<String, Value>,
        /// Current version.
        version: u64,
    },
    /// A revised proposal was submitted and awaits a decision.
    RevisedProposalPending {
        /// Request id.
        request_id: String,
        /// Gated tool.
        tool_name: String,
        /// Version of the submitted proposal.
        version: u64,
        /// Submitted arguments.
        current_args: Map<String, Value>,
    },
}

impl SuspendPayload {
    /// Request id being waited on.
    #[must_use]
    pub fn request_id(&self) -> &str {
        match self {
            Self::ApprovalRequired { request_id, .. }
            | Self::RevisionRequested { request_id, .. }
            | Self::RevisedProposalPending { request_id, .. } => request_id,
        }
    }

    /// The `type` tag.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ApprovalRequired { .. } => "approval_required",
            Self::RevisionRequested { .. } => "revision_requested",
            Self::RevisedProposalPending { .. } => "revised_proposal_pending",
        }
    }
}

/// Decision handed back by the host when it resumes the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumePayload {
    /// `approve`, `reject` or `revise`.
    pub decision: Decision,
    /// Reviewer note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Replacement arguments. On approve these override the current ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_args: Option<Map<String, Value>>,
    /// Revision instruction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revise_input: Option<String>,
    /// Structured revision patch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revise_patch: Option<Map<String, Value>>,
}

impl ResumePayload {
    fn with_decision(decision: Decision) -> Self {
        Self {
            decision,
            note: None,
            updated_args: None,
            revise_input: None,
            revise_patch: None,
        }
    }

    /// An approval.
    #[must_use]
    pub fn approve() -> Self {
        Self::with_decision(Decision::Approve)
    }

    /// A rejection with a note.
    #[must_use]
    pub fn reject(note: impl Into<String>) -> Self {
        Self {
            note: Some(note.into()),
            ..Self::with_decision(Decision::Reject)
        }
    }

    /// A revision request with an instruction.
    #[must_use]
    pub fn revise(instruction: impl Into<String>) -> Self {
        Self {
            revise_input: Some(instruction.into()),
            ..Self::with_decision(Decision::Revise)
        }
    }

    /// Attach replacement arguments.
    #[must_use]
    pub fn with_updated_args(mut self, args: Map<String, Value>) -> Self {
        self.updated_args = Some(args);
        self
    }

    /// Attach a structured patch.
    #[must_use]
    pub fn with_patch(mut self, patch: Map<String, Value>) -> Self {
        self.revise_patch = Some(patch);
        self
    }
}

/// Host-controlled continuation primitive.
///
/// `suspend` returns once the host re-enters the caller with a decision.
#[async_trait]
pub trait Suspender: Send + Sync {
    /// Suspend the caller with `payload` and return the resume value.
    async fn suspend(&self, payload: SuspendPayload) -> HilResult<ResumePayload>;
}

/// Drives an approval flow by suspending the caller at each decision point.
pub struct SuspendResumeAdapter {
    gateway: Arc<dyn DecisionGateway>,
    suspender: Arc<dyn Suspender>,
    default_risk_level: String,
}

impl SuspendResumeAdapter {
    /// Create an adapter.
    #[must_use]
    pub fn new(gateway: Arc<dyn DecisionGateway>, suspender: Arc<dyn Suspender>) -> Self {
        Self {
            gateway,
            suspender,
            default_risk_level: "MEDIUM".to_owned(),
        }
    }

    /// Create an adapter using the `[approval]` config section.
    #[must_use]
    pub fn from_config(
        gateway: Arc<dyn DecisionGateway>,
        suspender: Arc<dyn Suspender>,
        section: &ApprovalSection,
    ) -> Self {
        Self::new(gateway, suspender).with_default_risk_level(section.default_risk_level.as_str())
    }

    /// Risk level registered and proposed when the context has none.
    #[must_use]
    pub fn with_default_risk_level(mut self, risk_level: impl Into<String>) -> Self {
        self.default_risk_level = risk_level.into();
        self
    }

    /// Resolve a tool call to a terminal outcome.
    ///
    /// # Errors
    ///
    /// Returns gateway errors, suspend failures, and
    /// [`HilError::InvalidDecision`] for an unrecognized resume decision.
    pub async fn resolve(
        &self,
        tool_name: &str,
        args: Map<String, Value>,
        context: &ToolContext,
    ) -> HilResult<ApprovalOutcome> {
        let mut flow = RequestContext::new("adapter")
            .with_operation("resolve")
            .with_tool(tool_name);
        let span = flow.span();
        let result = self
            .resolve_inner(&mut flow, &span, tool_name, args, context)
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

    async fn resolve_inner(
        &self,
        flow: &mut RequestContext,
        span: &tracing::Span,
        tool_name: &str,
        args: Map<String, Value>,
        context: &ToolContext,
    ) -> HilResult<ApprovalOutcome> {
        let context = &context.with_resolved_risk_level(&self.default_risk_level);
        let (request_id, expires_at) = match self.gateway.evaluate(tool_name, &args, context).await? {
            Verdict::Allow { .. } => return Ok(ApprovalOutcome::Allow { tool_args: args }),
            Verdict::Deny { reason } => return Ok(ApprovalOutcome::Deny { reason }),
            Verdict::RequireApproval {
                request_id,
                expires_at,
            } => (request_id, expires_at),
        };
        flow.record_request_id(span, &request_id);

        let mut payload = SuspendPayload::ApprovalRequired {
            request_id: request_id.clone(),
            tool_name: tool_name.to_owned(),
            context: context.clone(),
            expires_at,
        };
        let mut state = NegotiationState::new(request_id, args);

        loop {
            info!(kind = payload.kind(), "suspending for decision");
            let resume = self.suspender.suspend(payload).await?;

            match resume.decision {
                Decision::Approve => {
                    return Ok(ApprovalOutcome::Approved {
                        request_id: state.request_id,
                        tool_args: resume.updated_args.unwrap_or(state.current_args),
                        version: state.current_version,
                    });
                },
                Decision::Reject => {
                    return Ok(ApprovalOutcome::Rejected {
                        request_id: state.request_id,
                        note: resume.note.unwrap_or_default(),
                        version: state.current_version,
                    });
                },
                Decision::Revise => {},
                Decision::Other(other) => {
                    warn!(decision = %other, "unrecognized resume decision");
                    return Err(HilError::InvalidDecision(format!(
                        "unrecognized decision {other:?}"
                    )));
                },
            }

            let Some(updated_args) = resume.updated_args else {
                payload = SuspendPayload::RevisionRequested {
                    request_id: state.request_id.clone(),
                    tool_name: tool_name.to_owned(),
                    revise_input: resume.revise_input.unwrap_or_default(),
                    revise_patch: resume.revise_patch.unwrap_or_default(),
                    current_args: state.current_args.clone(),
                    version: state.current_version,
                };
                continue;
            };

            state.current_args = updated_args;
            let update = ProposalUpdate::from_context(
                state.current_version,
                tool_name,
                state.current_args.clone(),
                context,
                &self.default_risk_level,
            );
            let response = self
                .gateway
                .submit_proposal(&state.request_id, &update)
                .await?;
            let previous = state.current_version;
            state.adopt_version(response.version);
            info!(
                version_from = previous,
                version = state.current_version,
                "proposal accepted"
            );

            match response.status {
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
                _ => {},
            }

            payload = SuspendPayload::RevisedProposalPending {
                request_id: state.request_id.clone(),
                tool_name: tool_name.to_owned(),
                version: state.current_version,
                current_args: state.current_args.clone(),
            };
        }
    }

    /// Gate `tool` behind the approval flow and run it with the final
    /// arguments when permitted.
    ///
    /// # Errors
    ///
    /// Returns [`HilError::Denied`], [`HilError::Rejected`] or
    /// [`HilError::AutoDenied`] when the call is refused, plus any error
    /// from [`Self::resolve`].
    pub async fn guard<F, Fut, T>(
        &self,
        tool_name: &str,
        args: Map<String, Value>,
        context: &ToolContext,
        tool: F,
    ) -> HilResult<T>
    where
        F: FnOnce(Map<String, Value>) -> Fut,
        Fut: Future<Output = T>,
    {
        let tool_name_owned = tool_name.to_owned();
        match self.resolve(tool_name, args, context).await? {
            ApprovalOutcome::Allow { tool_args }
            | ApprovalOutcome::Approved { tool_args, .. }
            | ApprovalOutcome::AutoAllowed { tool_args, .. } => Ok(tool(tool_args).await),
            ApprovalOutcome::Deny { reason } => Err(HilError::Denied {
                tool: tool_name_owned,
                reason,
            }),
            ApprovalOutcome::Rejected { note, .. } => Err(HilError::Rejected {
                tool: tool_name_owned,
                note,
            }),
            ApprovalOutcome::AutoDenied { .. } => Err(HilError::AutoDenied {
                tool: tool_name_owned,
            }),
            other => Err(HilError::InvalidDecision(format!(
                "unexpected outcome {}",
                other.tag()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn suspend_payload_is_tagged_by_type() {
        let payload = SuspendPayload::RevisedProposalPending {
            request_id: "req-1".to_owned(),
            tool_name: "send_email".to_owned(),
            version: 2,
            current_args: Map::new(),
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["type"], "revised_proposal_pending");
        assert_eq!(value["version"], 2);
        assert_eq!(payload.kind(), "revised_proposal_pending");
        assert_eq!(payload.request_id(), "req-1");
    }

    #[test]
    fn approval_required_carries_context_and_expiry() {
        let payload = SuspendPayload::ApprovalRequired {
            request_id: "req-1".to_owned(),
            tool_name: "send_email".to_owned(),
            context: ToolContext::new("bot", "r1"),
            expires_at: Some("2026-02-22T15:00:00Z".to_owned()),
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["type"], "approval_required");
        assert_eq!(value["expires_at"], "2026-02-22T15:00:00Z");
        assert_eq!(value["context"]["agent_id"], "bot");
    }

    #[test]
    fn resume_payload_parses_host_json() {
        let resume: ResumePayload = serde_json::from_value(json!({
            "decision": "revise",
            "revise_input": "Send to alice instead",
            "updated_args": {"to": "alice@example.com"},
        }))
        .unwrap();
        assert_eq!(resume.decision, Decision::Revise);
        assert_eq!(resume.revise_input.as_deref(), Some("Send to alice instead"));
        assert_eq!(resume.updated_args.unwrap()["to"], "alice@example.com");
        assert!(resume.revise_patch.is_none());
    }

    #[test]
    fn resume_payload_keeps_unknown_decision() {
        let resume: ResumePayload = serde_json::from_value(json!({"decision": "maybe"})).unwrap();
        assert_eq!(resume.decision, Decision::Other("maybe".to_owned()));
    }

    #[test]
    fn resume_constructors() {
        let reject = ResumePayload::reject("not appropriate");
        assert_eq!(reject.decision, Decision::Reject);
        assert_eq!(reject.note.as_deref(), Some("not appropriate"));

        let revise = ResumePayload::revise("shorter").with_patch(Map::new());
        assert_eq!(revise.decision, Decision::Revise);
        assert!(revise.revise_patch.is_some());
    }
}
