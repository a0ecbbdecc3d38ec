//! Wire and outcome types shared by the engine and the adapter.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::context::ToolContext;
use crate::redaction::redacted;

/// Immediate result of registering a tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Policy allows the call outright.
    Allow {
        /// Reason reported by the gateway, if any.
        reason: Option<String>,
    },
    /// Policy denies the call outright.
    Deny {
        /// Reason reported by the gateway.
        reason: String,
    },
    /// A human must decide.
    RequireApproval {
        /// Gateway-assigned request id.
        request_id: String,
        /// ISO-8601 expiry, if the gateway sent one.
        expires_at: Option<String>,
    },
}

impl Verdict {
    /// The pending request id, for `RequireApproval`.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Self::RequireApproval { request_id, .. } => Some(request_id),
            _ => None,
        }
    }
}

/// Status of a pending action as reported by the gateway.
///
/// Unknown strings are kept in [`RequestStatus::Other`] so that new gateway
/// states surface to callers instead of being dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RequestStatus {
    /// Waiting for a reviewer.
    Pending,
    /// A reviewer asked for changes.
    ReviseRequested,
    /// A reviewer approved.
    Approved,
    /// A reviewer rejected.
    Rejected,
    /// Policy allowed a revised proposal.
    AutoAllowed,
    /// Policy denied a revised proposal.
    AutoDenied,
    /// The request expired.
    Expired,
    /// Any other status string.
    Other(String),
}

impl RequestStatus {
    /// Wire representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "PENDING",
            Self::ReviseRequested => "REVISE_REQUESTED",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::AutoAllowed => "AUTO_ALLOWED",
            Self::AutoDenied => "AUTO_DENIED",
            Self::Expired => "EXPIRED",
            Self::Other(s) => s,
        }
    }

    /// Whether the gateway is still waiting on a reviewer.
    #[must_use]
    pub fn is_waiting(&self) -> bool {
        matches!(self, Self::Pending | Self::ReviseRequested)
    }

    /// Whether no further transition can occur.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Approved | Self::Rejected | Self::AutoAllowed | Self::AutoDenied | Self::Expired
        )
    }
}

impl From<String> for RequestStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "PENDING" => Self::Pending,
            "REVISE_REQUESTED" => Self::ReviseRequested,
            "APPROVED" => Self::Approved,
            "REJECTED" => Self::Rejected,
            "AUTO_ALLOWED" => Self::AutoAllowed,
            "AUTO_DENIED" => Self::AutoDenied,
            "EXPIRED" => Self::Expired,
            _ => Self::Other(s),
        }
    }
}

impl From<RequestStatus> for String {
    fn from(status: RequestStatus) -> Self {
        match status {
            RequestStatus::Other(s) => s,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reviewer's decision, as recorded by the gateway or handed to the
/// adapter on resume.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Decision {
    /// Go ahead.
    Approve,
    /// Do not run the tool.
    Reject,
    /// Change the arguments and resubmit.
    Revise,
    /// Any other decision string.
    Other(String),
}

impl Decision {
    /// Wire representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Revise => "revise",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for Decision {
    fn from(s: String) -> Self {
        match s.as_str() {
            "approve" => Self::Approve,
            "reject" => Self::Reject,
            "revise" => Self::Revise,
            _ => Self::Other(s),
        }
    }
}

impl From<Decision> for String {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Other(s) => s,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a pending action returned by status fetches and proposal
/// submissions.
///
/// Fields the client does not model are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestSnapshot {
    /// Request id, when echoed by the gateway.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Current status.
    #[serde(default)]
    pub status: Option<RequestStatus>,
    /// Current version.
    #[serde(default)]
    pub version: Option<u64>,
    /// Most recent reviewer decision.
    #[serde(default)]
    pub last_decision: Option<Decision>,
    /// Note attached to the most recent decision.
    #[serde(default)]
    pub last_decision_note: Option<String>,
    /// Revision instruction attached to the most recent decision.
    #[serde(default)]
    pub last_decision_revise_input: Option<String>,
    /// Expiry of the current round, if reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    /// Unmodelled fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RequestSnapshot {
    /// Whether the gateway is still waiting on a reviewer.
    ///
    /// A snapshot without a status counts as not waiting.
    #[must_use]
    pub fn is_waiting(&self) -> bool {
        self.status.as_ref().is_some_and(RequestStatus::is_waiting)
    }

    /// Whether the status equals `status`.
    #[must_use]
    pub fn has_status(&self, status: &RequestStatus) -> bool {
        self.status.as_ref() == Some(status)
    }

    /// Whether the last decision equals `decision`.
    #[must_use]
    pub fn has_decision(&self, decision: &Decision) -> bool {
        self.last_decision.as_ref() == Some(decision)
    }

    /// Reported version, or `fallback` when absent.
    #[must_use]
    pub fn version_or(&self, fallback: u64) -> u64 {
        self.version.unwrap_or(fallback)
    }

    /// Status string, or `UNKNOWN` when absent or empty.
    #[must_use]
    pub fn status_label(&self) -> String {
        match &self.status {
            Some(status) if !status.as_str().is_empty() => status.as_str().to_owned(),
            _ => "UNKNOWN".to_owned(),
        }
    }
}

/// Replacement action description submitted after a revision.
///
/// `display_hints` is omitted from the body entirely when `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalUpdate {
    /// The version the client believes is current.
    pub version_from: u64,
    /// Tool name.
    pub updated_tool_name: String,
    /// Full arguments.
    pub updated_tool_args: Map<String, Value>,
    /// Masked arguments.
    pub updated_tool_args_redacted: Map<String, Value>,
    /// Context summary.
    pub updated_context_summary: String,
    /// Risk level.
    pub updated_risk_level: String,
    /// Tags.
    pub tags: Vec<String>,
    /// Caller-supplied display hints, forwarded as given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_hints: Option<Value>,
}

impl ProposalUpdate {
    /// Create an update for `args`, computing the masked copy.
    #[must_use]
    pub fn new(version_from: u64, tool_name: impl Into<String>, args: Map<String, Value>) -> Self {
        let updated_tool_args_redacted = redacted(&args);
        Self {
            version_from,
            updated_tool_name: tool_name.into(),
            updated_tool_args: args,
            updated_tool_args_redacted,
            updated_context_summary: String::new(),
            updated_risk_level: "MEDIUM".to_owned(),
            tags: Vec::new(),
            display_hints: None,
        }
    }

    /// Create an update carrying summary, risk level, tags and display hints
    /// from `context`.
    #[must_use]
    pub fn from_context(
        version_from: u64,
        tool_name: &str,
        args: Map<String, Value>,
        context: &ToolContext,
        default_risk_level: &str,
    ) -> Self {
        let mut update = Self::new(version_from, tool_name, args)
            .with_context_summary(context.context_summary.clone())
            .with_risk_level(context.risk_level_or(default_risk_level))
            .with_tags(context.tags.clone());
        if let Some(display) = &context.display {
            update = update.with_display_hints(display.to_value());
        }
        update
    }

    /// Set the context summary.
    #[must_use]
    pub fn with_context_summary(mut self, summary: impl Into<String>) -> Self {
        self.updated_context_summary = summary.into();
        self
    }

    /// Set the risk level.
    #[must_use]
    pub fn with_risk_level(mut self, risk_level: impl Into<String>) -> Self {
        self.updated_risk_level = risk_level.into();
        self
    }

    /// Set the tags.
    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Attach display hints.
    #[must_use]
    pub fn with_display_hints(mut self, hints: Value) -> Self {
        self.display_hints = Some(hints);
        self
    }
}

/// Reason reported when policy auto-denies a revised proposal.
pub const AUTO_DENIED_REASON: &str = "Policy auto-denied the revised proposal";

/// Terminal result of an approval flow.
#[derive(Debug, Clone, PartialEq)]
pub enum ApprovalOutcome {
    /// Policy allowed the call at registration.
    Allow {
        /// Arguments to run with.
        tool_args: Map<String, Value>,
    },
    /// Policy denied the call at registration.
    Deny {
        /// Gateway reason.
        reason: String,
    },
    /// A reviewer approved.
    Approved {
        /// Request id.
        request_id: String,
        /// Arguments to run with, including accepted revisions.
        tool_args: Map<String, Value>,
        /// Version the approval applies to.
        version: u64,
    },
    /// A reviewer rejected.
    Rejected {
        /// Request id.
        request_id: String,
        /// Reviewer note.
        note: String,
        /// Version the rejection applies to.
        version: u64,
    },
    /// Policy allowed a revised proposal.
    AutoAllowed {
        /// Request id.
        request_id: String,
        /// Arguments to run with.
        tool_args: Map<String, Value>,
    },
    /// Policy denied a revised proposal.
    AutoDenied {
        /// Request id.
        request_id: String,
        /// Fixed reason text.
        reason: String,
    },
    /// The request expired.
    Expired {
        /// Request id.
        request_id: String,
    },
    /// A revision was requested and no callback was available.
    RevisionRequested {
        /// Request id.
        request_id: String,
        /// Reviewer instruction.
        revise_input: String,
        /// Arguments the instruction applies to.
        current_args: Map<String, Value>,
        /// Current version.
        version: u64,
    },
    /// The gateway reported a status this client does not recognize.
    Unknown {
        /// Raw status, or `UNKNOWN` if none was reported.
        status: String,
        /// Request id.
        request_id: String,
        /// The snapshot as received.
        raw: RequestSnapshot,
    },
}

impl ApprovalOutcome {
    /// Caller-facing tag.
    #[must_use]
    pub fn tag(&self) -> &str {
        match self {
            Self::Allow { .. } => "ALLOW",
            Self::Deny { .. } => "DENY",
            Self::Approved { .. } => "APPROVED",
            Self::Rejected { .. } => "REJECTED",
            Self::AutoAllowed { .. } => "AUTO_ALLOWED",
            Self::AutoDenied { .. } => "AUTO_DENIED",
            Self::Expired { .. } => "EXPIRED",
            Self::RevisionRequested { .. } => "REVISE_REQUESTED",
            Self::Unknown { status, .. } => status,
        }
    }

    /// The arguments to run the tool with, if the outcome permits running it.
    #[must_use]
    pub fn approved_args(&self) -> Option<&Map<String, Value>> {
        match self {
            Self::Allow { tool_args }
            | Self::Approved { tool_args, .. }
            | Self::AutoAllowed { tool_args, .. } => Some(tool_args),
            _ => None,
        }
    }

    /// The gateway request id, for outcomes reached after registration.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Self::Allow { .. } | Self::Deny { .. } => None,
            Self::Approved { request_id, .. }
            | Self::Rejected { request_id, .. }
            | Self::AutoAllowed { request_id, .. }
            | Self::AutoDenied { request_id, .. }
            | Self::Expired { request_id }
            | Self::RevisionRequested { request_id, .. }
            | Self::Unknown { request_id, .. } => Some(request_id),
        }
    }
}

/// Negotiation bookkeeping owned by a single approval run.
#[derive(Debug, Clone, PartialEq)]
pub struct NegotiationState {
    /// Request being negotiated.
    pub request_id: String,
    /// Version the client believes is current. Starts at 1.
    pub current_version: u64,
    /// Live arguments, replaced only by accepted revisions.
    pub current_args: Map<String, Value>,
}

impl NegotiationState {
    /// Start a negotiation at version 1.
    #[must_use]
    pub fn new(request_id: impl Into<String>, args: Map<String, Value>) -> Self {
        Self {
            request_id: request_id.into(),
            current_version: 1,
            current_args: args,
        }
    }

    /// The version below which decisions are stale, once a revision has
    /// been accepted.
    #[must_use]
    pub fn after_version(&self) -> Option<u64> {
        (self.current_version > 1).then_some(self.current_version)
    }

    /// Adopt the version returned by a proposal submission, or assume the
    /// next version when the gateway did not report one.
    pub fn adopt_version(&mut self, reported: Option<u64>) {
        let next = self.current_version.saturating_add(1);
        self.current_version = reported.unwrap_or(next);
    }
}
