//! Mock implementations for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use dhara_hil::{
    BoxError, DecisionGateway, HilError, HilResult, ProposalUpdate, RequestSnapshot,
    RequestStatus, ResumePayload, Reviser, SuspendPayload, Suspender, ToolContext,
    ToolInterceptor, Verdict,
};
use serde_json::{Map, Value};

/// A registration seen by [`MockGateway`].
#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredCall {
    /// Tool name.
    pub tool_name: String,
    /// Arguments as passed in.
    pub args: Map<String, Value>,
    /// Context as passed in.
    pub context: ToolContext,
}

#[derive(Debug, Default)]
struct GatewayState {
    snapshots: VecDeque<RequestSnapshot>,
    last_snapshot: Option<RequestSnapshot>,
    proposal_responses: VecDeque<RequestSnapshot>,
    registrations: Vec<RegisteredCall>,
    proposals: Vec<(String, ProposalUpdate)>,
    fetched: Vec<String>,
}

/// Scripted gateway.
///
/// Registration returns a fixed verdict. Status fetches pop queued
/// snapshots in order and keep returning the last one once the queue is
/// drained. Proposal submissions pop queued responses; with none queued they
/// answer `PENDING` without a version. Every call is recorded.
#[derive(Debug, Clone)]
pub struct MockGateway {
    verdict: Verdict,
    state: Arc<Mutex<GatewayState>>,
}

impl MockGateway {
    /// A gateway whose registrations resolve to `verdict`.
    #[must_use]
    pub fn new(verdict: Verdict) -> Self {
        Self {
            verdict,
            state: Arc::new(Mutex::new(GatewayState::default())),
        }
    }

    /// A gateway that allows every call.
    #[must_use]
    pub fn allowing() -> Self {
        Self::new(Verdict::Allow { reason: None })
    }

    /// A gateway that denies every call with `reason`.
    #[must_use]
    pub fn denying(reason: impl Into<String>) -> Self {
        Self::new(Verdict::Deny {
            reason: reason.into(),
        })
    }

    /// A gateway that requires approval under `request_id`, with no expiry.
    #[must_use]
    pub fn require_approval(request_id: impl Into<String>) -> Self {
        Self::new(Verdict::RequireApproval {
            request_id: request_id.into(),
            expires_at: None,
        })
    }

    /// Queue a status snapshot.
    #[must_use]
    pub fn with_snapshot(self, snapshot: RequestSnapshot) -> Self {
        if let Ok(mut guard) = self.state.lock() {
            guard.snapshots.push_back(snapshot);
        }
        self
    }

    /// Queue a proposal submission response.
    #[must_use]
    pub fn with_proposal_response(self, response: RequestSnapshot) -> Self {
        if let Ok(mut guard) = self.state.lock() {
            guard.proposal_responses.push_back(response);
        }
        self
    }

    /// Number of status fetches so far.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.state.lock().map(|g| g.fetched.len()).unwrap_or_default()
    }

    /// Registrations seen so far.
    #[must_use]
    pub fn registrations(&self) -> Vec<RegisteredCall> {
        self.state
            .lock()
            .map(|g| g.registrations.clone())
            .unwrap_or_default()
    }

    /// Proposals submitted so far, with their request ids.
    #[must_use]
    pub fn proposals(&self) -> Vec<(String, ProposalUpdate)> {
        self.state
            .lock()
            .map(|g| g.proposals.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ToolInterceptor for MockGateway {
    async fn evaluate(
        &self,
        tool_name: &str,
        args: &Map<String, Value>,
        context: &ToolContext,
    ) -> HilResult<Verdict> {
        if let Ok(mut guard) = self.state.lock() {
            guard.registrations.push(RegisteredCall {
                tool_name: tool_name.to_owned(),
                args: args.clone(),
                context: context.clone(),
            });
        }
        Ok(self.verdict.clone())
    }
}

#[async_trait]
impl DecisionGateway for MockGateway {
    async fn fetch_status(&self, request_id: &str) -> HilResult<RequestSnapshot> {
        let mut guard = self
            .state
            .lock()
            .map_err(|_| HilError::InvalidResponse("mock state poisoned".to_owned()))?;
        guard.fetched.push(request_id.to_owned());
        if let Some(next) = guard.snapshots.pop_front() {
            guard.last_snapshot = Some(next);
        }
        guard.last_snapshot.clone().ok_or_else(|| HilError::Remote {
            status: 404,
            body: format!("no scripted snapshot for {request_id}"),
        })
    }

    async fn submit_proposal(
        &self,
        request_id: &str,
        update: &ProposalUpdate,
    ) -> HilResult<RequestSnapshot> {
        let mut guard = self
            .state
            .lock()
            .map_err(|_| HilError::InvalidResponse("mock state poisoned".to_owned()))?;
        guard
            .proposals
            .push((request_id.to_owned(), update.clone()));
        Ok(guard
            .proposal_responses
            .pop_front()
            .unwrap_or_else(|| RequestSnapshot {
                status: Some(RequestStatus::Pending),
                ..RequestSnapshot::default()
            }))
    }
}

/// Scripted host suspend primitive.
///
/// Returns queued resume payloads in order and records every suspend
/// payload. Suspending with nothing queued fails with [`HilError::Suspend`].
#[derive(Debug, Clone, Default)]
pub struct MockSuspender {
    resumes: Arc<Mutex<VecDeque<ResumePayload>>>,
    suspended: Arc<Mutex<Vec<SuspendPayload>>>,
}

impl MockSuspender {
    /// Create a suspender with no scripted resumes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a resume payload.
    #[must_use]
    pub fn with_resume(self, resume: ResumePayload) -> Self {
        if let Ok(mut guard) = self.resumes.lock() {
            guard.push_back(resume);
        }
        self
    }

    /// Payloads the caller was suspended with, in order.
    #[must_use]
    pub fn suspended(&self) -> Vec<SuspendPayload> {
        self.suspended
            .lock()
            .map(|g| g.clone())
            .unwrap_or_default()
    }

    /// Number of suspensions so far.
    #[must_use]
    pub fn suspend_count(&self) -> usize {
        self.suspended.lock().map(|g| g.len()).unwrap_or_default()
    }
}

#[async_trait]
impl Suspender for MockSuspender {
    async fn suspend(&self, payload: SuspendPayload) -> HilResult<ResumePayload> {
        if let Ok(mut guard) = self.suspended.lock() {
            guard.push(payload);
        }
        self.resumes
            .lock()
            .ok()
            .and_then(|mut g| g.pop_front())
            .ok_or_else(|| HilError::Suspend("no scripted resume payload".to_owned()))
    }
}

/// One invocation of [`RecordingReviser`].
#[derive(Debug, Clone, PartialEq)]
pub struct ReviserCall {
    /// Arguments before revision.
    pub current_args: Map<String, Value>,
    /// Reviewer instruction.
    pub instruction: String,
    /// Patch passed along.
    pub patch: Map<String, Value>,
}

#[derive(Debug, Clone)]
enum ReviserBehavior {
    Append { field: String, suffix: String },
    Fail(String),
}

/// Reviser that appends a suffix to one string field, or always fails.
#[derive(Debug, Clone)]
pub struct RecordingReviser {
    behavior: ReviserBehavior,
    calls: Arc<Mutex<Vec<ReviserCall>>>,
}

impl RecordingReviser {
    /// Append `suffix` to the string at `field` on every revision.
    #[must_use]
    pub fn appending(field: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            behavior: ReviserBehavior::Append {
                field: field.into(),
                suffix: suffix.into(),
            },
            calls: Arc::default(),
        }
    }

    /// Fail every revision with `message`.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            behavior: ReviserBehavior::Fail(message.into()),
            calls: Arc::default(),
        }
    }

    /// Calls so far.
    #[must_use]
    pub fn calls(&self) -> Vec<ReviserCall> {
        self.calls.lock().map(|g| g.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Reviser for RecordingReviser {
    async fn revise(
        &self,
        current_args: &Map<String, Value>,
        instruction: &str,
        patch: &Map<String, Value>,
    ) -> Result<Map<String, Value>, BoxError> {
        if let Ok(mut guard) = self.calls.lock() {
            guard.push(ReviserCall {
                current_args: current_args.clone(),
                instruction: instruction.to_owned(),
                patch: patch.clone(),
            });
        }
        match &self.behavior {
            ReviserBehavior::Append { field, suffix } => {
                let mut updated = current_args.clone();
                let base = updated
                    .get(field)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned();
                updated.insert(field.clone(), Value::String(format!("{base}{suffix}")));
                Ok(updated)
            },
            ReviserBehavior::Fail(message) => Err(message.clone().into()),
        }
    }
}
