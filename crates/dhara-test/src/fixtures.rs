//! Test fixtures for common types.

use dhara_hil::{Decision, RequestSnapshot, RequestStatus, ToolContext};
use serde_json::{Map, Value, json};

/// Convert a JSON object literal into an argument map.
///
/// Non-object values produce an empty map.
#[must_use]
pub fn args_from(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// The arguments used by most flow tests.
#[must_use]
pub fn test_args() -> Map<String, Value> {
    args_from(json!({"to": "bob@example.com", "text": "hello"}))
}

/// A context for a test agent run.
#[must_use]
pub fn test_context() -> ToolContext {
    ToolContext::new("test-agent", "run-1")
        .with_summary("sending a follow-up")
        .with_tag("email")
}

/// A snapshot with the given status and version and no decision.
#[must_use]
pub fn snapshot(status: RequestStatus, version: u64) -> RequestSnapshot {
    RequestSnapshot {
        status: Some(status),
        version: Some(version),
        ..RequestSnapshot::default()
    }
}

/// A snapshot still waiting on a reviewer.
#[must_use]
pub fn pending(version: u64) -> RequestSnapshot {
    snapshot(RequestStatus::Pending, version)
}

/// A snapshot carrying a decision.
#[must_use]
pub fn decided(status: RequestStatus, decision: Decision, version: u64) -> RequestSnapshot {
    RequestSnapshot {
        last_decision: Some(decision),
        ..snapshot(status, version)
    }
}

/// An approved snapshot.
#[must_use]
pub fn approved(version: u64) -> RequestSnapshot {
    decided(RequestStatus::Approved, Decision::Approve, version)
}

/// A rejected snapshot with a note.
#[must_use]
pub fn rejected(version: u64, note: &str) -> RequestSnapshot {
    RequestSnapshot {
        last_decision_note: Some(note.to_owned()),
        ..decided(RequestStatus::Rejected, Decision::Reject, version)
    }
}

/// A revision request with an instruction.
#[must_use]
pub fn revise_requested(version: u64, instruction: &str) -> RequestSnapshot {
    RequestSnapshot {
        last_decision_revise_input: Some(instruction.to_owned()),
        ..decided(RequestStatus::ReviseRequested, Decision::Revise, version)
    }
}

/// A proposal submission response.
#[must_use]
pub fn proposal_response(version: u64, status: RequestStatus) -> RequestSnapshot {
    snapshot(status, version)
}
