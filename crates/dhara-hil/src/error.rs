//! Error types for the approval client.

use thiserror::Error;

/// Boxed error returned by revision callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while gating a tool call behind the gateway.
#[derive(Debug, Error)]
pub enum HilError {
    /// Network, DNS, connect or HTTP timeout failure. Never retried here.
    #[error("gateway transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The gateway answered with a non-success status.
    #[error("gateway returned HTTP {status}: {body}")]
    Remote {
        /// HTTP status code.
        status: u16,
        /// Response body as text.
        body: String,
    },

    /// No terminal decision arrived before the computed deadline.
    #[error("no decision for request {request_id} within {timeout_secs} seconds")]
    DeadlineExceeded {
        /// The pending request that was being waited on.
        request_id: String,
        /// The timeout that was applied, in seconds.
        timeout_secs: u64,
    },

    /// A success response whose body cannot be interpreted at all.
    #[error("invalid gateway response: {0}")]
    InvalidResponse(String),

    /// The client was configured with values that cannot be sent.
    #[error("invalid client configuration: {0}")]
    Config(String),

    /// The revision callback failed.
    #[error("revision callback failed: {0}")]
    Revision(#[source] BoxError),

    /// The host's suspend primitive failed to produce a resume value.
    #[error("suspend failed: {0}")]
    Suspend(String),

    /// Policy denied the tool call at registration.
    #[error("tool {tool} denied: {reason}")]
    Denied {
        /// The gated tool.
        tool: String,
        /// Reason reported by the gateway.
        reason: String,
    },

    /// A human reviewer rejected the tool call.
    #[error("tool {tool} rejected by human: {note}")]
    Rejected {
        /// The gated tool.
        tool: String,
        /// Reviewer note.
        note: String,
    },

    /// Policy auto-denied a revised proposal.
    #[error("tool {tool} auto-denied by policy after revision")]
    AutoDenied {
        /// The gated tool.
        tool: String,
    },

    /// A resume payload carried a decision the adapter does not understand.
    #[error("invalid decision payload: {0}")]
    InvalidDecision(String),
}

/// Result type for approval client operations.
pub type HilResult<T> = Result<T, HilError>;
