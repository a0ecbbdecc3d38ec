//! Seams between the approval flow and whatever answers for the gateway.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::context::ToolContext;
use crate::error::HilResult;
use crate::types::{ProposalUpdate, RequestSnapshot, Verdict};

/// Produces a verdict for a tool call.
///
/// This is the minimal capability a backend must offer to gate a tool. The
/// HTTP [`GatewayClient`](crate::GatewayClient) implements it by registering
/// the call with the gateway.
#[async_trait]
pub trait ToolInterceptor: Send + Sync {
    /// Register `tool_name` with `args` and return the immediate verdict.
    ///
    /// Implementations mask the arguments before sending them anywhere.
    async fn evaluate(
        &self,
        tool_name: &str,
        args: &Map<String, Value>,
        context: &ToolContext,
    ) -> HilResult<Verdict>;
}

/// The full set of gateway operations the engine and adapter drive.
#[async_trait]
pub trait DecisionGateway: ToolInterceptor {
    /// Fetch the current snapshot of a pending action.
    async fn fetch_status(&self, request_id: &str) -> HilResult<RequestSnapshot>;

    /// Submit a revised proposal and return the post-submission snapshot.
    async fn submit_proposal(
        &self,
        request_id: &str,
        update: &ProposalUpdate,
    ) -> HilResult<RequestSnapshot>;
}
