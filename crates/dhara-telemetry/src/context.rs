//! Correlation context for approval flows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Correlation context carried through one approval flow.
///
/// A flow starts before the gateway has assigned a request id, so the
/// gateway id is optional and can be recorded on the span later with
/// [`RequestContext::record_request_id`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    /// Local correlation identifier, unique per flow.
    pub correlation_id: Uuid,
    /// Component that created this context (`engine`, `adapter`, ...).
    pub component: String,
    /// Operation being performed.
    pub operation: Option<String>,
    /// Tool whose invocation is being gated.
    pub tool: Option<String>,
    /// Gateway-assigned request id, once known.
    pub request_id: Option<String>,
    /// When the flow started.
    pub started_at: DateTime<Utc>,
}

impl RequestContext {
    /// Create a new context for `component`.
    #[must_use]
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            correlation_id: Uuid::new_v4(),
            component: component.into(),
            operation: None,
            tool: None,
            request_id: None,
            started_at: Utc::now(),
        }
    }

    /// Set the operation name.
    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Set the gated tool name.
    #[must_use]
    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = Some(tool.into());
        self
    }

    /// Set the gateway request id.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Milliseconds since the flow started.
    #[must_use]
    pub fn elapsed_ms(&self) -> i64 {
        Utc::now()
            .signed_duration_since(self.started_at)
            .num_milliseconds()
    }

    /// Create a tracing span for this context.
    ///
    /// `request_id` is left empty when not yet known so that it can be
    /// filled in with [`Self::record_request_id`].
    #[must_use]
    pub fn span(&self) -> tracing::Span {
        let span = tracing::info_span!(
            "approval",
            correlation_id = %self.correlation_id,
            component = %self.component,
            operation = self.operation.as_deref(),
            tool = self.tool.as_deref(),
            request_id = tracing::field::Empty,
        );
        if let Some(id) = &self.request_id {
            span.record("request_id", id.as_str());
        }
        span
    }

    /// Record the gateway request id on `span` and on this context.
    pub fn record_request_id(&mut self, span: &tracing::Span, request_id: &str) {
        span.record("request_id", request_id);
        self.request_id = Some(request_id.to_owned());
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new("unknown")
    }
}
