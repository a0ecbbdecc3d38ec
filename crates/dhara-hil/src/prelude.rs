//! Common imports for gating tool calls.
//!
//! ```rust
//! use dhara_hil::prelude::*;
//! ```

pub use crate::{
    ApprovalEngine, ApprovalOutcome, DecisionGateway, EngineSettings, GatewayClient, HilError,
    HilResult, ResumePayload, Reviser, SuspendPayload, SuspendResumeAdapter, Suspender,
    ToolContext, ToolInterceptor, Verdict, reviser_fn,
};
