//! Shared setup for flow tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use dhara_hil::{ApprovalEngine, EngineSettings, SuspendResumeAdapter};
use dhara_test::{MockGateway, MockSuspender};

/// Engine over `gateway` with the production poll interval.
///
/// Tests using it run with paused time, so the interval costs nothing.
pub fn engine(gateway: &MockGateway) -> ApprovalEngine {
    dhara_test::init_test_logging();
    ApprovalEngine::new(Arc::new(gateway.clone()), EngineSettings::default())
}

/// Engine with an explicit per-round timeout.
pub fn engine_with_timeout(gateway: &MockGateway, timeout: Duration) -> ApprovalEngine {
    dhara_test::init_test_logging();
    ApprovalEngine::new(
        Arc::new(gateway.clone()),
        EngineSettings::default().with_timeout(timeout),
    )
}

/// Adapter over `gateway` and `suspender`.
pub fn adapter(gateway: &MockGateway, suspender: &MockSuspender) -> SuspendResumeAdapter {
    dhara_test::init_test_logging();
    SuspendResumeAdapter::new(Arc::new(gateway.clone()), Arc::new(suspender.clone()))
}
