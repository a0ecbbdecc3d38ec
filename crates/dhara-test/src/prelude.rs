//! Common imports for approval tests.

pub use crate::fixtures::*;
pub use crate::harness::init_test_logging;
pub use crate::mocks::{MockGateway, MockSuspender, RecordingReviser, RegisteredCall, ReviserCall};
