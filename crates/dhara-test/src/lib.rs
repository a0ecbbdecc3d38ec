//! Dhara Test - Shared test utilities for the DharaHIL approval client.
//!
//! Scripted doubles for the gateway and the host suspend primitive, plus
//! fixtures for common snapshots.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use dhara_hil::{ApprovalEngine, EngineSettings};
//! use dhara_test::{MockGateway, approved, test_args, test_context};
//!
//! #[tokio::test]
//! async fn approves() {
//!     let gateway = MockGateway::require_approval("req-1").with_snapshot(approved(1));
//!     let engine = ApprovalEngine::new(Arc::new(gateway.clone()), EngineSettings::default());
//!
//!     let outcome = engine
//!         .run("send_email", test_args(), &test_context(), None)
//!         .await
//!         .unwrap();
//!     assert_eq!(outcome.tag(), "APPROVED");
//!     assert_eq!(gateway.fetch_count(), 1);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

pub mod fixtures;
pub mod harness;
pub mod mocks;

pub use fixtures::*;
pub use harness::*;
pub use mocks::*;
