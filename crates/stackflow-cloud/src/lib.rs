//! StackFlow Cloud Infrastructure
//!
//! Provider abstraction for the two remote services a project needs: a
//! stack-based infrastructure API and object storage.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │               stackflow-pipeline                │
//! └───────────────┬─────────────────┬───────────────┘
//!                 │                 │
//! ┌───────────────▼─────────────────▼───────────────┐
//! │                stackflow-cloud                  │
//! │  ┌──────────────────┐  ┌─────────────────────┐  │
//! │  │ StackProvisioner │  │    BucketManager    │  │
//! │  │ (poll + backoff) │  │ (batched emptying)  │  │
//! │  └────────┬─────────┘  └──────────┬──────────┘  │
//! │  trait StackService     trait ObjectStorage     │
//! └───────────┬───────────────────────┬─────────────┘
//!             │                       │
//!     ┌───────▼────────┐      ┌───────▼───────┐
//!     │ cloudformation │      │      s3       │
//!     └────────────────┘      └───────────────┘
//! ```

pub mod bucket;
pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod provider;
pub mod stack;
pub mod waiter;

// Re-exports
pub use bucket::{BucketManager, MAX_DELETE_BATCH, validate_bucket_name};
pub use error::{CloudError, Result};
pub use provider::{
    ObjectPage, ObjectStorage, StackDescription, StackRef, StackRequest, StackService,
    StackStatus, StackTemplate, UpdateOutcome,
};
pub use stack::{DeployChange, StackDeployment, StackProvisioner};
pub use waiter::{Backoff, Clock, MIN_POLL_DELAY, PollConfig, TokioClock};
