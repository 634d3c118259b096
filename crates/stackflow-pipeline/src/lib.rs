//! StackFlow Pipeline
//!
//! Lifecycle actions over a project's entity tree. Creation runs Project →
//! Stage → Region → Resources, teardown runs the other way, and an action
//! taken out of order fails instead of cascading.
//!
//! # Example
//!
//! ```ignore
//! use stackflow_pipeline::{Pipeline, ProjectInitRequest, RegionRequest};
//!
//! let mut pipeline = Pipeline::new(stacks, buckets);
//! pipeline
//!     .project_init(ProjectInitRequest::new("demo", "demo-bucket.com", "dev", "us-east-1"))
//!     .await?;
//! let deployed = pipeline
//!     .resources_deploy(RegionRequest::new("dev", "us-east-1"))
//!     .await?;
//! println!("{:?}", deployed.data.outputs);
//! ```

mod actions;
pub mod cleanup;
pub mod error;
pub mod event;
pub mod pipeline;

// Re-exports
pub use cleanup::purge_project_bucket;
pub use error::{ActionError, ErrorContext, ErrorKind, Result};
pub use event::{
    Event, ProjectInitData, ProjectInitRequest, ProjectRemoveData, ProjectRemoveRequest,
    RegionCreateData, RegionCreateRequest, RegionRemoveData, RegionRemoveRequest, RegionRequest,
    ResourcesDeployData, ResourcesDeployRequest, ResourcesRemoveData, ResourcesRemoveRequest,
    StageCreateData, StageCreateRequest, StageRemoveData, StageRemoveRequest,
};
pub use pipeline::{Pipeline, output_variable_key, resources_template_key};
