//! StackFlow Core
//!
//! The entity model every action works on: a Project owning Stages, each
//! Stage owning Regions, each level carrying its own variable scope.
//!
//! ```text
//! Project ──┬── Stage "dev" ──┬── Region "us-east-1"
//!           │                 └── Region "eu-west-1"
//!           └── Stage "prod" ──── Region "us-east-1"
//! ```
//!
//! Besides the tree this crate renders the per-region resources template
//! and persists the project to `.stackflow/project.json`.

pub mod error;
pub mod model;
pub mod store;
pub mod template;

// Re-exports
pub use error::{CoreError, EntityKind, Result};
pub use model::{
    Project, Region, ScopedVariables, Stage, Variables, keys, normalize_project_name,
    validate_region_name, validate_stage_name,
};
pub use store::{ProjectLock, ProjectStore};
pub use template::{DEFAULT_RESOURCES_TEMPLATE, TemplateProcessor};
