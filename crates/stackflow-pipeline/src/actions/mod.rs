//! The eight lifecycle actions
//!
//! | Action | Fails with |
//! |---|---|
//! | `project_init` | `DuplicateEntity` when a project is already loaded |
//! | `stage_create` | `DuplicateEntity` |
//! | `region_create` | `ParentNotFound`, `DuplicateEntity` |
//! | `resources_deploy` | `NotFound`, provisioning errors |
//! | `resources_remove` | `NotFound` |
//! | `region_remove` | `HasDependents` while the resources stack is live |
//! | `stage_remove` | `NotEmpty` while the stage owns regions |
//! | `project_remove` | `NotEmpty` while the project owns stages |
//!
//! Structural checks run before anything is mutated. A remote failure after
//! a record was created leaves the record in place without provisioning
//! outputs, so `resources_deploy` can be retried.

mod project;
mod region;
mod resources;
mod stage;
