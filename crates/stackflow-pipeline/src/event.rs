//! Typed events passed through the actions
//!
//! Every action takes its request and hands back an [`Event`] holding that
//! request as `options` and the action's results as `data`.

use crate::error::{ActionError, ErrorContext, Result};
use serde::Serialize;
use stackflow_cloud::DeployChange;
use stackflow_core::{Project, Variables};
use std::collections::BTreeMap;

/// Options an action ran with and the data it produced
#[derive(Debug, Clone, Serialize)]
pub struct Event<O, D> {
    pub options: O,
    pub data: D,
}

impl<O, D> Event<O, D> {
    pub fn new(options: O, data: D) -> Self {
        Self { options, data }
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ActionError::validation(format!("option '{field}' is required")));
    }
    Ok(())
}

/// Options of `ProjectInit`
#[derive(Debug, Clone, Serialize)]
pub struct ProjectInitRequest {
    pub name: String,
    pub bucket: String,
    /// Region of the bucket and of the first region entity
    pub region: String,
    pub stage: String,
    pub profile: Option<String>,
    pub no_exe_cf: bool,
}

impl ProjectInitRequest {
    pub fn new(
        name: impl Into<String>,
        bucket: impl Into<String>,
        stage: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            bucket: bucket.into(),
            region: region.into(),
            stage: stage.into(),
            profile: None,
            no_exe_cf: false,
        }
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    pub fn with_no_exe_cf(mut self, no_exe_cf: bool) -> Self {
        self.no_exe_cf = no_exe_cf;
        self
    }

    pub fn validate(&self) -> Result<()> {
        require("name", &self.name)?;
        require("bucket", &self.bucket)?;
        require("stage", &self.stage)?;
        require("region", &self.region)
    }
}

/// Options of every action addressing a single region
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionRequest {
    pub stage: String,
    pub region: String,
    pub no_exe_cf: bool,
}

impl RegionRequest {
    pub fn new(stage: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            region: region.into(),
            no_exe_cf: false,
        }
    }

    pub fn with_no_exe_cf(mut self, no_exe_cf: bool) -> Self {
        self.no_exe_cf = no_exe_cf;
        self
    }

    pub fn validate(&self) -> Result<()> {
        require("stage", &self.stage)?;
        require("region", &self.region)
    }

    pub fn context(&self) -> ErrorContext {
        ErrorContext::region(&self.stage, &self.region)
    }
}

/// Options of `StageCreate`: the stage and its first region
pub type StageCreateRequest = RegionRequest;
pub type RegionCreateRequest = RegionRequest;
pub type ResourcesDeployRequest = RegionRequest;
pub type ResourcesRemoveRequest = RegionRequest;

/// Options of `RegionRemove`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionRemoveRequest {
    pub stage: String,
    pub region: String,
    pub no_exe_cf: bool,
    /// Remove the region's resources stack first instead of failing
    pub remove_resources: bool,
}

impl RegionRemoveRequest {
    pub fn new(stage: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            region: region.into(),
            no_exe_cf: false,
            remove_resources: false,
        }
    }

    pub fn with_no_exe_cf(mut self, no_exe_cf: bool) -> Self {
        self.no_exe_cf = no_exe_cf;
        self
    }

    pub fn with_remove_resources(mut self, remove_resources: bool) -> Self {
        self.remove_resources = remove_resources;
        self
    }

    pub fn validate(&self) -> Result<()> {
        require("stage", &self.stage)?;
        require("region", &self.region)
    }

    pub fn context(&self) -> ErrorContext {
        ErrorContext::region(&self.stage, &self.region)
    }

    pub(crate) fn as_region_request(&self) -> RegionRequest {
        RegionRequest {
            stage: self.stage.clone(),
            region: self.region.clone(),
            no_exe_cf: self.no_exe_cf,
        }
    }
}

/// Options of `StageRemove`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageRemoveRequest {
    pub stage: String,
    pub no_exe_cf: bool,
}

impl StageRemoveRequest {
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            no_exe_cf: false,
        }
    }

    pub fn with_no_exe_cf(mut self, no_exe_cf: bool) -> Self {
        self.no_exe_cf = no_exe_cf;
        self
    }

    pub fn validate(&self) -> Result<()> {
        require("stage", &self.stage)
    }
}

/// Options of `ProjectRemove`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProjectRemoveRequest {
    pub no_exe_cf: bool,
}

impl ProjectRemoveRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_no_exe_cf(mut self, no_exe_cf: bool) -> Self {
        self.no_exe_cf = no_exe_cf;
        self
    }
}

/// Result of rendering and, when executing, deploying a resources stack
#[derive(Debug, Clone, Serialize)]
pub struct ResourcesDeployData {
    pub stack_name: String,
    /// Rendered template
    pub template: String,
    /// Where the template was stored; absent when not executing
    pub template_url: Option<String>,
    pub stack_id: Option<String>,
    pub outputs: BTreeMap<String, String>,
    pub change: Option<DeployChange>,
}

impl ResourcesDeployData {
    /// Whether the stack was actually deployed
    pub fn executed(&self) -> bool {
        self.stack_id.is_some()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectInitData {
    pub project: String,
    pub project_bucket: String,
    pub project_bucket_region: String,
    pub stage: String,
    pub region: String,
    /// Resolved variables of the first region
    pub variables: Variables,
    pub resources: ResourcesDeployData,
}

/// Result of `StageCreate` and `RegionCreate`
#[derive(Debug, Clone, Serialize)]
pub struct RegionCreateData {
    pub stage: String,
    pub region: String,
    pub variables: Variables,
    pub resources: ResourcesDeployData,
}

pub type StageCreateData = RegionCreateData;

#[derive(Debug, Clone, Serialize)]
pub struct ResourcesRemoveData {
    pub stack_name: String,
    /// `false` when the stack was already absent or execution is disabled
    pub removed: bool,
    /// Region variables dropped with the stack
    pub cleared: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegionRemoveData {
    pub stage: String,
    pub region: String,
    /// Present when the action tore down the resources stack itself
    pub resources: Option<ResourcesRemoveData>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageRemoveData {
    pub stage: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectRemoveData {
    /// The removed project; its bucket still exists
    pub project: Project,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_project_init_requires_options() {
        let request = ProjectInitRequest::new("demo", "", "dev", "us-east-1");
        let err = request.validate().unwrap_err();
        assert_eq!(err.kind, ErrorKind::ValidationError);
        assert!(err.message.contains("bucket"));

        assert!(
            ProjectInitRequest::new("demo", "demo.com", "dev", "us-east-1")
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn test_region_request_context() {
        let request = RegionRequest::new("prod", "eu-west-1").with_no_exe_cf(true);
        assert!(request.no_exe_cf);
        assert_eq!(request.context(), ErrorContext::region("prod", "eu-west-1"));
        assert!(RegionRequest::new(" ", "eu-west-1").validate().is_err());
    }

    #[test]
    fn test_region_remove_defaults() {
        let request = RegionRemoveRequest::new("prod", "us-east-1");
        assert!(!request.remove_resources);
        assert_eq!(
            request.as_region_request(),
            RegionRequest::new("prod", "us-east-1")
        );
    }
}
