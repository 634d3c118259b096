//! Pipeline: the entity tree plus the providers actions run against

use crate::error::{ActionError, ErrorContext, InScope, Result};
use crate::event::{RegionRequest, ResourcesDeployData, ResourcesRemoveData};
use stackflow_cloud::{BucketManager, StackProvisioner, StackRef, StackRequest, StackTemplate};
use stackflow_core::{
    CoreError, DEFAULT_RESOURCES_TEMPLATE, EntityKind, Project, TemplateProcessor, Variables, keys,
};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// File name of the rendered resources template inside the bucket
pub const RESOURCES_TEMPLATE_FILE: &str = "resources-cf.json";

/// Bucket key the resources template of a region is stored under
pub fn resources_template_key(project: &str, stage: &str, region: &str) -> String {
    format!("stackflow/{project}/{stage}/{region}/resources/{RESOURCES_TEMPLATE_FILE}")
}

/// Variable key for a stack output: `IamRoleArnLambda` becomes
/// `iamRoleArnLambda`
pub fn output_variable_key(output: &str) -> String {
    let mut chars = output.chars();
    match chars.next() {
        Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

/// Resources stack found for a region
pub(crate) struct LiveStack {
    pub name: String,
    /// Provider status; `None` when only the record was consulted
    pub status: Option<String>,
}

/// Runs lifecycle actions against one project
///
/// Holds the entity tree exclusively. Actions take `&mut self`, so two
/// actions on the same pipeline never interleave.
pub struct Pipeline {
    project: Option<Project>,
    stacks: StackProvisioner,
    buckets: BucketManager,
    resources_template: String,
}

impl Pipeline {
    pub fn new(stacks: StackProvisioner, buckets: BucketManager) -> Self {
        Self {
            project: None,
            stacks,
            buckets,
            resources_template: DEFAULT_RESOURCES_TEMPLATE.to_string(),
        }
    }

    /// Start from a previously persisted project
    pub fn with_project(mut self, project: Option<Project>) -> Self {
        self.project = project;
        self
    }

    /// Replace the built-in resources template
    pub fn with_resources_template(mut self, template: impl Into<String>) -> Self {
        self.resources_template = template.into();
        self
    }

    pub fn project(&self) -> Option<&Project> {
        self.project.as_ref()
    }

    pub fn into_project(self) -> Option<Project> {
        self.project
    }

    pub fn stacks(&self) -> &StackProvisioner {
        &self.stacks
    }

    pub fn buckets(&self) -> &BucketManager {
        &self.buckets
    }

    pub(crate) fn require_project(&self) -> Result<&Project> {
        self.project.as_ref().ok_or_else(no_project)
    }

    pub(crate) fn require_project_mut(&mut self) -> Result<&mut Project> {
        self.project.as_mut().ok_or_else(no_project)
    }

    pub(crate) fn set_project(&mut self, project: Project) {
        self.project = Some(project);
    }

    pub(crate) fn take_project(&mut self) -> Option<Project> {
        self.project.take()
    }

    /// Render the resources template against a region's resolved variables
    pub fn render_resources(&self, stage: &str, region: &str) -> Result<String> {
        let context = ErrorContext::region(stage, region);
        let variables = self
            .require_project()?
            .resolve_variables(stage, region)
            .in_scope(&context)?;
        TemplateProcessor::with_variables(&variables)
            .render_json(&self.resources_template)
            .in_scope(&context)
    }

    /// Variable keys the resources template publishes as stack outputs
    fn output_keys(&self, stage: &str, region: &str) -> Vec<String> {
        let declared = self
            .render_resources(stage, region)
            .ok()
            .and_then(|body| serde_json::from_str::<serde_json::Value>(&body).ok())
            .and_then(|template| {
                template
                    .get("Outputs")
                    .and_then(|o| o.as_object())
                    .map(|o| o.keys().map(|k| output_variable_key(k)).collect())
            });
        declared.unwrap_or_else(|| vec![keys::IAM_ROLE_ARN_LAMBDA.to_string()])
    }

    /// Render, store and deploy the resources stack of a region, recording
    /// its outputs in the region's variables
    ///
    /// When execution is disabled only the rendered template is produced.
    pub(crate) async fn provision_resources(
        &mut self,
        request: &RegionRequest,
    ) -> Result<ResourcesDeployData> {
        let context = request.context();
        let template = self.render_resources(&request.stage, &request.region)?;

        let project = self.require_project()?;
        let stack_name = project.resources_stack_name(&request.stage);
        if request.no_exe_cf {
            debug!(stack = %stack_name, "Execution disabled, rendered template only");
            return Ok(ResourcesDeployData {
                stack_name,
                template,
                template_url: None,
                stack_id: None,
                outputs: BTreeMap::new(),
                change: None,
            });
        }

        let project_name = project.name().to_string();
        let bucket = project.bucket().to_string();
        let bucket_region = project.bucket_region().to_string();

        self.buckets
            .ensure_bucket(&bucket, &bucket_region)
            .await
            .in_scope(&context)?;
        let key = resources_template_key(&project_name, &request.stage, &request.region);
        let url = self
            .buckets
            .upload(&bucket, &key, template.as_bytes())
            .await
            .in_scope(&context)?;

        let deployment = self
            .stacks
            .deploy(StackRequest {
                stack: StackRef::new(&request.region, &stack_name),
                template: StackTemplate::from_body(template.clone()).with_url(url.clone()),
                parameters: BTreeMap::from([
                    ("ProjectName".to_string(), project_name),
                    ("Stage".to_string(), request.stage.clone()),
                ]),
            })
            .await
            .in_scope(&context)?;

        let region = self
            .require_project_mut()?
            .region_mut(&request.stage, &request.region)
            .in_scope(&context)?;
        let variables = region.variables_mut();
        for (output, value) in &deployment.outputs {
            variables.set(output_variable_key(output), value.clone());
        }
        variables.set(keys::RESOURCES_STACK_NAME, stack_name.clone());
        info!(
            stack = %stack_name,
            stage = %request.stage,
            region = %request.region,
            change = %deployment.change,
            "Resources deployed"
        );

        Ok(ResourcesDeployData {
            stack_name,
            template,
            template_url: Some(url),
            stack_id: Some(deployment.stack_id),
            outputs: deployment.outputs,
            change: Some(deployment.change),
        })
    }

    /// Remove the resources stack of a region and drop the variables it
    /// published. An absent stack is not an error.
    pub(crate) async fn teardown_resources(
        &mut self,
        request: &RegionRequest,
    ) -> Result<ResourcesRemoveData> {
        let context = request.context();
        let project = self.require_project()?;
        let record = project
            .region(&request.stage, &request.region)
            .in_scope(&context)?;
        let stack_name = record
            .resources_stack_name()
            .map(str::to_string)
            .unwrap_or_else(|| project.resources_stack_name(&request.stage));

        let removed = if request.no_exe_cf {
            debug!(stack = %stack_name, "Execution disabled, not removing stack");
            false
        } else {
            self.stacks
                .remove(&StackRef::new(&request.region, &stack_name))
                .await
                .in_scope(&context)?
        };

        let cleared = self.clear_resources_variables(&request.stage, &request.region)?;
        info!(stack = %stack_name, removed, "Resources removed");
        Ok(ResourcesRemoveData {
            stack_name,
            removed,
            cleared,
        })
    }

    /// The region's resources stack, while it exists
    ///
    /// When executing, the stack service is asked about the recorded stack
    /// name or, without a record, the name a deploy would use. A deploy that
    /// failed or timed out leaves a stack behind without recording it. Stale
    /// records of stacks the service no longer knows are cleared. Without
    /// execution only the record is consulted.
    pub(crate) async fn live_resources_stack(
        &mut self,
        request: &RegionRequest,
    ) -> Result<Option<LiveStack>> {
        let context = request.context();
        let project = self.require_project()?;
        let recorded = project
            .region(&request.stage, &request.region)
            .in_scope(&context)?
            .resources_stack_name()
            .map(str::to_string);

        if request.no_exe_cf {
            return Ok(recorded.map(|name| LiveStack { name, status: None }));
        }

        let stack_name = recorded
            .clone()
            .unwrap_or_else(|| project.resources_stack_name(&request.stage));
        let description = self
            .stacks
            .describe(&StackRef::new(&request.region, &stack_name))
            .await
            .in_scope(&context)?;

        match description {
            Some(desc) => {
                debug!(stack = %stack_name, status = %desc.status, "Resources stack exists");
                Ok(Some(LiveStack {
                    name: stack_name,
                    status: Some(desc.status),
                }))
            }
            None => {
                if recorded.is_some() {
                    warn!(stack = %stack_name, "Recorded resources stack no longer exists");
                    self.clear_resources_variables(&request.stage, &request.region)?;
                }
                Ok(None)
            }
        }
    }

    fn clear_resources_variables(&mut self, stage: &str, region: &str) -> Result<Vec<String>> {
        let context = ErrorContext::region(stage, region);
        let mut names = self.output_keys(stage, region);
        names.push(keys::RESOURCES_STACK_NAME.to_string());

        let variables = self
            .require_project_mut()?
            .region_mut(stage, region)
            .in_scope(&context)?
            .variables_mut();
        Ok(names
            .into_iter()
            .filter(|key| variables.remove(key).is_some())
            .collect())
    }

    /// Flattened variables of a region
    pub(crate) fn region_variables(&self, stage: &str, region: &str) -> Result<Variables> {
        self.require_project()?
            .resolve_variables(stage, region)
            .in_scope(&ErrorContext::region(stage, region))
    }
}

fn no_project() -> ActionError {
    ActionError::from(CoreError::NotFound {
        kind: EntityKind::Project,
        name: "no project in this directory".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::RegionRequest;
    use stackflow_cloud::memory::{InMemoryObjectStorage, InMemoryStackService};
    use std::sync::Arc;

    fn pipeline_with(project: Project) -> Pipeline {
        Pipeline::new(
            StackProvisioner::new(Arc::new(InMemoryStackService::new())),
            BucketManager::new(Arc::new(InMemoryObjectStorage::new())),
        )
        .with_project(Some(project))
    }

    fn demo_project() -> Project {
        let mut project = Project::new("demo", "demo-bucket.com", "us-east-1").unwrap();
        project.create_stage("dev").unwrap();
        project.create_region("dev", "us-east-1").unwrap();
        project
    }

    #[test]
    fn test_output_variable_key() {
        assert_eq!(output_variable_key("IamRoleArnLambda"), "iamRoleArnLambda");
        assert_eq!(output_variable_key("x"), "x");
        assert_eq!(output_variable_key(""), "");
    }

    #[test]
    fn test_resources_template_key() {
        assert_eq!(
            resources_template_key("demo", "dev", "us-east-1"),
            "stackflow/demo/dev/us-east-1/resources/resources-cf.json"
        );
    }

    #[test]
    fn test_render_resources_uses_region_scope() {
        let pipeline = pipeline_with(demo_project());
        let rendered = pipeline.render_resources("dev", "us-east-1").unwrap();
        assert!(rendered.contains("arn:aws:logs:us-east-1:*:*"));
        assert!(rendered.contains("dev-demo-lambda"));
    }

    #[test]
    fn test_custom_template_errors_are_validation_errors() {
        let pipeline = pipeline_with(demo_project())
            .with_resources_template("{\"Bucket\": \"{{ missing }}\"}");
        let err = pipeline.render_resources("dev", "us-east-1").unwrap_err();
        assert_eq!(err.kind, crate::ErrorKind::ValidationError);
        assert_eq!(err.context.stage.as_deref(), Some("dev"));
    }

    #[tokio::test]
    async fn test_provision_without_execution_renders_only() {
        let mut pipeline = pipeline_with(demo_project());
        let request = RegionRequest::new("dev", "us-east-1").with_no_exe_cf(true);

        let data = pipeline.provision_resources(&request).await.unwrap();

        assert_eq!(data.stack_name, "demo-dev-r");
        assert!(!data.executed());
        assert!(data.template.contains("IamRoleLambda"));
        let region = pipeline.project().unwrap().region("dev", "us-east-1").unwrap();
        assert!(!region.has_resources_stack());
    }

    #[tokio::test]
    async fn test_no_project_is_not_found() {
        let mut pipeline = Pipeline::new(
            StackProvisioner::new(Arc::new(InMemoryStackService::new())),
            BucketManager::new(Arc::new(InMemoryObjectStorage::new())),
        );
        let err = pipeline
            .provision_resources(&RegionRequest::new("dev", "us-east-1"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, crate::ErrorKind::NotFound);
    }
}
