use crate::error::{ActionError, ErrorContext, InScope, Result};
use crate::event::{
    Event, ProjectInitData, ProjectInitRequest, ProjectRemoveData, ProjectRemoveRequest,
    RegionRequest,
};
use crate::pipeline::Pipeline;
use stackflow_cloud::validate_bucket_name;
use stackflow_core::{CoreError, EntityKind, Project};
use tracing::info;

impl Pipeline {
    /// Create the project with its first stage and region, and provision
    /// that region's resources when executing
    pub async fn project_init(
        &mut self,
        request: ProjectInitRequest,
    ) -> Result<Event<ProjectInitRequest, ProjectInitData>> {
        let context = ErrorContext::region(&request.stage, &request.region);
        request.validate().in_scope(&context)?;

        if let Some(existing) = self.project() {
            return Err(ActionError::from(CoreError::DuplicateEntity {
                kind: EntityKind::Project,
                name: existing.name().to_string(),
            })
            .with_context(&context));
        }

        validate_bucket_name(&request.bucket).in_scope(&context)?;
        let mut project =
            Project::new(&request.name, &request.bucket, &request.region).in_scope(&context)?;
        project.create_stage(&request.stage).in_scope(&context)?;
        project
            .create_region(&request.stage, &request.region)
            .in_scope(&context)?;
        info!(
            project = %project.name(),
            bucket = %project.bucket(),
            stage = %request.stage,
            region = %request.region,
            no_exe_cf = request.no_exe_cf,
            "Initializing project"
        );
        self.set_project(project);

        let first_region = RegionRequest::new(&request.stage, &request.region)
            .with_no_exe_cf(request.no_exe_cf);
        let resources = self.provision_resources(&first_region).await?;
        let variables = self.region_variables(&request.stage, &request.region)?;

        let project = self.require_project()?;
        let data = ProjectInitData {
            project: project.name().to_string(),
            project_bucket: project.bucket().to_string(),
            project_bucket_region: project.bucket_region().to_string(),
            stage: request.stage.clone(),
            region: request.region.clone(),
            variables,
            resources,
        };
        Ok(Event::new(request, data))
    }

    /// Hand back a project that owns no stages
    ///
    /// The provisioning bucket is left alone; see
    /// [`crate::cleanup::purge_project_bucket`].
    pub async fn project_remove(
        &mut self,
        request: ProjectRemoveRequest,
    ) -> Result<Event<ProjectRemoveRequest, ProjectRemoveData>> {
        let context = ErrorContext::default();
        self.require_project()?.ensure_empty().in_scope(&context)?;

        let project = self.take_project().ok_or_else(|| {
            ActionError::from(CoreError::NotFound {
                kind: EntityKind::Project,
                name: "no project in this directory".to_string(),
            })
        })?;
        info!(project = %project.name(), bucket = %project.bucket(), "Project removed");
        Ok(Event::new(request, ProjectRemoveData { project }))
    }
}
