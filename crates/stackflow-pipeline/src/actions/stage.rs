use crate::error::{ErrorContext, InScope, Result};
use crate::event::{
    Event, RegionCreateData, StageCreateRequest, StageRemoveData, StageRemoveRequest,
};
use crate::pipeline::Pipeline;
use stackflow_core::validate_region_name;
use tracing::info;

impl Pipeline {
    /// Create a stage with its first region
    pub async fn stage_create(
        &mut self,
        request: StageCreateRequest,
    ) -> Result<Event<StageCreateRequest, RegionCreateData>> {
        let context = request.context();
        request.validate().in_scope(&context)?;

        let project = self.require_project_mut().in_scope(&context)?;
        project.check_new_stage(&request.stage).in_scope(&context)?;
        validate_region_name(&request.region).in_scope(&context)?;

        project.create_stage(&request.stage).in_scope(&context)?;
        project
            .create_region(&request.stage, &request.region)
            .in_scope(&context)?;
        info!(stage = %request.stage, region = %request.region, "Stage created");

        let resources = self.provision_resources(&request).await?;
        let variables = self.region_variables(&request.stage, &request.region)?;
        let data = RegionCreateData {
            stage: request.stage.clone(),
            region: request.region.clone(),
            variables,
            resources,
        };
        Ok(Event::new(request, data))
    }

    /// Remove a stage that owns no regions
    pub async fn stage_remove(
        &mut self,
        request: StageRemoveRequest,
    ) -> Result<Event<StageRemoveRequest, StageRemoveData>> {
        let context = ErrorContext::stage(&request.stage);
        request.validate().in_scope(&context)?;

        self.require_project_mut()
            .in_scope(&context)?
            .remove_stage(&request.stage)
            .in_scope(&context)?;
        info!(stage = %request.stage, "Stage removed");

        let data = StageRemoveData {
            stage: request.stage.clone(),
        };
        Ok(Event::new(request, data))
    }
}
