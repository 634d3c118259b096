use crate::error::{ActionError, InScope, Result};
use crate::event::{
    Event, RegionCreateData, RegionCreateRequest, RegionRemoveData, RegionRemoveRequest,
};
use crate::pipeline::{LiveStack, Pipeline};
use stackflow_core::{CoreError, EntityKind};
use tracing::info;

impl Pipeline {
    /// Add a region to an existing stage
    pub async fn region_create(
        &mut self,
        request: RegionCreateRequest,
    ) -> Result<Event<RegionCreateRequest, RegionCreateData>> {
        let context = request.context();
        request.validate().in_scope(&context)?;

        self.require_project_mut()
            .in_scope(&context)?
            .create_region(&request.stage, &request.region)
            .in_scope(&context)?;
        info!(stage = %request.stage, region = %request.region, "Region created");

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

    /// Remove a region whose resources stack is gone
    ///
    /// With `remove_resources` the stack is removed first; otherwise a stack
    /// in any state but deleted fails the action with `HasDependents`. This
    /// includes stacks left behind by a failed deploy.
    pub async fn region_remove(
        &mut self,
        request: RegionRemoveRequest,
    ) -> Result<Event<RegionRemoveRequest, RegionRemoveData>> {
        let context = request.context();
        request.validate().in_scope(&context)?;
        self.require_project()
            .in_scope(&context)?
            .region(&request.stage, &request.region)
            .in_scope(&context)?;

        let target = request.as_region_request();
        let live = self.live_resources_stack(&target).await?;
        let resources = match live {
            Some(_) if request.remove_resources => Some(self.teardown_resources(&target).await?),
            Some(LiveStack {
                name,
                status: Some(status),
            }) => {
                return Err(ActionError::from(CoreError::HasDependents {
                    kind: EntityKind::Region,
                    name: format!("{}/{}", request.stage, request.region),
                    dependent: EntityKind::ResourcesStack,
                    detail: format!("stack '{name}' is in {status}; remove it first"),
                })
                .with_context(&context));
            }
            _ => None,
        };

        // without execution a recorded stack still fails with HasDependents
        self.require_project_mut()?
            .remove_region(&request.stage, &request.region)
            .in_scope(&context)?;
        info!(stage = %request.stage, region = %request.region, "Region removed");

        let data = RegionRemoveData {
            stage: request.stage.clone(),
            region: request.region.clone(),
            resources,
        };
        Ok(Event::new(request, data))
    }
}
