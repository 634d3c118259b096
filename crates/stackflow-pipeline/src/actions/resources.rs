use crate::error::{InScope, Result};
use crate::event::{
    Event, ResourcesDeployData, ResourcesDeployRequest, ResourcesRemoveData,
    ResourcesRemoveRequest,
};
use crate::pipeline::Pipeline;

impl Pipeline {
    /// Render the resources template for a region and deploy it
    pub async fn resources_deploy(
        &mut self,
        request: ResourcesDeployRequest,
    ) -> Result<Event<ResourcesDeployRequest, ResourcesDeployData>> {
        let context = request.context();
        request.validate().in_scope(&context)?;
        self.require_project()
            .in_scope(&context)?
            .region(&request.stage, &request.region)
            .in_scope(&context)?;

        let data = self.provision_resources(&request).await?;
        Ok(Event::new(request, data))
    }

    /// Remove the resources stack of a region; removing an absent stack
    /// succeeds
    pub async fn resources_remove(
        &mut self,
        request: ResourcesRemoveRequest,
    ) -> Result<Event<ResourcesRemoveRequest, ResourcesRemoveData>> {
        let context = request.context();
        request.validate().in_scope(&context)?;

        let data = self.teardown_resources(&request).await?;
        Ok(Event::new(request, data))
    }
}
