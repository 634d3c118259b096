//! CloudFormation stack service

use crate::error::AwsError;
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_cloudformation::Client;
use aws_sdk_cloudformation::config::Region;
use aws_sdk_cloudformation::error::ProvideErrorMetadata;
use aws_sdk_cloudformation::types::{Capability, Parameter, Stack};
use stackflow_cloud::{
    CloudError, Result, StackDescription, StackRef, StackRequest, StackService, UpdateOutcome,
};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;
use tracing::debug;

const NO_UPDATES: &str = "No updates are to be performed";

fn sdk_error<E>(err: E) -> AwsError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    AwsError::from_parts(err.code(), err.message(), &err)
}

/// `ValidationError` returned for a stack name that does not exist
fn is_missing_stack(err: &AwsError) -> bool {
    err.code() == Some("ValidationError") && err.message().contains("does not exist")
}

fn is_no_updates(err: &AwsError) -> bool {
    err.code() == Some("ValidationError") && err.message().contains(NO_UPDATES)
}

fn parameters(request: &StackRequest) -> Vec<Parameter> {
    request
        .parameters
        .iter()
        .map(|(key, value)| {
            Parameter::builder()
                .parameter_key(key)
                .parameter_value(value)
                .build()
        })
        .collect()
}

fn describe(stack: &Stack) -> std::result::Result<StackDescription, AwsError> {
    let outputs: BTreeMap<String, String> = stack
        .outputs()
        .iter()
        .filter_map(|o| Some((o.output_key()?.to_string(), o.output_value()?.to_string())))
        .collect();

    Ok(StackDescription {
        stack_id: stack
            .stack_id()
            .ok_or(AwsError::MissingField("StackId"))?
            .to_string(),
        status: stack
            .stack_status()
            .ok_or(AwsError::MissingField("StackStatus"))?
            .as_str()
            .to_string(),
        status_reason: stack.stack_status_reason().map(str::to_string),
        outputs,
    })
}

/// CloudFormation in every region a project deploys to
///
/// Stacks are regional; one client is built per region from the shared
/// SDK configuration on first use.
pub struct CloudFormationStacks {
    config: SdkConfig,
    clients: Mutex<HashMap<String, Client>>,
}

impl CloudFormationStacks {
    pub fn new(config: SdkConfig) -> Self {
        Self {
            config,
            clients: Mutex::new(HashMap::new()),
        }
    }

    async fn client(&self, region: &str) -> Client {
        let mut clients = self.clients.lock().await;
        clients
            .entry(region.to_string())
            .or_insert_with(|| {
                debug!(region = %region, "Creating CloudFormation client");
                let conf = aws_sdk_cloudformation::config::Builder::from(&self.config)
                    .region(Region::new(region.to_string()))
                    .build();
                Client::from_conf(conf)
            })
            .clone()
    }
}

#[async_trait]
impl StackService for CloudFormationStacks {
    fn name(&self) -> &str {
        "cloudformation"
    }

    async fn describe_stack(&self, stack: &StackRef) -> Result<Option<StackDescription>> {
        let client = self.client(&stack.region).await;
        let output = match client.describe_stacks().stack_name(&stack.name).send().await {
            Ok(output) => output,
            Err(err) => {
                let err = sdk_error(err);
                if is_missing_stack(&err) {
                    return Ok(None);
                }
                return Err(err.into_cloud(&stack.to_string()));
            }
        };

        match output.stacks().first() {
            Some(found) => describe(found)
                .map(Some)
                .map_err(|e| e.into_cloud(&stack.to_string())),
            None => Ok(None),
        }
    }

    async fn create_stack(&self, request: &StackRequest) -> Result<String> {
        let client = self.client(&request.stack.region).await;
        let output = client
            .create_stack()
            .stack_name(&request.stack.name)
            .set_template_url(request.template.url.clone())
            .set_template_body(match request.template.url {
                Some(_) => None,
                None => Some(request.template.body.clone()),
            })
            .set_parameters(Some(parameters(request)))
            .capabilities(Capability::CapabilityIam)
            .send()
            .await
            .map_err(|e| sdk_error(e).into_cloud(&request.stack.to_string()))?;

        output
            .stack_id()
            .map(str::to_string)
            .ok_or_else(|| AwsError::MissingField("StackId").into_cloud(&request.stack.to_string()))
    }

    async fn update_stack(&self, request: &StackRequest) -> Result<UpdateOutcome> {
        let client = self.client(&request.stack.region).await;
        let result = client
            .update_stack()
            .stack_name(&request.stack.name)
            .set_template_url(request.template.url.clone())
            .set_template_body(match request.template.url {
                Some(_) => None,
                None => Some(request.template.body.clone()),
            })
            .set_parameters(Some(parameters(request)))
            .capabilities(Capability::CapabilityIam)
            .send()
            .await;

        match result {
            Ok(_) => Ok(UpdateOutcome::Started),
            Err(err) => {
                let err = sdk_error(err);
                if is_no_updates(&err) {
                    Ok(UpdateOutcome::NoChanges)
                } else {
                    Err(err.into_cloud(&request.stack.to_string()))
                }
            }
        }
    }

    async fn delete_stack(&self, stack: &StackRef) -> Result<()> {
        let client = self.client(&stack.region).await;
        match client.delete_stack().stack_name(&stack.name).send().await {
            Ok(_) => Ok(()),
            Err(err) => {
                let err = sdk_error(err);
                if is_missing_stack(&err) {
                    return Ok(());
                }
                Err(CloudError::from(err))
            }
        }
    }
}
