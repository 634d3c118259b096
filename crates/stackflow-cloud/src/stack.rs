//! Stack provisioner
//!
//! Drives a [`StackService`] to a terminal state: create-or-update with
//! polling, idempotent removal, and failure mapping.

use crate::error::{CloudError, Result};
use crate::provider::{
    StackDescription, StackRef, StackRequest, StackService, StackStatus, UpdateOutcome,
    requires_replacement,
};
use crate::waiter::{Backoff, Clock, PollConfig, TokioClock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// What a deploy did to the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployChange {
    Created,
    Updated,
    /// The provider reported nothing to update
    Unchanged,
    /// Same template and parameters as the last deploy; no remote call made
    Cached,
}

impl std::fmt::Display for DeployChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeployChange::Created => write!(f, "created"),
            DeployChange::Updated => write!(f, "updated"),
            DeployChange::Unchanged => write!(f, "unchanged"),
            DeployChange::Cached => write!(f, "cached"),
        }
    }
}

/// Result of a successful deploy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackDeployment {
    pub stack_id: String,
    pub outputs: BTreeMap<String, String>,
    pub change: DeployChange,
}

/// Last successfully deployed revision of a stack
#[derive(Debug, Clone)]
struct Revision {
    template: String,
    parameters: BTreeMap<String, String>,
    deployment: StackDeployment,
}

pub struct StackProvisioner {
    service: Arc<dyn StackService>,
    clock: Arc<dyn Clock>,
    poll: PollConfig,
    revisions: Mutex<HashMap<StackRef, Revision>>,
}

impl StackProvisioner {
    pub fn new(service: Arc<dyn StackService>) -> Self {
        Self {
            service,
            clock: Arc::new(TokioClock),
            poll: PollConfig::default(),
            revisions: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    pub fn service_name(&self) -> &str {
        self.service.name()
    }

    /// Current state of a stack; `None` when absent or deleted
    pub async fn describe(&self, stack: &StackRef) -> Result<Option<StackDescription>> {
        Ok(self
            .service
            .describe_stack(stack)
            .await?
            .filter(|desc| desc.phase() != StackStatus::Deleted))
    }

    /// Create the stack if absent, otherwise update it, and wait for the
    /// result
    pub async fn deploy(&self, request: StackRequest) -> Result<StackDeployment> {
        let stack = request.stack.clone();

        if let Some(cached) = self.cached(&request) {
            info!(stack = %stack, "Template and parameters unchanged, reusing outputs");
            return Ok(cached);
        }

        let mut existing = self.describe(&stack).await?;

        if existing
            .as_ref()
            .is_some_and(|desc| desc.phase() == StackStatus::Pending)
        {
            info!(stack = %stack, "Waiting for in-flight stack operation");
            existing = self.wait_until_settled(&stack).await?;
        }

        if let Some(desc) = existing.as_ref()
            && requires_replacement(&desc.status)
        {
            warn!(stack = %stack, status = %desc.status, "Stack cannot be updated, replacing");
            self.delete_and_wait(&stack).await?;
            existing = None;
        }

        let change = match existing {
            None => {
                let stack_id = self.service.create_stack(&request).await?;
                info!(stack = %stack, stack_id = %stack_id, "Creating stack");
                DeployChange::Created
            }
            Some(desc) => match self.service.update_stack(&request).await? {
                UpdateOutcome::Started => {
                    info!(stack = %stack, "Updating stack");
                    DeployChange::Updated
                }
                UpdateOutcome::NoChanges => {
                    info!(stack = %stack, "No updates to perform");
                    let deployment = StackDeployment {
                        stack_id: desc.stack_id,
                        outputs: desc.outputs,
                        change: DeployChange::Unchanged,
                    };
                    self.remember(&request, &deployment);
                    return Ok(deployment);
                }
            },
        };

        let settled = self.wait_until_settled(&stack).await?.ok_or_else(|| {
            CloudError::ProvisioningFailed {
                stack: stack.to_string(),
                status: "DELETE_COMPLETE".to_string(),
                reason: "stack disappeared while deploying".to_string(),
            }
        })?;

        if settled.phase() != StackStatus::Succeeded {
            return Err(CloudError::ProvisioningFailed {
                stack: stack.to_string(),
                status: settled.status,
                reason: settled.status_reason.unwrap_or_default(),
            });
        }

        info!(
            stack = %stack,
            status = %settled.status,
            outputs = settled.outputs.len(),
            "Stack deployed"
        );
        let deployment = StackDeployment {
            stack_id: settled.stack_id,
            outputs: settled.outputs,
            change,
        };
        self.remember(&request, &deployment);
        Ok(deployment)
    }

    /// Delete a stack and wait until it is gone
    ///
    /// Returns `false` when the stack was already absent.
    pub async fn remove(&self, stack: &StackRef) -> Result<bool> {
        self.forget(stack);

        let Some(desc) = self.describe(stack).await? else {
            info!(stack = %stack, "Stack already absent");
            return Ok(false);
        };

        if desc.phase() == StackStatus::Pending {
            info!(stack = %stack, status = %desc.status, "Waiting for in-flight stack operation");
            if self.wait_until_settled(stack).await?.is_none() {
                return Ok(false);
            }
        }

        self.delete_and_wait(stack).await?;
        info!(stack = %stack, "Stack removed");
        Ok(true)
    }

    async fn delete_and_wait(&self, stack: &StackRef) -> Result<()> {
        info!(stack = %stack, "Deleting stack");
        self.service.delete_stack(stack).await?;

        match self.wait_until_settled(stack).await? {
            None => Ok(()),
            Some(desc) => Err(CloudError::ProvisioningFailed {
                stack: stack.to_string(),
                status: desc.status,
                reason: desc
                    .status_reason
                    .unwrap_or_else(|| "stack still present after delete".to_string()),
            }),
        }
    }

    /// Poll until the stack leaves every `*_IN_PROGRESS` state
    ///
    /// `None` means the stack is gone.
    async fn wait_until_settled(&self, stack: &StackRef) -> Result<Option<StackDescription>> {
        let mut backoff = Backoff::new(self.poll.clone());
        loop {
            let Some(desc) = self.describe(stack).await? else {
                return Ok(None);
            };
            if desc.phase().is_terminal() {
                return Ok(Some(desc));
            }

            debug!(
                stack = %stack,
                status = %desc.status,
                waited = ?backoff.waited(),
                "Stack still in progress"
            );
            if !backoff.wait(self.clock.as_ref()).await {
                return Err(CloudError::ProvisioningTimeout {
                    stack: stack.to_string(),
                    status: desc.status,
                    waited: backoff.waited(),
                });
            }
        }
    }

    fn cached(&self, request: &StackRequest) -> Option<StackDeployment> {
        let revisions = self.revisions.lock().unwrap_or_else(PoisonError::into_inner);
        revisions
            .get(&request.stack)
            .filter(|rev| {
                rev.template == request.template.body && rev.parameters == request.parameters
            })
            .map(|rev| StackDeployment {
                change: DeployChange::Cached,
                ..rev.deployment.clone()
            })
    }

    fn remember(&self, request: &StackRequest, deployment: &StackDeployment) {
        let mut revisions = self.revisions.lock().unwrap_or_else(PoisonError::into_inner);
        revisions.insert(
            request.stack.clone(),
            Revision {
                template: request.template.body.clone(),
                parameters: request.parameters.clone(),
                deployment: deployment.clone(),
            },
        );
    }

    fn forget(&self, stack: &StackRef) {
        let mut revisions = self.revisions.lock().unwrap_or_else(PoisonError::into_inner);
        revisions.remove(stack);
    }
}
