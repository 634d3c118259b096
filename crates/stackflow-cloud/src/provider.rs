//! Provider traits for the stack service and object storage

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A stack is addressed by region and name; the same name may exist in
/// several regions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StackRef {
    pub region: String,
    pub name: String,
}

impl StackRef {
    pub fn new(region: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for StackRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.region)
    }
}

/// Provider-native stack statuses collapsed to what the provisioner acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackStatus {
    /// An operation is still running
    Pending,
    /// Create or update finished
    Succeeded,
    /// The last operation failed or was rolled back
    Failed,
    /// The stack has been deleted
    Deleted,
}

impl StackStatus {
    /// Map a CloudFormation status string
    ///
    /// Unknown statuses are treated as failures.
    pub fn from_provider(status: &str) -> Self {
        match status {
            "DELETE_COMPLETE" => StackStatus::Deleted,
            "CREATE_COMPLETE" | "UPDATE_COMPLETE" | "IMPORT_COMPLETE" => StackStatus::Succeeded,
            s if s.ends_with("_IN_PROGRESS") => StackStatus::Pending,
            _ => StackStatus::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, StackStatus::Pending)
    }
}

impl std::fmt::Display for StackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StackStatus::Pending => write!(f, "pending"),
            StackStatus::Succeeded => write!(f, "succeeded"),
            StackStatus::Failed => write!(f, "failed"),
            StackStatus::Deleted => write!(f, "deleted"),
        }
    }
}

/// Statuses in which a stack can only be deleted, never updated
pub fn requires_replacement(status: &str) -> bool {
    matches!(
        status,
        "ROLLBACK_COMPLETE" | "CREATE_FAILED" | "ROLLBACK_FAILED"
    )
}

/// Snapshot of a stack as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackDescription {
    pub stack_id: String,
    /// Provider-native status string, e.g. `UPDATE_ROLLBACK_COMPLETE`
    pub status: String,
    pub status_reason: Option<String>,
    pub outputs: BTreeMap<String, String>,
}

impl StackDescription {
    pub fn phase(&self) -> StackStatus {
        StackStatus::from_provider(&self.status)
    }
}

/// Rendered template, optionally also stored as an object the provider
/// can fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackTemplate {
    pub body: String,
    pub url: Option<String>,
}

impl StackTemplate {
    pub fn from_body(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            url: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// Input of a create or update call
#[derive(Debug, Clone)]
pub struct StackRequest {
    pub stack: StackRef,
    pub template: StackTemplate,
    pub parameters: BTreeMap<String, String>,
}

/// Result of asking the provider to update a stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Started,
    /// Template and parameters match the deployed revision
    NoChanges,
}

/// Stack-based infrastructure API
///
/// Implementations report raw provider state; waiting, idempotency and
/// failure mapping live in [`crate::StackProvisioner`].
#[async_trait]
pub trait StackService: Send + Sync {
    /// Returns the provider name (e.g., "cloudformation")
    fn name(&self) -> &str;

    /// Describe a stack; `None` when it does not exist
    async fn describe_stack(&self, stack: &StackRef) -> Result<Option<StackDescription>>;

    /// Start creating a stack, returning its id
    async fn create_stack(&self, request: &StackRequest) -> Result<String>;

    /// Start updating an existing stack
    async fn update_stack(&self, request: &StackRequest) -> Result<UpdateOutcome>;

    /// Start deleting a stack. Deleting an absent stack is not an error.
    async fn delete_stack(&self, stack: &StackRef) -> Result<()>;
}

/// One page of an object listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectPage {
    pub keys: Vec<String>,
    /// Present when the listing was truncated
    pub next_token: Option<String>,
}

/// Object-storage service
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Returns the provider name (e.g., "s3")
    fn name(&self) -> &str;

    /// Create a bucket. Fails with `BucketAlreadyOwned` when the caller
    /// already owns it.
    async fn create_bucket(&self, bucket: &str, region: &str) -> Result<()>;

    /// Delete an empty bucket
    async fn delete_bucket(&self, bucket: &str) -> Result<()>;

    async fn list_objects(
        &self,
        bucket: &str,
        continuation_token: Option<&str>,
    ) -> Result<ObjectPage>;

    /// Delete a batch of keys; `keys` is never empty and never larger than
    /// the provider's batch ceiling
    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<()>;

    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()>;

    /// URL the stack service can fetch an object from
    fn object_url(&self, bucket: &str, key: &str) -> String {
        format!("https://{bucket}.s3.amazonaws.com/{key}")
    }
}
