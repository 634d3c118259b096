//! AWS providers for StackFlow
//!
//! Implements [`StackService`](stackflow_cloud::StackService) on
//! CloudFormation and [`ObjectStorage`](stackflow_cloud::ObjectStorage) on
//! S3.
//!
//! # Requirements
//!
//! - Credentials resolvable by the default AWS chain (environment, shared
//!   profile, SSO or instance metadata)
//!
//! # Example
//!
//! ```ignore
//! use stackflow_cloud::{BucketManager, StackProvisioner};
//! use stackflow_cloud_aws::AwsProviders;
//! use std::sync::Arc;
//!
//! let aws = AwsProviders::load(Some("default"), "us-east-1").await;
//! let stacks = StackProvisioner::new(aws.stacks);
//! let buckets = BucketManager::new(aws.storage);
//! ```

pub mod cloudformation;
pub mod error;
pub mod s3;

pub use cloudformation::CloudFormationStacks;
pub use error::{AwsError, Result};
pub use s3::S3Storage;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use stackflow_cloud::{ObjectStorage, StackService};
use std::sync::Arc;
use tracing::debug;

/// Shared SDK configuration for a profile and home region
pub async fn load_sdk_config(profile: Option<&str>, region: &str) -> SdkConfig {
    debug!(profile = ?profile, region = %region, "Loading AWS configuration");
    let mut loader =
        aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.to_string()));
    if let Some(profile) = profile {
        loader = loader.profile_name(profile);
    }
    loader.load().await
}

/// Both AWS providers built from one configuration
pub struct AwsProviders {
    pub stacks: Arc<dyn StackService>,
    pub storage: Arc<dyn ObjectStorage>,
}

impl AwsProviders {
    pub fn from_config(config: SdkConfig) -> Self {
        Self {
            stacks: Arc::new(CloudFormationStacks::new(config.clone())),
            storage: Arc::new(S3Storage::new(config)),
        }
    }

    pub async fn load(profile: Option<&str>, region: &str) -> Self {
        Self::from_config(load_sdk_config(profile, region).await)
    }
}
