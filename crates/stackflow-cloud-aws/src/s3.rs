//! S3 object storage

use crate::error::AwsError;
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketLocationConstraint, CreateBucketConfiguration, Delete, ObjectIdentifier,
};
use stackflow_cloud::{CloudError, ObjectPage, ObjectStorage, Result};
use std::collections::HashMap;
use std::sync::PoisonError;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Region S3 reports as an empty location constraint
const LEGACY_REGION: &str = "us-east-1";

fn sdk_error<E>(err: E) -> AwsError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    AwsError::from_parts(err.code(), err.message(), &err)
}

/// Region named by a `GetBucketLocation` response
fn location_region(constraint: Option<&str>) -> String {
    match constraint {
        None | Some("") => LEGACY_REGION.to_string(),
        Some("EU") => "eu-west-1".to_string(),
        Some(region) => region.to_string(),
    }
}

/// Path-style URL; virtual-hosted URLs break TLS for bucket names with dots
fn path_style_url(region: &str, bucket: &str, key: &str) -> String {
    if region == LEGACY_REGION {
        format!("https://s3.amazonaws.com/{bucket}/{key}")
    } else {
        format!("https://s3.{region}.amazonaws.com/{bucket}/{key}")
    }
}

fn content_type(key: &str) -> &'static str {
    if key.ends_with(".json") {
        "application/json"
    } else {
        "application/octet-stream"
    }
}

/// S3 with one client per bucket region
pub struct S3Storage {
    config: SdkConfig,
    default_region: String,
    clients: Mutex<HashMap<String, Client>>,
    bucket_regions: std::sync::Mutex<HashMap<String, String>>,
}

impl S3Storage {
    pub fn new(config: SdkConfig) -> Self {
        let default_region = config
            .region()
            .map(|r| r.as_ref().to_string())
            .unwrap_or_else(|| LEGACY_REGION.to_string());
        Self {
            config,
            default_region,
            clients: Mutex::new(HashMap::new()),
            bucket_regions: std::sync::Mutex::new(HashMap::new()),
        }
    }

    async fn client(&self, region: &str) -> Client {
        let mut clients = self.clients.lock().await;
        clients
            .entry(region.to_string())
            .or_insert_with(|| {
                debug!(region = %region, "Creating S3 client");
                let conf = aws_sdk_s3::config::Builder::from(&self.config)
                    .region(Region::new(region.to_string()))
                    .build();
                Client::from_conf(conf)
            })
            .clone()
    }

    fn cached_region(&self, bucket: &str) -> Option<String> {
        self.bucket_regions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(bucket)
            .cloned()
    }

    fn remember_region(&self, bucket: &str, region: &str) {
        self.bucket_regions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(bucket.to_string(), region.to_string());
    }

    fn forget_region(&self, bucket: &str) {
        self.bucket_regions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(bucket);
    }

    /// Region the bucket lives in, looked up once per bucket
    async fn bucket_region(&self, bucket: &str) -> Result<String> {
        if let Some(region) = self.cached_region(bucket) {
            return Ok(region);
        }

        let output = self
            .client(&self.default_region)
            .await
            .get_bucket_location()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| sdk_error(e).into_cloud(bucket))?;
        let region = location_region(output.location_constraint().map(|c| c.as_str()));
        debug!(bucket = %bucket, region = %region, "Resolved bucket region");
        self.remember_region(bucket, &region);
        Ok(region)
    }

    async fn bucket_client(&self, bucket: &str) -> Result<Client> {
        let region = self.bucket_region(bucket).await?;
        Ok(self.client(&region).await)
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    fn name(&self) -> &str {
        "s3"
    }

    async fn create_bucket(&self, bucket: &str, region: &str) -> Result<()> {
        let client = self.client(region).await;
        let configuration = (region != LEGACY_REGION).then(|| {
            CreateBucketConfiguration::builder()
                .location_constraint(BucketLocationConstraint::from(region))
                .build()
        });

        client
            .create_bucket()
            .bucket(bucket)
            .set_create_bucket_configuration(configuration)
            .send()
            .await
            .map_err(|e| sdk_error(e).into_cloud(bucket))?;
        self.remember_region(bucket, region);
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        let client = self.bucket_client(bucket).await?;
        client
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| sdk_error(e).into_cloud(bucket))?;
        self.forget_region(bucket);
        Ok(())
    }

    async fn list_objects(
        &self,
        bucket: &str,
        continuation_token: Option<&str>,
    ) -> Result<ObjectPage> {
        let client = self.bucket_client(bucket).await?;
        let output = client
            .list_objects_v2()
            .bucket(bucket)
            .set_continuation_token(continuation_token.map(str::to_string))
            .send()
            .await
            .map_err(|e| sdk_error(e).into_cloud(bucket))?;

        let keys = output
            .contents()
            .iter()
            .filter_map(|object| object.key().map(str::to_string))
            .collect();
        let next_token = if output.is_truncated().unwrap_or(false) {
            output.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        Ok(ObjectPage { keys, next_token })
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<()> {
        let objects = keys
            .iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AwsError::Build(e.to_string()).into_cloud(bucket))?;
        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .map_err(|e| AwsError::Build(e.to_string()).into_cloud(bucket))?;

        let client = self.bucket_client(bucket).await?;
        let output = client
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| sdk_error(e).into_cloud(bucket))?;

        if let Some(failed) = output.errors().first() {
            warn!(
                bucket = %bucket,
                failures = output.errors().len(),
                "Some objects were not deleted"
            );
            return Err(CloudError::ApiError(format!(
                "{bucket}: could not delete {}: {} {}",
                failed.key().unwrap_or_default(),
                failed.code().unwrap_or_default(),
                failed.message().unwrap_or_default()
            )));
        }
        Ok(())
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
        let client = self.bucket_client(bucket).await?;
        client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type(key))
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| sdk_error(e).into_cloud(bucket))?;
        Ok(())
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        let region = self
            .cached_region(bucket)
            .unwrap_or_else(|| self.default_region.clone());
        path_style_url(&region, bucket, key)
    }
}
