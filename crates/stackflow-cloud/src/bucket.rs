//! Provisioning bucket management

use crate::error::{CloudError, Result};
use crate::provider::ObjectStorage;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info};

/// Keys per delete request accepted by S3-compatible stores
pub const MAX_DELETE_BATCH: usize = 1000;

/// List/delete rounds before giving up on a bucket that keeps refilling
const MAX_EMPTY_PASSES: usize = 10;

static BUCKET_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9][a-z0-9.-]{1,61}[a-z0-9]$").expect("valid bucket name pattern")
});

static IP_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}$").expect("valid ip pattern")
});

/// Check a bucket name against the S3 naming rules
pub fn validate_bucket_name(name: &str) -> Result<()> {
    let reason = if !BUCKET_NAME.is_match(name) {
        "3-63 lowercase letters, digits, dots or hyphens, starting and ending with a letter or digit"
    } else if name.contains("..") || name.contains(".-") || name.contains("-.") {
        "dots may not be adjacent to dots or hyphens"
    } else if IP_ADDRESS.is_match(name) {
        "must not be formatted as an IP address"
    } else {
        return Ok(());
    };

    Err(CloudError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    })
}

/// Bucket operations on top of an [`ObjectStorage`]
pub struct BucketManager {
    storage: Arc<dyn ObjectStorage>,
    batch_size: usize,
}

impl BucketManager {
    pub fn new(storage: Arc<dyn ObjectStorage>) -> Self {
        Self {
            storage,
            batch_size: MAX_DELETE_BATCH,
        }
    }

    /// Keys per delete request, clamped to `1..=MAX_DELETE_BATCH`
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, MAX_DELETE_BATCH);
        self
    }

    pub fn storage_name(&self) -> &str {
        self.storage.name()
    }

    /// Create the bucket unless the caller already owns it
    pub async fn ensure_bucket(&self, bucket: &str, region: &str) -> Result<()> {
        validate_bucket_name(bucket)?;
        match self.storage.create_bucket(bucket, region).await {
            Ok(()) => {
                info!(bucket = %bucket, region = %region, "Created bucket");
                Ok(())
            }
            Err(CloudError::BucketAlreadyOwned(_)) => {
                debug!(bucket = %bucket, "Bucket already exists");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Store an object, returning the URL it can be fetched from
    pub async fn upload(
        &self,
        bucket: &str,
        key: &str,
        body: impl Into<Vec<u8>>,
    ) -> Result<String> {
        self.storage.put_object(bucket, key, body.into()).await?;
        debug!(bucket = %bucket, key = %key, "Uploaded object");
        Ok(self.storage.object_url(bucket, key))
    }

    /// Every key in the bucket, following continuation tokens
    pub async fn list_all(&self, bucket: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self.storage.list_objects(bucket, token.as_deref()).await?;
            keys.extend(page.keys);
            match page.next_token {
                Some(next) => token = Some(next),
                None => return Ok(keys),
            }
        }
    }

    /// Delete every object, re-listing until a listing comes back empty
    ///
    /// Returns the number of objects deleted.
    pub async fn empty(&self, bucket: &str) -> Result<usize> {
        let mut deleted = 0;
        for pass in 1..=MAX_EMPTY_PASSES {
            let keys = self.list_all(bucket).await?;
            if keys.is_empty() {
                return Ok(deleted);
            }

            for batch in keys.chunks(self.batch_size) {
                self.storage.delete_objects(bucket, batch).await?;
            }
            deleted += keys.len();
            debug!(bucket = %bucket, pass, deleted = keys.len(), "Deleted objects");
        }
        Err(CloudError::BucketNotEmpty(bucket.to_string()))
    }

    /// Empty the bucket and delete it. An absent bucket is not an error.
    pub async fn empty_and_delete(&self, bucket: &str) -> Result<()> {
        let deleted = match self.empty(bucket).await {
            Ok(deleted) => deleted,
            Err(CloudError::BucketNotFound(_)) => {
                info!(bucket = %bucket, "Bucket already absent");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        match self.storage.delete_bucket(bucket).await {
            Ok(()) => {
                info!(bucket = %bucket, objects = deleted, "Deleted bucket");
                Ok(())
            }
            Err(CloudError::BucketNotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryObjectStorage, StorageCall};

    fn manager(storage: &Arc<InMemoryObjectStorage>) -> BucketManager {
        BucketManager::new(storage.clone())
    }

    async fn seed(storage: &InMemoryObjectStorage, bucket: &str, count: usize) {
        for i in 0..count {
            storage
                .put_object(bucket, &format!("objects/{i:05}.json"), b"{}".to_vec())
                .await
                .unwrap();
        }
    }

    #[test]
    fn test_bucket_name_rules() {
        assert!(validate_bucket_name("testprj0001.com").is_ok());
        assert!(validate_bucket_name("my-bucket").is_ok());
        assert!(validate_bucket_name("ab").is_err());
        assert!(validate_bucket_name("My_Bucket").is_err());
        assert!(validate_bucket_name("bucket..name").is_err());
        assert!(validate_bucket_name("-bucket").is_err());
        assert!(validate_bucket_name("192.168.1.1").is_err());
    }

    #[tokio::test]
    async fn test_ensure_bucket_is_idempotent() {
        let storage = Arc::new(InMemoryObjectStorage::new());
        let buckets = manager(&storage);

        buckets.ensure_bucket("demo.com", "us-east-1").await.unwrap();
        buckets.ensure_bucket("demo.com", "us-east-1").await.unwrap();

        assert!(storage.bucket_exists("demo.com"));
        assert_eq!(storage.bucket_region("demo.com").as_deref(), Some("us-east-1"));
    }

    #[tokio::test]
    async fn test_ensure_bucket_errors() {
        let storage = Arc::new(InMemoryObjectStorage::new());
        storage.deny("locked.com");
        let buckets = manager(&storage);

        assert!(matches!(
            buckets.ensure_bucket("locked.com", "us-east-1").await,
            Err(CloudError::AccessDenied(_))
        ));
        assert!(matches!(
            buckets.ensure_bucket("Bad_Name", "us-east-1").await,
            Err(CloudError::InvalidName { .. })
        ));
        // invalid names never reach the provider
        assert_eq!(storage.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_bucket_skips_delete_objects() {
        let storage = Arc::new(InMemoryObjectStorage::new());
        let buckets = manager(&storage);
        buckets.ensure_bucket("empty.com", "us-east-1").await.unwrap();

        buckets.empty_and_delete("empty.com").await.unwrap();

        assert!(!storage.bucket_exists("empty.com"));
        assert!(
            !storage
                .calls()
                .iter()
                .any(|c| matches!(c, StorageCall::DeleteObjects { .. }))
        );
    }

    #[tokio::test]
    async fn test_empty_and_delete_many_objects() {
        let storage = Arc::new(InMemoryObjectStorage::new().with_page_size(400));
        let buckets = manager(&storage);
        buckets.ensure_bucket("full.com", "us-east-1").await.unwrap();
        seed(&storage, "full.com", 2500).await;

        buckets.empty_and_delete("full.com").await.unwrap();

        assert!(!storage.bucket_exists("full.com"));
        let calls = storage.calls();
        let batches: Vec<usize> = calls
            .iter()
            .filter_map(|c| match c {
                StorageCall::DeleteObjects { count, .. } => Some(*count),
                _ => None,
            })
            .collect();
        assert_eq!(batches, vec![1000, 1000, 500]);
        assert_eq!(
            calls.last(),
            Some(&StorageCall::DeleteBucket {
                bucket: "full.com".to_string(),
                remaining: 0,
            })
        );
    }

    #[tokio::test]
    async fn test_custom_batch_size() {
        let storage = Arc::new(InMemoryObjectStorage::new());
        let buckets = manager(&storage).with_batch_size(2);
        buckets.ensure_bucket("small.com", "us-east-1").await.unwrap();
        seed(&storage, "small.com", 5).await;

        assert_eq!(buckets.empty("small.com").await.unwrap(), 5);
        assert_eq!(storage.object_count("small.com"), Some(0));
    }

    #[tokio::test]
    async fn test_empty_and_delete_absent_bucket() {
        let storage = Arc::new(InMemoryObjectStorage::new());
        let buckets = manager(&storage);
        assert!(buckets.empty_and_delete("gone.com").await.is_ok());
    }

    #[tokio::test]
    async fn test_upload_returns_url() {
        let storage = Arc::new(InMemoryObjectStorage::new());
        let buckets = manager(&storage);
        buckets.ensure_bucket("demo.com", "us-east-1").await.unwrap();

        let url = buckets
            .upload("demo.com", "stackflow/demo/template.json", "{}")
            .await
            .unwrap();

        assert_eq!(url, "https://demo.com.s3.amazonaws.com/stackflow/demo/template.json");
        assert_eq!(
            storage.object("demo.com", "stackflow/demo/template.json"),
            Some(b"{}".to_vec())
        );
    }
}
