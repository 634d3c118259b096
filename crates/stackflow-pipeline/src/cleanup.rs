//! Bucket cleanup after a project is removed
//!
//! `project_remove` never touches the provisioning bucket. Callers that want
//! it gone run [`purge_project_bucket`] on the returned project.

use crate::error::{ErrorContext, InScope, Result};
use stackflow_cloud::BucketManager;
use stackflow_core::Project;
use tracing::info;

/// Empty and delete the provisioning bucket of `project`
///
/// Returns `false` without calling the provider when execution is
/// disabled. A bucket that is already gone counts as purged.
pub async fn purge_project_bucket(
    project: &Project,
    buckets: &BucketManager,
    no_exe_cf: bool,
) -> Result<bool> {
    if no_exe_cf {
        info!(bucket = %project.bucket(), "Execution disabled, bucket left untouched");
        return Ok(false);
    }

    buckets
        .empty_and_delete(project.bucket())
        .await
        .in_scope(&ErrorContext::default())?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackflow_cloud::ObjectStorage;
    use stackflow_cloud::memory::InMemoryObjectStorage;
    use std::sync::Arc;

    fn project() -> Project {
        Project::new("demo", "demo-bucket.com", "us-east-1").unwrap()
    }

    #[tokio::test]
    async fn test_purge_skipped_without_execution() {
        let storage = Arc::new(InMemoryObjectStorage::new());
        storage.create_bucket("demo-bucket.com", "us-east-1").await.unwrap();
        let buckets = BucketManager::new(storage.clone());

        assert!(!purge_project_bucket(&project(), &buckets, true).await.unwrap());
        assert!(storage.bucket_exists("demo-bucket.com"));
        assert_eq!(storage.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_purge_deletes_objects_then_bucket() {
        let storage = Arc::new(InMemoryObjectStorage::new());
        storage.create_bucket("demo-bucket.com", "us-east-1").await.unwrap();
        for i in 0..3 {
            storage
                .put_object("demo-bucket.com", &format!("stackflow/{i}.json"), b"{}".to_vec())
                .await
                .unwrap();
        }
        let buckets = BucketManager::new(storage.clone());

        assert!(purge_project_bucket(&project(), &buckets, false).await.unwrap());
        assert!(!storage.bucket_exists("demo-bucket.com"));
        // a second purge finds nothing to do
        assert!(purge_project_bucket(&project(), &buckets, false).await.unwrap());
    }
}
