//! Cloud provider error types

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Stack {stack} ended in {status}: {reason}")]
    ProvisioningFailed {
        stack: String,
        status: String,
        reason: String,
    },

    #[error("Timed out after {waited:?} waiting for stack {stack} (last status {status})")]
    ProvisioningTimeout {
        stack: String,
        status: String,
        waited: Duration,
    },

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Invalid bucket name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Bucket already owned by you: {0}")]
    BucketAlreadyOwned(String),

    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    #[error("Bucket is not empty: {0}")]
    BucketNotEmpty(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CloudError>;
