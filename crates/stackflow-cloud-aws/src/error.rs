//! AWS provider error types

use stackflow_cloud::CloudError;
use thiserror::Error;

/// Error codes meaning the credentials were rejected
const AUTH_CODES: &[&str] = &[
    "ExpiredToken",
    "ExpiredTokenException",
    "InvalidAccessKeyId",
    "InvalidClientTokenId",
    "SignatureDoesNotMatch",
    "UnrecognizedClientException",
];

#[derive(Error, Debug)]
pub enum AwsError {
    #[error("{code}: {message}")]
    Service { code: String, message: String },

    #[error("Request could not be sent: {0}")]
    Transport(String),

    #[error("Invalid request: {0}")]
    Build(String),

    #[error("Response is missing {0}")]
    MissingField(&'static str),
}

pub type Result<T> = std::result::Result<T, AwsError>;

impl AwsError {
    /// Build from the error metadata of an SDK call
    ///
    /// Errors without a service code never reached AWS (DNS, TLS,
    /// credential resolution) and become [`AwsError::Transport`].
    pub fn from_parts(
        code: Option<&str>,
        message: Option<&str>,
        err: &(dyn std::error::Error + 'static),
    ) -> Self {
        match code {
            Some(code) => AwsError::Service {
                code: code.to_string(),
                message: message.map(str::to_string).unwrap_or_else(|| error_chain(err)),
            },
            None => AwsError::Transport(error_chain(err)),
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            AwsError::Service { code, .. } => Some(code),
            _ => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AwsError::Service { message, .. } => message,
            AwsError::Transport(message) | AwsError::Build(message) => message,
            AwsError::MissingField(field) => field,
        }
    }

    /// Map onto the provider-neutral error; `subject` names the bucket or
    /// stack the call was about
    pub fn into_cloud(self, subject: &str) -> CloudError {
        match self.code() {
            Some("BucketAlreadyOwnedByYou") => CloudError::BucketAlreadyOwned(subject.to_string()),
            Some("BucketAlreadyExists") => {
                CloudError::AccessDenied(format!("{subject} is owned by another account"))
            }
            Some("NoSuchBucket") => CloudError::BucketNotFound(subject.to_string()),
            Some("BucketNotEmpty") => CloudError::BucketNotEmpty(subject.to_string()),
            Some("InvalidBucketName") => CloudError::InvalidName {
                name: subject.to_string(),
                reason: self.message().to_string(),
            },
            Some("AccessDenied" | "AccessDeniedException" | "AllAccessDisabled") => {
                CloudError::AccessDenied(format!("{subject}: {}", self.message()))
            }
            Some(code) if AUTH_CODES.contains(&code) => {
                CloudError::AuthenticationFailed(self.to_string())
            }
            _ => CloudError::ApiError(format!("{subject}: {self}")),
        }
    }
}

impl From<AwsError> for CloudError {
    fn from(err: AwsError) -> Self {
        err.into_cloud("aws")
    }
}

/// Display of an error followed by its sources
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(code: &str, message: &str) -> AwsError {
        AwsError::Service {
            code: code.to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn test_bucket_codes() {
        assert!(matches!(
            service("BucketAlreadyOwnedByYou", "yours").into_cloud("demo.com"),
            CloudError::BucketAlreadyOwned(b) if b == "demo.com"
        ));
        assert!(matches!(
            service("NoSuchBucket", "missing").into_cloud("demo.com"),
            CloudError::BucketNotFound(_)
        ));
        assert!(matches!(
            service("BucketAlreadyExists", "taken").into_cloud("demo.com"),
            CloudError::AccessDenied(_)
        ));
        assert!(matches!(
            service("InvalidBucketName", "bad").into_cloud("Bad_Name"),
            CloudError::InvalidName { reason, .. } if reason == "bad"
        ));
    }

    #[test]
    fn test_auth_and_fallback_codes() {
        assert!(matches!(
            service("ExpiredToken", "expired").into_cloud("demo.com"),
            CloudError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            service("Throttling", "slow down").into_cloud("demo-dev-r"),
            CloudError::ApiError(msg) if msg == "demo-dev-r: Throttling: slow down"
        ));
        assert!(matches!(
            CloudError::from(AwsError::Transport("dns".to_string())),
            CloudError::ApiError(_)
        ));
    }

    #[test]
    fn test_from_parts() {
        let io = std::io::Error::other("connection reset");
        let err = AwsError::from_parts(None, None, &io);
        assert!(matches!(err, AwsError::Transport(ref m) if m == "connection reset"));

        let err = AwsError::from_parts(Some("ValidationError"), None, &io);
        assert_eq!(err.code(), Some("ValidationError"));
        assert_eq!(err.message(), "connection reset");
    }
}
