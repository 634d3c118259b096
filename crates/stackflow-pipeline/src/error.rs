//! Action error types

use serde::Serialize;
use stackflow_cloud::CloudError;
use stackflow_core::CoreError;
use thiserror::Error;

/// What went wrong, independent of the message wording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    DuplicateEntity,
    NotFound,
    ParentNotFound,
    HasDependents,
    NotEmpty,
    ProvisioningFailed,
    ProvisioningTimeout,
    AccessDenied,
    InvalidName,
    ValidationError,
    /// Provider or API failure outside the kinds above
    Remote,
    /// Local project state could not be read or written
    Storage,
}

impl ErrorKind {
    /// Failures detected before any remote call was made
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            ErrorKind::DuplicateEntity
                | ErrorKind::NotFound
                | ErrorKind::ParentNotFound
                | ErrorKind::HasDependents
                | ErrorKind::NotEmpty
                | ErrorKind::InvalidName
                | ErrorKind::ValidationError
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::DuplicateEntity => write!(f, "DuplicateEntity"),
            ErrorKind::NotFound => write!(f, "NotFound"),
            ErrorKind::ParentNotFound => write!(f, "ParentNotFound"),
            ErrorKind::HasDependents => write!(f, "HasDependents"),
            ErrorKind::NotEmpty => write!(f, "NotEmpty"),
            ErrorKind::ProvisioningFailed => write!(f, "ProvisioningFailed"),
            ErrorKind::ProvisioningTimeout => write!(f, "ProvisioningTimeout"),
            ErrorKind::AccessDenied => write!(f, "AccessDenied"),
            ErrorKind::InvalidName => write!(f, "InvalidName"),
            ErrorKind::ValidationError => write!(f, "ValidationError"),
            ErrorKind::Remote => write!(f, "Remote"),
            ErrorKind::Storage => write!(f, "Storage"),
        }
    }
}

/// Entity an action was working on when it failed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ErrorContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl ErrorContext {
    pub fn stage(stage: &str) -> Self {
        Self {
            stage: Some(stage.to_string()),
            region: None,
        }
    }

    pub fn region(stage: &str, region: &str) -> Self {
        Self {
            stage: Some(stage.to_string()),
            region: Some(region.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stage.is_none() && self.region.is_none()
    }
}

impl std::fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.stage, &self.region) {
            (Some(stage), Some(region)) => write!(f, " [stage {stage}, region {region}]"),
            (Some(stage), None) => write!(f, " [stage {stage}]"),
            (None, Some(region)) => write!(f, " [region {region}]"),
            (None, None) => Ok(()),
        }
    }
}

/// Failure of a pipeline action
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{kind}: {message}{context}")]
pub struct ActionError {
    pub kind: ErrorKind,
    pub message: String,
    pub context: ErrorContext,
}

pub type Result<T> = std::result::Result<T, ActionError>;

impl ActionError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ValidationError, message)
    }

    /// Attach the entity context unless one is already set
    pub fn with_context(mut self, context: &ErrorContext) -> Self {
        if self.context.is_empty() {
            self.context = context.clone();
        }
        self
    }
}

impl From<CoreError> for ActionError {
    fn from(err: CoreError) -> Self {
        let kind = match &err {
            CoreError::DuplicateEntity { .. } => ErrorKind::DuplicateEntity,
            CoreError::NotFound { .. } => ErrorKind::NotFound,
            CoreError::ParentNotFound { .. } => ErrorKind::ParentNotFound,
            CoreError::NotEmpty { .. } => ErrorKind::NotEmpty,
            CoreError::HasDependents { .. } => ErrorKind::HasDependents,
            CoreError::InvalidName { .. } => ErrorKind::InvalidName,
            CoreError::Template(_) => ErrorKind::ValidationError,
            CoreError::State(_) | CoreError::Lock(_) | CoreError::Io(_) | CoreError::Json(_) => {
                ErrorKind::Storage
            }
        };
        Self::new(kind, err.to_string())
    }
}

impl From<CloudError> for ActionError {
    fn from(err: CloudError) -> Self {
        let kind = match &err {
            CloudError::ProvisioningFailed { .. } => ErrorKind::ProvisioningFailed,
            CloudError::ProvisioningTimeout { .. } => ErrorKind::ProvisioningTimeout,
            CloudError::AccessDenied(_) => ErrorKind::AccessDenied,
            CloudError::InvalidName { .. } => ErrorKind::InvalidName,
            CloudError::BucketAlreadyOwned(_)
            | CloudError::BucketNotFound(_)
            | CloudError::BucketNotEmpty(_)
            | CloudError::AuthenticationFailed(_)
            | CloudError::ApiError(_)
            | CloudError::Json(_) => ErrorKind::Remote,
        };
        Self::new(kind, err.to_string())
    }
}

/// Convert any error an action sees and tag it with the entity context
pub(crate) trait InScope<T> {
    fn in_scope(self, context: &ErrorContext) -> Result<T>;
}

impl<T, E: Into<ActionError>> InScope<T> for std::result::Result<T, E> {
    fn in_scope(self, context: &ErrorContext) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackflow_core::EntityKind;

    #[test]
    fn test_core_error_kinds() {
        let err = ActionError::from(CoreError::NotEmpty {
            kind: EntityKind::Stage,
            name: "dev".to_string(),
            child_kind: EntityKind::Region,
            count: 1,
            children: "us-east-1".to_string(),
        });
        assert_eq!(err.kind, ErrorKind::NotEmpty);
        assert!(err.kind.is_structural());

        let err = ActionError::from(CoreError::Template("undefined variable".to_string()));
        assert_eq!(err.kind, ErrorKind::ValidationError);
    }

    #[test]
    fn test_cloud_error_kinds() {
        let err = ActionError::from(CloudError::ProvisioningFailed {
            stack: "demo-dev-r (us-east-1)".to_string(),
            status: "ROLLBACK_COMPLETE".to_string(),
            reason: "Role limit exceeded".to_string(),
        });
        assert_eq!(err.kind, ErrorKind::ProvisioningFailed);
        assert!(err.message.contains("Role limit exceeded"));
        assert!(!err.kind.is_structural());

        let err = ActionError::from(CloudError::AccessDenied("demo.com".to_string()));
        assert_eq!(err.kind, ErrorKind::AccessDenied);
    }

    #[test]
    fn test_context_in_display() {
        let err: Result<()> = Err(CoreError::NotFound {
            kind: EntityKind::Region,
            name: "prod/us-east-1".to_string(),
        })
        .in_scope(&ErrorContext::region("prod", "us-east-1"));
        let err = err.unwrap_err();

        assert_eq!(err.context.region.as_deref(), Some("us-east-1"));
        assert_eq!(
            err.to_string(),
            "NotFound: region 'prod/us-east-1' not found [stage prod, region us-east-1]"
        );
    }

    #[test]
    fn test_existing_context_is_kept() {
        let err = ActionError::validation("missing bucket")
            .with_context(&ErrorContext::stage("dev"))
            .with_context(&ErrorContext::region("prod", "eu-west-1"));
        assert_eq!(err.context, ErrorContext::stage("dev"));
    }
}
