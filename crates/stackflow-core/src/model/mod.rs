//! Entity model
//!
//! Project → Stage → Region, each level embedding its own [`Variables`].

mod project;
mod region;
mod stage;
mod variables;

// Re-exports
pub use project::*;
pub use region::*;
pub use stage::*;
pub use variables::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CoreError, EntityKind};

    fn project() -> Project {
        Project::new("testprj-0001", "testprj0001.com", "us-east-1").unwrap()
    }

    #[test]
    fn test_project_name_is_normalized() {
        let project = project();
        assert_eq!(project.name(), "testprj0001");
        assert_eq!(project.variables().get(keys::PROJECT), Some("testprj0001"));
        assert_eq!(
            project.variables().get(keys::PROJECT_BUCKET),
            Some("testprj0001.com")
        );
        assert_eq!(
            project.variables().get(keys::PROJECT_BUCKET_REGION),
            Some("us-east-1")
        );
    }

    #[test]
    fn test_project_name_without_alphanumerics_is_rejected() {
        let err = Project::new("---", "bucket", "us-east-1").unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidName {
                kind: EntityKind::Project,
                ..
            }
        ));
    }

    #[test]
    fn test_duplicate_stage_is_rejected() {
        let mut project = project();
        project.create_stage("dev").unwrap();

        let err = project.create_stage("dev").unwrap_err();
        assert!(matches!(
            err,
            CoreError::DuplicateEntity {
                kind: EntityKind::Stage,
                ..
            }
        ));
        assert_eq!(project.stage_names(), vec!["dev"]);
    }

    #[test]
    fn test_region_requires_parent_stage() {
        let mut project = project();
        let err = project.create_region("prod", "us-east-1").unwrap_err();
        assert!(matches!(
            err,
            CoreError::ParentNotFound {
                kind: EntityKind::Region,
                parent_kind: EntityKind::Stage,
                ..
            }
        ));
    }

    #[test]
    fn test_duplicate_region_is_rejected() {
        let mut project = project();
        project.create_stage("dev").unwrap();
        project.create_region("dev", "us-east-1").unwrap();

        let err = project.create_region("dev", "us-east-1").unwrap_err();
        assert!(matches!(
            err,
            CoreError::DuplicateEntity {
                kind: EntityKind::Region,
                ..
            }
        ));
    }

    #[test]
    fn test_same_region_in_different_stages() {
        let mut project = project();
        project.create_stage("dev").unwrap();
        project.create_stage("prod").unwrap();
        project.create_region("dev", "us-east-1").unwrap();
        project.create_region("prod", "us-east-1").unwrap();

        assert_eq!(
            project.region("prod", "us-east-1").unwrap().variables().get(keys::REGION),
            Some("us-east-1")
        );
    }

    #[test]
    fn test_invalid_names() {
        let mut project = project();
        assert!(project.create_stage("my stage").is_err());
        project.create_stage("dev").unwrap();
        assert!(project.create_region("dev", "mars").is_err());
        assert!(project.stage("dev").unwrap().is_empty());
    }

    #[test]
    fn test_lookup_missing_entities() {
        let mut project = project();
        assert!(matches!(
            project.stage("dev"),
            Err(CoreError::NotFound {
                kind: EntityKind::Stage,
                ..
            })
        ));
        project.create_stage("dev").unwrap();
        assert!(matches!(
            project.region("dev", "us-east-1"),
            Err(CoreError::NotFound {
                kind: EntityKind::Region,
                ..
            })
        ));
    }

    #[test]
    fn test_stage_with_regions_cannot_be_removed() {
        let mut project = project();
        project.create_stage("dev").unwrap();
        project.create_region("dev", "us-east-1").unwrap();

        let err = project.remove_stage("dev").unwrap_err();
        assert!(matches!(err, CoreError::NotEmpty { count: 1, .. }));
        assert!(project.has_stage("dev"));

        project.remove_region("dev", "us-east-1").unwrap();
        project.remove_stage("dev").unwrap();
        assert!(!project.has_stage("dev"));
    }

    #[test]
    fn test_region_with_stack_cannot_be_removed() {
        let mut project = project();
        project.create_stage("dev").unwrap();
        project
            .create_region("dev", "us-east-1")
            .unwrap()
            .variables_mut()
            .set(keys::RESOURCES_STACK_NAME, "testprj0001-dev-r");

        let err = project.remove_region("dev", "us-east-1").unwrap_err();
        assert!(matches!(
            err,
            CoreError::HasDependents {
                dependent: EntityKind::ResourcesStack,
                ..
            }
        ));

        project
            .region_mut("dev", "us-east-1")
            .unwrap()
            .variables_mut()
            .remove(keys::RESOURCES_STACK_NAME);
        assert!(project.remove_region("dev", "us-east-1").is_ok());
    }

    #[test]
    fn test_project_with_stages_is_not_empty() {
        let mut project = project();
        assert!(project.ensure_empty().is_ok());
        project.create_stage("dev").unwrap();
        assert!(matches!(
            project.ensure_empty(),
            Err(CoreError::NotEmpty {
                kind: EntityKind::Project,
                ..
            })
        ));
    }

    #[test]
    fn test_variable_resolution_walks_parents() {
        let mut project = project();
        project.variables_mut().set("domain", "example.com");
        project.variables_mut().set("logLevel", "info");
        let stage = project.create_stage("prod").unwrap();
        stage.variables_mut().set("logLevel", "warn");
        project.create_region("prod", "us-east-1").unwrap();
        project
            .region_mut("prod", "us-east-1")
            .unwrap()
            .variables_mut()
            .set("logLevel", "error");

        let scoped = project.scoped_variables("prod", Some("us-east-1")).unwrap();
        assert_eq!(scoped.resolve("logLevel"), Some("error"));
        assert_eq!(scoped.resolve("domain"), Some("example.com"));
        assert_eq!(scoped.resolve("stage"), Some("prod"));
        assert_eq!(scoped.resolve("missing"), None);

        let stage_scope = project.scoped_variables("prod", None).unwrap();
        assert_eq!(stage_scope.resolve("logLevel"), Some("warn"));
        assert_eq!(stage_scope.resolve("region"), None);

        let flat = project.resolve_variables("prod", "us-east-1").unwrap();
        assert_eq!(flat.get("logLevel"), Some("error"));
        assert_eq!(flat.get("project"), Some("testprj0001"));
    }

    #[test]
    fn test_variables_last_write_wins() {
        let mut vars = Variables::new();
        assert_eq!(vars.set("a", "1"), None);
        assert_eq!(vars.set("a", "2"), Some("1".to_string()));
        assert_eq!(vars.get("a"), Some("2"));
        assert_eq!(vars.len(), 1);
    }

    #[test]
    fn test_project_serialization_round_trip() {
        let mut project = project();
        project.create_stage("dev").unwrap();
        project
            .create_region("dev", "us-east-1")
            .unwrap()
            .variables_mut()
            .set(keys::IAM_ROLE_ARN_LAMBDA, "arn:aws:iam::123456789012:role/x");

        let json = serde_json::to_string(&project).unwrap();
        let restored: Project = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, project);
        assert_eq!(
            restored.region("dev", "us-east-1").unwrap().iam_role_arn(),
            Some("arn:aws:iam::123456789012:role/x")
        );
    }
}
