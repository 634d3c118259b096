use thiserror::Error;

/// Level of the entity tree an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Project,
    Stage,
    Region,
    ResourcesStack,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Project => write!(f, "project"),
            EntityKind::Stage => write!(f, "stage"),
            EntityKind::Region => write!(f, "region"),
            EntityKind::ResourcesStack => write!(f, "resources stack"),
        }
    }
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("{kind} '{name}' already exists")]
    DuplicateEntity { kind: EntityKind, name: String },

    #[error("{kind} '{name}' not found")]
    NotFound { kind: EntityKind, name: String },

    #[error("cannot create {kind} '{name}': {parent_kind} '{parent}' not found")]
    ParentNotFound {
        kind: EntityKind,
        name: String,
        parent_kind: EntityKind,
        parent: String,
    },

    #[error("{kind} '{name}' still owns {count} {child_kind}(s): {children}")]
    NotEmpty {
        kind: EntityKind,
        name: String,
        child_kind: EntityKind,
        count: usize,
        children: String,
    },

    #[error("{kind} '{name}' still has a live {dependent}: {detail}")]
    HasDependents {
        kind: EntityKind,
        name: String,
        dependent: EntityKind,
        detail: String,
    },

    #[error("Invalid {kind} name '{name}': {reason}")]
    InvalidName {
        kind: EntityKind,
        name: String,
        reason: String,
    },

    #[error("Template render error: {0}")]
    Template(String),

    #[error("State file error: {0}")]
    State(String),

    #[error("Lock acquisition failed: {0}")]
    Lock(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
