//! Region definition

use super::variables::{Variables, keys};
use serde::{Deserialize, Serialize};

/// One deployment region of a stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    name: String,
    #[serde(default)]
    variables: Variables,
}

impl Region {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let mut variables = Variables::new();
        variables.set(keys::REGION, name.clone());
        Self { name, variables }
    }

    /// Region identifier, e.g. `us-east-1`
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut Variables {
        &mut self.variables
    }

    /// Name of the resources stack recorded for this region, if any
    pub fn resources_stack_name(&self) -> Option<&str> {
        self.variables.get(keys::RESOURCES_STACK_NAME)
    }

    pub fn has_resources_stack(&self) -> bool {
        self.resources_stack_name().is_some()
    }

    pub fn iam_role_arn(&self) -> Option<&str> {
        self.variables.get(keys::IAM_ROLE_ARN_LAMBDA)
    }
}
