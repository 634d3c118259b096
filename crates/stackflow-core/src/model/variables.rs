//! Scoped variable stores

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Well-known variable keys written by the actions
pub mod keys {
    pub const PROJECT: &str = "project";
    pub const PROJECT_BUCKET: &str = "projectBucket";
    pub const PROJECT_BUCKET_REGION: &str = "projectBucketRegion";
    pub const STAGE: &str = "stage";
    pub const REGION: &str = "region";
    pub const IAM_ROLE_ARN_LAMBDA: &str = "iamRoleArnLambda";
    pub const RESOURCES_STACK_NAME: &str = "resourcesStackName";
}

/// Plain string key/value store attached to one entity
///
/// Writes are last-write-wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Variables(BTreeMap<String, String>);

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Set a value, returning the previous one
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy every entry of `other` over this store
    pub fn extend_from(&mut self, other: &Variables) {
        for (key, value) in other.iter() {
            self.set(key, value);
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Variables {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Layered view over the stores of a region, its stage and its project
///
/// Scopes are held innermost first, so a region value shadows a stage
/// value which shadows a project value.
#[derive(Debug, Clone)]
pub struct ScopedVariables<'a> {
    scopes: Vec<&'a Variables>,
}

impl<'a> ScopedVariables<'a> {
    pub fn new(innermost: &'a Variables) -> Self {
        Self {
            scopes: vec![innermost],
        }
    }

    /// Add an enclosing scope, consulted after every scope already present
    pub fn with_parent(mut self, parent: &'a Variables) -> Self {
        self.scopes.push(parent);
        self
    }

    /// Walk child to parent until the key is found
    pub fn resolve(&self, key: &str) -> Option<&'a str> {
        self.scopes.iter().find_map(|scope| scope.get(key))
    }

    /// Collapse every scope into one store, inner values winning
    pub fn flatten(&self) -> Variables {
        let mut merged = Variables::new();
        for scope in self.scopes.iter().rev() {
            merged.extend_from(scope);
        }
        merged
    }
}
