//! Stage definition

use super::region::Region;
use super::variables::{Variables, keys};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A stage (dev, prod, ...) and the regions it is deployed to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    name: String,
    #[serde(default)]
    variables: Variables,
    /// Regions keyed by region identifier
    #[serde(default)]
    regions: BTreeMap<String, Region>,
}

impl Stage {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let mut variables = Variables::new();
        variables.set(keys::STAGE, name.clone());
        Self {
            name,
            variables,
            regions: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut Variables {
        &mut self.variables
    }

    pub fn region(&self, name: &str) -> Option<&Region> {
        self.regions.get(name)
    }

    pub(crate) fn region_mut(&mut self, name: &str) -> Option<&mut Region> {
        self.regions.get_mut(name)
    }

    pub fn has_region(&self, name: &str) -> bool {
        self.regions.contains_key(name)
    }

    pub fn regions(&self) -> impl Iterator<Item = &Region> {
        self.regions.values()
    }

    pub fn region_names(&self) -> Vec<&str> {
        self.regions.keys().map(String::as_str).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub(crate) fn insert_region(&mut self, region: Region) -> &mut Region {
        self.regions
            .entry(region.name().to_string())
            .or_insert(region)
    }

    pub(crate) fn take_region(&mut self, name: &str) -> Option<Region> {
        self.regions.remove(name)
    }
}
