//! Project definition: root of the entity tree

use super::region::Region;
use super::stage::Stage;
use super::variables::{ScopedVariables, Variables, keys};
use crate::error::{CoreError, EntityKind, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

static STAGE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]+$").expect("valid stage name pattern"));

static REGION_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{2}(-[a-z]+)+-[0-9]+$").expect("valid region pattern"));

/// Strip everything but ASCII letters and digits from a project name
pub fn normalize_project_name(name: &str) -> String {
    name.chars().filter(char::is_ascii_alphanumeric).collect()
}

/// Root entity. Exclusively owns its stages, which own their regions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    name: String,
    bucket: String,
    bucket_region: String,
    #[serde(default)]
    variables: Variables,
    /// Stages keyed by stage name
    #[serde(default)]
    stages: BTreeMap<String, Stage>,
}

impl Project {
    /// Create a project with no stages
    ///
    /// The name is normalized with [`normalize_project_name`]; a name with
    /// nothing left after normalization is rejected.
    pub fn new(
        name: &str,
        bucket: impl Into<String>,
        bucket_region: impl Into<String>,
    ) -> Result<Self> {
        let normalized = normalize_project_name(name);
        if normalized.is_empty() {
            return Err(CoreError::InvalidName {
                kind: EntityKind::Project,
                name: name.to_string(),
                reason: "must contain at least one letter or digit".to_string(),
            });
        }
        let bucket = bucket.into();
        let bucket_region = bucket_region.into();
        validate_region_name(&bucket_region)?;

        let mut variables = Variables::new();
        variables.set(keys::PROJECT, normalized.clone());
        variables.set(keys::PROJECT_BUCKET, bucket.clone());
        variables.set(keys::PROJECT_BUCKET_REGION, bucket_region.clone());

        Ok(Self {
            name: normalized,
            bucket,
            bucket_region,
            variables,
            stages: BTreeMap::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Provisioning bucket holding templates and state
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn bucket_region(&self) -> &str {
        &self.bucket_region
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut Variables {
        &mut self.variables
    }

    /// Name of the resources stack of a stage; regional, so shared by
    /// every region of the stage
    pub fn resources_stack_name(&self, stage: &str) -> String {
        format!("{}-{}-r", self.name, stage)
    }

    pub fn stages(&self) -> impl Iterator<Item = &Stage> {
        self.stages.values()
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.keys().map(String::as_str).collect()
    }

    pub fn has_stage(&self, name: &str) -> bool {
        self.stages.contains_key(name)
    }

    pub fn stage(&self, name: &str) -> Result<&Stage> {
        self.stages.get(name).ok_or_else(|| CoreError::NotFound {
            kind: EntityKind::Stage,
            name: name.to_string(),
        })
    }

    pub fn stage_mut(&mut self, name: &str) -> Result<&mut Stage> {
        self.stages.get_mut(name).ok_or_else(|| CoreError::NotFound {
            kind: EntityKind::Stage,
            name: name.to_string(),
        })
    }

    pub fn region(&self, stage: &str, region: &str) -> Result<&Region> {
        self.stage(stage)?
            .region(region)
            .ok_or_else(|| region_not_found(stage, region))
    }

    pub fn region_mut(&mut self, stage: &str, region: &str) -> Result<&mut Region> {
        self.stage_mut(stage)?
            .region_mut(region)
            .ok_or_else(|| region_not_found(stage, region))
    }

    /// Check that `create_stage` would succeed, without mutating
    pub fn check_new_stage(&self, name: &str) -> Result<()> {
        validate_stage_name(name)?;
        if self.has_stage(name) {
            return Err(CoreError::DuplicateEntity {
                kind: EntityKind::Stage,
                name: name.to_string(),
            });
        }
        Ok(())
    }

    pub fn create_stage(&mut self, name: &str) -> Result<&mut Stage> {
        self.check_new_stage(name)?;
        tracing::debug!(project = %self.name, stage = %name, "Creating stage");
        Ok(self
            .stages
            .entry(name.to_string())
            .or_insert_with(|| Stage::new(name)))
    }

    /// Check that `create_region` would succeed, without mutating
    pub fn check_new_region(&self, stage: &str, region: &str) -> Result<()> {
        validate_region_name(region)?;
        let owner = self.stages.get(stage).ok_or_else(|| CoreError::ParentNotFound {
            kind: EntityKind::Region,
            name: region.to_string(),
            parent_kind: EntityKind::Stage,
            parent: stage.to_string(),
        })?;
        if owner.has_region(region) {
            return Err(CoreError::DuplicateEntity {
                kind: EntityKind::Region,
                name: format!("{stage}/{region}"),
            });
        }
        Ok(())
    }

    pub fn create_region(&mut self, stage: &str, region: &str) -> Result<&mut Region> {
        self.check_new_region(stage, region)?;
        tracing::debug!(project = %self.name, stage = %stage, region = %region, "Creating region");
        let owner = self.stage_mut(stage)?;
        Ok(owner.insert_region(Region::new(region)))
    }

    /// Remove a stage that owns no regions
    pub fn remove_stage(&mut self, name: &str) -> Result<Stage> {
        let stage = self.stage(name)?;
        if !stage.is_empty() {
            let names = stage.region_names();
            return Err(CoreError::NotEmpty {
                kind: EntityKind::Stage,
                name: name.to_string(),
                child_kind: EntityKind::Region,
                count: names.len(),
                children: names.join(", "),
            });
        }
        self.stages
            .remove(name)
            .ok_or_else(|| CoreError::NotFound {
                kind: EntityKind::Stage,
                name: name.to_string(),
            })
    }

    /// Remove a region that has no resources stack recorded
    pub fn remove_region(&mut self, stage: &str, region: &str) -> Result<Region> {
        let record = self.region(stage, region)?;
        if let Some(stack) = record.resources_stack_name() {
            return Err(CoreError::HasDependents {
                kind: EntityKind::Region,
                name: format!("{stage}/{region}"),
                dependent: EntityKind::ResourcesStack,
                detail: format!("remove resources stack '{stack}' first"),
            });
        }
        self.stage_mut(stage)?
            .take_region(region)
            .ok_or_else(|| region_not_found(stage, region))
    }

    /// Fail when the project still owns any stage
    pub fn ensure_empty(&self) -> Result<()> {
        if self.stages.is_empty() {
            return Ok(());
        }
        let names = self.stage_names();
        Err(CoreError::NotEmpty {
            kind: EntityKind::Project,
            name: self.name.clone(),
            child_kind: EntityKind::Stage,
            count: names.len(),
            children: names.join(", "),
        })
    }

    /// Layered variables of a stage, or of a region when one is given
    pub fn scoped_variables(
        &self,
        stage: &str,
        region: Option<&str>,
    ) -> Result<ScopedVariables<'_>> {
        let owner = self.stage(stage)?;
        let scoped = match region {
            Some(region) => {
                let record = owner
                    .region(region)
                    .ok_or_else(|| region_not_found(stage, region))?;
                ScopedVariables::new(record.variables()).with_parent(owner.variables())
            }
            None => ScopedVariables::new(owner.variables()),
        };
        Ok(scoped.with_parent(&self.variables))
    }

    /// Flattened variables of a region, region values winning
    pub fn resolve_variables(&self, stage: &str, region: &str) -> Result<Variables> {
        Ok(self.scoped_variables(stage, Some(region))?.flatten())
    }
}

fn region_not_found(stage: &str, region: &str) -> CoreError {
    CoreError::NotFound {
        kind: EntityKind::Region,
        name: format!("{stage}/{region}"),
    }
}

pub fn validate_stage_name(name: &str) -> Result<()> {
    if STAGE_NAME.is_match(name) {
        Ok(())
    } else {
        Err(CoreError::InvalidName {
            kind: EntityKind::Stage,
            name: name.to_string(),
            reason: "only letters and digits are allowed".to_string(),
        })
    }
}

pub fn validate_region_name(name: &str) -> Result<()> {
    if REGION_NAME.is_match(name) {
        Ok(())
    } else {
        Err(CoreError::InvalidName {
            kind: EntityKind::Region,
            name: name.to_string(),
            reason: "expected a region identifier such as us-east-1".to_string(),
        })
    }
}
