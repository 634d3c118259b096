//! Command context and the load/lock/save cycle around each action

use anyhow::Context as _;
use stackflow_cloud::{BucketManager, PollConfig, StackProvisioner};
use stackflow_cloud_aws::AwsProviders;
use stackflow_config::{Settings, find_project_root};
use stackflow_core::{ProjectLock, ProjectStore};
use stackflow_pipeline::Pipeline;
use std::path::PathBuf;
use std::time::Duration;

/// Flags and settings every command sees
pub struct Context {
    pub settings: Settings,
    pub profile: Option<String>,
    pub no_exe_cf: bool,
    project_dir: Option<PathBuf>,
    template: Option<String>,
}

impl Context {
    pub fn new(
        profile: Option<String>,
        no_exe_cf: bool,
        project_dir: Option<PathBuf>,
        template: Option<PathBuf>,
    ) -> anyhow::Result<Self> {
        let settings = Settings::load()?;
        let template = template
            .map(|path| {
                std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read template {}", path.display()))
            })
            .transpose()?;

        Ok(Self {
            profile: profile.or_else(|| settings.profile.clone()),
            settings,
            no_exe_cf,
            project_dir,
            template,
        })
    }

    /// Stage from the command line, else from settings, else `dev`
    pub fn stage(&self, stage: Option<String>) -> String {
        stage.unwrap_or_else(|| self.settings.stage_or_default().to_string())
    }

    /// Region from the command line, else from settings, else `us-east-1`
    pub fn region(&self, region: Option<String>) -> String {
        region.unwrap_or_else(|| self.settings.region_or_default().to_string())
    }

    /// Directory a new project is created in
    pub fn init_root(&self) -> anyhow::Result<PathBuf> {
        match &self.project_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(std::env::current_dir()?),
        }
    }

    /// Root of the existing project
    pub fn project_root(&self) -> anyhow::Result<PathBuf> {
        match &self.project_dir {
            Some(dir) => Ok(dir.clone()),
            None => {
                let cwd = std::env::current_dir()?;
                find_project_root(&cwd)
                    .context("no project here; run `stackflow project init` first")
            }
        }
    }

    fn poll_config(&self) -> PollConfig {
        let poll = &self.settings.poll;
        PollConfig {
            initial_delay: Duration::from_millis(poll.initial_delay_ms),
            max_delay: Duration::from_millis(poll.max_delay_ms),
            multiplier: poll.multiplier,
            timeout: Duration::from_secs(poll.timeout_secs),
        }
    }

    /// Pipeline backed by CloudFormation and S3
    pub async fn pipeline(&self, home_region: &str) -> Pipeline {
        let aws = AwsProviders::load(self.profile.as_deref(), home_region).await;
        let stacks = StackProvisioner::new(aws.stacks).with_poll_config(self.poll_config());
        let pipeline = Pipeline::new(stacks, BucketManager::new(aws.storage));
        match &self.template {
            Some(template) => pipeline.with_resources_template(template.clone()),
            None => pipeline,
        }
    }
}

/// A locked project with a pipeline over it
pub struct Session {
    store: ProjectStore,
    lock: ProjectLock,
    pub pipeline: Pipeline,
}

impl Session {
    pub async fn open(ctx: &Context, root: PathBuf) -> anyhow::Result<Self> {
        let store = ProjectStore::new(&root);
        let lock = store.acquire_lock().await?;
        let project = store.load().await?;

        let home_region = match &project {
            Some(project) => project.bucket_region().to_string(),
            None => ctx.region(None),
        };
        let pipeline = ctx.pipeline(&home_region).await.with_project(project);
        Ok(Self {
            store,
            lock,
            pipeline,
        })
    }

    /// Persist whatever the tree looks like now, successful action or not,
    /// and release the lock
    pub async fn close(self) -> anyhow::Result<()> {
        match self.pipeline.project() {
            Some(project) => self.store.save(project).await?,
            None => self.store.remove().await?,
        }
        self.lock.release().await?;
        Ok(())
    }
}
