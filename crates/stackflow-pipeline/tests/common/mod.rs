use stackflow_cloud::memory::{InMemoryObjectStorage, InMemoryStackService, ManualClock};
use stackflow_cloud::{BucketManager, PollConfig, StackProvisioner};
use stackflow_pipeline::Pipeline;
use std::sync::Arc;
use std::time::Duration;

/// In-memory providers shared by a pipeline and the assertions about it
pub struct TestBackend {
    pub stacks: Arc<InMemoryStackService>,
    pub storage: Arc<InMemoryObjectStorage>,
    pub clock: Arc<ManualClock>,
}

impl TestBackend {
    pub fn new() -> Self {
        Self::with_stacks(InMemoryStackService::new())
    }

    pub fn with_stacks(stacks: InMemoryStackService) -> Self {
        Self {
            stacks: Arc::new(stacks),
            storage: Arc::new(InMemoryObjectStorage::new()),
            clock: Arc::new(ManualClock::new()),
        }
    }

    pub fn poll_config() -> PollConfig {
        PollConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
            multiplier: 2.0,
            timeout: Duration::from_secs(120),
        }
    }

    pub fn pipeline(&self) -> Pipeline {
        let stacks = StackProvisioner::new(self.stacks.clone())
            .with_clock(self.clock.clone())
            .with_poll_config(Self::poll_config());
        Pipeline::new(stacks, BucketManager::new(self.storage.clone()))
    }
}

/// Project name and bucket unique to one test run
pub struct TestNames {
    pub name: String,
    /// Name as stored after normalization
    pub normalized: String,
    pub bucket: String,
}

impl TestNames {
    pub fn new() -> Self {
        let id = uuid::Uuid::new_v4();
        let name = format!("testprj-{id}");
        Self {
            normalized: name.chars().filter(char::is_ascii_alphanumeric).collect(),
            bucket: format!("{name}.com"),
            name,
        }
    }

    #[allow(dead_code)]
    pub fn stack(&self, stage: &str) -> String {
        format!("{}-{stage}-r", self.normalized)
    }
}
