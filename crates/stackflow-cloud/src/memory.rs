//! In-memory providers for tests
//!
//! Both fakes mirror the provider rules the rest of the workspace relies
//! on: stacks pass through `*_IN_PROGRESS` states before settling, deleted
//! stacks stop being describable, buckets refuse deletion while they hold
//! objects, and empty or oversized delete batches are rejected.

use crate::error::{CloudError, Result};
use crate::provider::{
    ObjectPage, ObjectStorage, StackDescription, StackRef, StackRequest, StackService,
    UpdateOutcome,
};
use crate::waiter::Clock;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

const FAKE_ACCOUNT: &str = "123456789012";
const DELETE_BATCH_CEILING: usize = 1000;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clock that returns immediately and records every requested delay
#[derive(Debug, Default)]
pub struct ManualClock {
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        lock(&self.sleeps).clone()
    }

    pub fn total_slept(&self) -> Duration {
        lock(&self.sleeps).iter().sum()
    }
}

#[async_trait]
impl Clock for ManualClock {
    async fn sleep(&self, duration: Duration) {
        lock(&self.sleeps).push(duration);
        tokio::task::yield_now().await;
    }
}

#[derive(Debug, Clone)]
struct Transition {
    /// Describes left before `final_status` is reached
    remaining: u32,
    final_status: String,
    final_reason: Option<String>,
    /// Outputs published once the transition succeeds
    final_outputs: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone)]
struct FakeStack {
    id: String,
    status: String,
    reason: Option<String>,
    outputs: BTreeMap<String, String>,
    template: String,
    parameters: BTreeMap<String, String>,
    transition: Option<Transition>,
}

#[derive(Debug, Default)]
struct StackState {
    stacks: HashMap<StackRef, FakeStack>,
    fail_next: Option<String>,
    calls: Vec<String>,
    next_id: u64,
}

/// Stack service keeping stacks in memory
#[derive(Debug)]
pub struct InMemoryStackService {
    state: Mutex<StackState>,
    settle_polls: u32,
}

impl Default for InMemoryStackService {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStackService {
    /// Operations settle on the second describe after they start
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StackState::default()),
            settle_polls: 1,
        }
    }

    /// Number of describes that still report `*_IN_PROGRESS`
    pub fn with_settle_polls(mut self, polls: u32) -> Self {
        self.settle_polls = polls;
        self
    }

    /// Make the next create or update roll back with `reason`
    pub fn fail_next_deploy(&self, reason: impl Into<String>) {
        lock(&self.state).fail_next = Some(reason.into());
    }

    /// Seed a settled stack
    pub fn insert_stack(&self, stack: StackRef, status: &str) {
        let mut state = lock(&self.state);
        state.next_id += 1;
        let id = stack_id(&stack, state.next_id);
        state.stacks.insert(
            stack,
            FakeStack {
                id,
                status: status.to_string(),
                reason: None,
                outputs: BTreeMap::new(),
                template: String::new(),
                parameters: BTreeMap::new(),
                transition: None,
            },
        );
    }

    /// Status without advancing any transition
    pub fn peek_status(&self, stack: &StackRef) -> Option<String> {
        lock(&self.state).stacks.get(stack).map(|s| s.status.clone())
    }

    /// Log of mutating calls, e.g. `create:demo-dev-r@us-east-1`
    pub fn calls(&self) -> Vec<String> {
        lock(&self.state).calls.clone()
    }

    fn transition(&self, final_status: &str) -> Transition {
        Transition {
            remaining: self.settle_polls,
            final_status: final_status.to_string(),
            final_reason: None,
            final_outputs: None,
        }
    }
}

fn stack_id(stack: &StackRef, n: u64) -> String {
    format!(
        "arn:aws:cloudformation:{}:{FAKE_ACCOUNT}:stack/{}/{n:08}",
        stack.region, stack.name
    )
}

/// Outputs the template declares; literal string values are kept, anything
/// else becomes a synthetic ARN
fn outputs_for(stack: &StackRef, template: &str) -> Result<BTreeMap<String, String>> {
    let parsed: serde_json::Value = serde_json::from_str(template)?;
    let mut outputs = BTreeMap::new();
    if let Some(declared) = parsed.get("Outputs").and_then(|o| o.as_object()) {
        for (key, output) in declared {
            let value = match output.get("Value").and_then(|v| v.as_str()) {
                Some(literal) => literal.to_string(),
                None => format!("arn:aws:iam::{FAKE_ACCOUNT}:role/{}-{key}", stack.name),
            };
            outputs.insert(key.clone(), value);
        }
    }
    Ok(outputs)
}

#[async_trait]
impl StackService for InMemoryStackService {
    fn name(&self) -> &str {
        "in-memory"
    }

    async fn describe_stack(&self, stack: &StackRef) -> Result<Option<StackDescription>> {
        let mut state = lock(&self.state);
        let Some(fake) = state.stacks.get_mut(stack) else {
            return Ok(None);
        };

        if let Some(transition) = fake.transition.as_mut() {
            if transition.remaining > 0 {
                transition.remaining -= 1;
            } else {
                fake.status = transition.final_status.clone();
                fake.reason = transition.final_reason.clone();
                if let Some(outputs) = transition.final_outputs.take() {
                    fake.outputs = outputs;
                }
                fake.transition = None;
            }
        }

        if fake.status == "DELETE_COMPLETE" {
            state.stacks.remove(stack);
            return Ok(None);
        }

        Ok(Some(StackDescription {
            stack_id: fake.id.clone(),
            status: fake.status.clone(),
            status_reason: fake.reason.clone(),
            outputs: fake.outputs.clone(),
        }))
    }

    async fn create_stack(&self, request: &StackRequest) -> Result<String> {
        let outputs = outputs_for(&request.stack, &request.template.body)?;
        let mut transition = self.transition("CREATE_COMPLETE");
        let mut state = lock(&self.state);
        state.calls.push(format!(
            "create:{}@{}",
            request.stack.name, request.stack.region
        ));

        if state.stacks.contains_key(&request.stack) {
            return Err(CloudError::ApiError(format!(
                "AlreadyExistsException: Stack [{}] already exists",
                request.stack.name
            )));
        }

        match state.fail_next.take() {
            Some(reason) => {
                transition.final_status = "ROLLBACK_COMPLETE".to_string();
                transition.final_reason = Some(reason);
            }
            None => transition.final_outputs = Some(outputs),
        }

        state.next_id += 1;
        let id = stack_id(&request.stack, state.next_id);
        state.stacks.insert(
            request.stack.clone(),
            FakeStack {
                id: id.clone(),
                status: "CREATE_IN_PROGRESS".to_string(),
                reason: None,
                outputs: BTreeMap::new(),
                template: request.template.body.clone(),
                parameters: request.parameters.clone(),
                transition: Some(transition),
            },
        );
        Ok(id)
    }

    async fn update_stack(&self, request: &StackRequest) -> Result<UpdateOutcome> {
        let outputs = outputs_for(&request.stack, &request.template.body)?;
        let mut transition = self.transition("UPDATE_COMPLETE");
        let mut state = lock(&self.state);
        state.calls.push(format!(
            "update:{}@{}",
            request.stack.name, request.stack.region
        ));
        let fail_next = state.fail_next.take();

        let Some(fake) = state.stacks.get_mut(&request.stack) else {
            return Err(CloudError::ApiError(format!(
                "ValidationError: Stack [{}] does not exist",
                request.stack.name
            )));
        };

        if fake.template == request.template.body && fake.parameters == request.parameters {
            return Ok(UpdateOutcome::NoChanges);
        }

        match fail_next {
            Some(reason) => {
                transition.final_status = "UPDATE_ROLLBACK_COMPLETE".to_string();
                transition.final_reason = Some(reason);
            }
            None => {
                transition.final_outputs = Some(outputs);
                fake.template = request.template.body.clone();
                fake.parameters = request.parameters.clone();
            }
        }
        fake.status = "UPDATE_IN_PROGRESS".to_string();
        fake.transition = Some(transition);
        Ok(UpdateOutcome::Started)
    }

    async fn delete_stack(&self, stack: &StackRef) -> Result<()> {
        let transition = self.transition("DELETE_COMPLETE");
        let mut state = lock(&self.state);
        state
            .calls
            .push(format!("delete:{}@{}", stack.name, stack.region));

        if let Some(fake) = state.stacks.get_mut(stack) {
            fake.status = "DELETE_IN_PROGRESS".to_string();
            fake.transition = Some(transition);
        }
        Ok(())
    }
}

/// Recorded object-storage call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageCall {
    CreateBucket(String),
    ListObjects(String),
    DeleteObjects { bucket: String, count: usize },
    PutObject { bucket: String, key: String },
    /// Objects still present when the delete was issued
    DeleteBucket { bucket: String, remaining: usize },
}

#[derive(Debug, Default)]
struct FakeBucket {
    region: String,
    objects: BTreeMap<String, Vec<u8>>,
}

#[derive(Debug, Default)]
struct StorageState {
    buckets: HashMap<String, FakeBucket>,
    denied: HashSet<String>,
    calls: Vec<StorageCall>,
}

/// Object storage keeping buckets in memory
#[derive(Debug)]
pub struct InMemoryObjectStorage {
    state: Mutex<StorageState>,
    page_size: usize,
}

impl Default for InMemoryObjectStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryObjectStorage {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StorageState::default()),
            page_size: 1000,
        }
    }

    /// Keys returned per listing page
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Make every operation on `bucket` fail with access denied
    pub fn deny(&self, bucket: impl Into<String>) {
        lock(&self.state).denied.insert(bucket.into());
    }

    pub fn bucket_exists(&self, bucket: &str) -> bool {
        lock(&self.state).buckets.contains_key(bucket)
    }

    pub fn bucket_region(&self, bucket: &str) -> Option<String> {
        lock(&self.state)
            .buckets
            .get(bucket)
            .map(|b| b.region.clone())
    }

    pub fn object_count(&self, bucket: &str) -> Option<usize> {
        lock(&self.state).buckets.get(bucket).map(|b| b.objects.len())
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        lock(&self.state)
            .buckets
            .get(bucket)
            .and_then(|b| b.objects.get(key).cloned())
    }

    pub fn calls(&self) -> Vec<StorageCall> {
        lock(&self.state).calls.clone()
    }

    fn check_access(state: &StorageState, bucket: &str) -> Result<()> {
        if state.denied.contains(bucket) {
            return Err(CloudError::AccessDenied(bucket.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for InMemoryObjectStorage {
    fn name(&self) -> &str {
        "in-memory"
    }

    async fn create_bucket(&self, bucket: &str, region: &str) -> Result<()> {
        let mut state = lock(&self.state);
        state.calls.push(StorageCall::CreateBucket(bucket.to_string()));
        Self::check_access(&state, bucket)?;

        if state.buckets.contains_key(bucket) {
            return Err(CloudError::BucketAlreadyOwned(bucket.to_string()));
        }
        state.buckets.insert(
            bucket.to_string(),
            FakeBucket {
                region: region.to_string(),
                objects: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        let mut state = lock(&self.state);
        Self::check_access(&state, bucket)?;
        let remaining = state
            .buckets
            .get(bucket)
            .map(|b| b.objects.len())
            .ok_or_else(|| CloudError::BucketNotFound(bucket.to_string()))?;
        state.calls.push(StorageCall::DeleteBucket {
            bucket: bucket.to_string(),
            remaining,
        });

        if remaining > 0 {
            return Err(CloudError::BucketNotEmpty(bucket.to_string()));
        }
        state.buckets.remove(bucket);
        Ok(())
    }

    async fn list_objects(
        &self,
        bucket: &str,
        continuation_token: Option<&str>,
    ) -> Result<ObjectPage> {
        let mut state = lock(&self.state);
        state.calls.push(StorageCall::ListObjects(bucket.to_string()));
        Self::check_access(&state, bucket)?;
        let fake = state
            .buckets
            .get(bucket)
            .ok_or_else(|| CloudError::BucketNotFound(bucket.to_string()))?;

        let offset = match continuation_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| CloudError::ApiError(format!("invalid continuation token {token}")))?,
            None => 0,
        };
        let keys: Vec<String> = fake
            .objects
            .keys()
            .skip(offset)
            .take(self.page_size)
            .cloned()
            .collect();
        let next = offset + keys.len();
        let next_token = (next < fake.objects.len()).then(|| next.to_string());

        Ok(ObjectPage { keys, next_token })
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<()> {
        let mut state = lock(&self.state);
        state.calls.push(StorageCall::DeleteObjects {
            bucket: bucket.to_string(),
            count: keys.len(),
        });
        Self::check_access(&state, bucket)?;

        if keys.is_empty() {
            return Err(CloudError::ApiError(
                "MalformedXML: delete request without objects".to_string(),
            ));
        }
        if keys.len() > DELETE_BATCH_CEILING {
            return Err(CloudError::ApiError(format!(
                "MalformedXML: {} keys exceed the batch ceiling",
                keys.len()
            )));
        }

        let fake = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| CloudError::BucketNotFound(bucket.to_string()))?;
        for key in keys {
            fake.objects.remove(key);
        }
        Ok(())
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
        let mut state = lock(&self.state);
        state.calls.push(StorageCall::PutObject {
            bucket: bucket.to_string(),
            key: key.to_string(),
        });
        Self::check_access(&state, bucket)?;
        let fake = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| CloudError::BucketNotFound(bucket.to_string()))?;
        fake.objects.insert(key.to_string(), body);
        Ok(())
    }
}
