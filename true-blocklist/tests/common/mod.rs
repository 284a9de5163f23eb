// Scripted collaborators shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use interfaces::defs::{CollaboratorError, CollaboratorResult, KeyValueStore};
use interfaces::MemoryKeyValueStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use tokio::sync::Semaphore;
use true_blocklist::{
    AccountName, BlockListPage, BlocklistError, BlocksApi, ConfirmPrompt, ProgressObserver,
    Result, TriggerSurface, UpdateSummary,
};

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn accounts(names: &[&str]) -> Vec<AccountName> {
    names.iter().map(|name| AccountName::from(*name)).collect()
}

#[derive(Clone)]
enum Step {
    Page(BlockListPage),
    Fail,
}

/// Blocks API serving fixed pages. Cursors are `"{account}-page-{n}"`.
#[derive(Default)]
pub struct ScriptedBlocksApi {
    steps: HashMap<(String, Option<String>), Step>,
    delays: HashMap<String, Duration>,
    gate: Option<Arc<Semaphore>>,
    requests: Mutex<Vec<(String, Option<String>)>>,
}

fn cursor_for(account: &str, page: usize) -> Option<String> {
    if page == 1 {
        None
    } else {
        Some(format!("{}-page-{}", account, page))
    }
}

impl ScriptedBlocksApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `pages` for `account`, in order, then stop.
    pub fn account(mut self, account: &str, pages: Vec<Vec<&str>>) -> Self {
        let count = pages.len();
        for (index, entries) in pages.into_iter().enumerate() {
            let number = index + 1;
            let next_cursor = if number < count {
                cursor_for(account, number + 1)
            } else {
                None
            };
            self.steps.insert(
                (account.to_string(), cursor_for(account, number)),
                Step::Page(BlockListPage {
                    entries: entries.into_iter().map(str::to_string).collect(),
                    next_cursor,
                }),
            );
        }
        self
    }

    /// Make the request for page `page` (1-based) of `account` fail.
    pub fn fail_page(mut self, account: &str, page: usize) -> Self {
        self.steps
            .insert((account.to_string(), cursor_for(account, page)), Step::Fail);
        self
    }

    /// Delay every response for `account`.
    pub fn delay(mut self, account: &str, delay: Duration) -> Self {
        self.delays.insert(account.to_string(), delay);
        self
    }

    /// Hold every response until the semaphore hands out a permit.
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn requests(&self) -> Vec<(String, Option<String>)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_for(&self, account: &str) -> Vec<Option<String>> {
        self.requests()
            .into_iter()
            .filter(|(name, _)| name == account)
            .map(|(_, cursor)| cursor)
            .collect()
    }
}

#[async_trait]
impl BlocksApi for ScriptedBlocksApi {
    async fn fetch_page(&self, account: &AccountName, cursor: Option<&str>) -> Result<BlockListPage> {
        let key = (account.to_string(), cursor.map(str::to_string));
        self.requests.lock().unwrap().push(key.clone());

        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await.expect("gate closed");
        }
        if let Some(delay) = self.delays.get(account.as_str()) {
            tokio::time::sleep(*delay).await;
        }

        match self.steps.get(&key) {
            Some(Step::Page(page)) => Ok(page.clone()),
            Some(Step::Fail) => Err(BlocklistError::HttpStatus {
                account: account.clone(),
                status: 500,
            }),
            None => Err(BlocklistError::MalformedResponse {
                account: account.clone(),
                reason: format!("no scripted page for cursor {:?}", cursor),
            }),
        }
    }
}

/// Trigger surface that records everything shown on it.
pub struct RecordingSurface {
    answer: bool,
    pub statuses: Mutex<Vec<String>>,
    pub progress: Mutex<Vec<usize>>,
    pub completed: Mutex<Vec<UpdateSummary>>,
    pub failures: Mutex<Vec<String>>,
    pub prompts: Mutex<Vec<ConfirmPrompt>>,
}

impl RecordingSurface {
    pub fn confirming() -> Self {
        Self::answering(true)
    }

    pub fn declining() -> Self {
        Self::answering(false)
    }

    fn answering(answer: bool) -> Self {
        Self {
            answer,
            statuses: Mutex::new(Vec::new()),
            progress: Mutex::new(Vec::new()),
            completed: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn statuses(&self) -> Vec<String> {
        self.statuses.lock().unwrap().clone()
    }

    pub fn progress(&self) -> Vec<usize> {
        self.progress.lock().unwrap().clone()
    }

    pub fn failures(&self) -> Vec<String> {
        self.failures.lock().unwrap().clone()
    }

    pub fn completed(&self) -> Vec<UpdateSummary> {
        self.completed.lock().unwrap().clone()
    }
}

impl ProgressObserver for RecordingSurface {
    fn on_progress(&self, total_found: usize) {
        self.progress.lock().unwrap().push(total_found);
    }
}

#[async_trait]
impl TriggerSurface for RecordingSurface {
    async fn confirm(&self, prompt: &ConfirmPrompt) -> bool {
        self.prompts.lock().unwrap().push(prompt.clone());
        self.answer
    }

    fn status(&self, text: &str) {
        self.statuses.lock().unwrap().push(text.to_string());
    }

    fn complete(&self, summary: &UpdateSummary) {
        self.completed.lock().unwrap().push(summary.clone());
    }

    fn failed(&self, error: &BlocklistError) {
        self.failures.lock().unwrap().push(error.to_string());
    }
}

/// Memory store whose reads or writes can be made to fail, and whose
/// removals can be made slow.
#[derive(Default)]
pub struct FlakyKeyValueStore {
    inner: MemoryKeyValueStore,
    pub fail_reads: std::sync::atomic::AtomicBool,
    pub fail_writes: std::sync::atomic::AtomicBool,
    remove_delay: Mutex<Option<Duration>>,
}

impl FlakyKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn set_remove_delay(&self, delay: Duration) {
        *self.remove_delay.lock().unwrap() = Some(delay);
    }
}

#[async_trait]
impl KeyValueStore for FlakyKeyValueStore {
    async fn get(&self, key: &str) -> CollaboratorResult<Option<String>> {
        if self.fail_reads.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(CollaboratorError::Unavailable("read refused".to_string()));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> CollaboratorResult<()> {
        if self.fail_writes.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(CollaboratorError::Unavailable("write refused".to_string()));
        }
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> CollaboratorResult<()> {
        let delay = *self.remove_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_writes.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(CollaboratorError::Unavailable("write refused".to_string()));
        }
        self.inner.remove(key).await
    }
}
