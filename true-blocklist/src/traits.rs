use crate::types::{AccountName, BlockListPage, BlocklistError, Result, UpdateSummary};
use async_trait::async_trait;

/// Source of one account's block relationships, one page at a time.
#[async_trait]
pub trait BlocksApi: Send + Sync {
    /// Fetch a single page. `cursor` is `None` for the first page and
    /// otherwise the previous page's `next_cursor`, passed through verbatim.
    async fn fetch_page(&self, account: &AccountName, cursor: Option<&str>) -> Result<BlockListPage>;
}

/// Receives the running total of blocked accounts found during a gather.
pub trait ProgressObserver: Send + Sync {
    /// Called with a count that never decreases within one run.
    fn on_progress(&self, total_found: usize);

    /// Called once an account has been fully paged.
    fn on_account_done(&self, account: &AccountName, found: usize, total_found: usize) {
        let _ = (account, found, total_found);
    }
}

/// Observer that ignores everything.
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&self, _total_found: usize) {}
}

/// Confirmation prompt shown before an update starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmPrompt {
    pub title: &'static str,
    pub message: &'static str,
    pub confirm_label: &'static str,
}

/// User-facing surface for the update action: confirm, show progress, then
/// show either a summary or an error.
#[async_trait]
pub trait TriggerSurface: ProgressObserver {
    async fn confirm(&self, prompt: &ConfirmPrompt) -> bool;

    /// Free-form status text while working.
    fn status(&self, text: &str);

    fn complete(&self, summary: &UpdateSummary);

    fn failed(&self, error: &BlocklistError);
}
