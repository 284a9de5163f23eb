use crate::fetcher::Fetcher;
use crate::traits::ProgressObserver;
use crate::types::{AccountName, AggregateBlockList, BlocklistError, Result};
use futures::future::try_join_all;
use std::collections::BTreeMap;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Sent by each account branch to the owning loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatherEvent {
    Progress { account: AccountName, found_so_far: usize },
    AccountDone { account: AccountName, found: usize },
}

/// Progress state of one gather run. Only the owning loop mutates it.
#[derive(Debug, Clone, Default)]
pub struct GatherProgress {
    running_total: usize,
    per_account: BTreeMap<AccountName, usize>,
}

impl GatherProgress {
    pub fn running_total(&self) -> usize {
        self.running_total
    }

    pub fn per_account(&self) -> &BTreeMap<AccountName, usize> {
        &self.per_account
    }

    /// Record that `account` has now found `found_so_far` names. Returns the
    /// new running total. A stale, smaller count never lowers the total.
    pub fn record(&mut self, account: &AccountName, found_so_far: usize) -> usize {
        let previous = self.per_account.entry(account.clone()).or_insert(0);
        if found_so_far > *previous {
            self.running_total += found_so_far - *previous;
            *previous = found_so_far;
        }
        self.running_total
    }
}

#[derive(Debug, Clone)]
pub struct GatherOutcome {
    pub aggregate: AggregateBlockList,
    pub progress: GatherProgress,
}

/// Fetch every account's block list concurrently and merge the results.
///
/// Branches run interleaved on the calling task. They report progress over
/// a channel and never share mutable state; the loop below is the only
/// writer of the running total. The first failing branch fails the whole
/// gather and the remaining branches are dropped.
pub async fn gather_all<O>(fetcher: &Fetcher, accounts: &[AccountName], observer: &O) -> Result<GatherOutcome>
where
    O: ProgressObserver + ?Sized,
{
    info!("Gathering blocks for {} accounts", accounts.len());

    let (tx, mut rx) = mpsc::unbounded_channel::<GatherEvent>();

    let branches: Vec<_> = accounts
        .iter()
        .map(|account| {
            let tx = tx.clone();
            async move {
                let entries = fetcher
                    .fetch_all(account, |found_so_far| {
                        let _ = tx.send(GatherEvent::Progress {
                            account: account.clone(),
                            found_so_far,
                        });
                    })
                    .await
                    .inspect_err(|e| warn!("Gathering blocks for {} failed: {}", account, e))?;

                let _ = tx.send(GatherEvent::AccountDone {
                    account: account.clone(),
                    found: entries.len(),
                });
                Ok::<_, BlocklistError>(entries)
            }
        })
        .collect();
    // Only the branches hold senders now, so the receiver closes once they
    // have all finished or been dropped.
    drop(tx);

    let owner = async {
        let mut progress = GatherProgress::default();
        while let Some(event) = rx.recv().await {
            match event {
                GatherEvent::Progress { account, found_so_far } => {
                    let before = progress.running_total();
                    let total = progress.record(&account, found_so_far);
                    if total != before {
                        observer.on_progress(total);
                    }
                }
                GatherEvent::AccountDone { account, found } => {
                    let total = progress.record(&account, found);
                    debug!("Account {} done with {} blocks (running total {})", account, found, total);
                    observer.on_account_done(&account, found, total);
                }
            }
        }
        progress
    };

    let (results, progress) = tokio::join!(try_join_all(branches), owner);
    let per_account_entries = results?;

    let mut aggregate = AggregateBlockList::new();
    for entries in per_account_entries {
        aggregate.extend(entries);
    }

    info!(
        "Gathered {} distinct blocked accounts ({} found across accounts)",
        aggregate.len(),
        progress.running_total()
    );

    Ok(GatherOutcome { aggregate, progress })
}
