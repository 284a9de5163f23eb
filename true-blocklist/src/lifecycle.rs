use crate::aggregator::{gather_all, GatherOutcome};
use crate::fetcher::Fetcher;
use crate::filter::PostFilter;
use crate::listener::Subscription;
use crate::messages;
use crate::state::AggregateStore;
use crate::traits::{ProgressObserver, TriggerSurface};
use crate::types::{
    AccountName, BlocklistError, ContentStream, KeyValueStore, PreferenceSource, Result,
    UpdateOutcome, UpdatePhase, UpdateSummary,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

/// One run of the update action, owned by whoever triggered it.
#[derive(Debug, Clone)]
pub struct UpdateSession {
    pub run_id: Uuid,
    pub accounts: Vec<AccountName>,
    pub started_at: DateTime<Utc>,
}

impl UpdateSession {
    pub fn start(accounts: Vec<AccountName>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            accounts,
            started_at: Utc::now(),
        }
    }

    pub fn finish(self, outcome: &GatherOutcome) -> UpdateSummary {
        UpdateSummary {
            run_id: self.run_id,
            total_blocked: outcome.aggregate.len(),
            total_found: outcome.progress.running_total(),
            per_account: outcome.progress.per_account().clone(),
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}

/// Holds the phase while a run or a teardown is in flight. Dropping it
/// without calling [`PhaseGuard::finish`] puts the phase back to `Idle`.
struct PhaseGuard<'a> {
    phase: &'a watch::Sender<UpdatePhase>,
    finished: bool,
}

impl PhaseGuard<'_> {
    fn enter(&self, next: UpdatePhase) {
        self.phase.send_replace(next);
    }

    fn finish(mut self) {
        self.phase.send_replace(UpdatePhase::Done);
        self.finished = true;
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.phase.send_replace(UpdatePhase::Idle);
        }
    }
}

/// Forwards gather progress to the surface as text and counts.
struct SurfaceProgress<'a> {
    surface: &'a dyn TriggerSurface,
}

impl ProgressObserver for SurfaceProgress<'_> {
    fn on_progress(&self, total_found: usize) {
        self.surface.status(&messages::progress(total_found));
        self.surface.on_progress(total_found);
    }

    fn on_account_done(&self, account: &AccountName, found: usize, total_found: usize) {
        self.surface.status(&messages::account_done(total_found));
        self.surface.on_account_done(account, found, total_found);
    }
}

/// The blocklist feature: keeps the post filter attached to the content
/// stream and runs the update action.
pub struct TrueBlocklist {
    fetcher: Fetcher,
    accounts: Vec<AccountName>,
    store: AggregateStore,
    stream: Arc<dyn ContentStream>,
    subscription: Subscription,
    phase: watch::Sender<UpdatePhase>,
}

impl TrueBlocklist {
    pub fn new(
        fetcher: Fetcher,
        accounts: Vec<AccountName>,
        kv: Arc<dyn KeyValueStore>,
        preferences: Arc<dyn PreferenceSource>,
        stream: Arc<dyn ContentStream>,
    ) -> Self {
        let store = AggregateStore::new(kv);
        let filter = Arc::new(PostFilter::new(store.clone(), preferences));
        let subscription = Subscription::new(stream.clone(), filter);
        let (phase, _) = watch::channel(UpdatePhase::Idle);

        Self {
            fetcher,
            accounts,
            store,
            stream,
            subscription,
            phase,
        }
    }

    pub fn store(&self) -> &AggregateStore {
        &self.store
    }

    pub fn accounts(&self) -> &[AccountName] {
        &self.accounts
    }

    pub fn phase(&self) -> UpdatePhase {
        *self.phase.borrow()
    }

    pub fn watch_phase(&self) -> watch::Receiver<UpdatePhase> {
        self.phase.subscribe()
    }

    pub fn is_enabled(&self) -> bool {
        self.subscription.is_active()
    }

    /// Start filtering newly observed posts.
    pub fn enable(&self) {
        self.subscription.subscribe();
        info!("True blocklist enabled for {} accounts", self.accounts.len());
    }

    /// Ask for confirmation, then run the update.
    pub async fn update_blocks(&self, surface: &dyn TriggerSurface) -> Result<UpdateOutcome> {
        if self.phase().is_busy() {
            let err = BlocklistError::UpdateInProgress;
            surface.failed(&err);
            return Err(err);
        }

        if !surface.confirm(&messages::CONFIRM_PROMPT).await {
            info!("Update declined");
            return Ok(UpdateOutcome::Declined);
        }

        self.run_update(surface).await.map(UpdateOutcome::Completed)
    }

    /// Gather every account's blocks, replace the stored list and re-attach
    /// the filter. A second call while one is running is rejected.
    pub async fn run_update(&self, surface: &dyn TriggerSurface) -> Result<UpdateSummary> {
        let guard = match self.begin(UpdatePhase::Gathering) {
            Some(guard) => guard,
            None => {
                warn!("Rejected update: another update is running");
                let err = BlocklistError::UpdateInProgress;
                surface.failed(&err);
                return Err(err);
            }
        };

        let session = UpdateSession::start(self.accounts.clone());
        info!("Starting update {} for {} accounts", session.run_id, session.accounts.len());
        surface.status(messages::WORKING_TITLE);
        surface.status(messages::GATHERING);

        let progress = SurfaceProgress { surface };
        let outcome = match gather_all(&self.fetcher, &session.accounts, &progress).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Update {} failed while gathering: {}", session.run_id, e);
                surface.failed(&e);
                return Err(e);
            }
        };

        guard.enter(UpdatePhase::Committing);
        if let Err(e) = self.store.set(&outcome.aggregate).await {
            error!("Update {} failed to store the blocklist: {}", session.run_id, e);
            surface.failed(&e);
            return Err(e);
        }
        self.subscription.subscribe();

        let summary = session.finish(&outcome);
        guard.finish();

        info!(
            "Update {} done: {} blocked accounts stored",
            summary.run_id, summary.total_blocked
        );
        surface.status(&messages::complete(summary.total_blocked));
        surface.complete(&summary);
        Ok(summary)
    }

    /// Stop filtering, remove every hide marking and forget the stored list.
    ///
    /// The phase stays `Disabling` until teardown ends, so no update can
    /// start in between. It is `Idle` afterwards, whether or not the store
    /// removal succeeded.
    pub async fn disable(&self) -> Result<()> {
        let Some(_guard) = self.begin(UpdatePhase::Disabling) else {
            warn!("Rejected disable: an update is running");
            return Err(BlocklistError::UpdateInProgress);
        };

        self.subscription.unsubscribe();
        self.stream.clear_hidden();
        self.store.remove().await?;

        info!("True blocklist disabled");
        Ok(())
    }

    /// Move from a non-busy phase to `next`, atomically. `None` when another
    /// run holds the phase.
    fn begin(&self, next: UpdatePhase) -> Option<PhaseGuard<'_>> {
        let started = self.phase.send_if_modified(|phase| {
            if phase.is_busy() {
                false
            } else {
                *phase = next;
                true
            }
        });

        if !started {
            return None;
        }
        Some(PhaseGuard {
            phase: &self.phase,
            finished: false,
        })
    }
}
