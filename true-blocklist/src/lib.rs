pub mod types;
pub mod traits;
pub mod parser;
pub mod fetcher;
pub mod aggregator;
pub mod state;
pub mod soft_blocklist;
pub mod filter;
pub mod listener;
pub mod lifecycle;
pub mod messages;
pub mod preferences;

pub use types::*;
pub use traits::{BlocksApi, ConfirmPrompt, NoProgress, ProgressObserver, TriggerSurface};
pub use fetcher::{Fetcher, HttpBlocksApi};
pub use aggregator::{gather_all, GatherOutcome, GatherProgress};
pub use state::AggregateStore;
pub use filter::{apply_decision, classify, EffectiveBlocklist, PostFilter};
pub use listener::Subscription;
pub use lifecycle::{TrueBlocklist, UpdateSession};
pub use preferences::StoredPreferences;
