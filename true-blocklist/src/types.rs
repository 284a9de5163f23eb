use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

pub use interfaces::defs::{
    CollaboratorError, ContentItem, ContentStream, HideTarget, KeyValueStore, NewItemsHandler,
    PostElement, PreferenceSource, SubscriptionId, TrailEntry,
};

/// One of the user's own accounts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountName(pub String);

impl AccountName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for AccountName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// One page of an account's block relationships.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockListPage {
    pub entries: Vec<String>,
    /// Opaque continuation token, followed verbatim on the next request.
    pub next_cursor: Option<String>,
}

/// Blocked account names merged across every account the user controls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateBlockList(BTreeSet<String>);

impl AggregateBlockList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        self.0.insert(name.into())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }

    pub fn into_inner(self) -> BTreeSet<String> {
        self.0
    }
}

impl<S: Into<String>> FromIterator<S> for AggregateBlockList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<S: Into<String>> Extend<S> for AggregateBlockList {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        self.0.extend(iter.into_iter().map(Into::into));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterDecision {
    FullHide,
    /// Only these trail indices are hidden.
    PartialHide(BTreeSet<usize>),
    Visible,
}

impl FilterDecision {
    pub fn targets(&self) -> Vec<HideTarget> {
        match self {
            FilterDecision::FullHide => vec![HideTarget::Item],
            FilterDecision::PartialHide(indices) => {
                indices.iter().map(|index| HideTarget::TrailEntry(*index)).collect()
            }
            FilterDecision::Visible => Vec::new(),
        }
    }
}

/// Where the update action currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdatePhase {
    Idle,
    Gathering,
    Committing,
    Done,
    /// `disable` is tearing the feature down.
    Disabling,
}

impl UpdatePhase {
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            UpdatePhase::Gathering | UpdatePhase::Committing | UpdatePhase::Disabling
        )
    }
}

/// Result of a finished update run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateSummary {
    pub run_id: Uuid,
    /// Distinct blocked accounts now persisted.
    pub total_blocked: usize,
    /// Running total reported while gathering; counts overlaps once per
    /// account.
    pub total_found: usize,
    pub per_account: BTreeMap<AccountName, usize>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum UpdateOutcome {
    Completed(UpdateSummary),
    Declined,
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub api_base_url: String,
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub access_token: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.tumblr.com".to_string(),
            user_agent: "True-Blocklist/1.0".to_string(),
            timeout_seconds: 30,
            access_token: None,
        }
    }
}

impl FetchConfig {
    /// Defaults overlaid with `TRUE_BLOCKLIST_API_BASE`,
    /// `TRUE_BLOCKLIST_TOKEN` and `TRUE_BLOCKLIST_TIMEOUT_SECONDS`.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(base) = std::env::var("TRUE_BLOCKLIST_API_BASE") {
            config.api_base_url = base;
        }
        if let Ok(token) = std::env::var("TRUE_BLOCKLIST_TOKEN") {
            if !token.trim().is_empty() {
                config.access_token = Some(token);
            }
        }
        if let Ok(timeout) = std::env::var("TRUE_BLOCKLIST_TIMEOUT_SECONDS") {
            config.timeout_seconds = timeout.parse().map_err(|_| {
                BlocklistError::Config(format!("TRUE_BLOCKLIST_TIMEOUT_SECONDS is not a number: {}", timeout))
            })?;
        }

        Ok(config)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BlocklistError {
    #[error("Request for {account} failed: {source}")]
    Network {
        account: AccountName,
        #[source]
        source: reqwest::Error,
    },

    #[error("Request for {account} returned HTTP {status}")]
    HttpStatus { account: AccountName, status: u16 },

    #[error("Malformed response for {account}: {reason}")]
    MalformedResponse { account: AccountName, reason: String },

    #[error("Storage error: {0}")]
    Storage(#[from] CollaboratorError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("An update is already in progress")]
    UpdateInProgress,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl BlocklistError {
    /// Failures that abort a gather run.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            BlocklistError::Network { .. }
                | BlocklistError::HttpStatus { .. }
                | BlocklistError::MalformedResponse { .. }
        )
    }

    pub fn account(&self) -> Option<&AccountName> {
        match self {
            BlocklistError::Network { account, .. }
            | BlocklistError::HttpStatus { account, .. }
            | BlocklistError::MalformedResponse { account, .. } => Some(account),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, BlocklistError>;
