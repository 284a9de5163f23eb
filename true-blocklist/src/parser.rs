use crate::types::{AccountName, BlockListPage, BlocklistError, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

// The blocks endpoint wraps its payload in `{ "meta": .., "response": .. }`.
// Some proxies hand back the payload directly, so both shapes are accepted.
#[derive(Debug, Deserialize)]
struct Envelope {
    response: Value,
}

#[derive(Debug, Deserialize)]
struct BlocksPayload {
    #[serde(alias = "blockedTumblelogs", alias = "blocked_accounts", alias = "blockedAccounts")]
    blocked_tumblelogs: Option<Vec<BlockedAccount>>,
    #[serde(alias = "links")]
    _links: Option<Links>,
}

#[derive(Debug, Deserialize)]
struct BlockedAccount {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Links {
    next: Option<NextLink>,
}

#[derive(Debug, Deserialize)]
struct NextLink {
    href: Option<String>,
}

/// Decode one page of the blocks endpoint.
pub fn parse_blocks_page(account: &AccountName, body: &str) -> Result<BlockListPage> {
    let value: Value = serde_json::from_str(body).map_err(|e| malformed(account, format!("invalid JSON: {}", e)))?;

    let payload = match serde_json::from_value::<Envelope>(value.clone()) {
        Ok(envelope) => envelope.response,
        Err(_) => value,
    };

    let payload: BlocksPayload =
        serde_json::from_value(payload).map_err(|e| malformed(account, e.to_string()))?;

    let blocked = payload
        .blocked_tumblelogs
        .ok_or_else(|| malformed(account, "missing blocked account list".to_string()))?;

    let entries = blocked
        .into_iter()
        .enumerate()
        .map(|(index, blocked)| {
            blocked
                .name
                .ok_or_else(|| malformed(account, format!("blocked account {} has no name", index)))
        })
        .collect::<Result<Vec<_>>>()?;

    let next_cursor = payload
        ._links
        .and_then(|links| links.next)
        .and_then(|next| next.href)
        .filter(|href| !href.is_empty());

    debug!("Parsed blocks page for {}: {} entries, more: {}", account, entries.len(), next_cursor.is_some());

    Ok(BlockListPage { entries, next_cursor })
}

fn malformed(account: &AccountName, reason: String) -> BlocklistError {
    BlocklistError::MalformedResponse {
        account: account.clone(),
        reason,
    }
}
