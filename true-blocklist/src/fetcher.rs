use crate::parser::parse_blocks_page;
use crate::traits::BlocksApi;
use crate::types::{AccountName, BlockListPage, BlocklistError, FetchConfig, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

/// [`BlocksApi`] over HTTP.
pub struct HttpBlocksApi {
    client: Client,
    base_url: Url,
    config: FetchConfig,
}

impl HttpBlocksApi {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()
            .map_err(|e| BlocklistError::Config(format!("Failed to create HTTP client: {}", e)))?;

        let base_url = Url::parse(&config.api_base_url)?;

        Ok(Self { client, base_url, config })
    }

    /// URL of the first page for `account`, or of the page `cursor` points
    /// at. Relative cursors are resolved against the API base.
    pub fn page_url(&self, account: &AccountName, cursor: Option<&str>) -> Result<Url> {
        match cursor {
            Some(cursor) => Ok(self.base_url.join(cursor)?),
            None => {
                let mut url = self.base_url.clone();
                url.path_segments_mut()
                    .map_err(|_| BlocklistError::Config(format!("API base cannot be a base: {}", self.base_url)))?
                    .pop_if_empty()
                    .extend(["v2", "blog", account.as_str(), "blocks"]);
                Ok(url)
            }
        }
    }

    fn token_for(&self, url: &Url) -> Option<&str> {
        if url.origin() == self.base_url.origin() {
            self.config.access_token.as_deref()
        } else {
            None
        }
    }
}

#[async_trait]
impl BlocksApi for HttpBlocksApi {
    async fn fetch_page(&self, account: &AccountName, cursor: Option<&str>) -> Result<BlockListPage> {
        let url = self.page_url(account, cursor)?;
        let start_time = Instant::now();

        debug!("Fetching blocks page: {}", url);

        let mut request = self.client.get(url.clone());
        // Cursors may point at another host; the token only goes to the API
        if let Some(token) = self.token_for(&url) {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| network(account, e))?;
        let status = response.status();

        if !status.is_success() {
            warn!("Blocks request for {} returned {}", account, status);
            return Err(BlocklistError::HttpStatus {
                account: account.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| network(account, e))?;
        debug!(
            "Fetched {} ({} bytes) in {}ms",
            url,
            body.len(),
            start_time.elapsed().as_millis()
        );

        parse_blocks_page(account, &body)
    }
}

fn network(account: &AccountName, source: reqwest::Error) -> BlocklistError {
    BlocklistError::Network {
        account: account.clone(),
        source,
    }
}

/// Walks one account's paginated block list to the end.
#[derive(Clone)]
pub struct Fetcher {
    api: Arc<dyn BlocksApi>,
}

impl Fetcher {
    pub fn new(api: Arc<dyn BlocksApi>) -> Self {
        Self { api }
    }

    pub fn http(config: FetchConfig) -> Result<Self> {
        Ok(Self::new(Arc::new(HttpBlocksApi::new(config)?)))
    }

    /// Fetch every page for `account`, one after the other. `on_page` is
    /// called after each page with the number of distinct names found so far
    /// for this account. The first failing page aborts the whole account.
    pub async fn fetch_all<F>(&self, account: &AccountName, mut on_page: F) -> Result<Vec<String>>
    where
        F: FnMut(usize),
    {
        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = self.api.fetch_page(account, cursor.as_deref()).await?;
            pages += 1;

            for name in page.entries {
                if seen.insert(name.clone()) {
                    entries.push(name);
                }
            }
            on_page(entries.len());

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        info!("Found {} blocked accounts for {} across {} pages", entries.len(), account, pages);
        Ok(entries)
    }
}
