use crate::config::ApiConfig;
use crate::error::LiveDropsError;
use crate::types::DropEvent;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

// The endpoint has answered both bare arrays and wrapped pages
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RecentDropsPage {
    Bare(Vec<DropEvent>),
    Drops { drops: Vec<DropEvent> },
    Data { data: Vec<DropEvent> },
}

impl RecentDropsPage {
    fn into_drops(self) -> Vec<DropEvent> {
        match self {
            RecentDropsPage::Bare(drops)
            | RecentDropsPage::Drops { drops }
            | RecentDropsPage::Data { data: drops } => drops,
        }
    }
}

/// One-shot reader for the most recent drops, used to seed an empty feed.
#[derive(Debug, Clone)]
pub struct RecentDropsClient {
    client: Client,
    base_url: Url,
    limit: usize,
}

impl RecentDropsClient {
    pub fn new(config: &ApiConfig) -> Result<Self, LiveDropsError> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self::with_client(client, config.base_url.clone(), config.seed_limit))
    }

    pub fn with_client(client: Client, base_url: Url, limit: usize) -> Self {
        Self {
            client,
            base_url,
            limit,
        }
    }

    pub fn endpoint(&self) -> Result<Url, LiveDropsError> {
        let mut url = self.base_url.join("drops/recent")?;
        url.query_pairs_mut()
            .append_pair("limit", &self.limit.to_string());
        Ok(url)
    }

    /// Newest-first drops, at most `limit` of them.
    pub async fn fetch(&self) -> Result<Vec<DropEvent>, LiveDropsError> {
        let url = self.endpoint()?;
        debug!(%url, "fetching recent drops");

        let page: RecentDropsPage = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut drops = page.into_drops();
        drops.truncate(self.limit);
        info!(count = drops.len(), "recent drops fetched");
        Ok(drops)
    }
}
