// Fantasy Premier League public JSON API client.
//
// One GET per endpoint per run, no retries. The API rejects requests without a
// browser-like User-Agent.

use std::time::Duration;

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, info};

use crate::bootstrap::Bootstrap;
use crate::fixtures::Fixture;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const DEFAULT_BASE_URL: &str = "https://fantasy.premierleague.com/api/";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        source: serde_json::Error,
    },
}

// ---------------------------------------------------------------------------
// FplClient
// ---------------------------------------------------------------------------

pub struct FplClient {
    http: reqwest::Client,
    base_url: String,
}

impl FplClient {
    /// Create a client for `base_url` (a trailing slash is added if missing).
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        let mut base_url = base_url.trim().to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch players, teams and positions in one payload.
    pub async fn bootstrap_static(&self) -> Result<Bootstrap, ClientError> {
        let (url, bootstrap): (_, Bootstrap) = self.get_json("bootstrap-static/").await?;
        info!(
            "Fetched {} players and {} teams from {}",
            bootstrap.elements.len(),
            bootstrap.teams.len(),
            url
        );
        Ok(bootstrap)
    }

    /// Fetch every fixture of the season, played or not.
    pub async fn fixtures(&self) -> Result<Vec<Fixture>, ClientError> {
        let (url, fixtures): (_, Vec<Fixture>) = self.get_json("fixtures/").await?;
        info!("Fetched {} fixtures from {}", fixtures.len(), url);
        Ok(fixtures)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<(String, T), ClientError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);

        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        match serde_json::from_str(&body) {
            Ok(value) => Ok((url, value)),
            Err(source) => Err(ClientError::Decode { url, source }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
