//! Resilient HTTP fetcher
//!
//! This module handles every page GET made against the tracked site:
//! - Building the shared HTTP client
//! - Racing one request per credential set, first good response wins
//! - Falling back to one sequential pass when the whole race fails
//! - Bounding everything by a hard ceiling

use crate::config::Config;
use crate::model::CredentialSet;
use reqwest::header::COOKIE;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinSet;
use url::Url;

/// Why one GET with one credential set did not produce a usable page
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("empty response body")]
    EmptyBody,

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// A page could not be fetched with any credential set
#[derive(Debug, Error)]
pub enum FetchFailure {
    #[error("no credential sets configured")]
    NoCredentials,

    #[error("all {attempts} attempts for {url} failed, last error: {last_error}")]
    AllAttemptsFailed {
        url: String,
        attempts: usize,
        last_error: String,
    },

    #[error("fetching {url} exceeded the hard ceiling")]
    CeilingElapsed { url: String },
}

/// Builds the HTTP client shared by fetching, keep-alive and replies
///
/// Redirects are followed; the client keeps no cookie jar because every
/// request carries its credential set's `Cookie` header explicitly.
pub fn build_http_client(config: &Config) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.site.user_agent.clone())
        .connect_timeout(config.http.connect_timeout())
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches pages by racing every credential set
#[derive(Clone)]
pub struct ResilientFetcher {
    client: Client,
    credentials: Arc<[CredentialSet]>,
    attempt_timeout: Duration,
    ceiling: Duration,
}

impl ResilientFetcher {
    /// Creates a fetcher over an already-built client
    ///
    /// # Arguments
    ///
    /// * `client` - The HTTP client to use
    /// * `credentials` - Credential sets to race, in priority order
    /// * `attempt_timeout` - Bound on each individual GET
    /// * `ceiling` - Bound on a whole `fetch` call
    pub fn new(
        client: Client,
        credentials: Vec<CredentialSet>,
        attempt_timeout: Duration,
        ceiling: Duration,
    ) -> Self {
        Self {
            client,
            credentials: credentials.into(),
            attempt_timeout,
            ceiling,
        }
    }

    /// Builds a fetcher from the loaded configuration
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let client = build_http_client(config)?;
        let credentials = config
            .credentials
            .iter()
            .map(CredentialSet::from_entry)
            .collect();
        Ok(Self::new(
            client,
            credentials,
            config.http.attempt_timeout(),
            config.http.fetch_ceiling(),
        ))
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn credentials(&self) -> &[CredentialSet] {
        &self.credentials
    }

    /// Bound on any single request made with this fetcher's client
    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    /// The credential set used for actions that must come from one identity
    pub fn primary(&self) -> Option<&CredentialSet> {
        self.credentials.first()
    }

    /// Fetches a page's HTML
    ///
    /// One GET per credential set runs concurrently, each bounded by the
    /// attempt timeout. The first 200 response with a non-empty body is
    /// returned and the remaining requests are aborted. If every racer
    /// fails, the credential sets are tried once more one after another.
    /// The whole call never outlives the ceiling.
    pub async fn fetch(&self, url: &Url) -> Result<String, FetchFailure> {
        if self.credentials.is_empty() {
            return Err(FetchFailure::NoCredentials);
        }

        match tokio::time::timeout(self.ceiling, self.race(url)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(url = %url, "Fetch ceiling of {:?} elapsed", self.ceiling);
                Err(FetchFailure::CeilingElapsed {
                    url: url.to_string(),
                })
            }
        }
    }

    /// Fetches a page with one specific credential set, no racing
    pub async fn fetch_with(
        &self,
        url: &Url,
        credentials: &CredentialSet,
    ) -> Result<String, FetchFailure> {
        attempt(&self.client, url, credentials, self.attempt_timeout)
            .await
            .map_err(|e| FetchFailure::AllAttemptsFailed {
                url: url.to_string(),
                attempts: 1,
                last_error: e.to_string(),
            })
    }

    /// Sends one GET and returns the status and body whatever the status
    pub async fn probe(
        &self,
        url: &Url,
        credentials: &CredentialSet,
    ) -> Result<(StatusCode, String), AttemptError> {
        let request = self
            .client
            .get(url.clone())
            .header(COOKIE, credentials.cookie_header())
            .send();

        let response = tokio::time::timeout(self.attempt_timeout, request)
            .await
            .map_err(|_| AttemptError::Timeout(self.attempt_timeout))??;
        let status = response.status();
        let body = tokio::time::timeout(self.attempt_timeout, response.text())
            .await
            .map_err(|_| AttemptError::Timeout(self.attempt_timeout))??;
        Ok((status, body))
    }

    async fn race(&self, url: &Url) -> Result<String, FetchFailure> {
        let mut attempts = 0;
        let mut last_error = String::new();

        let mut racers = JoinSet::new();
        for credentials in self.credentials.iter().cloned() {
            let client = self.client.clone();
            let url = url.clone();
            let timeout = self.attempt_timeout;
            racers.spawn(async move {
                let result = attempt(&client, &url, &credentials, timeout).await;
                (credentials, result)
            });
        }

        while let Some(joined) = racers.join_next().await {
            attempts += 1;
            match joined {
                Ok((credentials, Ok(body))) => {
                    racers.abort_all();
                    tracing::debug!(url = %url, credential = credentials.label(), "Race won");
                    return Ok(body);
                }
                Ok((credentials, Err(e))) => {
                    tracing::debug!(
                        url = %url,
                        credential = credentials.label(),
                        "Fetch attempt failed: {}",
                        e
                    );
                    last_error = e.to_string();
                }
                Err(e) => {
                    last_error = format!("attempt task failed: {}", e);
                }
            }
        }

        tracing::debug!(url = %url, "All racers failed, trying credential sets in turn");
        for credentials in self.credentials.iter() {
            attempts += 1;
            match attempt(&self.client, url, credentials, self.attempt_timeout).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    tracing::debug!(
                        url = %url,
                        credential = credentials.label(),
                        "Sequential attempt failed: {}",
                        e
                    );
                    last_error = e.to_string();
                }
            }
        }

        Err(FetchFailure::AllAttemptsFailed {
            url: url.to_string(),
            attempts,
            last_error,
        })
    }
}

/// One GET with one credential set, bounded by `timeout`
async fn attempt(
    client: &Client,
    url: &Url,
    credentials: &CredentialSet,
    timeout: Duration,
) -> Result<String, AttemptError> {
    let work = async {
        let response = client
            .get(url.clone())
            .header(COOKIE, credentials.cookie_header())
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(AttemptError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Err(AttemptError::EmptyBody);
        }
        Ok::<_, AttemptError>(body)
    };

    tokio::time::timeout(timeout, work)
        .await
        .map_err(|_| AttemptError::Timeout(timeout))?
}
