//! Reply submission with verification

use crate::config::ReplyConfig;
use crate::extract::{collapsed_text, extract_posts};
use crate::model::CredentialSet;
use crate::reply::form::{discover_form, ReplyForm};
use crate::tracker::{AttemptError, ResilientFetcher};
use reqwest::header::{ACCEPT, COOKIE};
use reqwest::multipart;
use scraper::Html;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors that end a reply attempt
#[derive(Debug, Error)]
pub enum ReplyError {
    #[error("no credential set available for posting")]
    NoCredentials,

    #[error("thread page unreachable: {0}")]
    PageUnreachable(String),

    #[error("no reply form found on {url}")]
    NoForm { url: String },

    #[error("all {attempts} submission attempts failed, last error: {last_error}")]
    Exhausted { attempts: usize, last_error: String },
}

/// How the payload is encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    UrlEncoded,
    Multipart,
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UrlEncoded => write!(f, "urlencoded"),
            Self::Multipart => write!(f, "multipart"),
        }
    }
}

/// The submission strategy that produced a verified reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReport {
    pub field: String,
    pub encoding: Encoding,
    /// Newest post id seen on the verification page
    pub newest_post_id: Option<String>,
}

/// JSON envelope returned when `_xfResponseType=json` is honoured
#[derive(Debug, Deserialize)]
struct JsonEnvelope {
    status: Option<String>,
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

impl JsonEnvelope {
    fn first_error(&self) -> String {
        self.errors
            .first()
            .map(|e| match e {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_else(|| "site reported an error".to_string())
    }
}

/// Posts replies by emulating the site's reply form
#[derive(Clone)]
pub struct ReplySubmitter {
    fetcher: ResilientFetcher,
    verify_attempts: u32,
    verify_delay: Duration,
    snippet_words: usize,
}

impl ReplySubmitter {
    pub fn new(fetcher: ResilientFetcher, config: &ReplyConfig) -> Self {
        Self {
            fetcher,
            verify_attempts: config.verify_attempts.max(1),
            verify_delay: config.verify_delay(),
            snippet_words: config.snippet_words.max(1),
        }
    }

    /// Posts `message` into the thread at `thread_url`
    ///
    /// Every message-field candidate is tried with a urlencoded and then a
    /// multipart body. An attempt counts only once a re-fetch of the thread
    /// shows the start of the message.
    pub async fn submit(&self, thread_url: &Url, message: &str) -> Result<SubmitReport, ReplyError> {
        let credentials = self.fetcher.primary().ok_or(ReplyError::NoCredentials)?;
        let form = self.inspect(thread_url).await?;

        let snippet = snippet(message, self.snippet_words);
        let mut attempts = 0;
        let mut last_error = String::from("no submission attempted");

        for field in &form.body_fields {
            for encoding in [Encoding::UrlEncoded, Encoding::Multipart] {
                attempts += 1;
                if let Err(e) = self.send(&form, field, message, encoding, credentials).await {
                    tracing::debug!(field = %field, %encoding, "Submission rejected: {}", e);
                    last_error = e;
                    continue;
                }

                match self.verify(thread_url, &snippet, credentials).await {
                    Some(html) => {
                        tracing::info!(url = %thread_url, field = %field, %encoding, "Reply verified");
                        let newest_post_id = extract_posts(&html, thread_url).pop().map(|p| p.id);
                        return Ok(SubmitReport {
                            field: field.clone(),
                            encoding,
                            newest_post_id,
                        });
                    }
                    None => {
                        last_error = format!(
                            "reply not visible after {} checks ({} as {})",
                            self.verify_attempts, field, encoding
                        );
                        tracing::debug!("{}", last_error);
                    }
                }
            }
        }

        tracing::warn!(url = %thread_url, attempts, "Reply failed: {}", last_error);
        Err(ReplyError::Exhausted {
            attempts,
            last_error,
        })
    }

    /// Fetches the thread with the primary credential set and returns the
    /// form a submission would use, without posting anything
    pub async fn inspect(&self, thread_url: &Url) -> Result<ReplyForm, ReplyError> {
        let credentials = self.fetcher.primary().ok_or(ReplyError::NoCredentials)?;

        let page = self
            .fetcher
            .fetch_with(thread_url, credentials)
            .await
            .map_err(|e| ReplyError::PageUnreachable(e.to_string()))?;

        let form = discover_form(&page, thread_url).ok_or_else(|| ReplyError::NoForm {
            url: thread_url.to_string(),
        })?;
        tracing::debug!(
            action = %form.action,
            fields = form.fields.len(),
            token = form.csrf_token().is_some(),
            "Reply form found"
        );
        Ok(form)
    }

    /// Sends one submission; `Ok` means the response looked like success
    ///
    /// The request and the body read share one attempt timeout.
    async fn send(
        &self,
        form: &ReplyForm,
        field: &str,
        message: &str,
        encoding: Encoding,
        credentials: &CredentialSet,
    ) -> Result<(), String> {
        let payload = build_payload(form, field, message);

        let request = self
            .fetcher
            .client()
            .post(form.action.clone())
            .header(COOKIE, credentials.cookie_header())
            .header(ACCEPT, "application/json, text/html;q=0.9");

        let request = match encoding {
            Encoding::UrlEncoded => request.form(&payload),
            Encoding::Multipart => {
                let body = payload
                    .into_iter()
                    .fold(multipart::Form::new(), |body, (name, value)| body.text(name, value));
                request.multipart(body)
            }
        };

        let timeout = self.fetcher.attempt_timeout();
        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            let body = response.text().await?;
            Ok::<_, reqwest::Error>((status, body))
        };

        let (status, body) = tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| AttemptError::Timeout(timeout).to_string())?
            .map_err(|e| AttemptError::Network(e).to_string())?;

        judge_response(status, &body)
    }

    /// Re-fetches the thread until the snippet shows up
    async fn verify(&self, url: &Url, snippet: &str, credentials: &CredentialSet) -> Option<String> {
        for check in 1..=self.verify_attempts {
            tokio::time::sleep(self.verify_delay).await;

            match self.fetcher.fetch_with(url, credentials).await {
                Ok(html) if page_contains(&html, snippet) => return Some(html),
                Ok(_) => tracing::debug!(check, "Reply not visible yet"),
                Err(e) => tracing::debug!(check, "Verification fetch failed: {}", e),
            }
        }
        None
    }
}

/// Form fields plus the message and the JSON-response flags
fn build_payload(form: &ReplyForm, field: &str, message: &str) -> Vec<(String, String)> {
    let mut payload: Vec<(String, String)> = form
        .fields
        .iter()
        .filter(|(name, _)| name != field && name != "_xfWithData" && name != "_xfResponseType")
        .cloned()
        .collect();

    payload.push((field.to_string(), message.to_string()));
    payload.push(("_xfWithData".to_string(), "1".to_string()));
    payload.push(("_xfResponseType".to_string(), "json".to_string()));
    payload
}

/// Decides whether a submission response plausibly succeeded
fn judge_response(status: reqwest::StatusCode, body: &str) -> Result<(), String> {
    if let Ok(envelope) = serde_json::from_str::<JsonEnvelope>(body) {
        match envelope.status.as_deref() {
            Some("ok") => return Ok(()),
            Some("error") => return Err(envelope.first_error()),
            _ => {}
        }
    }

    if status.is_success() || status.is_redirection() {
        Ok(())
    } else {
        Err(format!("HTTP status {}", status.as_u16()))
    }
}

/// The first `words` words of the message, single-spaced
fn snippet(message: &str, words: usize) -> String {
    message
        .split_whitespace()
        .take(words)
        .collect::<Vec<_>>()
        .join(" ")
}

fn page_contains(html: &str, snippet: &str) -> bool {
    let document = Html::parse_document(html);
    collapsed_text(document.root_element()).contains(snippet)
}
