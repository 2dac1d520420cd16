//! Shared fixtures for the integration tests

use async_trait::async_trait;
use forum_tracker::model::{CredentialSet, Resource, SubscriberId};
use forum_tracker::notify::{NotifyError, Notifier};
use forum_tracker::tracker::ResilientFetcher;
use forum_tracker::url::ResourceKind;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;
use url::Url;
use wiremock::MockServer;

/// A credential set whose only cookie is `xf_session=<label>`
pub fn credentials(label: &str) -> CredentialSet {
    let mut tokens = BTreeMap::new();
    tokens.insert("xf_session".to_string(), label.to_string());
    CredentialSet::new(label, tokens)
}

pub fn fetcher(labels: &[&str], attempt_timeout: Duration, ceiling: Duration) -> ResilientFetcher {
    ResilientFetcher::new(
        reqwest::Client::new(),
        labels.iter().map(|label| credentials(label)).collect(),
        attempt_timeout,
        ceiling,
    )
}

/// A fetcher with one credential set and short timeouts
pub fn quick_fetcher() -> ResilientFetcher {
    fetcher(&["main"], Duration::from_secs(2), Duration::from_secs(5))
}

/// A resource on the mock server; the mock speaks plain http so the URL is
/// used as-is instead of being normalized
pub fn resource_on(server: &MockServer, path: &str, kind: ResourceKind) -> Resource {
    let url = Url::parse(&format!("{}{}", server.uri(), path)).unwrap();
    Resource::with_kind(url, kind)
}

pub fn thread_page(ids: &[u32]) -> String {
    let posts: String = ids
        .iter()
        .map(|id| {
            format!(
                r#"<article class="message message--post" data-author="user{id}" data-content="post-{id}">
                     <time datetime="2024-05-0{d}T10:00:00+0000">May</time>
                     <div class="bbWrapper">body {id}</div>
                   </article>"#,
                d = id % 9 + 1
            )
        })
        .collect();
    format!("<html><body>{}</body></html>", posts)
}

pub fn forum_page(ids: &[u32]) -> String {
    let topics: String = ids
        .iter()
        .map(|id| {
            format!(
                r#"<div class="structItem structItem--thread" data-author="author{id}">
                     <div class="structItem-title"><a href="/threads/topic.{id}/" data-tp-primary="on">Topic {id}</a></div>
                   </div>"#
            )
        })
        .collect();
    format!("<html><body><div class=\"structItemContainer\">{}</div></body></html>", topics)
}

/// Records every notification; optionally refuses one subscriber
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(SubscriberId, String)>>,
    refuse: Option<SubscriberId>,
}

impl RecordingNotifier {
    pub fn refusing(subscriber: SubscriberId) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            refuse: Some(subscriber),
        }
    }

    pub fn sent(&self) -> Vec<(SubscriberId, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, subscriber: SubscriberId, text: &str) -> Result<(), NotifyError> {
        if self.refuse == Some(subscriber) {
            return Err(NotifyError::Delivery {
                subscriber,
                reason: "chat unavailable".to_string(),
            });
        }
        self.sent.lock().unwrap().push((subscriber, text.to_string()));
        Ok(())
    }
}
