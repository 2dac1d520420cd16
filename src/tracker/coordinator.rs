//! Tracker facade - the programmatic interface used by the command layer
//!
//! This module wires the fetcher, store, scheduler and reply submitter
//! together and exposes the inbound operations:
//! - Tracking, untracking and listing subscriptions
//! - Scheduled and on-demand poll cycles
//! - One-shot page reads that bypass cursors
//! - Reply posting and credential health checks

use crate::config::Config;
use crate::extract::{extract_posts, extract_topics};
use crate::model::{Post, Resource, SubscriberId, Subscription, Topic};
use crate::notify::Notifier;
use crate::reply::{ReplyForm, ReplyOutcome, ReplySubmitter};
use crate::storage::{self, SharedStore};
use crate::tracker::engine::ResourceChecker;
use crate::tracker::keepalive::spawn_keepalive;
use crate::tracker::scheduler::{CycleReport, PollScheduler};
use crate::tracker::ResilientFetcher;
use crate::url::{extract_host, is_same_site, ResourceKind};
use crate::{ConfigError, Result, TrackerError};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Result of a track request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackOutcome {
    pub resource: Resource,
    /// `false` when the subscriber already tracked this resource
    pub created: bool,
}

/// Health of one credential set against the site root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialStatus {
    pub label: String,
    pub status: Option<u16>,
    pub logged_in: bool,
    pub error: Option<String>,
}

/// Main tracker structure
pub struct Tracker {
    site_root: Url,
    keepalive: Option<Duration>,
    fetcher: ResilientFetcher,
    store: SharedStore,
    scheduler: PollScheduler,
    submitter: ReplySubmitter,
}

impl Tracker {
    /// Creates a tracker backed by the SQLite database named in the config
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `notifier` - Transport that receives every notification
    ///
    /// # Returns
    ///
    /// * `Ok(Tracker)` - Storage opened and HTTP client built
    /// * `Err(TrackerError)` - Failed to initialize
    pub fn new(config: Config, notifier: Arc<dyn Notifier>) -> Result<Self> {
        let storage = storage::open_storage(Path::new(&config.storage.database_path))?;
        let fetcher = ResilientFetcher::from_config(&config)?;
        Self::from_parts(config, storage::shared(storage), notifier, fetcher)
    }

    /// Creates a tracker over an existing store and fetcher
    pub fn from_parts(
        config: Config,
        store: SharedStore,
        notifier: Arc<dyn Notifier>,
        fetcher: ResilientFetcher,
    ) -> Result<Self> {
        let site_root = Url::parse(&config.site.base_url).map_err(|e| {
            ConfigError::InvalidUrl(format!("{}: {}", config.site.base_url, e))
        })?;

        let checker = ResourceChecker::new(
            fetcher.clone(),
            Arc::clone(&store),
            notifier,
            config.tracker.forum_topic_window,
        );
        let scheduler = PollScheduler::new(
            checker,
            Arc::clone(&store),
            config.tracker.poll_interval(),
            config.tracker.max_concurrent_checks as usize,
        );
        let submitter = ReplySubmitter::new(fetcher.clone(), &config.reply);
        let keepalive = config
            .tracker
            .keepalive_enabled
            .then(|| config.tracker.keepalive_interval());

        tracing::info!(
            "Tracker ready for {} with {} credential set(s)",
            site_root,
            fetcher.credentials().len()
        );

        Ok(Self {
            site_root,
            keepalive,
            fetcher,
            store,
            scheduler,
            submitter,
        })
    }

    pub fn scheduler(&self) -> &PollScheduler {
        &self.scheduler
    }

    // ===== Subscriptions =====

    /// Starts tracking a thread or forum for a subscriber
    ///
    /// Tracking the same resource twice keeps the existing subscription and
    /// its cursor.
    pub fn track(&self, subscriber: SubscriberId, raw_url: &str) -> Result<TrackOutcome> {
        let resource = self.resolve(raw_url)?;

        let created = storage::lock(&self.store)?
            .add_subscription(&Subscription::new(subscriber, resource.clone()))?;

        if created {
            tracing::info!(subscriber = %subscriber, "Now tracking {}", resource);
        } else {
            tracing::debug!(subscriber = %subscriber, "Already tracking {}", resource);
        }

        Ok(TrackOutcome { resource, created })
    }

    /// Stops tracking; returns whether a subscription was removed
    pub fn untrack(&self, subscriber: SubscriberId, raw_url: &str) -> Result<bool> {
        let resource = Resource::parse(raw_url)?;
        let removed = storage::lock(&self.store)?.remove_subscription(subscriber, resource.key())?;

        if removed {
            tracing::info!(subscriber = %subscriber, "Stopped tracking {}", resource.url());
        }
        Ok(removed)
    }

    /// Lists a subscriber's tracked resources with their cursors
    pub fn list_tracked(&self, subscriber: SubscriberId) -> Result<Vec<Subscription>> {
        Ok(storage::lock(&self.store)?.list_for_subscriber(subscriber)?)
    }

    // ===== Polling =====

    /// Starts an extra poll cycle in the background
    ///
    /// Returns `None` when called outside a tokio runtime. Aborting the
    /// returned handle cancels the cycle; dropping it lets the cycle finish.
    pub fn force_check(&self) -> Option<JoinHandle<Result<CycleReport>>> {
        if tokio::runtime::Handle::try_current().is_err() {
            tracing::warn!("Cannot start an on-demand check without a runtime");
            return None;
        }
        Some(self.scheduler.trigger())
    }

    /// Runs one poll cycle and waits for it
    pub async fn check_now(&self) -> Result<CycleReport> {
        self.scheduler.run_cycle().await
    }

    /// Polls until `cancel` fires, with the keep-alive loop alongside
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let keepalive = self.keepalive.map(|period| {
            tracing::info!("Keep-alive every {:?}", period);
            spawn_keepalive(
                self.fetcher.clone(),
                self.site_root.clone(),
                period,
                cancel.child_token(),
            )
        });

        self.scheduler.run(cancel.clone()).await;

        if let Some(handle) = keepalive {
            cancel.cancel();
            handle
                .await
                .map_err(|e| TrackerError::Task(format!("keep-alive: {}", e)))?;
        }
        Ok(())
    }

    // ===== One-shot reads =====

    /// Fetches and extracts a thread's posts, ignoring cursors
    pub async fn manual_fetch_posts(&self, raw_url: &str) -> Result<Vec<Post>> {
        let resource = self.resolve(raw_url)?;
        let html = self.fetcher.fetch(resource.url()).await?;
        Ok(extract_posts(&html, resource.url()))
    }

    /// Fetches and extracts a forum's topics, ignoring cursors
    pub async fn manual_fetch_topics(&self, raw_url: &str) -> Result<Vec<Topic>> {
        let resource = self.resolve(raw_url)?;
        let html = self.fetcher.fetch(resource.url()).await?;
        Ok(extract_topics(&html, resource.url()))
    }

    // ===== Replies =====

    /// Posts a reply and, once verified, moves the subscriber's cursor past it
    pub async fn post_reply(
        &self,
        subscriber: SubscriberId,
        raw_url: &str,
        text: &str,
    ) -> ReplyOutcome {
        match self.resolve(raw_url) {
            Ok(resource) => self.post_reply_to(subscriber, &resource, text).await,
            Err(e) => ReplyOutcome::failure(e),
        }
    }

    /// Posts a reply into an already-resolved resource
    ///
    /// The resource must be a thread. No site check is made here; callers
    /// holding a raw URL go through `post_reply`.
    pub async fn post_reply_to(
        &self,
        subscriber: SubscriberId,
        resource: &Resource,
        text: &str,
    ) -> ReplyOutcome {
        if resource.kind() != ResourceKind::Thread {
            return ReplyOutcome::failure(TrackerError::NotAThread {
                url: resource.url().to_string(),
            });
        }

        let report = match self.submitter.submit(resource.url(), text).await {
            Ok(report) => report,
            Err(e) => return ReplyOutcome::failure(e),
        };

        if let Some(newest) = report.newest_post_id.as_deref() {
            let written = storage::lock(&self.store)
                .and_then(|mut store| store.update_cursor(subscriber, resource.key(), newest));
            if let Err(e) = written {
                tracing::warn!(subscriber = %subscriber, "Reply posted but cursor not saved: {}", e);
            }
        }

        ReplyOutcome::success()
    }

    /// Shows the reply form a post into this thread would use, posting nothing
    pub async fn inspect_reply_form(&self, raw_url: &str) -> Result<ReplyForm> {
        let resource = self.resolve(raw_url)?;
        if resource.kind() != ResourceKind::Thread {
            return Err(TrackerError::NotAThread {
                url: resource.url().to_string(),
            });
        }
        Ok(self.submitter.inspect(resource.url()).await?)
    }

    // ===== Credentials =====

    /// Fetches the site root once per credential set
    pub async fn check_credentials(&self) -> Vec<CredentialStatus> {
        let mut statuses = Vec::new();

        for credentials in self.fetcher.credentials() {
            let status = match self.fetcher.probe(&self.site_root, credentials).await {
                Ok((code, body)) => CredentialStatus {
                    label: credentials.label().to_string(),
                    status: Some(code.as_u16()),
                    logged_in: code.is_success() && looks_logged_in(&body),
                    error: None,
                },
                Err(e) => CredentialStatus {
                    label: credentials.label().to_string(),
                    status: None,
                    logged_in: false,
                    error: Some(e.to_string()),
                },
            };

            tracing::info!(
                credential = credentials.label(),
                status = ?status.status,
                logged_in = status.logged_in,
                "Credential check"
            );
            statuses.push(status);
        }

        statuses
    }

    /// Normalizes a URL and checks it is a trackable page on this site
    fn resolve(&self, raw_url: &str) -> Result<Resource> {
        let resource = Resource::parse(raw_url)?;

        if !resource.kind().is_trackable() {
            return Err(TrackerError::UnknownResourceKind {
                url: resource.url().to_string(),
            });
        }

        if !is_same_site(resource.url(), &self.site_root) {
            return Err(TrackerError::ForeignHost {
                url: resource.url().to_string(),
                expected_host: extract_host(&self.site_root).unwrap_or_default(),
            });
        }

        Ok(resource)
    }
}

static LOGGED_IN_MARKER: Lazy<Option<Selector>> =
    Lazy::new(|| Selector::parse("[data-logged-in]").ok());

static LOGOUT_LINK: Lazy<Option<Selector>> =
    Lazy::new(|| Selector::parse("a[href*='logout'], a[href*='log-out']").ok());

/// Logged-in pages mark the root element or offer a logout link
///
/// An explicit `data-logged-in` marker decides on its own; the logout link
/// is only consulted when no marker is present.
fn looks_logged_in(html: &str) -> bool {
    let document = Html::parse_document(html);
    let find = |sel: &Lazy<Option<Selector>>| {
        sel.as_ref().and_then(|sel| document.select(sel).next())
    };

    match find(&LOGGED_IN_MARKER) {
        Some(marker) => marker.value().attr("data-logged-in") == Some("true"),
        None => find(&LOGOUT_LINK).is_some(),
    }
}
