//! Per-resource diff and notify
//!
//! Checking a resource is split in two. `plan` is pure: given the fetched
//! HTML and the resource's subscriptions it decides which events each
//! subscriber should receive and where their cursors end up. The
//! `ResourceChecker` then fetches, plans, delivers and writes cursors.

use crate::extract::{extract_posts, extract_topics};
use crate::model::{Resource, SubscriberId, Subscription, Topic};
use crate::notify::{NotificationEvent, Notifier};
use crate::storage::{self, SharedStore};
use crate::tracker::ResilientFetcher;
use crate::url::ResourceKind;
use crate::Result;
use std::collections::HashSet;
use std::sync::Arc;

/// What one subscriber should be told about one resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberPlan {
    pub subscriber: SubscriberId,
    /// Events in delivery order
    pub events: Vec<NotificationEvent>,
    /// Cursor to store once every event is delivered; `None` leaves it alone
    pub final_cursor: Option<String>,
}

impl SubscriberPlan {
    fn unchanged(subscriber: SubscriberId) -> Self {
        Self {
            subscriber,
            events: Vec::new(),
            final_cursor: None,
        }
    }

    fn baseline(subscriber: SubscriberId, cursor: &str) -> Self {
        Self {
            subscriber,
            events: Vec::new(),
            final_cursor: Some(cursor.to_string()),
        }
    }

    pub fn is_baseline(&self) -> bool {
        self.events.is_empty() && self.final_cursor.is_some()
    }
}

/// Result of diffing one page against its subscriptions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffPlan {
    /// The resource kind cannot be diffed
    Skip,
    /// The markup yielded nothing to compare
    Empty,
    Ready(Vec<SubscriberPlan>),
}

/// Outcome of checking one resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    Skipped,
    ExtractionEmpty,
    Checked {
        notified: usize,
        baselined: usize,
        deferred: usize,
    },
}

/// Diffs a fetched page against every subscription of its resource
///
/// # Arguments
///
/// * `resource` - The resource the page was fetched for
/// * `html` - The fetched page
/// * `subscriptions` - All subscriptions to this resource
/// * `forum_window` - How many of the newest topics a forum diff considers
pub fn plan(
    resource: &Resource,
    html: &str,
    subscriptions: &[Subscription],
    forum_window: usize,
) -> DiffPlan {
    match resource.kind() {
        ResourceKind::Thread => plan_thread(resource, html, subscriptions),
        ResourceKind::Forum => plan_forum(resource, html, subscriptions, forum_window),
        ResourceKind::Unknown => DiffPlan::Skip,
    }
}

fn plan_thread(resource: &Resource, html: &str, subscriptions: &[Subscription]) -> DiffPlan {
    let posts = extract_posts(html, resource.url());
    let newest = match posts.last() {
        Some(post) => post,
        None => return DiffPlan::Empty,
    };

    let plans = subscriptions
        .iter()
        .map(|sub| match sub.cursor.as_deref() {
            None => SubscriberPlan::baseline(sub.subscriber, &newest.id),
            Some(cursor) if cursor == newest.id => SubscriberPlan::unchanged(sub.subscriber),
            Some(_) => SubscriberPlan {
                subscriber: sub.subscriber,
                events: vec![NotificationEvent::new_post(
                    sub.subscriber,
                    resource.key(),
                    newest,
                )],
                final_cursor: Some(newest.id.clone()),
            },
        })
        .collect();

    DiffPlan::Ready(plans)
}

fn plan_forum(
    resource: &Resource,
    html: &str,
    subscriptions: &[Subscription],
    forum_window: usize,
) -> DiffPlan {
    let topics = extract_topics(html, resource.url());
    if topics.is_empty() {
        return DiffPlan::Empty;
    }

    let window = topic_window(&topics, forum_window);
    let newest = match window.last() {
        Some((_, topic)) => *topic,
        None => {
            tracing::debug!(url = %resource.url(), "No numbered topics in listing");
            return DiffPlan::Empty;
        }
    };

    let plans = subscriptions
        .iter()
        .map(|sub| {
            let cursor = match sub.cursor.as_deref() {
                None => return SubscriberPlan::baseline(sub.subscriber, &newest.id),
                Some(cursor) => cursor,
            };

            // A cursor that is not a number predates numeric ids; the whole window is new
            let floor = cursor.parse::<u64>().ok();
            let events: Vec<NotificationEvent> = window
                .iter()
                .filter(|(id, _)| floor.map_or(true, |floor| *id > floor))
                .map(|(_, topic)| NotificationEvent::new_topic(sub.subscriber, resource.key(), topic))
                .collect();

            let final_cursor = events.last().map(|event| event.item_id().to_string());
            SubscriberPlan {
                subscriber: sub.subscriber,
                events,
                final_cursor,
            }
        })
        .collect();

    DiffPlan::Ready(plans)
}

/// The newest `size` numbered topics, oldest first, without duplicates
fn topic_window(topics: &[Topic], size: usize) -> Vec<(u64, &Topic)> {
    let mut seen = HashSet::new();
    let mut numbered: Vec<(u64, &Topic)> = topics
        .iter()
        .filter_map(|topic| topic.numeric_id().map(|id| (id, topic)))
        .filter(|(id, _)| seen.insert(*id))
        .collect();

    numbered.sort_by_key(|(id, _)| *id);
    let skip = numbered.len().saturating_sub(size);
    numbered.split_off(skip)
}

/// Fetches a resource, diffs it and applies the result
#[derive(Clone)]
pub struct ResourceChecker {
    fetcher: ResilientFetcher,
    store: SharedStore,
    notifier: Arc<dyn Notifier>,
    forum_window: usize,
}

impl ResourceChecker {
    pub fn new(
        fetcher: ResilientFetcher,
        store: SharedStore,
        notifier: Arc<dyn Notifier>,
        forum_window: usize,
    ) -> Self {
        Self {
            fetcher,
            store,
            notifier,
            forum_window,
        }
    }

    /// Checks one resource for all of its subscribers
    ///
    /// Fetch failures are returned to the caller; nothing is written in
    /// that case so the next cycle retries from the same cursors.
    pub async fn check(
        &self,
        resource: &Resource,
        subscriptions: &[Subscription],
    ) -> Result<CheckOutcome> {
        if !resource.kind().is_trackable() {
            tracing::debug!(url = %resource.url(), "Skipping resource of unknown kind");
            return Ok(CheckOutcome::Skipped);
        }

        let html = self.fetcher.fetch(resource.url()).await?;

        match plan(resource, &html, subscriptions, self.forum_window) {
            DiffPlan::Skip => Ok(CheckOutcome::Skipped),
            DiffPlan::Empty => {
                tracing::info!(url = %resource.url(), "Page yielded no {} content", resource.kind());
                Ok(CheckOutcome::ExtractionEmpty)
            }
            DiffPlan::Ready(plans) => self.apply(resource, plans).await,
        }
    }

    async fn apply(&self, resource: &Resource, plans: Vec<SubscriberPlan>) -> Result<CheckOutcome> {
        let mut notified = 0;
        let mut baselined = 0;
        let mut deferred = 0;

        for plan in plans {
            if plan.is_baseline() {
                baselined += 1;
            }

            let total = plan.events.len();
            let mut cursor = if total == 0 {
                plan.final_cursor.clone()
            } else {
                None
            };

            for (index, event) in plan.events.iter().enumerate() {
                match self.notifier.notify(plan.subscriber, &event.render()).await {
                    Ok(()) => {
                        notified += 1;
                        cursor = Some(event.item_id().to_string());
                    }
                    Err(e) => {
                        tracing::warn!(
                            subscriber = %plan.subscriber,
                            url = %resource.url(),
                            "Delivery failed, deferring {} event(s): {}",
                            total - index,
                            e
                        );
                        deferred += total - index;
                        break;
                    }
                }
            }

            if let Some(cursor) = cursor {
                self.write_cursor(plan.subscriber, resource, &cursor)?;
            }
        }

        Ok(CheckOutcome::Checked {
            notified,
            baselined,
            deferred,
        })
    }

    fn write_cursor(&self, subscriber: SubscriberId, resource: &Resource, cursor: &str) -> Result<()> {
        let updated = storage::lock(&self.store)?.update_cursor(subscriber, resource.key(), cursor)?;
        if updated {
            tracing::debug!(subscriber = %subscriber, url = %resource.url(), cursor, "Cursor advanced");
        } else {
            tracing::debug!(subscriber = %subscriber, url = %resource.url(), "Subscription removed during check");
        }
        Ok(())
    }
}
