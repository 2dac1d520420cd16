//! Notification events and the outbound transport boundary
//!
//! The tracker only produces plain-text payloads. Delivery, chunking and
//! retries on transient send failures belong to the `Notifier`
//! implementation.

use crate::model::{Post, SubscriberId, Topic};
use async_trait::async_trait;
use thiserror::Error;

/// Longest post body carried in a notification, in characters
pub const MAX_BODY_CHARS: usize = 1500;

/// Errors reported by a notification transport
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Delivery to {subscriber} failed: {reason}")]
    Delivery {
        subscriber: SubscriberId,
        reason: String,
    },
}

/// Outbound port to the chat transport
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, subscriber: SubscriberId, text: &str) -> Result<(), NotifyError>;
}

/// Something new on a tracked resource, addressed to one subscriber
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    NewPost {
        subscriber: SubscriberId,
        resource_url: String,
        post: Post,
    },
    NewTopic {
        subscriber: SubscriberId,
        resource_url: String,
        topic: Topic,
    },
}

impl NotificationEvent {
    /// Builds a post event, truncating the body to `MAX_BODY_CHARS`
    pub fn new_post(subscriber: SubscriberId, resource_url: &str, post: &Post) -> Self {
        let mut post = post.clone();
        post.body = truncate_chars(&post.body, MAX_BODY_CHARS);
        Self::NewPost {
            subscriber,
            resource_url: resource_url.to_string(),
            post,
        }
    }

    pub fn new_topic(subscriber: SubscriberId, resource_url: &str, topic: &Topic) -> Self {
        Self::NewTopic {
            subscriber,
            resource_url: resource_url.to_string(),
            topic: topic.clone(),
        }
    }

    pub fn subscriber(&self) -> SubscriberId {
        match self {
            Self::NewPost { subscriber, .. } | Self::NewTopic { subscriber, .. } => *subscriber,
        }
    }

    /// The id the subscriber's cursor moves to once this event is delivered
    pub fn item_id(&self) -> &str {
        match self {
            Self::NewPost { post, .. } => &post.id,
            Self::NewTopic { topic, .. } => &topic.id,
        }
    }

    /// Renders the plain-text payload handed to the transport
    pub fn render(&self) -> String {
        match self {
            Self::NewPost {
                resource_url, post, ..
            } => format!(
                "New post in {}\n{} | {}\n\n{}\n\n{}",
                resource_url, post.timestamp, post.author, post.body, post.permalink
            ),
            Self::NewTopic {
                resource_url,
                topic,
                ..
            } => format!(
                "New topic in {}\n{}\nby {}\n{}",
                resource_url, topic.title, topic.author, topic.url
            ),
        }
    }
}

/// Cuts `text` to at most `max` characters, marking the cut with an ellipsis
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

/// Writes every notification to standard output
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutNotifier;

#[async_trait]
impl Notifier for StdoutNotifier {
    async fn notify(&self, subscriber: SubscriberId, text: &str) -> Result<(), NotifyError> {
        println!("[to {}]\n{}\n", subscriber, text);
        Ok(())
    }
}
