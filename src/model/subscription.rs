use crate::model::Resource;
use std::fmt;

/// Identifier of a notification recipient (a chat or conversation id)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(pub i64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One subscriber tracking one resource
///
/// `cursor` is the id of the last post (thread) or topic (forum) this
/// subscriber has been told about. `None` means the resource was never
/// checked for this subscriber; the first check only records a baseline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub subscriber: SubscriberId,
    pub resource: Resource,
    pub cursor: Option<String>,
}

impl Subscription {
    pub fn new(subscriber: SubscriberId, resource: Resource) -> Self {
        Self {
            subscriber,
            resource,
            cursor: None,
        }
    }
}
