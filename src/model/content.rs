/// One message inside a thread
///
/// `timestamp` is kept in the site's own format and never reparsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: String,
    pub author: String,
    pub timestamp: String,
    pub body: String,
    pub permalink: String,
}

/// One thread entry in a sub-forum listing
///
/// `id` is the numeric thread id taken from the topic URL; it is empty when
/// the listing entry carried a title but no recognizable link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    pub id: String,
    pub title: String,
    pub author: String,
    pub url: String,
}

impl Topic {
    /// The id as a number, when it is one
    pub fn numeric_id(&self) -> Option<u64> {
        self.id.parse().ok()
    }
}
