use crate::url::{classify_resource, normalize_url, ResourceKind};
use crate::UrlError;
use std::fmt;
use url::Url;

/// A trackable URL together with its classification
///
/// Resources are identified by their normalized URL; two subscriptions to
/// the same resource share one fetch per poll cycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Resource {
    url: Url,
    kind: ResourceKind,
}

impl Resource {
    /// Normalizes and classifies a raw URL
    ///
    /// The kind may be `Unknown`; callers that schedule resources must
    /// reject those.
    pub fn parse(raw: &str) -> Result<Self, UrlError> {
        let url = normalize_url(raw)?;
        let kind = classify_resource(&url);
        Ok(Self { url, kind })
    }

    /// Wraps an already-normalized URL with a known kind
    ///
    /// Used when loading rows back from storage.
    pub fn with_kind(url: Url, kind: ResourceKind) -> Self {
        Self { url, kind }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// The storage and grouping key
    pub fn key(&self) -> &str {
        self.url.as_str()
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.url, self.kind)
    }
}
