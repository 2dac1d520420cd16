use crate::config::CredentialEntry;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Session-identifying cookie tokens for one site identity
///
/// A credential set is immutable once built and cheap to clone. Several sets
/// may be loaded side by side; the fetcher races them so one logged-out or
/// rate-limited identity does not stall polling.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialSet {
    label: Arc<str>,
    tokens: Arc<BTreeMap<String, String>>,
}

impl CredentialSet {
    /// Creates a credential set from a label and named tokens
    pub fn new(label: impl Into<String>, tokens: BTreeMap<String, String>) -> Self {
        Self {
            label: Arc::from(label.into()),
            tokens: Arc::new(tokens),
        }
    }

    /// Builds a credential set from a config entry
    pub fn from_entry(entry: &CredentialEntry) -> Self {
        Self::new(entry.label.clone(), entry.tokens.clone())
    }

    /// Human-readable label, safe to log
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Assembles the `Cookie` request header value
    ///
    /// Tokens are emitted in name order: `a=1; b=2`.
    pub fn cookie_header(&self) -> String {
        self.tokens
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

// Token values are secrets; only the label and token names are printed.
impl fmt::Debug for CredentialSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialSet")
            .field("label", &self.label())
            .field("tokens", &self.tokens.keys().collect::<Vec<_>>())
            .finish()
    }
}
