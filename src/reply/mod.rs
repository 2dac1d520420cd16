//! Reply submission
//!
//! # Flow
//!
//! 1. Fetch the thread page with the primary credential set
//! 2. Discover the reply form and its hidden fields
//! 3. Try each message-field candidate, urlencoded then multipart
//! 4. Confirm each plausible success by finding the message on the page

mod form;
mod submitter;

pub use form::{discover_form, ReplyForm, CSRF_FIELD, FALLBACK_BODY_FIELDS};
pub use submitter::{Encoding, ReplyError, ReplySubmitter, SubmitReport};

/// Result of a reply request as reported to the command layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyOutcome {
    pub ok: bool,
    pub error: Option<String>,
}

impl ReplyOutcome {
    pub fn success() -> Self {
        Self { ok: true, error: None }
    }

    pub fn failure(error: impl ToString) -> Self {
        Self {
            ok: false,
            error: Some(error.to_string()),
        }
    }
}
