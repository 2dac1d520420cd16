//! Reply form discovery
//!
//! Finds the reply form on a thread page, collects the fields a browser
//! would submit with it, and lists candidate names for the message field.

use crate::extract::resolve_link;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Name of the anti-forgery field the site expects
pub const CSRF_FIELD: &str = "_xfToken";

/// Message field names tried when the form has no named textarea
pub const FALLBACK_BODY_FIELDS: &[&str] = &["message_html", "message", "message_text", "content"];

/// Keywords that mark a form action as a reply endpoint
const REPLY_ACTION_KEYWORDS: &[&str] = &["add-reply", "reply", "post"];

/// Input types a browser never submits as plain name/value pairs
const SKIPPED_INPUT_TYPES: &[&str] = &["submit", "button", "image", "file", "reset"];

static EDITOR_FORM: Lazy<Option<Selector>> = Lazy::new(|| {
    Selector::parse("form.message-editor, form[data-xf-init*='editor'], form#ThreadReply").ok()
});

static QUICK_REPLY_FORM: Lazy<Option<Selector>> = Lazy::new(|| {
    Selector::parse("form.js-quickReply, form[data-xf-init*='quick-reply'], form#QuickReply").ok()
});

static ANY_FORM: Lazy<Option<Selector>> = Lazy::new(|| Selector::parse("form").ok());
static INPUT: Lazy<Option<Selector>> = Lazy::new(|| Selector::parse("input[name]").ok());
static TEXTAREA: Lazy<Option<Selector>> = Lazy::new(|| Selector::parse("textarea[name]").ok());
static PAGE_TOKEN_INPUT: Lazy<Option<Selector>> =
    Lazy::new(|| Selector::parse("input[name='_xfToken']").ok());
static META_TOKEN: Lazy<Option<Selector>> =
    Lazy::new(|| Selector::parse("meta[name='csrf-token']").ok());
static HTML_TOKEN: Lazy<Option<Selector>> = Lazy::new(|| Selector::parse("html[data-csrf]").ok());

/// A reply form as a browser would submit it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyForm {
    /// Absolute URL the form posts to
    pub action: Url,
    /// Name/value pairs submitted alongside the message, in document order
    pub fields: Vec<(String, String)>,
    /// Candidate names for the message field, most likely first
    pub body_fields: Vec<String>,
}

impl ReplyForm {
    /// The anti-forgery token carried by the form, if any
    pub fn csrf_token(&self) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == CSRF_FIELD)
            .map(|(_, value)| value.as_str())
    }

    /// Form fields safe to print: the anti-forgery token value is masked
    pub fn redacted_fields(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.fields.iter().map(|(name, value)| {
            if name == CSRF_FIELD {
                (name.as_str(), "<redacted>")
            } else {
                (name.as_str(), value.as_str())
            }
        })
    }
}

/// Locates the reply form on a thread page
///
/// Candidates are tried in order: an editor form, a quick-reply form, a
/// form whose action looks like a reply endpoint, then any form at all.
pub fn discover_form(html: &str, page_url: &Url) -> Option<ReplyForm> {
    let document = Html::parse_document(html);
    let form = locate(&document)?;

    let action = form
        .value()
        .attr("action")
        .and_then(|href| resolve_link(href, page_url))
        .unwrap_or_else(|| page_url.clone());

    let mut fields = collect_fields(form);
    if !fields.iter().any(|(name, _)| name == CSRF_FIELD) {
        if let Some(token) = page_token(&document) {
            fields.push((CSRF_FIELD.to_string(), token));
        }
    }

    Some(ReplyForm {
        action,
        fields,
        body_fields: body_field_candidates(form),
    })
}

fn locate(document: &Html) -> Option<ElementRef<'_>> {
    let first = |sel: &Lazy<Option<Selector>>| {
        sel.as_ref().and_then(|sel| document.select(sel).next())
    };

    first(&EDITOR_FORM)
        .or_else(|| first(&QUICK_REPLY_FORM))
        .or_else(|| {
            ANY_FORM.as_ref().and_then(|sel| {
                document.select(sel).find(|form| {
                    let action = form.value().attr("action").unwrap_or("").to_lowercase();
                    REPLY_ACTION_KEYWORDS.iter().any(|kw| action.contains(kw))
                })
            })
        })
        .or_else(|| first(&ANY_FORM))
}

fn collect_fields(form: ElementRef<'_>) -> Vec<(String, String)> {
    let Some(sel) = INPUT.as_ref() else {
        return Vec::new();
    };

    form.select(sel)
        .filter_map(|input| {
            let el = input.value();
            let name = el.attr("name")?.trim();
            if name.is_empty() {
                return None;
            }

            let kind = el.attr("type").unwrap_or("text").to_ascii_lowercase();
            if SKIPPED_INPUT_TYPES.contains(&kind.as_str()) {
                return None;
            }
            if (kind == "checkbox" || kind == "radio") && el.attr("checked").is_none() {
                return None;
            }

            let default = if kind == "checkbox" { "on" } else { "" };
            let value = el.attr("value").unwrap_or(default);
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}

fn page_token(document: &Html) -> Option<String> {
    let read = |sel: &Lazy<Option<Selector>>, attr: &str| {
        sel.as_ref()
            .and_then(|sel| document.select(sel).next())
            .and_then(|el| el.value().attr(attr))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    read(&PAGE_TOKEN_INPUT, "value")
        .or_else(|| read(&META_TOKEN, "content"))
        .or_else(|| read(&HTML_TOKEN, "data-csrf"))
}

fn body_field_candidates(form: ElementRef<'_>) -> Vec<String> {
    let mut names: Vec<String> = TEXTAREA
        .as_ref()
        .map(|sel| {
            form.select(sel)
                .filter_map(|ta| ta.value().attr("name"))
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect()
        })
        .unwrap_or_default();

    for fallback in FALLBACK_BODY_FIELDS {
        if !names.iter().any(|name| name == fallback) {
            names.push(fallback.to_string());
        }
    }
    names
}
