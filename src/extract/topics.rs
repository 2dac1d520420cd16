//! Forum listing extraction

use super::candidates::{collapsed_text, resolve_link, Cascade, Containers, Probe};
use super::PLACEHOLDER_AUTHOR;
use crate::model::Topic;
use crate::url::{extract_thread_id, first_number};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use url::Url;

static TOPIC_CONTAINERS: Lazy<Containers> = Lazy::new(|| {
    Containers::new(&[
        ".structItem--thread",
        ".structItem",
        "li.discussionListItem",
        ".discussionListItem",
    ])
});

/// Title anchors, tried in order; the anchor supplies both title and URL
static TOPIC_LINKS: Lazy<Vec<Selector>> = Lazy::new(|| {
    [
        ".structItem-title a[data-tp-primary]",
        ".structItem-title a[href*='threads']",
        "h3.title a",
        "a[href*='threads']",
    ]
    .iter()
    .filter_map(|css| Selector::parse(css).ok())
    .collect()
});

static TOPIC_TITLE: Lazy<Cascade> =
    Lazy::new(|| Cascade::new(&[Probe::Text(".structItem-title"), Probe::Text(".title")]));

static TOPIC_AUTHOR: Lazy<Cascade> = Lazy::new(|| {
    Cascade::new(&[
        Probe::SelfAttr("data-author"),
        Probe::Text(".structItem-minor .username"),
        Probe::Text(".structItem-parts a"),
        Probe::Text(".username"),
    ])
});

static TOPIC_ELEMENT_ID: Lazy<Cascade> = Lazy::new(|| Cascade::new(&[Probe::SelfAttr("id")]));

/// Extracts the topics of a forum listing in document order
///
/// Topic ids come from the topic URL, else from the listing element's id
/// attribute. Entries with a title but no id are kept with an empty id;
/// entries with neither are skipped.
pub fn extract_topics(html: &str, page_url: &Url) -> Vec<Topic> {
    let document = Html::parse_document(html);

    let topics: Vec<Topic> = TOPIC_CONTAINERS
        .select(&document)
        .into_iter()
        .filter_map(|element| extract_topic(element, page_url))
        .collect();

    tracing::debug!(url = %page_url, count = topics.len(), "Extracted topics");
    topics
}

fn extract_topic(element: ElementRef<'_>, page_url: &Url) -> Option<Topic> {
    let link = primary_link(element, page_url);

    let title = link
        .as_ref()
        .map(|(text, _)| text.clone())
        .filter(|text| !text.is_empty())
        .or_else(|| TOPIC_TITLE.first(element))
        .unwrap_or_default();
    let url = link.map(|(_, url)| url.to_string()).unwrap_or_default();

    let id = extract_thread_id(&url)
        .or_else(|| TOPIC_ELEMENT_ID.first_with(element, first_number))
        .unwrap_or_default();

    if id.is_empty() && title.is_empty() {
        tracing::trace!("Skipping listing entry without id or title");
        return None;
    }

    let author = TOPIC_AUTHOR
        .first(element)
        .unwrap_or_else(|| PLACEHOLDER_AUTHOR.to_string());

    Some(Topic {
        id,
        title,
        author,
        url,
    })
}

/// Finds the topic's title anchor, returning its text and resolved URL
fn primary_link(element: ElementRef<'_>, page_url: &Url) -> Option<(String, Url)> {
    TOPIC_LINKS.iter().find_map(|sel| {
        element.select(sel).find_map(|anchor| {
            let href = anchor.value().attr("href")?;
            let url = resolve_link(href, page_url)?;
            Some((collapsed_text(anchor), url))
        })
    })
}
