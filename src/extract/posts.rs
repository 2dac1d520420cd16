//! Thread page extraction

use super::candidates::{resolve_link, Cascade, Containers, Probe};
use super::{PLACEHOLDER_AUTHOR, PLACEHOLDER_BODY, PLACEHOLDER_TIMESTAMP};
use crate::model::Post;
use crate::url::{extract_thread_id, first_number};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html};
use url::Url;

/// Post containers, newest template first
static POST_CONTAINERS: Lazy<Containers> = Lazy::new(|| {
    Containers::new(&["article.message--post", "article.message", "li.message", ".message"])
});

static POST_ID: Lazy<Cascade> = Lazy::new(|| {
    Cascade::new(&[
        Probe::SelfAttr("data-content"),
        Probe::SelfAttr("data-message-id"),
        Probe::SelfAttr("id"),
    ])
});

static POST_AUTHOR: Lazy<Cascade> = Lazy::new(|| {
    Cascade::new(&[
        Probe::SelfAttr("data-author"),
        Probe::Text(".message-name a"),
        Probe::Text(".message-name"),
        Probe::Text(".username"),
        Probe::Text(".message-userCard a"),
    ])
});

static POST_TIMESTAMP: Lazy<Cascade> = Lazy::new(|| {
    Cascade::new(&[
        Probe::Attr("time[datetime]", "datetime"),
        Probe::Attr(".u-dt[datetime]", "datetime"),
        Probe::Attr("abbr.DateTime[data-time]", "data-time"),
        Probe::Text("time"),
        Probe::Text(".DateTime"),
    ])
});

static POST_BODY: Lazy<Cascade> = Lazy::new(|| {
    Cascade::new(&[
        Probe::Lines(".bbWrapper"),
        Probe::Lines(".message-body"),
        Probe::Lines(".message-content"),
        Probe::Lines("blockquote.messageText"),
        Probe::Lines(".messageText"),
    ])
});

static POST_PERMALINK: Lazy<Cascade> = Lazy::new(|| {
    Cascade::new(&[
        Probe::Attr(".message-attribution-main a[href]", "href"),
        Probe::Attr("a.datePermalink", "href"),
        Probe::Attr("a[href*='/posts/']", "href"),
    ])
});

/// Extracts the posts of a thread page in document order (oldest first)
///
/// Missing author, timestamp or body degrade to placeholders. A post whose
/// id is found neither in its markup nor in the page URL is skipped.
pub fn extract_posts(html: &str, page_url: &Url) -> Vec<Post> {
    let document = Html::parse_document(html);
    let thread_id = extract_thread_id(page_url.as_str());

    let posts: Vec<Post> = POST_CONTAINERS
        .select(&document)
        .into_iter()
        .filter_map(|element| extract_post(element, page_url, thread_id.as_deref()))
        .collect();

    tracing::debug!(url = %page_url, count = posts.len(), "Extracted posts");
    posts
}

fn extract_post(element: ElementRef<'_>, page_url: &Url, thread_id: Option<&str>) -> Option<Post> {
    let id = match POST_ID.first_with(element, first_number) {
        Some(id) => id,
        None => {
            let fallback = thread_id?;
            tracing::trace!("Post without markup id, using thread id {}", fallback);
            fallback.to_string()
        }
    };

    let author = POST_AUTHOR
        .first(element)
        .unwrap_or_else(|| PLACEHOLDER_AUTHOR.to_string());
    let timestamp = POST_TIMESTAMP
        .first(element)
        .unwrap_or_else(|| PLACEHOLDER_TIMESTAMP.to_string());
    let body = POST_BODY
        .first(element)
        .unwrap_or_else(|| PLACEHOLDER_BODY.to_string());
    let permalink = POST_PERMALINK
        .first_with(element, |href| resolve_link(href, page_url).map(String::from))
        .unwrap_or_else(|| fallback_permalink(page_url, &id));

    Some(Post {
        id,
        author,
        timestamp,
        body,
        permalink,
    })
}

fn fallback_permalink(page_url: &Url, id: &str) -> String {
    let mut url = page_url.clone();
    url.set_fragment(Some(&format!("post-{}", id)));
    url.to_string()
}
