use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

/// Thread-id patterns, tried in order; the first capture wins
static THREAD_ID_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // /posts/123456/
        r"/posts/(\d+)",
        // slug.3717567/ or slug.3717567 at the end
        r"\.(\d+)(?:/|$)",
        // threads=slug.3717567
        r"threads=[^&]*?\.(\d+)",
        // threads=3717567
        r"threads=(\d+)",
        // threads/3717567/
        r"threads/(\d+)",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

static FIRST_NUMBER: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(\d+)").ok());

/// Extracts the numeric thread identifier from a thread or post URL
///
/// Returns `None` when no known pattern matches.
///
/// # Examples
///
/// ```
/// use forum_tracker::url::extract_thread_id;
///
/// assert_eq!(extract_thread_id("https://f.example.com/threads/hello.3717567/"), Some("3717567".to_string()));
/// assert_eq!(extract_thread_id("https://f.example.com/index.php?threads=42"), Some("42".to_string()));
/// assert_eq!(extract_thread_id("https://f.example.com/members/"), None);
/// ```
pub fn extract_thread_id(url: &str) -> Option<String> {
    // Only the path and query are searched; hosts like 10.0.0.1 must not match
    let target = match Url::parse(url) {
        Ok(parsed) => match parsed.query() {
            Some(query) => format!("{}?{}", parsed.path(), query),
            None => parsed.path().to_string(),
        },
        Err(_) => url.to_string(),
    };

    THREAD_ID_PATTERNS
        .iter()
        .find_map(|re| re.captures(&target))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Returns the first run of ASCII digits in `value`
///
/// Markup ids come as `post-123`, `js-post-123` or plain `123`.
pub fn first_number(value: &str) -> Option<String> {
    FIRST_NUMBER
        .as_ref()
        .and_then(|re| re.captures(value))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
