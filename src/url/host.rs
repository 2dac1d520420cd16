use url::Url;

/// Extracts the lowercase host from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use forum_tracker::url::extract_host;
///
/// let url = Url::parse("https://Forum.Example.com/threads/a.1/").unwrap();
/// assert_eq!(extract_host(&url), Some("forum.example.com".to_string()));
/// ```
pub fn extract_host(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Checks whether `candidate` lives on the same site as `base`
///
/// Hosts are compared case-insensitively with any leading `www.` ignored,
/// so `www.forum.example.com` and `forum.example.com` are the same site.
pub fn is_same_site(candidate: &Url, base: &Url) -> bool {
    match (extract_host(candidate), extract_host(base)) {
        (Some(a), Some(b)) => strip_www(&a) == strip_www(&b),
        _ => false,
    }
}

fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}
