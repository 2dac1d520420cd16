use crate::UrlError;
use url::Url;

/// Normalizes a URL according to Forum-Tracker's normalization rules
///
/// # Normalization Steps
///
/// 1. Trim surrounding whitespace and drop every control character
/// 2. Prepend `https://` when the input carries no scheme
/// 3. Enforce HTTPS: convert http:// to https://; reject other schemes
/// 4. Parse the URL (lowercases the host, resolves dot segments)
/// 5. Remove the fragment (a `#post-123` anchor names the same resource)
/// 6. Collapse duplicated trailing slashes into one
///
/// The result is stable under re-normalization:
/// `normalize_url(normalize_url(u).as_str()) == normalize_url(u)`.
///
/// # Examples
///
/// ```
/// use forum_tracker::url::normalize_url;
///
/// let url = normalize_url(" http://Forum.Example.com/threads/a.1// \n").unwrap();
/// assert_eq!(url.as_str(), "https://forum.example.com/threads/a.1/");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    // Step 1: Strip whitespace and control characters
    let cleaned: String = url_str.trim().chars().filter(|c| !c.is_control()).collect();

    if cleaned.is_empty() {
        return Err(UrlError::Empty);
    }

    // Step 2 & 3: Force the https scheme
    let with_scheme = force_https(&cleaned)?;

    // Step 4: Parse
    let mut url = Url::parse(&with_scheme).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost);
    }

    // Step 5: Remove fragment
    url.set_fragment(None);

    // Step 6: Collapse duplicated trailing slashes
    let collapsed = collapse_trailing_slashes(url.as_str());
    if collapsed.len() != url.as_str().len() {
        url = Url::parse(&collapsed).map_err(|e| UrlError::Parse(e.to_string()))?;
    }

    Ok(url)
}

/// Rewrites the scheme to https, adding one when missing
fn force_https(input: &str) -> Result<String, UrlError> {
    match input.find("://") {
        Some(idx) => {
            let scheme = input[..idx].to_ascii_lowercase();
            match scheme.as_str() {
                "https" | "http" => Ok(format!("https{}", &input[idx..])),
                other => Err(UrlError::InvalidScheme(format!(
                    "Only HTTP and HTTPS schemes are supported, got: {}",
                    other
                ))),
            }
        }
        None if input.starts_with("//") => Ok(format!("https:{}", input)),
        None => Ok(format!("https://{}", input)),
    }
}

/// Trims runs of trailing slashes down to a single slash
fn collapse_trailing_slashes(s: &str) -> String {
    let trimmed = s.trim_end_matches('/');
    if trimmed.len() == s.len() {
        return s.to_string();
    }
    // Never eat into the "://" separator
    if trimmed.ends_with(':') {
        return s.to_string();
    }
    format!("{}/", trimmed)
}
