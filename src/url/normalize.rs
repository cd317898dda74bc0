use crate::{UrlError, UrlResult};
use url::Url;

/// Resolves a detail-page href and reduces it to its identity
///
/// Two hrefs that differ only in query string or fragment normalize to the same URL,
/// which is what link deduplication relies on.
///
/// # Normalization Steps
///
/// 1. Reject empty, fragment-only, and `javascript:`/`mailto:`/`tel:`/`data:` hrefs
/// 2. Resolve against the page the href was found on
/// 3. Require an HTTP(S) scheme and a host
/// 4. Collapse repeated slashes and `.` segments; `..` is resolved by the parser
/// 5. Drop the query string and the fragment
///
/// # Examples
///
/// ```
/// use listing_scraper::url::normalize_detail_url;
/// use url::Url;
///
/// let page = Url::parse("https://auto.example/moskva/cars/all/?page=2").unwrap();
/// let url = normalize_detail_url("/cars/used/sale/kia/rio/11-ab/?from=search", &page).unwrap();
/// assert_eq!(url.as_str(), "https://auto.example/cars/used/sale/kia/rio/11-ab/");
/// ```
pub fn normalize_detail_url(href: &str, base: &Url) -> UrlResult<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return Err(UrlError::Malformed(format!("not a page link: '{}'", href)));
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return Err(UrlError::InvalidScheme(href.to_string()));
    }

    let mut url = base.join(href).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().is_none() {
        return Err(UrlError::Malformed(format!("missing host: '{}'", href)));
    }

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);
    url.set_query(None);
    url.set_fragment(None);

    Ok(url)
}

/// Removes empty and `.` segments, keeping a trailing slash if there was one
fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect();

    if segments.is_empty() {
        return "/".to_string();
    }

    let mut result = format!("/{}", segments.join("/"));
    if path.ends_with('/') {
        result.push('/');
    }
    result
}
