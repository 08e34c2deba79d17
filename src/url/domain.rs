use crate::FetchError;
use url::Url;

/// Extracts the throttling key of a URL
///
/// The key is the scheme and authority of the URL (`scheme://host[:port]`),
/// lowercased, with path, query and fragment stripped. Default ports are
/// omitted so `https://example.com:443/a` and `https://example.com/b` share a key.
///
/// # Arguments
///
/// * `url` - The URL to extract the key from
///
/// # Returns
///
/// * `Some(String)` - The host key
/// * `None` - If the URL has no host
///
/// # Examples
///
/// ```
/// use url::Url;
/// use toc_ripple::url::host_key;
///
/// let url = Url::parse("https://EXAMPLE.com/novel/1").unwrap();
/// assert_eq!(host_key(&url), Some("https://example.com".to_string()));
///
/// let url = Url::parse("http://localhost:8080/feed").unwrap();
/// assert_eq!(host_key(&url), Some("http://localhost:8080".to_string()));
/// ```
pub fn host_key(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    if host.is_empty() {
        return None;
    }

    let mut key = format!("{}://{}", url.scheme(), host.to_lowercase());
    if let Some(port) = url.port() {
        key.push_str(&format!(":{}", port));
    }
    Some(key)
}

/// Parses a raw URL string and extracts its host key
///
/// Malformed input, or input without an extractable host, is a generic fetch
/// failure rather than a [`crate::UrlError`]: by the time a URL reaches the
/// queue layer it should already have been validated by the dispatcher.
pub fn extract_host_key(raw: &str) -> Result<String, FetchError> {
    Url::parse(raw)
        .ok()
        .as_ref()
        .and_then(host_key)
        .ok_or_else(|| FetchError::InvalidHost(raw.to_string()))
}
