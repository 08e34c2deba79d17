use crate::UrlError;
use url::Url;

/// Validates a caller-supplied URL before any scraping starts
///
/// # Validation Rules
///
/// 1. The string must parse as an absolute URL
/// 2. The scheme must be `http` or `https`
/// 3. The URL must carry a non-empty host
///
/// # Arguments
///
/// * `raw` - The URL string as received from the caller
///
/// # Returns
///
/// * `Ok(Url)` - The parsed URL
/// * `Err(UrlError)` - The input is not a usable URL; the error references `raw`
///
/// # Examples
///
/// ```
/// use toc_ripple::url::validate_url;
///
/// assert!(validate_url("https://example.com/novel").is_ok());
/// assert!(validate_url("not a url").is_err());
/// assert!(validate_url("ftp://example.com").is_err());
/// ```
pub fn validate_url(raw: &str) -> Result<Url, UrlError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(UrlError::new("Empty URL", raw));
    }

    let url =
        Url::parse(trimmed).map_err(|e| UrlError::new(format!("Invalid URL ({})", e), raw))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::new(
            format!("Unsupported URL scheme '{}'", url.scheme()),
            raw,
        ));
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(UrlError::new("URL has no host", raw)),
    }
}
