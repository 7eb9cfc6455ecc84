use crate::UrlError;
use url::Url;

/// Canonicalizes a URL into the form used as the frontier and index key
///
/// # Canonicalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Require the `http` or `https` scheme
/// 3. Require a host (the parser lowercases it and drops default ports)
/// 4. Remove the fragment (everything after #)
///
/// Scheme, host, path and query are otherwise kept as-is, so two URLs that differ
/// only by fragment map to the same record.
///
/// # Examples
///
/// ```
/// use newt::url::canonicalize_url;
///
/// let a = canonicalize_url("https://x.com/a#b").unwrap();
/// let b = canonicalize_url("https://x.com/a#c").unwrap();
/// assert_eq!(a, b);
/// assert_eq!(a.as_str(), "https://x.com/a");
/// ```
pub fn canonicalize_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
    canonicalize_parsed(url)
}

/// Canonicalizes an already parsed URL (e.g. the result of resolving a relative link)
pub fn canonicalize_parsed(mut url: Url) -> Result<Url, UrlError> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => {}
        _ => return Err(UrlError::MissingDomain),
    }

    url.set_fragment(None);
    Ok(url)
}

/// Returns the lowercase extension of the last path segment, if it has one
pub fn path_extension(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.last()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
