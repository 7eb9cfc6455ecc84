use url::Url;

/// Extracts the lowercase host of a URL, used as the frontier's domain column and the
/// politeness tracker key
///
/// Returns `None` for URLs without a host; canonical frontier URLs always have one.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use newt::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM:8080/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns true when both URLs point at the same host
///
/// Used by the domain-diversity link filter; URLs without a host never match.
pub fn same_host(a: &Url, b: &Url) -> bool {
    match (extract_domain(a), extract_domain(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}
