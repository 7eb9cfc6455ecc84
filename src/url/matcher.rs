/// Checks if a domain matches a wildcard pattern
///
/// Both pattern forms cover the domain and everything beneath it:
/// 1. Bare pattern: "example.com" matches "example.com" and "www.example.com"
/// 2. Wildcard pattern: "*.example.com" matches the same set
///
/// Blocking a platform therefore also blocks its `www.` and mobile hosts.
///
/// # Arguments
///
/// * `pattern` - The domain pattern, optionally starting with "*."
/// * `candidate` - The domain to check against the pattern
///
/// # Returns
///
/// * `true` - If the candidate matches the pattern
/// * `false` - Otherwise
///
/// # Examples
///
/// ```
/// use newt::url::matches_wildcard;
///
/// // Bare pattern
/// assert!(matches_wildcard("example.com", "example.com"));
/// assert!(matches_wildcard("example.com", "www.example.com"));
/// assert!(!matches_wildcard("example.com", "other.com"));
///
/// // Wildcard match
/// assert!(matches_wildcard("*.example.com", "example.com"));
/// assert!(matches_wildcard("*.example.com", "blog.example.com"));
/// assert!(matches_wildcard("*.example.com", "api.v2.example.com"));
/// assert!(!matches_wildcard("*.example.com", "example.org"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    let base = pattern.strip_prefix("*.").unwrap_or(pattern);
    if base.is_empty() {
        return candidate.is_empty() && pattern.is_empty();
    }
    candidate == base
        || (candidate.len() > base.len()
            && candidate.ends_with(base)
            && candidate.as_bytes()[candidate.len() - base.len() - 1] == b'.')
}

/// Returns true if the domain matches any of the blocked patterns
pub fn is_blocked_domain(domain: &str, patterns: &[String]) -> bool {
    let domain = domain.to_ascii_lowercase();
    patterns
        .iter()
        .any(|pattern| matches_wildcard(&pattern.to_ascii_lowercase(), &domain))
}
