use url::Url;

/// Syntactic URL check applied to every URL of a batch before any probing.
///
/// Accepts absolute `http`/`https` URLs with a non-empty host.
pub fn is_valid_url(s: &str) -> bool {
    match Url::parse(s) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https")
                && url.host_str().is_some_and(|h| !h.is_empty())
        }
        Err(_) => false,
    }
}
