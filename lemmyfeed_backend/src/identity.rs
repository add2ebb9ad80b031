//! Canonical identity for federated servers.
//!
//! Every lookup that touches an instance goes through
//! [`normalized_instance_url`] so the same server always resolves to the same
//! row, no matter how the URL was spelled.

use url::Url;

/// Instances offered to a fresh install before the user picks their own.
pub const SUGGESTED_INSTANCES: &[&str] = &[
    "https://lemmy.world",
    "https://lemmy.ml",
    "https://beehaw.org",
    "https://sh.itjust.works",
    "https://feddit.org",
    "https://programming.dev",
];

/// Canonicalizes an instance URL to its origin form: `https://host[:port]`,
/// lowercase host, no path, query, fragment, or trailing slash. The scheme is
/// forced to https regardless of input. Returns `None` when the input cannot
/// be parsed as a URL with a host.
///
/// Callers decide what `None` means: the site resolver treats it as a hard
/// error (the URL came from the developer or the user's own input field),
/// while the import engine skips and logs (the URL came from a remote server).
pub fn normalized_instance_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    // Bare hostnames ("lemmy.world") are accepted too.
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    let parsed = Url::parse(&candidate).ok()?;
    match parsed.scheme() {
        "http" | "https" => {}
        _ => return None,
    }
    let host = parsed.host_str()?.to_ascii_lowercase();
    match parsed.port() {
        Some(port) => Some(format!("https://{host}:{port}")),
        None => Some(format!("https://{host}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spellings_collapse_to_one_origin() {
        let expected = Some("https://lemmy.world".to_string());
        assert_eq!(normalized_instance_url("https://Lemmy.World/"), expected);
        assert_eq!(normalized_instance_url("https://lemmy.world"), expected);
        assert_eq!(normalized_instance_url("http://lemmy.world"), expected);
        assert_eq!(normalized_instance_url("lemmy.world"), expected);
        assert_eq!(
            normalized_instance_url("https://lemmy.world/c/rust?sort=Hot#top"),
            expected
        );
    }

    #[test]
    fn ports_are_kept() {
        assert_eq!(
            normalized_instance_url("http://localhost:8536"),
            Some("https://localhost:8536".to_string())
        );
    }

    #[test]
    fn garbage_yields_none() {
        assert_eq!(normalized_instance_url(""), None);
        assert_eq!(normalized_instance_url("   "), None);
        assert_eq!(normalized_instance_url("not a url at all"), None);
        assert_eq!(normalized_instance_url("ftp://lemmy.world"), None);
    }
}
