//! URL canonicalisation for candidate deduplication.
//!
//! Canonicalises URLs so that the same article syndicated with different
//! tracking parameters, schemes, mobile hosts or trailing slashes collapses
//! to one dedup key.

use sha2::{Digest, Sha256};
use url::Url;

/// Tracking query parameters that are stripped during canonicalisation.
/// Any key starting with `utm_` is also stripped.
const TRACKING_PARAMS: &[&str] = &[
    "ref",
    "fbclid",
    "gclid",
    "msclkid",
    "mc_cid",
    "mc_eid",
    "_ga",
    "_gl",
    "igshid",
    "ncid",
    "sr_share",
];

/// Host prefixes that point at the same site.
const HOST_PREFIXES: &[&str] = &["www.", "m."];

/// Directory index documents dropped from the end of a path.
const INDEX_DOCUMENTS: &[&str] = &[
    "index.html",
    "index.htm",
    "index.php",
    "index.asp",
    "index.jsp",
];

/// Canonicalise a URL for deduplication.
///
/// The scheme is dropped so that `http` and `https` copies of a page
/// collide. Applies, in order:
///
/// 1. Lowercase host, strip `www.` / `m.` prefixes, drop default ports.
/// 2. Drop the fragment.
/// 3. Drop a trailing index document and trailing slashes.
/// 4. Strip tracking parameters and sort what remains.
///
/// Input that does not parse as a URL is trimmed and lowercased instead.
///
/// # Examples
///
/// ```
/// use pulse_search::orchestrator::url_normalize::canonicalize_url;
///
/// let a = canonicalize_url("https://www.Example.COM/path/?b=2&a=1&utm_source=x#top");
/// let b = canonicalize_url("http://example.com/path?a=1&b=2");
/// assert_eq!(a, b);
/// assert_eq!(a, "example.com/path?a=1&b=2");
/// ```
pub fn canonicalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let Ok(parsed) = Url::parse(trimmed) else {
        return trimmed.to_lowercase();
    };
    let Some(host) = parsed.host_str() else {
        return trimmed.to_lowercase();
    };

    let mut host = host.to_lowercase();
    for prefix in HOST_PREFIXES {
        if let Some(rest) = host.strip_prefix(prefix) {
            host = rest.to_owned();
            break;
        }
    }
    // `port()` is None for the scheme's default port.
    if let Some(port) = parsed.port() {
        host = format!("{host}:{port}");
    }

    let mut path = parsed.path().to_owned();
    for doc in INDEX_DOCUMENTS {
        if let Some(stripped) = path.strip_suffix(doc) {
            if stripped.ends_with('/') {
                path = stripped.to_owned();
                break;
            }
        }
    }
    let path = path.trim_end_matches('/');

    let mut params: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    params.sort();

    let mut canonical = format!("{host}{path}");
    if !params.is_empty() {
        let qs = params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        canonical.push('?');
        canonical.push_str(&qs);
    }
    canonical
}

/// Dedup key: the first 16 hex chars of the SHA-256 of the canonical URL.
pub fn dedup_key(raw: &str) -> String {
    let digest = Sha256::digest(canonicalize_url(raw).as_bytes());
    digest
        .iter()
        .take(8)
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

fn is_tracking_param(key: &str) -> bool {
    let key = key.to_lowercase();
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key.as_str())
}
