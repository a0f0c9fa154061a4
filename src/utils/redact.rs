//! Keeping secrets out of logs and terminal output.

use std::sync::LazyLock;

use regex::Regex;

/// Longest mask shown for a secret.
const MASK_MAX_LEN: usize = 12;

static URL_USERINFO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"://[^/@\s]+@").expect("userinfo pattern is valid"));

/// Strip userinfo (`token@`) from a URL so it can be logged or shown.
///
/// Strings that don't look like URLs are returned unchanged.
pub fn redact_url(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_string();
    };
    let rest = &url[scheme_end + 3..];
    let authority_end = rest.find('/').unwrap_or(rest.len());
    match rest[..authority_end].rfind('@') {
        Some(at) => format!("{}://***@{}", &url[..scheme_end], &rest[at + 1..]),
        None => url.to_string(),
    }
}

/// Redact every URL userinfo section found in free text, such as git
/// output that echoes the remote URL.
pub fn redact_text(text: &str) -> String {
    URL_USERINFO.replace_all(text, "://***@").into_owned()
}

/// Mask a secret for display. No character of the secret is shown; the
/// mask length follows the secret's length up to 12.
pub fn mask_secret(secret: &str) -> String {
    "*".repeat(secret.chars().count().min(MASK_MAX_LEN))
}
