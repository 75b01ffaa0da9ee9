//! Instance address normalization.
//!
//! Accounts may name their instance as a bare host, a full URL, or a URL with
//! a path copied from the browser. Every form is reduced to an `https://host`
//! origin before any request is built.

/// Lemmy REST API path below the site origin.
pub const API_PATH: &str = "/api/v3";

/// Reduce a configured site address to an `https://<host>` origin.
///
/// Resolution rules:
/// - A leading `http://` or `https://` scheme is dropped (case-insensitive).
/// - Anything from the first `/`, `?` or `#` after the host is dropped.
/// - The host is lower-cased; a port is kept.
///
/// Returns `None` when no host remains.
pub fn normalize_site_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let lower = trimmed.to_ascii_lowercase();

    let without_scheme = if lower.starts_with("https://") {
        &trimmed["https://".len()..]
    } else if lower.starts_with("http://") {
        &trimmed["http://".len()..]
    } else {
        trimmed
    };

    let host = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default()
        .trim_end_matches('.');

    if host.is_empty() || host.contains(char::is_whitespace) {
        return None;
    }

    Some(format!("https://{}", host.to_ascii_lowercase()))
}

/// Build the API base URL for an already-normalized site origin.
pub fn api_base_url(site: &str) -> String {
    format!("{}{}", site.trim_end_matches('/'), API_PATH)
}
