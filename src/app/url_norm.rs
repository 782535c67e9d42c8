use url::Url;

pub const ARCHIVE_HOST: &str = "web.archive.org";
pub const ARCHIVE_STATIC_HOST: &str = "web-static.archive.org";

// Wayback Machine modifier that serves the snapshot without its toolbar.
const HIDE_TOOLBAR_MARKER: &str = "if_";
const SNAPSHOT_PREFIX: &str = "/web/";

fn host_of(raw: &str) -> Option<String> {
    Url::parse(raw.trim())
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
}

pub fn is_archive_url(raw: &str) -> bool {
    host_of(raw).is_some_and(|host| host == ARCHIVE_HOST)
}

pub fn is_archive_static_asset(raw: &str) -> bool {
    host_of(raw).is_some_and(|host| host.contains(ARCHIVE_STATIC_HOST))
}

/// Rewrites `web.archive.org/web/<timestamp>/...` to
/// `web.archive.org/web/<timestamp>if_/...`. Anything else, including
/// archive URLs without a timestamp segment, comes back unchanged.
pub fn normalize_archive_url(raw: &str) -> String {
    if !is_archive_url(raw) {
        return raw.to_string();
    }
    let Some(prefix_idx) = raw.find(SNAPSHOT_PREFIX) else {
        return raw.to_string();
    };
    let timestamp_start = prefix_idx + SNAPSHOT_PREFIX.len();
    let Some(timestamp_len) = raw[timestamp_start..].find('/') else {
        return raw.to_string();
    };
    let timestamp = &raw[timestamp_start..timestamp_start + timestamp_len];
    if timestamp.is_empty() || timestamp.contains(HIDE_TOOLBAR_MARKER) {
        return raw.to_string();
    }

    let insert_at = timestamp_start + timestamp_len;
    format!(
        "{}{}{}",
        &raw[..insert_at],
        HIDE_TOOLBAR_MARKER,
        &raw[insert_at..]
    )
}
