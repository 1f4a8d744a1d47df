//! Small string helpers shared by the engine, the client and the binaries.

use std::hash::{Hash, Hasher};

/// Longest error excerpt echoed back from an HTTP body
const EXCERPT_CHARS: usize = 180;

/// Trimmed value, or `None` when absent or blank
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|trimmed| !trimmed.is_empty())
        .map(str::to_string)
}

pub fn is_http_url(value: &str) -> bool {
    ["http://", "https://"]
        .iter()
        .any(|scheme| value.starts_with(scheme))
}

/// First few characters of an opaque response body, for error messages
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(EXCERPT_CHARS).collect()
}

/// Per-process hash of a user id. Logs carry this instead of the raw id.
pub fn user_fingerprint(user_id: &str) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    user_id.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_session_ids_normalize_to_none() {
        assert_eq!(normalize_text_option(None), None);
        assert_eq!(normalize_text_option(Some(" \t ".to_string())), None);
        assert_eq!(
            normalize_text_option(Some(" session-1 ".to_string())),
            Some("session-1".to_string())
        );
    }

    #[test]
    fn only_http_schemes_are_accepted() {
        assert!(is_http_url("http://127.0.0.1:8080"));
        assert!(is_http_url("https://sync.example.com"));
        assert!(!is_http_url("ftp://sync.example.com"));
        assert!(!is_http_url("sync.example.com"));
    }

    #[test]
    fn long_bodies_are_cut() {
        let body = format!("  {}  ", "x".repeat(500));
        assert_eq!(compact_text(&body).chars().count(), EXCERPT_CHARS);
    }

    #[test]
    fn fingerprints_are_stable_and_distinct() {
        assert_eq!(user_fingerprint("u1"), user_fingerprint("u1"));
        assert_ne!(user_fingerprint("u1"), user_fingerprint("u2"));
    }
}
