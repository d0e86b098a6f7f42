//! Handle extraction and the usage/handle consistency rule for the tracked
//! social platform.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::{X_DOMAINS, X_INTENT_SEGMENT, X_NON_PROFILE_SEGMENTS, X_SCREEN_NAME_PARAM};

/// Final `(usesX, xHandle)` pair for one record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct XPresence {
    pub uses_x: bool,
    pub x_handle: Option<String>,
}

/// Turn a bare handle, an `@handle` or a profile URL into `@handle`.
///
/// Returns `None` for empty input, URLs on foreign hosts, action routes
/// such as `/home`, and anything that cannot be a handle.
pub fn extract_handle(raw: &str) -> Option<String> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    let handle = if value.contains("://") {
        handle_from_url(value)?
    } else {
        value.strip_prefix('@').unwrap_or(value).to_string()
    };

    is_plausible_handle(&handle).then(|| format!("@{}", handle))
}

fn handle_from_url(value: &str) -> Option<String> {
    let url = Url::parse(value).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    if !is_platform_host(&host) {
        return None;
    }

    let first = url.path_segments()?.find(|s| !s.is_empty())?;
    let segment = first.to_ascii_lowercase();

    if segment == X_INTENT_SEGMENT {
        return url
            .query_pairs()
            .find(|(k, _)| k == X_SCREEN_NAME_PARAM)
            .map(|(_, v)| v.trim().trim_start_matches('@').to_string())
            .filter(|v| !v.is_empty());
    }
    if X_NON_PROFILE_SEGMENTS.contains(&segment.as_str()) {
        return None;
    }

    Some(first.strip_prefix('@').unwrap_or(first).to_string())
}

fn is_platform_host(host: &str) -> bool {
    X_DOMAINS
        .iter()
        .any(|domain| host == *domain || host.ends_with(&format!(".{}", domain)))
}

fn is_plausible_handle(handle: &str) -> bool {
    !handle.is_empty() && !handle.chars().any(|c| c.is_whitespace() || c == '@')
}

/// Apply the consistency rule to a tri-state usage flag and a candidate
/// handle value.
///
/// An explicit `false` always wins and clears the handle. A resolvable
/// handle implies usage. A missing flag with no handle means no usage.
/// An explicit `true` without a handle is kept as is.
pub fn reconcile_x(uses: Option<bool>, handle: Option<&str>) -> XPresence {
    if uses == Some(false) {
        return XPresence::default();
    }

    match handle.and_then(extract_handle) {
        Some(h) => XPresence {
            uses_x: true,
            x_handle: Some(h),
        },
        None => XPresence {
            uses_x: uses.unwrap_or(false),
            x_handle: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_handle_from_intent_url() {
        assert_eq!(
            extract_handle("https://x.com/intent/user?screen_name=policyWonk"),
            Some("@policyWonk".to_string())
        );
    }

    #[test]
    fn test_intent_url_without_screen_name_is_rejected() {
        assert_eq!(extract_handle("https://twitter.com/intent/tweet?text=hello"), None);
    }

    #[test]
    fn test_non_profile_route_is_rejected() {
        assert_eq!(extract_handle("https://twitter.com/home"), None);
        assert_eq!(extract_handle("https://x.com/share?url=foo"), None);
    }

    #[test]
    fn test_profile_urls() {
        assert_eq!(extract_handle("https://twitter.com/MariaWalshEU"), Some("@MariaWalshEU".to_string()));
        assert_eq!(extract_handle("https://X.COM/someone/status/123"), Some("@someone".to_string()));
        assert_eq!(extract_handle("https://mobile.twitter.com/someone/"), Some("@someone".to_string()));
        assert_eq!(extract_handle("https://x.com/@someone"), Some("@someone".to_string()));
        assert_eq!(extract_handle("  https://x.com/someone  "), Some("@someone".to_string()));
    }

    #[test]
    fn test_foreign_hosts_are_rejected() {
        assert_eq!(extract_handle("https://facebook.com/someone"), None);
        // suffix match only counts on a label boundary
        assert_eq!(extract_handle("https://notx.com/someone"), None);
        assert_eq!(extract_handle("https://x.com/"), None);
    }

    #[test]
    fn test_bare_and_prefixed_handles() {
        assert_eq!(extract_handle("someone"), Some("@someone".to_string()));
        assert_eq!(extract_handle("@someone"), Some("@someone".to_string()));
        assert_eq!(extract_handle("   "), None);
        assert_eq!(extract_handle(""), None);
        assert_eq!(extract_handle("@"), None);
        assert_eq!(extract_handle("two words"), None);
    }

    #[test]
    fn test_extraction_is_idempotent() {
        for input in ["@policyWonk", "policyWonk", "https://x.com/policyWonk"] {
            let once = extract_handle(input).unwrap();
            assert_eq!(extract_handle(&once), Some(once.clone()));
        }
    }

    #[test]
    fn test_explicit_negative_clears_handle() {
        assert_eq!(reconcile_x(Some(false), Some("@someone")), XPresence::default());
    }

    #[test]
    fn test_handle_implies_usage() {
        let presence = reconcile_x(None, Some("https://x.com/someone"));
        assert!(presence.uses_x);
        assert_eq!(presence.x_handle.as_deref(), Some("@someone"));
    }

    #[test]
    fn test_absent_flag_without_handle_means_no_usage() {
        assert_eq!(reconcile_x(None, None), XPresence::default());
        assert_eq!(reconcile_x(None, Some("https://x.com/home")), XPresence::default());
    }

    #[test]
    fn test_explicit_usage_without_handle_is_kept() {
        let presence = reconcile_x(Some(true), None);
        assert!(presence.uses_x);
        assert_eq!(presence.x_handle, None);
    }
}
