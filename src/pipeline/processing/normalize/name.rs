use crate::constants::NAME_PREFIX_ARTIFACT;

/// Clean a display name: drop the scraper breadcrumb prefix, trim, and turn
/// `Last, First` into `First Last`.
pub fn normalize_name(raw: &str) -> Option<String> {
    let name = strip_prefix_artifact(raw.trim()).trim();
    if name.is_empty() {
        return None;
    }

    let mut parts = name.split(',');
    if let (Some(last), Some(first), None) = (parts.next(), parts.next(), parts.next()) {
        let (last, first) = (last.trim(), first.trim());
        if !last.is_empty() && !first.is_empty() {
            return Some(format!("{} {}", first, last));
        }
    }

    Some(name.to_string())
}

// "HomeMaria Walsh" or "Home Maria Walsh", but never "Homer Simpson"
fn strip_prefix_artifact(name: &str) -> &str {
    match name.strip_prefix(NAME_PREFIX_ARTIFACT) {
        Some(rest) if rest.is_empty() => rest,
        Some(rest) => match rest.chars().next() {
            Some(c) if c.is_whitespace() || c.is_uppercase() => rest,
            _ => name,
        },
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_breadcrumb_prefix() {
        assert_eq!(normalize_name("HomeMaria Walsh"), Some("Maria Walsh".to_string()));
        assert_eq!(normalize_name("  Home  Maria Walsh "), Some("Maria Walsh".to_string()));
        assert_eq!(normalize_name("Homer Simpson"), Some("Homer Simpson".to_string()));
        assert_eq!(normalize_name("Home"), None);
    }

    #[test]
    fn test_reorders_last_first() {
        assert_eq!(normalize_name("Walsh, Maria"), Some("Maria Walsh".to_string()));
        assert_eq!(normalize_name("von der Leyen,  Ursula "), Some("Ursula von der Leyen".to_string()));
    }

    #[test]
    fn test_leaves_ambiguous_commas_alone() {
        assert_eq!(normalize_name("Walsh,"), Some("Walsh,".to_string()));
        assert_eq!(normalize_name("A, B, C"), Some("A, B, C".to_string()));
    }

    #[test]
    fn test_blank_name_is_none() {
        assert_eq!(normalize_name("   "), None);
    }
}
