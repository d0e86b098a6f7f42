use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

static BARE_HANDLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"("xHandle"\s*:\s*)(@[\w_]+)"#).expect("valid bare handle pattern"));

/// Quote `"xHandle": @name` values left bare by hand edits, so the text
/// parses as JSON. Text without such values is returned unchanged.
pub fn repair_unquoted_handles(text: &str) -> Cow<'_, str> {
    BARE_HANDLE.replace_all(text, r#"$1"$2""#)
}
