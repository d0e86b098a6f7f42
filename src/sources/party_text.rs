//! Party detection in scraped page text. Adapter-side only: the merge
//! pipeline receives the extracted label, never the blob.

use once_cell::sync::Lazy;
use regex::Regex;

static BUNDESTAG_GROUP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(CDU/CSU|SPD|AfD|FDP|Die Linke|Bündnis 90/Die Grünen|fraktionslos)\b")
        .expect("valid party pattern")
});

/// First Bundestag group label in `blob`, as a lowercase slug
/// with umlauts transliterated.
pub fn detect_party(blob: &str) -> Option<String> {
    let label = BUNDESTAG_GROUP.captures(blob)?.get(1)?.as_str();
    Some(slugify(label))
}

fn slugify(label: &str) -> String {
    label
        .to_lowercase()
        .replace(' ', "_")
        .replace('ü', "ue")
        .replace('ö', "oe")
        .replace('ä', "ae")
}
