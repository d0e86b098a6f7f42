//! Field normalizers: pure functions that canonicalize one semantic field
//! each, plus the per-source pass that runs them over a raw record.

pub mod handle;
pub mod mapping;
pub mod name;

pub use handle::{extract_handle, reconcile_x, XPresence};
pub use mapping::{party_table, MappedLabel, MappingTable, TableKind, COUNTRY_CODES};
pub use name::normalize_name;

use crate::config::SourceProfile;
use crate::constants::{FIELD_USES_X, FIELD_X_HANDLE, MAILTO_PREFIX};
use crate::domain::{Level, RawRecord};
use crate::observability::metrics;
use crate::pipeline::processing::diagnostics::{DiagnosticKind, Diagnostics};

/// Strip a `mailto:` prefix and surrounding whitespace
pub fn normalize_email(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let address = match trimmed.get(..MAILTO_PREFIX.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(MAILTO_PREFIX) => &trimmed[MAILTO_PREFIX.len()..],
        _ => trimmed,
    };
    let address = address.trim();
    (!address.is_empty()).then(|| address.to_string())
}

/// A raw record reduced to the canonical schema. Every field is optional;
/// the merge engine decides what lands on the canonical record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedFields {
    pub source_key: Option<String>,
    pub name: Option<String>,
    pub country: Option<String>,
    pub country_code: Option<String>,
    pub level: Option<Level>,
    pub institution: Option<String>,
    pub role: Option<String>,
    pub party: Option<String>,
    pub email: Option<String>,
    pub x: XPresence,
    /// Party label that went through a table without a match
    pub unmapped_party: Option<String>,
}

/// Runs every field normalizer over the records of one source
pub struct RecordNormalizer<'a> {
    profile: &'a SourceProfile,
}

impl<'a> RecordNormalizer<'a> {
    pub fn new(profile: &'a SourceProfile) -> Self {
        Self { profile }
    }

    /// Normalize `raw`. Never fails: unusable values degrade to `None` and
    /// a diagnostic tagged with `record_id`.
    pub fn normalize(&self, raw: &RawRecord, record_id: &str, diagnostics: &mut Diagnostics) -> NormalizedFields {
        let profile = self.profile;
        let fields = &profile.fields;

        let country = raw
            .first_text(&fields.country)
            .map(str::to_string)
            .or_else(|| profile.country.clone());

        // A recognized country decides the code; an unrecognized one leaves it null
        let country_code = match country.as_deref() {
            Some(c) => COUNTRY_CODES
                .map_reporting(c, Some(record_id), diagnostics)
                .filter(|m| m.known)
                .map(|m| m.value),
            None => raw.first_text(&fields.country_code).map(|c| c.to_ascii_uppercase()),
        };

        let (party, unmapped_party) = match raw.first_text(&fields.party) {
            Some(label) => match profile.party_table {
                Some(table) => match party_table(table).map(label) {
                    Some(m) if m.known => (Some(m.value), None),
                    Some(m) => (Some(m.value.clone()), Some(m.value)),
                    None => (None, None),
                },
                None => (Some(label.to_string()), None),
            },
            None => (None, None),
        };

        let normalized = NormalizedFields {
            source_key: raw.first_text(&fields.source_key).map(str::to_string),
            name: raw.first_text(&fields.name).and_then(normalize_name),
            country,
            country_code,
            level: Some(profile.level),
            institution: profile.institution.clone(),
            role: profile.role.clone(),
            party,
            email: raw.first_text(&fields.email).and_then(normalize_email),
            x: self.normalize_x(raw, record_id, diagnostics),
            unmapped_party,
        };

        metrics::normalize::record_normalized();
        normalized
    }

    fn normalize_x(&self, raw: &RawRecord, record_id: &str, diagnostics: &mut Diagnostics) -> XPresence {
        let fields = &self.profile.fields;

        let uses = match raw.first_flag(&fields.uses_x) {
            (_, Ok(flag)) => flag,
            (field, Err(value)) => {
                diagnostics.record(
                    DiagnosticKind::MalformedInput,
                    Some(record_id),
                    Some(field.unwrap_or(FIELD_USES_X)),
                    format!("Unrecognized usage flag '{}', treated as absent", value),
                );
                None
            }
        };

        let candidates: Vec<&str> = fields.x_handle.iter().filter_map(|f| raw.text(f)).collect();
        let handle = candidates.iter().find_map(|c| extract_handle(c));

        if handle.is_none() && uses != Some(false) {
            if let Some(first) = candidates.first() {
                diagnostics.record(
                    DiagnosticKind::UnresolvedHandle,
                    Some(record_id),
                    Some(FIELD_X_HANDLE),
                    format!("'{}' does not resolve to a profile handle", first),
                );
            }
        }

        reconcile_x(uses, handle.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PartyTable, SourceProfile};

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("mailto:a@b.eu"), Some("a@b.eu".to_string()));
        assert_eq!(normalize_email(" MAILTO: a@b.eu "), Some("a@b.eu".to_string()));
        assert_eq!(normalize_email("a@b.eu"), Some("a@b.eu".to_string()));
        assert_eq!(normalize_email("mailto:"), None);
        assert_eq!(normalize_email(""), None);
    }

    #[test]
    fn test_normalize_mep_row() {
        let profile = SourceProfile::european_parliament();
        let normalizer = RecordNormalizer::new(&profile);
        let mut diagnostics = Diagnostics::new();

        let raw = RawRecord::new()
            .with_text("mep_id", "197490")
            .with_text("name", "HomeMaria Walsh")
            .with_text("country", "Ireland")
            .with_text("political_group", "Group of the European People's Party (Christian Democrats)")
            .with_text("email", "mailto:maria.walsh@europarl.europa.eu")
            .with_text("x_url", "https://twitter.com/MariaWalshEU");

        let fields = normalizer.normalize(&raw, "mep_197490", &mut diagnostics);

        assert_eq!(fields.name.as_deref(), Some("Maria Walsh"));
        assert_eq!(fields.country_code.as_deref(), Some("IE"));
        assert_eq!(fields.party.as_deref(), Some("EPP"));
        assert_eq!(fields.email.as_deref(), Some("maria.walsh@europarl.europa.eu"));
        assert_eq!(fields.level, Some(Level::Eu));
        assert_eq!(fields.institution.as_deref(), Some("European Parliament"));
        assert!(fields.x.uses_x);
        assert_eq!(fields.x.x_handle.as_deref(), Some("@MariaWalshEU"));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_unmapped_country_keeps_name_and_nulls_code() {
        let profile = SourceProfile::european_parliament();
        let normalizer = RecordNormalizer::new(&profile);
        let mut diagnostics = Diagnostics::new();

        let raw = RawRecord::new().with_text("country", "Ruritania");
        let fields = normalizer.normalize(&raw, "mep_1", &mut diagnostics);

        assert_eq!(fields.country.as_deref(), Some("Ruritania"));
        assert_eq!(fields.country_code, None);
        assert_eq!(diagnostics.count(DiagnosticKind::UnmappedCountry), 1);
    }

    #[test]
    fn test_profile_country_default_applies() {
        let profile = SourceProfile::bundestag();
        let normalizer = RecordNormalizer::new(&profile);
        let mut diagnostics = Diagnostics::new();

        let raw = RawRecord::new()
            .with_text("qid", "Q567")
            .with_text("partyName", "Alternative für Deutschland");
        let fields = normalizer.normalize(&raw, "mp_de_Q567", &mut diagnostics);

        assert_eq!(fields.country.as_deref(), Some("Germany"));
        assert_eq!(fields.country_code.as_deref(), Some("DE"));
        assert_eq!(fields.party.as_deref(), Some("afd"));
        assert_eq!(fields.source_key.as_deref(), Some("Q567"));
    }

    #[test]
    fn test_unmapped_party_passes_through_and_is_reported_to_caller() {
        let mut profile = SourceProfile::riksdag();
        profile.party_table = Some(PartyTable::SeParties);
        let normalizer = RecordNormalizer::new(&profile);
        let mut diagnostics = Diagnostics::new();

        let raw = RawRecord::new().with_text("party", "NYP");
        let fields = normalizer.normalize(&raw, "mp_se_1", &mut diagnostics);

        assert_eq!(fields.party.as_deref(), Some("NYP"));
        assert_eq!(fields.unmapped_party.as_deref(), Some("NYP"));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_explicit_negative_beats_populated_handle() {
        let profile = SourceProfile::riksdag();
        let normalizer = RecordNormalizer::new(&profile);
        let mut diagnostics = Diagnostics::new();

        let raw = RawRecord::new().with_bool("usesX", false).with_text("xHandle", "@someone");
        let fields = normalizer.normalize(&raw, "mp_se_1", &mut diagnostics);

        assert_eq!(fields.x, XPresence { uses_x: false, x_handle: None });
    }

    #[test]
    fn test_unresolvable_handle_raises_diagnostic() {
        let profile = SourceProfile::european_parliament();
        let normalizer = RecordNormalizer::new(&profile);
        let mut diagnostics = Diagnostics::new();

        let raw = RawRecord::new().with_text("x_url", "https://twitter.com/home");
        let fields = normalizer.normalize(&raw, "mep_1", &mut diagnostics);

        assert_eq!(fields.x, XPresence::default());
        assert_eq!(diagnostics.count(DiagnosticKind::UnresolvedHandle), 1);
    }

    #[test]
    fn test_malformed_usage_flag_is_treated_as_absent() {
        let profile = SourceProfile::riksdag();
        let normalizer = RecordNormalizer::new(&profile);
        let mut diagnostics = Diagnostics::new();

        let raw = RawRecord::new().with_text("usesX", "sometimes").with_text("xHandle", "someone");
        let fields = normalizer.normalize(&raw, "mp_se_1", &mut diagnostics);

        assert!(fields.x.uses_x);
        assert_eq!(fields.x.x_handle.as_deref(), Some("@someone"));
        assert_eq!(diagnostics.count(DiagnosticKind::MalformedInput), 1);
    }
}
