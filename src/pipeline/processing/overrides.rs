//! Human-verified corrections applied after every base merge. Override
//! values always win; unknown ids become stub records.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

use crate::constants::{
    FIELD_COUNTRY, FIELD_COUNTRY_CODE, FIELD_EMAIL, FIELD_ID, FIELD_INSTITUTION, FIELD_LEVEL, FIELD_NAME,
    FIELD_PARTY, FIELD_ROLE, FIELD_SOURCE_KEY, FIELD_USES_X, FIELD_X_HANDLE,
};
use crate::domain::{CanonicalRecord, Level};
use crate::error::{DirectoryError, Result};
use crate::observability::metrics;
use crate::pipeline::processing::diagnostics::{DiagnosticKind, Diagnostics};
use crate::pipeline::processing::merge::{apply_x_consistency, json_kind};
use crate::pipeline::processing::normalize::COUNTRY_CODES;
use crate::pipeline::storage::RecordIndex;

/// A partial record keyed by canonical id. Fields apply in order, so a
/// field listed twice ends up with its last value.
#[derive(Debug, Clone, PartialEq)]
pub struct OverrideEntry {
    pub id: String,
    pub fields: Vec<(String, Value)>,
}

impl OverrideEntry {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: Vec::new(),
        }
    }

    pub fn set(mut self, field: impl Into<String>, value: Value) -> Self {
        self.fields.push((field.into(), value));
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverrideSet {
    entries: Vec<OverrideEntry>,
}

impl OverrideSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: OverrideEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OverrideEntry> {
        self.entries.iter()
    }

    /// Parse `{ "<id>": { field: value, ... }, ... }`. A top level that is
    /// not an object is fatal; entries that are not objects are skipped.
    pub fn from_json(value: Value, diagnostics: &mut Diagnostics) -> Result<Self> {
        let map = match value {
            Value::Object(map) => map,
            other => {
                return Err(DirectoryError::invalid_input(
                    "overrides",
                    format!("expected an object keyed by id, found {}", json_kind(&other)),
                ))
            }
        };

        let mut set = OverrideSet::new();
        for (id, entry) in map {
            match entry {
                Value::Object(fields) => set.push(OverrideEntry {
                    id,
                    fields: fields_in_order(fields),
                }),
                other => diagnostics.record(
                    DiagnosticKind::MalformedOverride,
                    Some(&id),
                    None,
                    format!("Override for {} is {} rather than an object, skipping", id, json_kind(&other)),
                ),
            }
        }
        Ok(set)
    }
}

fn fields_in_order(fields: Map<String, Value>) -> Vec<(String, Value)> {
    fields.into_iter().collect()
}

/// Counts from one override pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct OverrideReport {
    pub applied: usize,
    pub stubs_created: usize,
    pub rejected_fields: usize,
    /// Ids of every record an override touched, in application order
    pub touched: Vec<String>,
}

/// Apply every override entry to the index, then re-run the usage/handle
/// rule on each touched record.
#[instrument(skip_all, fields(overrides = overrides.len()))]
pub fn apply_overrides(index: &mut RecordIndex, overrides: &OverrideSet, diagnostics: &mut Diagnostics) -> OverrideReport {
    let mut report = OverrideReport::default();

    for entry in overrides.iter() {
        if !index.contains(&entry.id) {
            diagnostics.record(
                DiagnosticKind::OrphanedOverride,
                Some(&entry.id),
                None,
                format!("Override id {} not found in base data; creating stub entry", entry.id),
            );
            index.insert(CanonicalRecord::stub(entry.id.clone()));
            report.stubs_created += 1;
            metrics::overrides::stub_created();
        } else {
            debug!(id = %entry.id, "Applying override to existing record");
        }

        let Some(record) = index.get_mut(&entry.id) else {
            continue;
        };

        let mut explicit_uses = None;
        for (field, value) in &entry.fields {
            if field == FIELD_ID {
                if value.as_str() != Some(entry.id.as_str()) {
                    diagnostics.record(
                        DiagnosticKind::OverrideIdMismatch,
                        Some(&entry.id),
                        Some(FIELD_ID),
                        format!("Override for {} carries id {}; the key wins", entry.id, value),
                    );
                }
                continue;
            }

            match write_field(record, field, value) {
                Ok(uses) => {
                    if uses.is_some() {
                        explicit_uses = uses;
                    }
                }
                Err(reason) => {
                    report.rejected_fields += 1;
                    diagnostics.record(
                        DiagnosticKind::MalformedOverride,
                        Some(&entry.id),
                        Some(field),
                        format!("Override field '{}' for {} ignored: {}", field, entry.id, reason),
                    );
                }
            }
        }

        let touches_country = entry
            .fields
            .iter()
            .any(|(field, _)| field == FIELD_COUNTRY || field == FIELD_COUNTRY_CODE);
        if touches_country {
            report_country_mismatch(record, diagnostics);
        }

        apply_x_consistency(record, explicit_uses, diagnostics);
        index.refresh_source_key(&entry.id);

        report.applied += 1;
        report.touched.push(entry.id.clone());
        metrics::overrides::applied();
    }

    info!(
        applied = report.applied,
        stubs_created = report.stubs_created,
        rejected_fields = report.rejected_fields,
        "Applied overrides"
    );
    report
}

// Overrides stay verbatim; a country/code pair that disagrees is only reported
fn report_country_mismatch(record: &CanonicalRecord, diagnostics: &mut Diagnostics) {
    let Some(country) = record.country.as_deref() else {
        return;
    };
    let expected = COUNTRY_CODES.lookup(country);
    if expected == record.country_code.as_deref() {
        return;
    }
    diagnostics.record(
        DiagnosticKind::CountryCodeMismatch,
        Some(&record.id),
        Some(FIELD_COUNTRY_CODE),
        format!(
            "Override leaves {} with country '{}' and countryCode {}; expected {}",
            record.id,
            country,
            record.country_code.as_deref().unwrap_or("null"),
            expected.unwrap_or("null")
        ),
    );
}

fn text_value(value: &Value) -> std::result::Result<Option<String>, String> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        other => Err(format!("expected a string or null, found {}", json_kind(other))),
    }
}

/// Write one override field verbatim. Returns the usage flag when the
/// field was `usesX`.
fn write_field(record: &mut CanonicalRecord, field: &str, value: &Value) -> std::result::Result<Option<bool>, String> {
    let slot = match field {
        FIELD_SOURCE_KEY => &mut record.source_key,
        FIELD_NAME => &mut record.name,
        FIELD_COUNTRY => &mut record.country,
        FIELD_COUNTRY_CODE => &mut record.country_code,
        FIELD_INSTITUTION => &mut record.institution,
        FIELD_ROLE => &mut record.role,
        FIELD_PARTY => &mut record.party,
        FIELD_EMAIL => &mut record.email,
        FIELD_X_HANDLE => &mut record.x_handle,
        FIELD_LEVEL => {
            record.level = match value {
                Value::Null => None,
                Value::String(s) => Some(s.parse::<Level>()?),
                other => return Err(format!("expected a level string or null, found {}", json_kind(other))),
            };
            return Ok(None);
        }
        FIELD_USES_X => {
            let uses = match value {
                Value::Null => false,
                Value::Bool(b) => *b,
                other => return Err(format!("expected a boolean or null, found {}", json_kind(other))),
            };
            record.uses_x = uses;
            return Ok(Some(uses));
        }
        _ => {
            record.extra.insert(field.to_string(), value.clone());
            return Ok(None);
        }
    };

    *slot = text_value(value)?;
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn seeded_index() -> RecordIndex {
        let mut index = RecordIndex::new();
        let mut record = CanonicalRecord::stub("mep_1");
        record.name = Some("Maria Walsh".to_string());
        record.party = Some("EPP".to_string());
        record.uses_x = true;
        record.x_handle = Some("@MariaWalshEU".to_string());
        index.insert(record);
        index
    }

    #[test]
    fn test_override_overwrites_populated_fields() {
        let mut index = seeded_index();
        let mut diagnostics = Diagnostics::new();
        let mut overrides = OverrideSet::new();
        overrides.push(
            OverrideEntry::new("mep_1")
                .set("party", json!("Renew"))
                .set("email", json!("maria@example.eu")),
        );

        let report = apply_overrides(&mut index, &overrides, &mut diagnostics);

        let record = index.get("mep_1").unwrap();
        assert_eq!(record.party.as_deref(), Some("Renew"));
        assert_eq!(record.email.as_deref(), Some("maria@example.eu"));
        assert_eq!(record.name.as_deref(), Some("Maria Walsh"));
        assert_eq!(report.applied, 1);
        assert_eq!(report.stubs_created, 0);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_override_can_null_a_field() {
        let mut index = seeded_index();
        let mut diagnostics = Diagnostics::new();
        let mut overrides = OverrideSet::new();
        overrides.push(OverrideEntry::new("mep_1").set("party", Value::Null));

        apply_overrides(&mut index, &overrides, &mut diagnostics);
        assert_eq!(index.get("mep_1").unwrap().party, None);
    }

    #[test]
    fn test_unknown_id_creates_stub() {
        let mut index = seeded_index();
        let mut diagnostics = Diagnostics::new();
        let mut overrides = OverrideSet::new();
        overrides.push(OverrideEntry::new("mep_999").set("name", json!("New Person")));

        let report = apply_overrides(&mut index, &overrides, &mut diagnostics);

        assert_eq!(index.len(), 2);
        assert_eq!(report.stubs_created, 1);
        let stub = index.get("mep_999").unwrap();
        assert_eq!(stub.name.as_deref(), Some("New Person"));
        assert_eq!(stub.party, None);
        assert!(!stub.uses_x);
        assert_eq!(diagnostics.count(DiagnosticKind::OrphanedOverride), 1);
        assert_eq!(index.records().last().map(|r| r.id.as_str()), Some("mep_999"));
    }

    #[test]
    fn test_override_disabling_usage_clears_handle() {
        let mut index = seeded_index();
        let mut diagnostics = Diagnostics::new();
        let mut overrides = OverrideSet::new();
        overrides.push(OverrideEntry::new("mep_1").set("usesX", json!(false)));

        apply_overrides(&mut index, &overrides, &mut diagnostics);

        let record = index.get("mep_1").unwrap();
        assert!(!record.uses_x);
        assert_eq!(record.x_handle, None);
    }

    #[test]
    fn test_override_handle_implies_usage_and_is_canonicalized() {
        let mut index = RecordIndex::new();
        index.insert(CanonicalRecord::stub("mep_2"));
        let mut diagnostics = Diagnostics::new();
        let mut overrides = OverrideSet::new();
        overrides.push(OverrideEntry::new("mep_2").set("xHandle", json!("https://x.com/fresh")));

        apply_overrides(&mut index, &overrides, &mut diagnostics);

        let record = index.get("mep_2").unwrap();
        assert!(record.uses_x);
        assert_eq!(record.x_handle.as_deref(), Some("@fresh"));
    }

    #[test]
    fn test_last_value_wins_within_one_entry() {
        let mut index = seeded_index();
        let mut diagnostics = Diagnostics::new();
        let mut overrides = OverrideSet::new();
        overrides.push(
            OverrideEntry::new("mep_1")
                .set("party", json!("ECR"))
                .set("party", json!("NI")),
        );

        apply_overrides(&mut index, &overrides, &mut diagnostics);
        assert_eq!(index.get("mep_1").unwrap().party.as_deref(), Some("NI"));
    }

    #[test]
    fn test_wrongly_typed_field_is_skipped() {
        let mut index = seeded_index();
        let mut diagnostics = Diagnostics::new();
        let mut overrides = OverrideSet::new();
        overrides.push(
            OverrideEntry::new("mep_1")
                .set("usesX", json!("yes"))
                .set("name", json!(12))
                .set("party", json!("NI")),
        );

        let report = apply_overrides(&mut index, &overrides, &mut diagnostics);

        let record = index.get("mep_1").unwrap();
        assert!(record.uses_x);
        assert_eq!(record.name.as_deref(), Some("Maria Walsh"));
        assert_eq!(record.party.as_deref(), Some("NI"));
        assert_eq!(report.rejected_fields, 2);
        assert_eq!(diagnostics.count(DiagnosticKind::MalformedOverride), 2);
    }

    #[test]
    fn test_extra_keys_are_kept_verbatim() {
        let mut index = seeded_index();
        let mut diagnostics = Diagnostics::new();
        let mut overrides = OverrideSet::new();
        overrides.push(OverrideEntry::new("mep_1").set("euGroupFull", json!("Renew Europe Group")));

        apply_overrides(&mut index, &overrides, &mut diagnostics);
        assert_eq!(
            index.get("mep_1").unwrap().extra.get("euGroupFull"),
            Some(&json!("Renew Europe Group"))
        );
    }

    #[test]
    fn test_country_without_matching_code_is_reported_not_rewritten() {
        let mut index = seeded_index();
        if let Some(record) = index.get_mut("mep_1") {
            record.country = Some("Germany".to_string());
            record.country_code = Some("DE".to_string());
        }
        let mut diagnostics = Diagnostics::new();
        let mut overrides = OverrideSet::new();
        overrides.push(OverrideEntry::new("mep_1").set("country", json!("France")));

        apply_overrides(&mut index, &overrides, &mut diagnostics);

        let record = index.get("mep_1").unwrap();
        assert_eq!(record.country.as_deref(), Some("France"));
        assert_eq!(record.country_code.as_deref(), Some("DE"));
        assert_eq!(diagnostics.count(DiagnosticKind::CountryCodeMismatch), 1);
    }

    #[test]
    fn test_country_and_code_set_together_are_not_reported() {
        let mut index = seeded_index();
        let mut diagnostics = Diagnostics::new();
        let mut overrides = OverrideSet::new();
        overrides.push(
            OverrideEntry::new("mep_1")
                .set("country", json!("France"))
                .set("countryCode", json!("FR")),
        );

        apply_overrides(&mut index, &overrides, &mut diagnostics);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_mismatched_id_field_is_reported() {
        let mut index = seeded_index();
        let mut diagnostics = Diagnostics::new();
        let mut overrides = OverrideSet::new();
        overrides.push(OverrideEntry::new("mep_1").set("id", json!("mep_2")));

        apply_overrides(&mut index, &overrides, &mut diagnostics);

        assert!(index.contains("mep_1"));
        assert!(!index.contains("mep_2"));
        assert_eq!(diagnostics.count(DiagnosticKind::OverrideIdMismatch), 1);
    }

    #[test]
    fn test_from_json_skips_non_object_entries() {
        let mut diagnostics = Diagnostics::new();
        let set = OverrideSet::from_json(
            json!({
                "mep_1": {"party": "NI"},
                "mep_2": "not an object",
                "mep_3": null
            }),
            &mut diagnostics,
        )
        .unwrap();

        assert_eq!(set.len(), 1);
        assert_eq!(diagnostics.count(DiagnosticKind::MalformedOverride), 2);
    }

    #[test]
    fn test_from_json_rejects_non_object_top_level() {
        let mut diagnostics = Diagnostics::new();
        let err = OverrideSet::from_json(json!([{"id": "mep_1"}]), &mut diagnostics).unwrap_err();
        assert!(matches!(err, DirectoryError::InvalidInput { .. }));
    }
}
