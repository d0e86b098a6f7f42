//! Merge engine: resolve identity, normalize, and fold raw records into the
//! record index under the precedence policy.

use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info, instrument};

use crate::config::{Precedence, SourceProfile};
use crate::constants::{
    FIELD_COUNTRY, FIELD_COUNTRY_CODE, FIELD_EMAIL, FIELD_INSTITUTION, FIELD_LEVEL, FIELD_NAME, FIELD_PARTY,
    FIELD_ROLE, FIELD_SOURCE_KEY, FIELD_USES_X, FIELD_X_HANDLE,
};
use crate::domain::{CanonicalRecord, RawRecord};
use crate::error::{DirectoryError, Result};
use crate::observability::metrics;
use crate::pipeline::processing::diagnostics::{DiagnosticKind, Diagnostics};
use crate::pipeline::processing::identity::{IdentityResolver, KeyOrigin};
use crate::pipeline::processing::normalize::{
    extract_handle, reconcile_x, NormalizedFields, RecordNormalizer, COUNTRY_CODES,
};
use crate::pipeline::storage::RecordIndex;

/// Raw records from one source, ready for merging
#[derive(Debug, Clone)]
pub struct SourceBatch {
    pub profile: SourceProfile,
    pub records: Vec<RawRecord>,
    /// Array elements dropped because they were not objects
    pub skipped: usize,
}

impl SourceBatch {
    pub fn new(profile: SourceProfile, records: Vec<RawRecord>) -> Self {
        Self {
            profile,
            records,
            skipped: 0,
        }
    }

    /// Build a batch from a JSON array of objects. Anything but an array is
    /// fatal; non-object elements are skipped with a diagnostic.
    pub fn from_json(profile: SourceProfile, value: Value, diagnostics: &mut Diagnostics) -> Result<Self> {
        let Value::Array(items) = value else {
            return Err(DirectoryError::invalid_input(
                format!("base input '{}'", profile.name),
                "expected a JSON array of records",
            ));
        };

        let mut records = Vec::with_capacity(items.len());
        let mut skipped = 0;
        for (position, item) in items.into_iter().enumerate() {
            match item {
                Value::Object(object) => {
                    records.push(RawRecord::from_json_object(object, &profile.name, diagnostics));
                }
                other => {
                    skipped += 1;
                    diagnostics.record(
                        DiagnosticKind::MalformedInput,
                        None,
                        None,
                        format!(
                            "source '{}': element {} is {} rather than an object, skipped",
                            profile.name,
                            position,
                            json_kind(&other)
                        ),
                    );
                }
            }
        }

        Ok(Self {
            profile,
            records,
            skipped,
        })
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// What happened to one raw record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted { id: String },
    Merged { id: String, changed: Vec<&'static str> },
}

impl MergeOutcome {
    pub fn id(&self) -> &str {
        match self {
            MergeOutcome::Inserted { id } | MergeOutcome::Merged { id, .. } => id,
        }
    }
}

/// Per-batch counts
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub source: String,
    pub records: usize,
    pub inserted: usize,
    pub merged: usize,
    pub duplicates: usize,
    pub fallback_keys: usize,
    pub skipped: usize,
}

#[derive(Default)]
struct BatchState {
    seen: HashSet<String>,
    reported: HashSet<String>,
    fallback_keys: usize,
}

/// Folds raw records into a [`RecordIndex`]. One engine serves one run: it
/// owns that run's identity resolver and fallback sequence.
#[derive(Debug, Default)]
pub struct MergeEngine {
    resolver: IdentityResolver,
    unmapped_parties: BTreeSet<String>,
}

impl MergeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge every record of a base batch in order. Repeated identity keys
    /// within the batch fold into the first occurrence, fill-if-empty, with
    /// one `DuplicateId` diagnostic per key.
    #[instrument(skip_all, fields(source = %batch.profile.name))]
    pub fn merge_batch(
        &mut self,
        index: &mut RecordIndex,
        batch: &SourceBatch,
        diagnostics: &mut Diagnostics,
    ) -> BatchReport {
        let mut state = BatchState::default();
        let mut report = BatchReport {
            source: batch.profile.name.clone(),
            records: batch.records.len(),
            skipped: batch.skipped,
            ..BatchReport::default()
        };

        for raw in &batch.records {
            let (outcome, duplicate) = self.merge_tracked(index, raw, &batch.profile, &mut state, diagnostics);
            if duplicate {
                report.duplicates += 1;
            }
            match outcome {
                MergeOutcome::Inserted { .. } => report.inserted += 1,
                MergeOutcome::Merged { .. } => report.merged += 1,
            }
        }

        report.fallback_keys = state.fallback_keys;
        if state.fallback_keys > 0 {
            diagnostics.record(
                DiagnosticKind::FallbackIdentity,
                None,
                None,
                format!(
                    "source '{}': {} record(s) had no stable identifier and got run-scoped keys; \
                     they will not match across runs or sources",
                    batch.profile.name, state.fallback_keys
                ),
            );
        }

        info!(
            records = report.records,
            inserted = report.inserted,
            merged = report.merged,
            duplicates = report.duplicates,
            "Merged batch"
        );
        report
    }

    /// Merge a single record outside of any batch
    pub fn merge(
        &mut self,
        index: &mut RecordIndex,
        raw: &RawRecord,
        profile: &SourceProfile,
        diagnostics: &mut Diagnostics,
    ) -> MergeOutcome {
        let mut state = BatchState::default();
        self.merge_tracked(index, raw, profile, &mut state, diagnostics).0
    }

    fn merge_tracked(
        &mut self,
        index: &mut RecordIndex,
        raw: &RawRecord,
        profile: &SourceProfile,
        state: &mut BatchState,
        diagnostics: &mut Diagnostics,
    ) -> (MergeOutcome, bool) {
        metrics::merge::record_seen();

        let key = self.resolver.resolve(raw, profile);
        if key.origin == KeyOrigin::Fallback {
            state.fallback_keys += 1;
        }

        let fields = RecordNormalizer::new(profile).normalize(raw, &key.id, diagnostics);
        if let Some(label) = &fields.unmapped_party {
            self.unmapped_parties.insert(label.clone());
        }

        let duplicate = !state.seen.insert(key.id.clone());
        if duplicate {
            metrics::merge::duplicate_detected();
            if state.reported.insert(key.id.clone()) {
                diagnostics.record(
                    DiagnosticKind::DuplicateId,
                    Some(&key.id),
                    None,
                    format!("Duplicate id in source '{}': {}", profile.name, key.id),
                );
            }
        }

        let target = if index.contains(&key.id) {
            Some(key.id.clone())
        } else {
            fields
                .source_key
                .as_deref()
                .and_then(|sk| index.id_for_source_key(sk))
                .map(str::to_string)
        };

        let outcome = match target {
            Some(id) => {
                // first-seen wins within a batch regardless of source precedence
                let precedence = if duplicate {
                    Precedence::FillIfEmpty
                } else {
                    profile.precedence
                };
                let changed = match index.get_mut(&id) {
                    Some(record) => merge_fields(record, fields, precedence),
                    None => Vec::new(),
                };
                debug!(id = %id, ?changed, "Merged into existing record");
                index.refresh_source_key(&id);
                metrics::merge::record_merged();
                MergeOutcome::Merged { id, changed }
            }
            None => {
                let id = key.id;
                index.insert(new_record(id.clone(), fields));
                metrics::merge::record_inserted();
                MergeOutcome::Inserted { id }
            }
        };

        (outcome, duplicate)
    }

    /// Party labels that went through a mapping table unmatched this run
    pub fn unmapped_party_labels(&self) -> &BTreeSet<String> {
        &self.unmapped_parties
    }
}

fn new_record(id: String, fields: NormalizedFields) -> CanonicalRecord {
    CanonicalRecord {
        id,
        source_key: fields.source_key,
        name: fields.name,
        country: fields.country,
        country_code: fields.country_code,
        level: fields.level,
        institution: fields.institution,
        role: fields.role,
        party: fields.party,
        email: fields.email,
        uses_x: fields.x.uses_x,
        x_handle: fields.x.x_handle,
        extra: Default::default(),
    }
}

fn merge_slot<T: PartialEq>(
    slot: &mut Option<T>,
    incoming: Option<T>,
    precedence: Precedence,
    field: &'static str,
    changed: &mut Vec<&'static str>,
) {
    let Some(value) = incoming else {
        return;
    };
    let replace = match slot {
        None => true,
        Some(existing) => precedence == Precedence::Authoritative && *existing != value,
    };
    if replace {
        *slot = Some(value);
        changed.push(field);
    }
}

/// Fold normalized fields into an existing record. Empty incoming values
/// never erase anything. Under `FillIfEmpty` only empty slots (and a
/// default `usesX = false`) are filled.
pub fn merge_fields(record: &mut CanonicalRecord, fields: NormalizedFields, precedence: Precedence) -> Vec<&'static str> {
    let mut changed = Vec::new();

    merge_slot(&mut record.source_key, fields.source_key, precedence, FIELD_SOURCE_KEY, &mut changed);
    merge_slot(&mut record.name, fields.name, precedence, FIELD_NAME, &mut changed);
    // country and countryCode move as a pair
    let code_before = record.country_code.clone();
    merge_slot(&mut record.country, fields.country, precedence, FIELD_COUNTRY, &mut changed);
    merge_slot(&mut record.country_code, fields.country_code, precedence, FIELD_COUNTRY_CODE, &mut changed);
    align_country_code(record);
    changed.retain(|field| *field != FIELD_COUNTRY_CODE);
    if record.country_code != code_before {
        changed.push(FIELD_COUNTRY_CODE);
    }
    merge_slot(&mut record.level, fields.level, precedence, FIELD_LEVEL, &mut changed);
    merge_slot(&mut record.institution, fields.institution, precedence, FIELD_INSTITUTION, &mut changed);
    merge_slot(&mut record.role, fields.role, precedence, FIELD_ROLE, &mut changed);
    merge_slot(&mut record.party, fields.party, precedence, FIELD_PARTY, &mut changed);
    merge_slot(&mut record.email, fields.email, precedence, FIELD_EMAIL, &mut changed);

    // A handle only arrives together with usesX = true, so the pair stays consistent
    if fields.x.uses_x && !record.uses_x {
        record.uses_x = true;
        changed.push(FIELD_USES_X);
    }
    merge_slot(&mut record.x_handle, fields.x.x_handle, precedence, FIELD_X_HANDLE, &mut changed);

    changed
}

/// Tie `countryCode` to `country`: a recognized country decides the code and
/// an unrecognized one leaves it null. Records without a country keep
/// whatever code they carry. Returns whether the code changed.
pub fn align_country_code(record: &mut CanonicalRecord) -> bool {
    let Some(country) = record.country.as_deref() else {
        return false;
    };
    let code = COUNTRY_CODES.lookup(country).map(str::to_string);
    if record.country_code == code {
        return false;
    }
    record.country_code = code;
    true
}

/// Re-apply the usage/handle rule to one canonical record. `explicit` is
/// the usage flag a caller knows to be deliberate; `None` lets a handle
/// imply usage. Returns whether the record changed.
pub fn apply_x_consistency(record: &mut CanonicalRecord, explicit: Option<bool>, diagnostics: &mut Diagnostics) -> bool {
    if let Some(raw) = record.x_handle.as_deref() {
        if explicit != Some(false) && extract_handle(raw).is_none() {
            diagnostics.record(
                DiagnosticKind::UnresolvedHandle,
                Some(&record.id),
                Some(FIELD_X_HANDLE),
                format!("'{}' does not resolve to a profile handle", raw),
            );
        }
    }

    let flag = explicit.or(record.uses_x.then_some(true));
    let presence = reconcile_x(flag, record.x_handle.as_deref());
    let changed = presence.uses_x != record.uses_x || presence.x_handle != record.x_handle;
    record.uses_x = presence.uses_x;
    record.x_handle = presence.x_handle;
    changed
}

/// Run the usage/handle rule over every record in the index
pub fn enforce_x_consistency(index: &mut RecordIndex, diagnostics: &mut Diagnostics) -> usize {
    let mut fixed = 0;
    for record in index.iter_mut() {
        if apply_x_consistency(record, None, diagnostics) {
            fixed += 1;
        }
    }
    fixed
}
