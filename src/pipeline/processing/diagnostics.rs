use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

use crate::observability::metrics;

/// Kinds of non-fatal data-quality anomalies raised while merging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A field or record had a shape the pipeline cannot use
    MalformedInput,
    /// A country name with no ISO code mapping
    UnmappedCountry,
    /// The same identity key appeared twice within one base batch
    DuplicateId,
    /// An override targeted an id no source produced; a stub was created
    OrphanedOverride,
    /// An override entry or one of its values was unusable
    MalformedOverride,
    /// A non-empty handle value that does not resolve to a profile
    UnresolvedHandle,
    /// Records keyed by a run-scoped sequence number instead of a stable id
    FallbackIdentity,
    /// An override entry carried an `id` different from its key
    OverrideIdMismatch,
    /// After overrides, a record's country code is not the mapped code of its country
    CountryCodeMismatch,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::MalformedInput => "malformed_input",
            DiagnosticKind::UnmappedCountry => "unmapped_country",
            DiagnosticKind::DuplicateId => "duplicate_id",
            DiagnosticKind::OrphanedOverride => "orphaned_override",
            DiagnosticKind::MalformedOverride => "malformed_override",
            DiagnosticKind::UnresolvedHandle => "unresolved_handle",
            DiagnosticKind::FallbackIdentity => "fallback_identity",
            DiagnosticKind::OverrideIdMismatch => "override_id_mismatch",
            DiagnosticKind::CountryCodeMismatch => "country_code_mismatch",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured warning describing one anomaly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// Canonical id of the record involved, when one is known
    pub record_id: Option<String>,
    /// Field that triggered the diagnostic
    pub field: Option<String>,
    pub message: String,
}

/// Ordered collector for diagnostics raised during one run
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic, log it and count it
    pub fn record(
        &mut self,
        kind: DiagnosticKind,
        record_id: Option<&str>,
        field: Option<&str>,
        message: impl Into<String>,
    ) {
        let message = message.into();
        warn!(
            kind = %kind,
            record_id = record_id.unwrap_or("-"),
            field = field.unwrap_or("-"),
            "{}",
            message
        );
        metrics::diagnostics::recorded(kind);

        self.entries.push(Diagnostic {
            kind,
            record_id: record_id.map(str::to_string),
            field: field.map(str::to_string),
            message,
        });
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.entries.iter().filter(|d| d.kind == kind).count()
    }

    pub fn counts_by_kind(&self) -> BTreeMap<DiagnosticKind, usize> {
        let mut counts = BTreeMap::new();
        for entry in &self.entries {
            *counts.entry(entry.kind).or_insert(0) += 1;
        }
        counts
    }

    pub fn into_entries(self) -> Vec<Diagnostic> {
        self.entries
    }
}
