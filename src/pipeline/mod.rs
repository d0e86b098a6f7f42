//! One directory run: merge every base batch, enforce the usage/handle rule,
//! apply overrides, and summarize.

pub mod processing;
pub mod storage;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{info, instrument};

use crate::config::SourceProfile;
use crate::domain::CanonicalRecord;
use crate::error::Result;
use crate::observability::metrics;
use processing::diagnostics::{Diagnostic, Diagnostics};
use processing::merge::{enforce_x_consistency, BatchReport, MergeEngine, SourceBatch};
use processing::overrides::{apply_overrides, OverrideReport, OverrideSet};
use storage::RecordIndex;

/// Counts reported at the end of a run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Raw records handed to the merge engine across all batches
    pub raw_records: usize,
    pub unique_records: usize,
    pub stubs_created: usize,
    pub overrides_applied: usize,
    /// Records with `usesX` set
    pub with_x: usize,
    pub diagnostics_by_kind: BTreeMap<String, usize>,
    /// Party labels no mapping table knew, sorted and distinct
    pub unmapped_party_labels: Vec<String>,
    pub completed_at: DateTime<Utc>,
}

/// Everything a run produces
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutput {
    pub records: Vec<CanonicalRecord>,
    pub diagnostics: Vec<Diagnostic>,
    pub batches: Vec<BatchReport>,
    pub overrides: OverrideReport,
    pub summary: RunSummary,
}

pub struct Pipeline;

impl Pipeline {
    /// Run the merge over already-materialized batches.
    ///
    /// Batches are merged in the order given, then the usage/handle rule is
    /// enforced over the merged base set, then overrides are applied. Never
    /// fails: field-level problems land in the diagnostics.
    #[instrument(skip_all, fields(batches = batches.len()))]
    pub fn run(
        batches: &[SourceBatch],
        overrides: Option<&OverrideSet>,
        mut diagnostics: Diagnostics,
    ) -> PipelineOutput {
        let mut index = RecordIndex::new();
        let mut engine = MergeEngine::new();

        let reports: Vec<BatchReport> = batches
            .iter()
            .map(|batch| engine.merge_batch(&mut index, batch, &mut diagnostics))
            .collect();
        let raw_records = reports.iter().map(|report| report.records).sum();

        let fixed = enforce_x_consistency(&mut index, &mut diagnostics);
        if fixed > 0 {
            info!(fixed, "Usage/handle rule corrected merged records");
        }

        let override_report = match overrides {
            Some(set) => apply_overrides(&mut index, set, &mut diagnostics),
            None => OverrideReport::default(),
        };

        let with_x = index.iter().filter(|record| record.uses_x).count();
        let summary = RunSummary {
            raw_records,
            unique_records: index.len(),
            stubs_created: override_report.stubs_created,
            overrides_applied: override_report.applied,
            with_x,
            diagnostics_by_kind: diagnostics
                .counts_by_kind()
                .into_iter()
                .map(|(kind, count)| (kind.as_str().to_string(), count))
                .collect(),
            unmapped_party_labels: engine.unmapped_party_labels().iter().cloned().collect(),
            completed_at: Utc::now(),
        };

        info!(
            raw_records = summary.raw_records,
            unique_records = summary.unique_records,
            with_x = summary.with_x,
            stubs_created = summary.stubs_created,
            diagnostics = diagnostics.len(),
            "Directory run complete"
        );
        metrics::run::records_emitted(summary.unique_records);

        PipelineOutput {
            records: index.into_records(),
            diagnostics: diagnostics.into_entries(),
            batches: reports,
            overrides: override_report,
            summary,
        }
    }

    /// Validate top-level JSON inputs, then run.
    ///
    /// Every base input must be an array and the overrides, when given, an
    /// object. A malformed top-level input fails the run before anything is
    /// merged.
    pub fn run_json(inputs: Vec<(SourceProfile, Value)>, overrides: Option<Value>) -> Result<PipelineOutput> {
        let mut diagnostics = Diagnostics::new();
        let batches = inputs
            .into_iter()
            .map(|(profile, value)| SourceBatch::from_json(profile, value, &mut diagnostics))
            .collect::<Result<Vec<_>>>()?;
        let overrides = overrides
            .map(|value| OverrideSet::from_json(value, &mut diagnostics))
            .transpose()?;

        Ok(Self::run(&batches, overrides.as_ref(), diagnostics))
    }
}
