//! Run counters for the reconciliation pipeline.
//!
//! Recording is a no-op until a recorder is installed with [`init`], so the
//! library can be used (and tested) without one.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::fmt;
use tracing::info;

use crate::error::{DirectoryError, Result};

/// All metric names used in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    NormalizeRecordsProcessed,
    MergeRecordsSeen,
    MergeRecordsInserted,
    MergeRecordsMerged,
    MergeDuplicatesDetected,
    OverridesApplied,
    OverridesStubsCreated,
    DiagnosticsRecorded,
    RunRecordsEmitted,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::NormalizeRecordsProcessed => "reps_normalize_records_processed_total",
            MetricName::MergeRecordsSeen => "reps_merge_records_seen_total",
            MetricName::MergeRecordsInserted => "reps_merge_records_inserted_total",
            MetricName::MergeRecordsMerged => "reps_merge_records_merged_total",
            MetricName::MergeDuplicatesDetected => "reps_merge_duplicates_detected_total",
            MetricName::OverridesApplied => "reps_overrides_applied_total",
            MetricName::OverridesStubsCreated => "reps_overrides_stubs_created_total",
            MetricName::DiagnosticsRecorded => "reps_diagnostics_recorded_total",
            MetricName::RunRecordsEmitted => "reps_run_records_emitted",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Install the Prometheus recorder and return the handle used to render it
pub fn init() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| DirectoryError::Config(format!("Failed to install Prometheus recorder: {}", e)))?;
    info!("Metrics recorder installed");
    Ok(handle)
}

pub mod normalize {
    use super::MetricName;

    pub fn record_normalized() {
        ::metrics::counter!(MetricName::NormalizeRecordsProcessed.as_str()).increment(1);
    }
}

pub mod merge {
    use super::MetricName;

    pub fn record_seen() {
        ::metrics::counter!(MetricName::MergeRecordsSeen.as_str()).increment(1);
    }

    pub fn record_inserted() {
        ::metrics::counter!(MetricName::MergeRecordsInserted.as_str()).increment(1);
    }

    pub fn record_merged() {
        ::metrics::counter!(MetricName::MergeRecordsMerged.as_str()).increment(1);
    }

    pub fn duplicate_detected() {
        ::metrics::counter!(MetricName::MergeDuplicatesDetected.as_str()).increment(1);
    }
}

pub mod overrides {
    use super::MetricName;

    pub fn applied() {
        ::metrics::counter!(MetricName::OverridesApplied.as_str()).increment(1);
    }

    pub fn stub_created() {
        ::metrics::counter!(MetricName::OverridesStubsCreated.as_str()).increment(1);
    }
}

pub mod diagnostics {
    use super::MetricName;
    use crate::pipeline::processing::diagnostics::DiagnosticKind;

    pub fn recorded(kind: DiagnosticKind) {
        ::metrics::counter!(MetricName::DiagnosticsRecorded.as_str(), "kind" => kind.as_str()).increment(1);
    }
}

pub mod run {
    use super::MetricName;

    pub fn records_emitted(count: usize) {
        ::metrics::gauge!(MetricName::RunRecordsEmitted.as_str()).set(count as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names_are_prefixed() {
        for name in [
            MetricName::NormalizeRecordsProcessed,
            MetricName::MergeDuplicatesDetected,
            MetricName::OverridesStubsCreated,
            MetricName::RunRecordsEmitted,
        ] {
            assert!(name.as_str().starts_with("reps_"));
        }
        assert_eq!(MetricName::OverridesApplied.to_string(), "reps_overrides_applied_total");
    }

    #[test]
    fn test_recording_without_recorder_is_a_no_op() {
        merge::record_seen();
        diagnostics::recorded(crate::pipeline::processing::diagnostics::DiagnosticKind::DuplicateId);
    }
}
