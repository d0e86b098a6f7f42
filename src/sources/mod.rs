//! Adapters that turn source files into raw record batches. Everything
//! format-specific lives here; the pipeline only ever sees [`SourceBatch`].

pub mod party_text;
pub mod repair;
pub mod wikidata;

use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::{info, instrument, warn};

use crate::config::{SourceConfig, SourceFormat};
use crate::error::{DirectoryError, Result};
use crate::pipeline::processing::diagnostics::Diagnostics;
use crate::pipeline::processing::merge::SourceBatch;

/// Read a JSON document from disk
pub fn read_json(path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Parse a records file, retrying once after repairing unquoted handles
/// when the text is not valid JSON as-is.
pub fn parse_records_text(text: &str) -> Result<Value> {
    match serde_json::from_str(text) {
        Ok(value) => Ok(value),
        Err(original) => {
            let repaired = repair::repair_unquoted_handles(text);
            if repaired == text {
                return Err(original.into());
            }
            warn!("Input is not valid JSON; retrying after quoting bare xHandle values");
            Ok(serde_json::from_str(&repaired)?)
        }
    }
}

/// Load one configured source into a batch
#[instrument(skip_all, fields(source = %source.profile.name, path = %source.path.display()))]
pub fn load_source(source: &SourceConfig, diagnostics: &mut Diagnostics) -> Result<SourceBatch> {
    let text = fs::read_to_string(&source.path).map_err(|e| {
        DirectoryError::Config(format!(
            "source '{}': cannot read '{}': {}",
            source.profile.name,
            source.path.display(),
            e
        ))
    })?;

    let records = match source.format {
        SourceFormat::Records => parse_records_text(&text)?,
        SourceFormat::Wikidata => wikidata::flatten_bindings(serde_json::from_str(&text)?)?,
    };

    let batch = SourceBatch::from_json(source.profile.clone(), records, diagnostics)?;
    info!(records = batch.records.len(), skipped = batch.skipped, "Loaded source");
    Ok(batch)
}
