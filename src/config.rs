use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::constants;
use crate::domain::Level;
use crate::error::{DirectoryError, Result};

/// Run configuration loaded from `directory.toml`
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryConfig {
    /// Where the merged directory is written
    pub output: PathBuf,
    /// Optional human-maintained corrections keyed by canonical id
    #[serde(default)]
    pub overrides: Option<PathBuf>,
    /// Optional Prometheus text dump of the run counters
    #[serde(default)]
    pub metrics_output: Option<PathBuf>,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

/// One input file plus the profile describing how to read its records
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub format: SourceFormat,
    #[serde(flatten)]
    pub profile: SourceProfile,
}

/// Shape of a source file on disk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    /// A JSON array of flat objects
    #[default]
    Records,
    /// SPARQL JSON results (`results.bindings`)
    Wikidata,
}

/// Precedence of a source's values when merged into an existing record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Precedence {
    /// Only fill fields that are still empty
    #[default]
    FillIfEmpty,
    /// Non-empty incoming values replace existing ones
    Authoritative,
}

/// Which party mapping table a source's labels go through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PartyTable {
    EuGroups,
    DeParties,
    SeParties,
}

/// Values fixed for every record of one source, and where its fields live
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceProfile {
    pub name: String,
    pub level: Level,
    /// Default country for sources that do not carry one per record
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub institution: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    /// Field holding the externally stable identifier
    #[serde(default)]
    pub id_field: Option<String>,
    #[serde(default)]
    pub party_table: Option<PartyTable>,
    #[serde(default)]
    pub precedence: Precedence,
    #[serde(default)]
    pub fields: FieldAliases,
}

impl SourceProfile {
    pub fn new(name: impl Into<String>, level: Level) -> Self {
        Self {
            name: name.into(),
            level,
            country: None,
            institution: None,
            role: None,
            id_field: None,
            party_table: None,
            precedence: Precedence::default(),
            fields: FieldAliases::default(),
        }
    }

    /// European Parliament export
    pub fn european_parliament() -> Self {
        Self {
            institution: Some("European Parliament".to_string()),
            role: Some("MEP".to_string()),
            id_field: Some("mep_id".to_string()),
            party_table: Some(PartyTable::EuGroups),
            ..Self::new("meps", Level::Eu)
        }
    }

    /// Bundestag members keyed by Wikidata QID
    pub fn bundestag() -> Self {
        Self {
            country: Some("Germany".to_string()),
            institution: Some("Bundestag".to_string()),
            role: Some("MP".to_string()),
            id_field: Some("qid".to_string()),
            party_table: Some(PartyTable::DeParties),
            ..Self::new("mps_de", Level::National)
        }
    }

    /// Riksdag members with single-letter party codes
    pub fn riksdag() -> Self {
        Self {
            country: Some("Sweden".to_string()),
            institution: Some("Riksdag".to_string()),
            role: Some("MP".to_string()),
            party_table: Some(PartyTable::SeParties),
            ..Self::new("mps_se", Level::National)
        }
    }
}

fn aliases(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Source field names consulted, in order, for each canonical field
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FieldAliases {
    pub id: Vec<String>,
    pub source_key: Vec<String>,
    pub name: Vec<String>,
    pub country: Vec<String>,
    pub country_code: Vec<String>,
    pub party: Vec<String>,
    pub email: Vec<String>,
    pub uses_x: Vec<String>,
    pub x_handle: Vec<String>,
}

impl Default for FieldAliases {
    fn default() -> Self {
        Self {
            id: aliases(&[constants::FIELD_ID]),
            source_key: aliases(&[constants::FIELD_SOURCE_KEY, "qid"]),
            name: aliases(&[constants::FIELD_NAME, "personLabel"]),
            country: aliases(&[constants::FIELD_COUNTRY]),
            country_code: aliases(&[constants::FIELD_COUNTRY_CODE]),
            party: aliases(&[constants::FIELD_PARTY, "partyName", "political_group"]),
            email: aliases(&[constants::FIELD_EMAIL]),
            uses_x: aliases(&[constants::FIELD_USES_X]),
            x_handle: aliases(&[constants::FIELD_X_HANDLE, "x_handle", "x", "x_url"]),
        }
    }
}

impl DirectoryConfig {
    /// Load the configuration from `path`, resolving relative source paths
    /// against the directory holding the file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            DirectoryError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;

        let mut config = Self::from_toml(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        info!(path = %path.display(), sources = config.sources.len(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: DirectoryConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(DirectoryError::Config("at least one [[sources]] entry is required".to_string()));
        }

        let mut names = std::collections::HashSet::new();
        for source in &self.sources {
            if !names.insert(source.profile.name.as_str()) {
                return Err(DirectoryError::Config(format!(
                    "duplicate source name '{}'",
                    source.profile.name
                )));
            }
            if source.format == SourceFormat::Wikidata && source.profile.id_field.is_none() {
                return Err(DirectoryError::Config(format!(
                    "source '{}': wikidata sources need an id_field",
                    source.profile.name
                )));
            }
        }
        Ok(())
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.output);
        if let Some(p) = self.overrides.as_mut() {
            resolve(p);
        }
        if let Some(p) = self.metrics_output.as_mut() {
            resolve(p);
        }
        for source in &mut self.sources {
            resolve(&mut source.path);
        }
    }
}
