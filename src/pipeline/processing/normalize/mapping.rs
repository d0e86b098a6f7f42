//! Enumeration mapping from free-form labels to short codes.
//!
//! Unmapped labels always pass through trimmed. Country tables surface a
//! diagnostic for them; party tables do not, since their long tail is
//! expected.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::config::PartyTable;
use crate::constants::FIELD_COUNTRY;
use crate::pipeline::processing::diagnostics::{DiagnosticKind, Diagnostics};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Country,
    Party,
}

/// A hand-curated label → short value table
#[derive(Debug)]
pub struct MappingTable {
    pub name: &'static str,
    pub kind: TableKind,
    entries: HashMap<&'static str, &'static str>,
}

/// Outcome of mapping one label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedLabel {
    pub value: String,
    /// False when the label was passed through unmapped
    pub known: bool,
}

impl MappingTable {
    fn new(name: &'static str, kind: TableKind, entries: &[(&'static str, &'static str)]) -> Self {
        Self {
            name,
            kind,
            entries: entries.iter().copied().collect(),
        }
    }

    pub fn lookup(&self, label: &str) -> Option<&'static str> {
        self.entries.get(label.trim()).copied()
    }

    /// Map a label, passing unknown labels through trimmed. Empty labels map
    /// to nothing.
    pub fn map(&self, label: &str) -> Option<MappedLabel> {
        let trimmed = label.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(match self.lookup(trimmed) {
            Some(value) => MappedLabel {
                value: value.to_string(),
                known: true,
            },
            None => MappedLabel {
                value: trimmed.to_string(),
                known: false,
            },
        })
    }

    /// `map`, plus a diagnostic when a country-kind table misses
    pub fn map_reporting(
        &self,
        label: &str,
        record_id: Option<&str>,
        diagnostics: &mut Diagnostics,
    ) -> Option<MappedLabel> {
        let mapped = self.map(label)?;
        if !mapped.known && self.kind == TableKind::Country {
            diagnostics.record(
                DiagnosticKind::UnmappedCountry,
                record_id,
                Some(FIELD_COUNTRY),
                format!("No country code mapping for '{}'", mapped.value),
            );
        }
        Some(mapped)
    }
}

pub static COUNTRY_CODES: Lazy<MappingTable> = Lazy::new(|| {
    MappingTable::new(
        "country_codes",
        TableKind::Country,
        &[
            ("Austria", "AT"),
            ("Belgium", "BE"),
            ("Bulgaria", "BG"),
            ("Croatia", "HR"),
            ("Cyprus", "CY"),
            ("Czech Republic", "CZ"),
            ("Czechia", "CZ"),
            ("Denmark", "DK"),
            ("Estonia", "EE"),
            ("Finland", "FI"),
            ("France", "FR"),
            ("Germany", "DE"),
            ("Greece", "GR"),
            ("Hungary", "HU"),
            ("Ireland", "IE"),
            ("Italy", "IT"),
            ("Latvia", "LV"),
            ("Lithuania", "LT"),
            ("Luxembourg", "LU"),
            ("Malta", "MT"),
            ("Netherlands", "NL"),
            ("Poland", "PL"),
            ("Portugal", "PT"),
            ("Romania", "RO"),
            ("Slovakia", "SK"),
            ("Slovenia", "SI"),
            ("Spain", "ES"),
            ("Sweden", "SE"),
        ],
    )
});

pub static EU_GROUPS: Lazy<MappingTable> = Lazy::new(|| {
    MappingTable::new(
        "eu_groups",
        TableKind::Party,
        &[
            ("Group of the European People's Party (Christian Democrats)", "EPP"),
            (
                "Group of the Progressive Alliance of Socialists and Democrats in the European Parliament",
                "S&D",
            ),
            ("Renew Europe Group", "Renew"),
            ("Group of the Greens/European Free Alliance", "Greens/EFA"),
            ("European Conservatives and Reformists Group", "ECR"),
            ("Identity and Democracy Group", "ID"),
            ("The Left group in the European Parliament - GUE/NGL", "The Left"),
            ("Non-attached Members", "NI"),
        ],
    )
});

pub static DE_PARTIES: Lazy<MappingTable> = Lazy::new(|| {
    MappingTable::new(
        "de_parties",
        TableKind::Party,
        &[
            ("Sozialdemokratische Partei Deutschlands", "spd"),
            ("Christlich Demokratische Union", "cdu"),
            ("Christlich-Soziale Union in Bayern", "csu"),
            ("Bündnis 90/Die Grünen", "gruene"),
            ("Die Grünen", "gruene"),
            ("Freie Demokratische Partei", "fdp"),
            ("Alternative für Deutschland", "afd"),
            ("Die Linke", "linke"),
            ("Partei des Demokratischen Sozialismus", "linke"),
            ("Arbeit & soziale Gerechtigkeit – Die Wahlalternative", "linke"),
            ("Bündnis Sahra Wagenknecht – Vernunft und Gerechtigkeit", "bsw"),
        ],
    )
});

// Riksdag exports carry letter codes; the directory shows the party name
pub static SE_PARTIES: Lazy<MappingTable> = Lazy::new(|| {
    MappingTable::new(
        "se_parties",
        TableKind::Party,
        &[
            ("S", "Socialdemokraterna"),
            ("M", "Moderaterna"),
            ("SD", "Sverigedemokraterna"),
            ("C", "Centerpartiet"),
            ("V", "Vänsterpartiet"),
            ("KD", "Kristdemokraterna"),
            ("L", "Liberalerna"),
            ("MP", "Miljöpartiet de gröna"),
            ("-", "Partilös (obunden)"),
        ],
    )
});

pub fn party_table(table: PartyTable) -> &'static MappingTable {
    match table {
        PartyTable::EuGroups => &EU_GROUPS,
        PartyTable::DeParties => &DE_PARTIES,
        PartyTable::SeParties => &SE_PARTIES,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_country_maps_to_code() {
        let mut diagnostics = Diagnostics::new();
        let mapped = COUNTRY_CODES.map_reporting(" Czechia ", None, &mut diagnostics).unwrap();
        assert_eq!(mapped, MappedLabel { value: "CZ".to_string(), known: true });
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_unmapped_country_passes_through_with_diagnostic() {
        let mut diagnostics = Diagnostics::new();
        let mapped = COUNTRY_CODES
            .map_reporting("Ruritania", Some("mep_9"), &mut diagnostics)
            .unwrap();
        assert_eq!(mapped.value, "Ruritania");
        assert!(!mapped.known);
        assert_eq!(diagnostics.count(DiagnosticKind::UnmappedCountry), 1);
        assert_eq!(diagnostics.entries()[0].record_id.as_deref(), Some("mep_9"));
    }

    #[test]
    fn test_unmapped_party_is_silent() {
        let mut diagnostics = Diagnostics::new();
        let mapped = EU_GROUPS
            .map_reporting("Patriots for Europe Group", None, &mut diagnostics)
            .unwrap();
        assert_eq!(mapped.value, "Patriots for Europe Group");
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_party_tables() {
        assert_eq!(party_table(PartyTable::EuGroups).lookup("Renew Europe Group"), Some("Renew"));
        assert_eq!(party_table(PartyTable::DeParties).lookup("Die Grünen"), Some("gruene"));
        assert_eq!(party_table(PartyTable::SeParties).lookup("-"), Some("Partilös (obunden)"));
    }

    #[test]
    fn test_empty_label_maps_to_nothing() {
        assert_eq!(DE_PARTIES.map("   "), None);
    }
}
