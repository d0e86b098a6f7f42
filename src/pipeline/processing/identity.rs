use serde::{Deserialize, Serialize};

use crate::config::SourceProfile;
use crate::constants::{EU_ID_PREFIX, FALLBACK_ID_MARKER, NATIONAL_ID_PREFIX};
use crate::domain::{Level, RawRecord};
use crate::pipeline::processing::normalize::COUNTRY_CODES;

/// How an identity key was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyOrigin {
    /// The record already carried a canonical id
    Canonical,
    /// Derived from an externally stable identifier
    Stable,
    /// Run-scoped sequence number; not comparable across runs
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityKey {
    pub id: String,
    pub origin: KeyOrigin,
}

impl IdentityKey {
    pub fn is_cross_run_stable(&self) -> bool {
        self.origin != KeyOrigin::Fallback
    }
}

/// Derives canonical identity keys for raw records.
///
/// Owns the fallback sequence for one run; create a fresh resolver per run
/// so sequence state never leaks between runs.
#[derive(Debug, Default)]
pub struct IdentityResolver {
    next_sequence: u32,
}

impl IdentityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Namespace for a source's keys: `mep_` for the EU level, `mp_<cc>_`
    /// for national sources with a known country.
    pub fn namespace(profile: &SourceProfile) -> String {
        match profile.level {
            Level::Eu => EU_ID_PREFIX.to_string(),
            Level::National => {
                let code = profile.country.as_deref().and_then(|c| COUNTRY_CODES.lookup(c));
                match code {
                    Some(code) => format!("{}{}_", NATIONAL_ID_PREFIX, code.to_ascii_lowercase()),
                    None => NATIONAL_ID_PREFIX.to_string(),
                }
            }
        }
    }

    pub fn resolve(&mut self, record: &RawRecord, profile: &SourceProfile) -> IdentityKey {
        if let Some(id) = record.first_text(&profile.fields.id) {
            return IdentityKey {
                id: id.to_string(),
                origin: KeyOrigin::Canonical,
            };
        }

        let namespace = Self::namespace(profile);

        if let Some(stable) = profile.id_field.as_deref().and_then(|f| record.text(f)) {
            return IdentityKey {
                id: format!("{}{}", namespace, stable),
                origin: KeyOrigin::Stable,
            };
        }

        self.next_sequence += 1;
        IdentityKey {
            id: format!("{}{}{:03}", namespace, FALLBACK_ID_MARKER, self.next_sequence),
            origin: KeyOrigin::Fallback,
        }
    }

    /// Number of fallback keys issued so far in this run
    pub fn fallback_count(&self) -> u32 {
        self.next_sequence
    }
}
