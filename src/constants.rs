//! Field name and namespace constants shared across the pipeline.
//! Canonical field names are the camelCase keys used in the emitted directory.

pub const FIELD_ID: &str = "id";
pub const FIELD_SOURCE_KEY: &str = "sourceKey";
pub const FIELD_NAME: &str = "name";
pub const FIELD_COUNTRY: &str = "country";
pub const FIELD_COUNTRY_CODE: &str = "countryCode";
pub const FIELD_LEVEL: &str = "level";
pub const FIELD_INSTITUTION: &str = "institution";
pub const FIELD_ROLE: &str = "role";
pub const FIELD_PARTY: &str = "party";
pub const FIELD_EMAIL: &str = "email";
pub const FIELD_USES_X: &str = "usesX";
pub const FIELD_X_HANDLE: &str = "xHandle";

// Identity namespaces per level of government
pub const EU_ID_PREFIX: &str = "mep_";
pub const NATIONAL_ID_PREFIX: &str = "mp_";

/// Marker placed between the namespace and the run-scoped sequence number
pub const FALLBACK_ID_MARKER: &str = "seq";

/// Hosts serving profiles on the tracked platform (subdomains match too)
pub const X_DOMAINS: &[&str] = &["x.com", "twitter.com"];

/// First path segments on the platform that are actions, not profiles
pub const X_NON_PROFILE_SEGMENTS: &[&str] = &[
    "intent",
    "share",
    "home",
    "i",
    "search",
    "explore",
    "hashtag",
    "login",
    "settings",
    "notifications",
    "messages",
];

/// Route whose query string may still carry a handle
pub const X_INTENT_SEGMENT: &str = "intent";
pub const X_SCREEN_NAME_PARAM: &str = "screen_name";

/// Breadcrumb token some scraped pages glue in front of the name
pub const NAME_PREFIX_ARTIFACT: &str = "Home";

pub const MAILTO_PREFIX: &str = "mailto:";

pub const DEFAULT_CONFIG_PATH: &str = "directory.toml";
pub const CONFIG_PATH_ENV: &str = "REPS_CONFIG";
