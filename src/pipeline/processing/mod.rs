// Processing stages: normalization, identity, merging, overrides, and the
// diagnostics they report into

pub mod diagnostics;
pub mod identity;
pub mod merge;
pub mod normalize;
pub mod overrides;
