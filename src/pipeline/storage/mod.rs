pub mod record_index;

pub use record_index::RecordIndex;
