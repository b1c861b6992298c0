//! Persistence of the summary tables and the read-only processed store.

pub mod store;
pub mod verify;
pub mod writer;

pub use store::ProcessedStore;
pub use verify::{VerificationReport, VerifiedFile, verify_outputs};
pub use writer::{
    ANALYTICS_FILE, DatasetMetadata, METADATA_FILE, RunMetadata, build_metadata,
    compression_ratio, write_analytics, write_metadata, write_table, write_tables,
};
