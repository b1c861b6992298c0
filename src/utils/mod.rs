//! Shared helpers for source file I/O, logging and progress reporting.

pub mod io;
pub mod logging;

pub use io::{DEFAULT_BATCH_SIZE, find_source_files, read_tabular_file};
pub use logging::{log_operation_complete, log_operation_start, log_warning};
