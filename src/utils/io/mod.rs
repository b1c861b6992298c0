//! Reading source files into Arrow record batches

pub mod tabular;

pub use tabular::{
    DEFAULT_BATCH_SIZE, SourceFormat, TabularFile, find_source_files, get_batch_size,
    read_tabular_file, string_column,
};
