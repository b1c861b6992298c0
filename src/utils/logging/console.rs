//! Console output utilities
//!
//! This module provides the human-readable summaries printed by the binary.

use crate::loader::DatasetSummary;
use crate::persist::VerificationReport;
use crate::pipeline::PipelineOutcome;

/// Print the dataset and table counts of a finished run
pub fn print_run_summary(outcome: &PipelineOutcome) {
    println!("Preprocessing finished in {:?}", outcome.elapsed);
    for summary in &outcome.summaries {
        print_dataset_summary(summary);
    }

    println!("Summary tables:");
    for (name, rows) in outcome.tables.row_counts() {
        println!("  - {name}: {rows} rows");
    }
    println!(
        "Processed size: {} bytes (compression ratio {:.2})",
        outcome.metadata.processed_size_bytes, outcome.metadata.compression_ratio
    );
}

/// Print the quick profile of one cleaned dataset
pub fn print_dataset_summary(summary: &DatasetSummary) {
    println!(
        "{}: {} rows, {} columns, {} states, {} districts, {} pincodes",
        summary.kind,
        summary.rows,
        summary.columns,
        summary.distinct_states,
        summary.distinct_districts,
        summary.distinct_pincodes
    );
    if let (Some(first), Some(last)) = (summary.date_min, summary.date_max) {
        println!("  dates {first} .. {last} ({} unparseable)", summary.null_dates);
    }
    if summary.invalid_pincodes > 0 {
        println!("  {} rows with a non 6-digit pincode", summary.invalid_pincodes);
    }
}

/// Print a verification report
pub fn print_verification(report: &VerificationReport) {
    for file in &report.files {
        match file.bytes {
            Some(bytes) => println!("  [ok]      {} ({bytes} bytes)", file.name),
            None => println!("  [missing] {}", file.name),
        }
    }
    println!(
        "Total processed size: {} bytes (target {} bytes)",
        report.total_bytes, report.target_bytes
    );
    if let Some(ratio) = report.compression_ratio {
        println!("Compression ratio: {ratio:.2}");
    }
    if report.passed() {
        println!("Verification passed");
    } else {
        println!("Verification failed");
    }
}
