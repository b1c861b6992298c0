//! Module for handling date parsing of source records.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Configuration for date format handling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DateFormatConfig {
    /// List of date format strings to try when parsing dates
    pub date_formats: Vec<String>,
    /// Enable heuristic format detection
    pub enable_format_detection: bool,
}

impl Default for DateFormatConfig {
    fn default() -> Self {
        Self {
            date_formats: vec![
                "%d-%m-%Y".to_string(), // Source export: 15-01-2025
                "%Y-%m-%d".to_string(), // ISO format: 2025-01-15
                "%d/%m/%Y".to_string(), // 15/01/2025
                "%m/%d/%Y".to_string(), // US: 01/15/2025
                "%d.%m.%Y".to_string(), // 15.01.2025
                "%Y%m%d".to_string(),   // Compact: 20250115
                "%d %b %Y".to_string(), // 15 Jan 2025
                "%d %B %Y".to_string(), // 15 January 2025
            ],
            enable_format_detection: true,
        }
    }
}

/// Parse a date string with multiple format attempts
///
/// Returns `None` for anything that cannot be parsed; callers treat that as a
/// null date rather than an error.
#[must_use]
pub fn parse_date_string(s: &str, config: &DateFormatConfig) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    for format in &config.date_formats {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return Some(date);
        }
    }

    // Timestamps such as "2025-01-15 00:00:00" or "2025-01-15T00:00:00"
    let s = match s.split_once(['T', ' ']) {
        Some((date_part, _)) if date_part.len() == 10 => date_part,
        _ => s,
    };
    for format in &config.date_formats {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return Some(date);
        }
    }

    if config.enable_format_detection {
        if let Some(detected_format) = detect_date_format(s) {
            if let Ok(date) = NaiveDate::parse_from_str(s, detected_format) {
                return Some(date);
            }
        }
    }

    None
}

/// Try to detect the date format based on string patterns
#[must_use]
pub fn detect_date_format(s: &str) -> Option<&'static str> {
    let bytes = s.as_bytes();

    if s.len() == 10 && bytes[4] == b'-' && bytes[7] == b'-' {
        return Some("%Y-%m-%d");
    }
    if s.len() == 10 && bytes[2] == b'-' && bytes[5] == b'-' {
        return Some("%d-%m-%Y");
    }

    if s.contains('/') {
        let parts: Vec<&str> = s.split('/').collect();
        if parts.len() == 3 {
            if parts[0].len() == 4 {
                return Some("%Y/%m/%d");
            } else if parts[2].len() == 4 && parts[0].parse::<u8>().is_ok() {
                // Day-first, also when the day could be read as a month
                return Some("%d/%m/%Y");
            }
        }
    }

    if s.len() == 8 && s.chars().all(|c| c.is_ascii_digit()) {
        return Some("%Y%m%d");
    }

    None
}
