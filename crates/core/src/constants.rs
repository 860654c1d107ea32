//! Constants used throughout the medrec core crate.
//!
//! This module keeps form codes, filename patterns and legal limits in one place
//! so they stay consistent between the validation rules and the export pipeline.

/// Form code used when no explicit code is configured.
pub const DEFAULT_FORM_CODE: &str = "A3";

/// Prefix of every exported document filename.
pub const EXPORT_FILENAME_PREFIX: &str = "Form";

/// `chrono` format string for the timestamp part of an export filename (`yyyyMMdd_HHmmss`).
pub const EXPORT_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Extension of exported documents.
pub const EXPORT_FILE_EXTENSION: &str = "docx";

/// Maximum number of days allowed between the two practitioners' examinations.
pub const MAX_DAYS_BETWEEN_EXAMINATIONS: i64 = 5;

/// Maximum length of a configured form code.
pub const MAX_FORM_CODE_LEN: usize = 16;
