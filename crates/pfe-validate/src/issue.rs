//! Field issues.
//!
//! Each variant carries only the data its message needs; [`FieldIssue::into_error`]
//! renders it into the `FilterError` shape stored in `ui.errors`.

use chrono::NaiveDate;
use pfe_schema::ValueKind;
use pfe_state::{ErrorSeverity, FilterError};

/// Stable error codes.
pub mod codes {
    /// Path names no dimension.
    pub const UNKNOWN_FILTER: &str = "UNKNOWN_FILTER";
    /// Value kind differs from the declared kind.
    pub const KIND_MISMATCH: &str = pfe_state::KIND_MISMATCH;
    /// List item outside a closed vocabulary.
    pub const INVALID_OPTION: &str = "INVALID_OPTION";
    /// List item repeated.
    pub const DUPLICATE_VALUE: &str = "DUPLICATE_VALUE";
    /// `min > max`.
    pub const INVALID_RANGE: &str = "INVALID_RANGE";
    /// A bound outside the declared domain.
    pub const OUT_OF_BOUNDS: &str = "OUT_OF_BOUNDS";
    /// A bound is NaN or infinite.
    pub const NOT_FINITE: &str = "NOT_FINITE";
    /// `startDate > endDate`.
    pub const INVALID_DATE_RANGE: &str = "INVALID_DATE_RANGE";
    /// Window starts in the future.
    pub const FUTURE_DATE: &str = "FUTURE_DATE";
    /// Text longer than the declared maximum.
    pub const TOO_LONG: &str = "TOO_LONG";
}

/// A single per-field finding.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldIssue {
    UnknownFilter,
    KindMismatch { expected: ValueKind, found: ValueKind },
    InvalidOption { options: Vec<String> },
    DuplicateValue { item: String },
    InvalidRange { min: f64, max: f64 },
    OutOfBounds { bound: &'static str, value: f64, min: f64, max: f64 },
    NotFinite { bound: &'static str },
    InvalidDateRange { start: NaiveDate, end: NaiveDate },
    FutureDate { start: NaiveDate },
    TooLong { len: usize, max: usize },
}

impl FieldIssue {
    /// Stable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownFilter => codes::UNKNOWN_FILTER,
            Self::KindMismatch { .. } => codes::KIND_MISMATCH,
            Self::InvalidOption { .. } => codes::INVALID_OPTION,
            Self::DuplicateValue { .. } => codes::DUPLICATE_VALUE,
            Self::InvalidRange { .. } => codes::INVALID_RANGE,
            Self::OutOfBounds { .. } => codes::OUT_OF_BOUNDS,
            Self::NotFinite { .. } => codes::NOT_FINITE,
            Self::InvalidDateRange { .. } => codes::INVALID_DATE_RANGE,
            Self::FutureDate { .. } => codes::FUTURE_DATE,
            Self::TooLong { .. } => codes::TOO_LONG,
        }
    }

    /// Duplicates and future windows are accepted with a warning.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::DuplicateValue { .. } | Self::FutureDate { .. } => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }

    fn message(&self, path: &str) -> String {
        match self {
            Self::UnknownFilter => format!("'{path}' is not a filter"),
            Self::KindMismatch { expected, found } => {
                format!("'{path}' expects a {expected} value, got {found}")
            }
            Self::InvalidOption { options } => {
                format!("invalid option(s) for '{path}': {}", options.join(", "))
            }
            Self::DuplicateValue { item } => format!("'{item}' is selected more than once"),
            Self::InvalidRange { min, max } => {
                format!("minimum {min} is greater than maximum {max}")
            }
            Self::OutOfBounds {
                bound,
                value,
                min,
                max,
            } => format!("{bound} {value} is outside [{min}, {max}]"),
            Self::NotFinite { bound } => format!("{bound} must be a finite number"),
            Self::InvalidDateRange { start, end } => {
                format!("start date {start} is after end date {end}")
            }
            Self::FutureDate { start } => format!("start date {start} is in the future"),
            Self::TooLong { len, max } => format!("{len} characters exceeds the limit of {max}"),
        }
    }

    /// Render for `ui.errors`.
    pub fn into_error(self, path: &str) -> FilterError {
        FilterError {
            filter_type: path.to_string(),
            message: self.message(path),
            code: self.code().to_string(),
            severity: self.severity(),
        }
    }
}
