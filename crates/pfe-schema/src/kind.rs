//! # Dimension Kinds
//!
//! | Kind | Empty value | Example |
//! |------|-------------|---------|
//! | `List` | `[]` | risk grades, industries |
//! | `Range` | `{min: none, max: none}` | credit limit |
//! | `DateRange` | `{startDate: none, endDate: none}` | reporting window |
//! | `Text` | `""` | free-text search |
//! | `Group` | every member empty | compliance status by authority |

use serde::{Deserialize, Serialize};

use crate::table::DimensionSpec;

/// How chart clicks select a list dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Selection {
    /// A click replaces the whole value; re-clicking clears it.
    Single,
    /// A click toggles membership of the clicked bucket.
    Multi,
}

/// Inclusive numeric domain of a range dimension.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeDomain {
    /// Smallest admissible bound.
    pub min: f64,
    /// Largest admissible bound.
    pub max: f64,
}

impl RangeDomain {
    /// Construct a domain.
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Whether `v` lies inside the domain.
    pub fn contains(&self, v: f64) -> bool {
        v >= self.min && v <= self.max
    }

    /// Clamp `v` to the domain edges.
    pub fn clamp(&self, v: f64) -> f64 {
        v.max(self.min).min(self.max)
    }
}

/// The declared kind of a dimension.
#[derive(Debug, Clone, PartialEq)]
pub enum DimensionKind {
    /// Order-irrelevant set of strings.
    List {
        /// Closed vocabulary; `None` accepts any string.
        vocabulary: Option<Vec<String>>,
        /// Chart selection mode.
        selection: Selection,
    },
    /// Numeric `{min?, max?}` band.
    Range {
        /// Admissible domain of either bound.
        domain: RangeDomain,
    },
    /// ISO date window.
    DateRange,
    /// Free text.
    Text {
        /// Maximum length in characters.
        max_len: usize,
    },
    /// A named group of member dimensions.
    Group {
        /// Members in declaration order.
        members: Vec<DimensionSpec>,
    },
}

impl DimensionKind {
    /// The value kind this dimension holds.
    pub fn value_kind(&self) -> ValueKind {
        match self {
            Self::List { .. } => ValueKind::List,
            Self::Range { .. } => ValueKind::Range,
            Self::DateRange => ValueKind::DateRange,
            Self::Text { .. } => ValueKind::Text,
            Self::Group { .. } => ValueKind::Group,
        }
    }
}

/// Discriminant of a filter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// List of strings.
    List,
    /// Numeric range.
    Range,
    /// Date window.
    DateRange,
    /// Text scalar.
    Text,
    /// Group of members.
    Group,
}

impl ValueKind {
    /// Identifier used in error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Range => "range",
            Self::DateRange => "date_range",
            Self::Text => "text",
            Self::Group => "group",
        }
    }
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_clamp() {
        let d = RangeDomain::new(0.0, 100.0);
        assert_eq!(d.clamp(-5.0), 0.0);
        assert_eq!(d.clamp(150.0), 100.0);
        assert_eq!(d.clamp(42.5), 42.5);
        assert!(d.contains(0.0));
        assert!(d.contains(100.0));
        assert!(!d.contains(100.1));
    }

    #[test]
    fn test_value_kind_mapping() {
        assert_eq!(DimensionKind::DateRange.value_kind(), ValueKind::DateRange);
        assert_eq!(
            DimensionKind::Text { max_len: 10 }.value_kind(),
            ValueKind::Text
        );
        assert_eq!(
            DimensionKind::Group { members: vec![] }.value_kind(),
            ValueKind::Group
        );
    }
}
