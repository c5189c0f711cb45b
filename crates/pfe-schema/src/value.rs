//! # Filter Values
//!
//! `FilterValue` serializes in the canonical shape the query layer consumes:
//! a list is a JSON array, a range is `{"min": .., "max": ..}` with absent
//! bounds omitted, a date window is `{"startDate": .., "endDate": ..}`, text is a
//! string, and a group is an object keyed by member name.
//!
//! Deserialization is deliberately not derived: the same JSON object could be
//! a range, a date window, or a group, so decoding always goes through the
//! schema (see [`crate::decode`]).

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::kind::ValueKind;

/// Numeric band with optional bounds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RangeBounds {
    /// Lower bound, inclusive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Upper bound, inclusive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl RangeBounds {
    /// A band with both bounds optional.
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    /// A band with both bounds set.
    pub fn between(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    /// Both bounds absent.
    pub fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    /// Whether this band intersects `[lo, hi]`. Absent bounds are open.
    pub fn overlaps(&self, lo: f64, hi: f64) -> bool {
        let min = self.min.unwrap_or(f64::NEG_INFINITY);
        let max = self.max.unwrap_or(f64::INFINITY);
        min <= hi && lo <= max
    }
}

/// Date window with optional ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateBounds {
    /// First day included.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    /// Last day included.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

impl DateBounds {
    /// A window with both ends optional.
    pub fn new(start_date: Option<NaiveDate>, end_date: Option<NaiveDate>) -> Self {
        Self {
            start_date,
            end_date,
        }
    }

    /// Both ends absent.
    pub fn is_open(&self) -> bool {
        self.start_date.is_none() && self.end_date.is_none()
    }
}

/// A value held by one filter dimension.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FilterValue {
    /// Set of selected strings.
    List(Vec<String>),
    /// Numeric band.
    Range(RangeBounds),
    /// Date window.
    DateRange(DateBounds),
    /// Free text.
    Text(String),
    /// Member name to member value.
    Group(BTreeMap<String, FilterValue>),
}

impl FilterValue {
    /// Convenience constructor for list values.
    pub fn list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    /// Convenience constructor for a bounded range.
    pub fn range(min: Option<f64>, max: Option<f64>) -> Self {
        Self::Range(RangeBounds::new(min, max))
    }

    /// Convenience constructor for text.
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// The discriminant.
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::List(_) => ValueKind::List,
            Self::Range(_) => ValueKind::Range,
            Self::DateRange(_) => ValueKind::DateRange,
            Self::Text(_) => ValueKind::Text,
            Self::Group(_) => ValueKind::Group,
        }
    }

    /// Whether this is the canonical empty value of its kind.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::List(items) => items.is_empty(),
            Self::Range(r) => r.is_unbounded(),
            Self::DateRange(d) => d.is_open(),
            Self::Text(s) => s.is_empty(),
            Self::Group(members) => members.values().all(FilterValue::is_empty),
        }
    }

    /// The list items, if this is a list.
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// The band, if this is a range.
    pub fn as_range(&self) -> Option<&RangeBounds> {
        match self {
            Self::Range(r) => Some(r),
            _ => None,
        }
    }

    /// The text, if this is a scalar.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The members, if this is a group.
    pub fn as_group(&self) -> Option<&BTreeMap<String, FilterValue>> {
        match self {
            Self::Group(m) => Some(m),
            _ => None,
        }
    }

    /// Mutable members, if this is a group.
    pub fn as_group_mut(&mut self) -> Option<&mut BTreeMap<String, FilterValue>> {
        match self {
            Self::Group(m) => Some(m),
            _ => None,
        }
    }
}
