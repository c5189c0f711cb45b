//! # The Dimension Table
//!
//! `Schema` is an ordered list of [`DimensionSpec`]s. Dotted paths are
//! resolved by walking group members by name, so a new nested dimension is a
//! new member entry and nothing else.
//!
//! ## Built-in Portfolio Table
//!
//! | Path | Kind | Notes |
//! |------|------|-------|
//! | `riskGrades` | list | `CM1`..`CM7`, multi-select |
//! | `industries` | list | closed, multi-select, high-cardinality |
//! | `regions` | list | closed, multi-select, high-cardinality |
//! | `listingStatus` | list | closed, single-select |
//! | `creditRatings` | list | `AAA`..`D`, `NR`, multi-select |
//! | `processingStatus` | list | closed, single-select |
//! | `complianceStatus.{gst,epfo,audit}` | group of lists | by authority |
//! | `financialMetrics.{revenue,ebitdaMargin,debtEquityRatio,currentRatio}` | group of ranges | high-cardinality |
//! | `creditLimit` | range | |
//! | `dateRange` | date range | |
//! | `searchQuery` | text | max 200 chars |

use std::collections::{BTreeMap, HashSet};

use pfe_core::FilterPath;

use crate::error::SchemaError;
use crate::kind::{DimensionKind, RangeDomain, Selection};
use crate::value::{DateBounds, FilterValue, RangeBounds};

/// Name of the free-text dimension in the portfolio table.
pub const SEARCH_DIMENSION: &str = "searchQuery";

/// One dimension (or group member) in the table.
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionSpec {
    /// Key used in paths and serialized filter sets.
    pub name: String,
    /// Display label.
    pub label: String,
    /// Declared kind.
    pub kind: DimensionKind,
    /// Counts towards the performance threshold when active.
    pub high_cardinality: bool,
}

impl DimensionSpec {
    /// A list dimension.
    pub fn list(
        name: &str,
        label: &str,
        vocabulary: Option<&[&str]>,
        selection: Selection,
    ) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            kind: DimensionKind::List {
                vocabulary: vocabulary.map(|v| v.iter().map(|s| s.to_string()).collect()),
                selection,
            },
            high_cardinality: false,
        }
    }

    /// A numeric range dimension.
    pub fn range(name: &str, label: &str, domain: RangeDomain) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            kind: DimensionKind::Range { domain },
            high_cardinality: false,
        }
    }

    /// A date window dimension.
    pub fn date_range(name: &str, label: &str) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            kind: DimensionKind::DateRange,
            high_cardinality: false,
        }
    }

    /// A free-text dimension.
    pub fn text(name: &str, label: &str, max_len: usize) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            kind: DimensionKind::Text { max_len },
            high_cardinality: false,
        }
    }

    /// A group of member dimensions.
    pub fn group(name: &str, label: &str, members: Vec<DimensionSpec>) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            kind: DimensionKind::Group { members },
            high_cardinality: false,
        }
    }

    /// Mark as high-cardinality.
    pub fn high_cardinality(mut self) -> Self {
        self.high_cardinality = true;
        self
    }

    /// The canonical empty value of this dimension.
    pub fn empty_value(&self) -> FilterValue {
        match &self.kind {
            DimensionKind::List { .. } => FilterValue::List(Vec::new()),
            DimensionKind::Range { .. } => FilterValue::Range(RangeBounds::default()),
            DimensionKind::DateRange => FilterValue::DateRange(DateBounds::default()),
            DimensionKind::Text { .. } => FilterValue::Text(String::new()),
            DimensionKind::Group { members } => FilterValue::Group(
                members
                    .iter()
                    .map(|m| (m.name.clone(), m.empty_value()))
                    .collect(),
            ),
        }
    }

    /// Look up a direct group member by name.
    pub fn member(&self, name: &str) -> Option<&DimensionSpec> {
        match &self.kind {
            DimensionKind::Group { members } => members.iter().find(|m| m.name == name),
            _ => None,
        }
    }

    /// Closed vocabulary, if this is a list with one.
    pub fn vocabulary(&self) -> Option<&[String]> {
        match &self.kind {
            DimensionKind::List {
                vocabulary: Some(v),
                ..
            } => Some(v),
            _ => None,
        }
    }

    /// Whether `value` holds exactly this dimension's kind, recursively.
    ///
    /// A group value must carry every declared member and nothing else.
    pub fn conforms(&self, value: &FilterValue) -> bool {
        match (&self.kind, value) {
            (DimensionKind::List { .. }, FilterValue::List(_))
            | (DimensionKind::Range { .. }, FilterValue::Range(_))
            | (DimensionKind::DateRange, FilterValue::DateRange(_))
            | (DimensionKind::Text { .. }, FilterValue::Text(_)) => true,
            (DimensionKind::Group { members }, FilterValue::Group(values)) => {
                values.len() == members.len()
                    && members.iter().all(|m| {
                        values
                            .get(&m.name)
                            .map(|v| m.conforms(v))
                            .unwrap_or(false)
                    })
            }
            _ => false,
        }
    }
}

/// The dimension table.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    dimensions: Vec<DimensionSpec>,
}

impl Schema {
    /// Build a table, checking that names are unique per level and usable
    /// as path segments.
    pub fn new(dimensions: Vec<DimensionSpec>) -> Result<Self, SchemaError> {
        check_level(&dimensions, "")?;
        Ok(Self { dimensions })
    }

    /// Top-level dimensions in declaration order.
    pub fn dimensions(&self) -> &[DimensionSpec] {
        &self.dimensions
    }

    /// Look up a top-level dimension.
    pub fn dimension(&self, name: &str) -> Option<&DimensionSpec> {
        self.dimensions.iter().find(|d| d.name == name)
    }

    /// Resolve a dotted path to its spec by walking group members.
    pub fn resolve(&self, path: &FilterPath) -> Option<&DimensionSpec> {
        let mut segments = path.segments();
        let mut spec = self.dimension(segments.next()?)?;
        for segment in segments {
            spec = spec.member(segment)?;
        }
        Some(spec)
    }

    /// Canonical empty value at `path`.
    pub fn empty_value(&self, path: &FilterPath) -> Option<FilterValue> {
        self.resolve(path).map(DimensionSpec::empty_value)
    }

    /// Every top-level dimension at its empty value.
    pub fn default_values(&self) -> BTreeMap<String, FilterValue> {
        self.dimensions
            .iter()
            .map(|d| (d.name.clone(), d.empty_value()))
            .collect()
    }

    /// Every non-group path in declaration order, paired with its spec.
    pub fn leaf_paths(&self) -> Vec<(FilterPath, &DimensionSpec)> {
        let mut out = Vec::new();
        for dim in &self.dimensions {
            if let Ok(path) = FilterPath::new(dim.name.clone()) {
                collect_leaves(path, dim, &mut out);
            }
        }
        out
    }

    /// The built-in credit-portfolio table.
    pub fn portfolio() -> Self {
        Self {
            dimensions: portfolio_dimensions(),
        }
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::portfolio()
    }
}

fn collect_leaves<'a>(
    path: FilterPath,
    spec: &'a DimensionSpec,
    out: &mut Vec<(FilterPath, &'a DimensionSpec)>,
) {
    match &spec.kind {
        DimensionKind::Group { members } => {
            for member in members {
                if let Ok(child) = path.child(&member.name) {
                    collect_leaves(child, member, out);
                }
            }
        }
        _ => out.push((path, spec)),
    }
}

fn check_level(dims: &[DimensionSpec], parent: &str) -> Result<(), SchemaError> {
    let mut seen = HashSet::new();
    for dim in dims {
        let full = if parent.is_empty() {
            dim.name.clone()
        } else {
            format!("{parent}.{}", dim.name)
        };
        if dim.name.contains('.') || FilterPath::new(dim.name.clone()).is_err() {
            return Err(SchemaError::InvalidTable(format!(
                "dimension name {full:?} is not a valid path segment"
            )));
        }
        if !seen.insert(dim.name.as_str()) {
            return Err(SchemaError::InvalidTable(format!(
                "duplicate dimension {full:?}"
            )));
        }
        match &dim.kind {
            DimensionKind::Range { domain } if !(domain.min <= domain.max) => {
                return Err(SchemaError::InvalidTable(format!(
                    "range {full:?} has an empty domain"
                )));
            }
            DimensionKind::Group { members } => {
                if members.is_empty() {
                    return Err(SchemaError::InvalidTable(format!(
                        "group {full:?} has no members"
                    )));
                }
                check_level(members, &full)?;
            }
            _ => {}
        }
    }
    Ok(())
}

/// Risk grades, best first.
pub const RISK_GRADES: &[&str] = &["CM1", "CM2", "CM3", "CM4", "CM5", "CM6", "CM7"];

fn portfolio_dimensions() -> Vec<DimensionSpec> {
    vec![
        DimensionSpec::list("riskGrades", "Risk grade", Some(RISK_GRADES), Selection::Multi),
        DimensionSpec::list(
            "industries",
            "Industry",
            Some(&[
                "manufacturing",
                "services",
                "trading",
                "construction",
                "technology",
                "healthcare",
                "retail",
                "agriculture",
                "financial_services",
                "logistics",
                "energy",
                "real_estate",
            ]),
            Selection::Multi,
        )
        .high_cardinality(),
        DimensionSpec::list(
            "regions",
            "Region",
            Some(&["north", "south", "east", "west", "central", "northeast"]),
            Selection::Multi,
        )
        .high_cardinality(),
        DimensionSpec::list(
            "listingStatus",
            "Listing status",
            Some(&["listed", "unlisted", "delisted", "suspended"]),
            Selection::Single,
        ),
        DimensionSpec::list(
            "creditRatings",
            "External credit rating",
            Some(&["AAA", "AA", "A", "BBB", "BB", "B", "C", "D", "NR"]),
            Selection::Multi,
        ),
        DimensionSpec::list(
            "processingStatus",
            "Processing status",
            Some(&["pending", "processing", "completed", "failed"]),
            Selection::Single,
        ),
        DimensionSpec::group(
            "complianceStatus",
            "Compliance status",
            vec![
                DimensionSpec::list(
                    "gst",
                    "GST",
                    Some(&["Regular", "Cancelled", "Suspended", "Not Registered"]),
                    Selection::Multi,
                ),
                DimensionSpec::list(
                    "epfo",
                    "EPFO",
                    Some(&["Compliant", "Non-Compliant", "Not Registered"]),
                    Selection::Multi,
                ),
                DimensionSpec::list(
                    "audit",
                    "Audit opinion",
                    Some(&["Unqualified", "Qualified", "Adverse", "Disclaimer", "Pending"]),
                    Selection::Multi,
                ),
            ],
        ),
        DimensionSpec::group(
            "financialMetrics",
            "Financial metrics",
            vec![
                DimensionSpec::range("revenue", "Revenue (crore)", RangeDomain::new(0.0, 1_000_000.0))
                    .high_cardinality(),
                DimensionSpec::range("ebitdaMargin", "EBITDA margin (%)", RangeDomain::new(-100.0, 100.0))
                    .high_cardinality(),
                DimensionSpec::range("debtEquityRatio", "Debt / equity", RangeDomain::new(0.0, 50.0))
                    .high_cardinality(),
                DimensionSpec::range("currentRatio", "Current ratio", RangeDomain::new(0.0, 20.0))
                    .high_cardinality(),
            ],
        ),
        DimensionSpec::range("creditLimit", "Credit limit (lakh)", RangeDomain::new(0.0, 100_000.0)),
        DimensionSpec::date_range("dateRange", "Reporting period"),
        DimensionSpec::text(SEARCH_DIMENSION, "Search", 200),
    ]
}
