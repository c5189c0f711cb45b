//! # Filter Paths
//!
//! A `FilterPath` addresses either a top-level dimension (`riskGrades`) or a
//! member of a grouped dimension (`financialMetrics.revenue`). Paths are
//! purely syntactic here; whether a path names a real dimension is decided
//! by the schema table.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::PfeError;

/// A validated dotted filter path.
///
/// Segments are non-empty and consist of ASCII alphanumerics or `_`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FilterPath(String);

impl FilterPath {
    /// Parse and validate a dotted path.
    pub fn new(path: impl Into<String>) -> Result<Self, PfeError> {
        let path = path.into();
        if path.is_empty() {
            return Err(PfeError::InvalidPath {
                path,
                reason: "empty path".into(),
            });
        }
        for segment in path.split('.') {
            if segment.is_empty() {
                return Err(PfeError::InvalidPath {
                    path: path.clone(),
                    reason: "empty segment".into(),
                });
            }
            if !segment.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(PfeError::InvalidPath {
                    path: path.clone(),
                    reason: format!("invalid character in segment {segment:?}"),
                });
            }
        }
        Ok(Self(path))
    }

    /// Join a parent path and a member name.
    pub fn child(&self, member: &str) -> Result<Self, PfeError> {
        Self::new(format!("{}.{member}", self.0))
    }

    /// The full dotted text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate over the path segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    /// The top-level dimension name.
    pub fn root(&self) -> &str {
        self.0.split('.').next().unwrap_or(&self.0)
    }

    /// True when the path addresses a member of a grouped dimension.
    pub fn is_nested(&self) -> bool {
        self.0.contains('.')
    }

    /// This path and every ancestor, longest first.
    ///
    /// `financialMetrics.revenue` yields itself, then `financialMetrics`.
    pub fn lineage(&self) -> Vec<FilterPath> {
        let mut out = vec![self.clone()];
        let mut current = self.0.as_str();
        while let Some(idx) = current.rfind('.') {
            current = &current[..idx];
            out.push(FilterPath(current.to_string()));
        }
        out
    }
}

impl fmt::Display for FilterPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for FilterPath {
    type Err = PfeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for FilterPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for FilterPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        FilterPath::new(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_level_path() {
        let p = FilterPath::new("riskGrades").unwrap();
        assert_eq!(p.root(), "riskGrades");
        assert!(!p.is_nested());
        assert_eq!(p.segments().count(), 1);
    }

    #[test]
    fn test_nested_path() {
        let p = FilterPath::new("financialMetrics.revenue").unwrap();
        assert_eq!(p.root(), "financialMetrics");
        assert!(p.is_nested());
        assert_eq!(p.segments().collect::<Vec<_>>(), vec!["financialMetrics", "revenue"]);
    }

    #[test]
    fn test_invalid_paths() {
        assert!(FilterPath::new("").is_err());
        assert!(FilterPath::new("a..b").is_err());
        assert!(FilterPath::new(".a").is_err());
        assert!(FilterPath::new("a.").is_err());
        assert!(FilterPath::new("a b").is_err());
        assert!(FilterPath::new("a-b").is_err());
    }

    #[test]
    fn test_lineage() {
        let p = FilterPath::new("complianceStatus.gst").unwrap();
        let lineage: Vec<String> = p.lineage().iter().map(|p| p.to_string()).collect();
        assert_eq!(lineage, vec!["complianceStatus.gst", "complianceStatus"]);
    }

    #[test]
    fn test_child() {
        let p = FilterPath::new("financialMetrics").unwrap();
        assert_eq!(p.child("revenue").unwrap().as_str(), "financialMetrics.revenue");
        assert!(p.child("").is_err());
    }

    #[test]
    fn test_serde_rejects_invalid() {
        assert!(serde_json::from_str::<FilterPath>("\"a..b\"").is_err());
        let p: FilterPath = serde_json::from_str("\"regions\"").unwrap();
        assert_eq!(p.as_str(), "regions");
    }
}
