//! Cross-field rule tables for the portfolio dimensions.
//!
//! Rules are data. A new exclusion or a new grade band is a table row.

/// Two list dimensions whose selections cannot co-occur.
///
/// Fires when `restricted` is active and every selected item lies in
/// `within`, while `other` is active and selects nothing from `compatible`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExclusionRule {
    /// Dimension whose restriction causes the exclusion.
    pub restricted: &'static str,
    /// Items that, when they make up the whole selection, trigger the rule.
    pub within: &'static [&'static str],
    /// The excluded dimension.
    pub other: &'static str,
    /// Items of `other` that remain possible.
    pub compatible: &'static [&'static str],
    /// Explanation used in the conflict message.
    pub reason: &'static str,
}

/// Typical numeric band of one category.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    /// Category item.
    pub category: &'static str,
    /// Lower edge, inclusive.
    pub lo: f64,
    /// Upper edge, inclusive.
    pub hi: f64,
}

const fn band(category: &'static str, lo: f64, hi: f64) -> Band {
    Band { category, lo, hi }
}

/// A categorical dimension whose items imply numeric bands on a range
/// dimension.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContradictionRule {
    /// List dimension.
    pub category: &'static str,
    /// Range dimension (may be a group member).
    pub range: &'static str,
    /// Band per category item. Items without a band never contradict.
    pub bands: &'static [Band],
    /// Noun for the range, used in the conflict message.
    pub label: &'static str,
}

/// Exclusion rules, evaluated in order.
pub const EXCLUSIONS: &[ExclusionRule] = &[
    ExclusionRule {
        restricted: "listingStatus",
        within: &["unlisted"],
        other: "creditRatings",
        compatible: &["NR"],
        reason: "unlisted companies carry no external rating other than NR",
    },
    ExclusionRule {
        restricted: "processingStatus",
        within: &["pending", "failed"],
        other: "riskGrades",
        compatible: &[],
        reason: "companies that have not completed processing have no risk grade",
    },
];

/// Revenue bands (crore) typical of each risk grade.
pub const REVENUE_BANDS: &[Band] = &[
    band("CM1", 1000.0, f64::INFINITY),
    band("CM2", 500.0, 5000.0),
    band("CM3", 250.0, 2500.0),
    band("CM4", 100.0, 1000.0),
    band("CM5", 50.0, 500.0),
    band("CM6", 10.0, 250.0),
    band("CM7", 0.0, 100.0),
];

/// Debt/equity bands typical of each risk grade.
pub const LEVERAGE_BANDS: &[Band] = &[
    band("CM1", 0.0, 1.0),
    band("CM2", 0.0, 1.5),
    band("CM3", 0.0, 2.0),
    band("CM4", 0.5, 3.0),
    band("CM5", 1.0, 4.0),
    band("CM6", 1.5, 6.0),
    band("CM7", 2.0, 50.0),
];

/// Contradiction rules, evaluated in order.
pub const CONTRADICTIONS: &[ContradictionRule] = &[
    ContradictionRule {
        category: "riskGrades",
        range: "financialMetrics.revenue",
        bands: REVENUE_BANDS,
        label: "revenue",
    },
    ContradictionRule {
        category: "riskGrades",
        range: "financialMetrics.debtEquityRatio",
        bands: LEVERAGE_BANDS,
        label: "debt/equity",
    },
];
