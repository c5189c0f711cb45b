//! # Query-String Codec
//!
//! One parameter per non-empty leaf path, named `{prefix}{path}`:
//!
//! | Kind | Parameter(s) | Value |
//! |------|--------------|-------|
//! | list | `f_riskGrades` | `CM1,CM3` (items escape `%` and `,`) |
//! | range | `f_financialMetrics.revenue` | `min-max`, either side may be empty |
//! | date range | `f_dateRange.startDate`, `f_dateRange.endDate` | `YYYY-MM-DD` |
//! | text | `f_searchQuery` | raw |
//!
//! The whole string is then form-urlencoded. Empty dimensions produce no
//! parameter, so the default state encodes to an empty query.

use std::collections::{BTreeMap, BTreeSet};

use pfe_core::{Clock, FilterPath, FilterSource};
use pfe_schema::{parse_date, DateBounds, DimensionKind, DimensionSpec, FilterValue, RangeBounds, Schema};
use pfe_state::{FilterSet, FilterState, Metadata, UiState};
use url::form_urlencoded;

use crate::report::{screen, DecodeReport};

const START_SUFFIX: &str = ".startDate";
const END_SUFFIX: &str = ".endDate";

// ─── Encoding ────────────────────────────────────────────────────────

/// Encode the non-empty leaf values of `state` as a query string (no
/// leading `?`), in table order.
pub fn encode_query(schema: &Schema, state: &FilterState, prefix: &str) -> String {
    let mut out = form_urlencoded::Serializer::new(String::new());
    append_params(&mut out, schema, state, prefix);
    out.finish()
}

/// Rewrite `existing` so its filter parameters describe `state`.
///
/// Parameters without `prefix` are kept in their original order ahead of
/// the filter parameters.
pub fn merge_query(existing: &str, schema: &Schema, state: &FilterState, prefix: &str) -> String {
    let mut out = form_urlencoded::Serializer::new(String::new());
    for (key, value) in form_urlencoded::parse(trim_query(existing).as_bytes()) {
        if !key.starts_with(prefix) {
            out.append_pair(&key, &value);
        }
    }
    append_params(&mut out, schema, state, prefix);
    out.finish()
}

fn append_params(
    out: &mut form_urlencoded::Serializer<'_, String>,
    schema: &Schema,
    state: &FilterState,
    prefix: &str,
) {
    for path in state.filters.active_paths(schema) {
        let Some(value) = state.filters.get(&path) else { continue };
        let name = format!("{prefix}{path}");
        match value {
            FilterValue::List(items) => {
                let joined: Vec<String> = items.iter().map(|i| escape_item(i)).collect();
                out.append_pair(&name, &joined.join(","));
            }
            FilterValue::Range(r) => {
                out.append_pair(&name, &encode_range(r));
            }
            FilterValue::DateRange(d) => {
                if let Some(start) = d.start_date {
                    out.append_pair(&format!("{name}{START_SUFFIX}"), &start.format("%Y-%m-%d").to_string());
                }
                if let Some(end) = d.end_date {
                    out.append_pair(&format!("{name}{END_SUFFIX}"), &end.format("%Y-%m-%d").to_string());
                }
            }
            FilterValue::Text(s) => {
                out.append_pair(&name, s);
            }
            FilterValue::Group(_) => {}
        }
    }
}

fn escape_item(item: &str) -> String {
    item.replace('%', "%25").replace(',', "%2C")
}

fn unescape_item(item: &str) -> String {
    item.replace("%2C", ",").replace("%2c", ",").replace("%25", "%")
}

fn encode_range(r: &RangeBounds) -> String {
    let side = |b: Option<f64>| b.map(|v| v.to_string()).unwrap_or_default();
    format!("{}-{}", side(r.min), side(r.max))
}

/// Split `min-max`. The separator is the first `-` that follows a digit or
/// `.`; failing that, a leading `-` means "no minimum".
fn decode_range(raw: &str) -> Result<RangeBounds, String> {
    let bytes = raw.as_bytes();
    let sep = (1..bytes.len())
        .find(|&i| bytes[i] == b'-' && (bytes[i - 1].is_ascii_digit() || bytes[i - 1] == b'.'))
        .or_else(|| raw.starts_with('-').then_some(0))
        .ok_or_else(|| format!("{raw:?} is not of the form min-max"))?;
    let side = |s: &str| -> Result<Option<f64>, String> {
        if s.is_empty() {
            return Ok(None);
        }
        let v: f64 = s.parse().map_err(|_| format!("{s:?} is not a number"))?;
        if v.is_finite() {
            Ok(Some(v))
        } else {
            Err(format!("{s:?} is not finite"))
        }
    };
    Ok(RangeBounds::new(side(&raw[..sep])?, side(&raw[sep + 1..])?))
}

// ─── Decoding ────────────────────────────────────────────────────────

/// Decode the filter parameters of `query` (a leading `?` is ignored).
///
/// Returns `None` when no parameter carries `prefix`. Otherwise every leaf
/// is decoded independently; a leaf that fails to parse or validate keeps
/// its empty value and is reported, as is every unrecognised prefixed
/// parameter. When a parameter repeats, the last occurrence wins.
///
/// The resulting state has `source = url` and `version = 1`.
pub fn decode_query(
    schema: &Schema,
    query: &str,
    prefix: &str,
    clock: &dyn Clock,
) -> Option<(FilterState, DecodeReport)> {
    let params: BTreeMap<String, String> = form_urlencoded::parse(trim_query(query).as_bytes())
        .filter_map(|(k, v)| k.strip_prefix(prefix).map(|name| (name.to_string(), v.into_owned())))
        .collect();
    if params.is_empty() {
        return None;
    }

    let mut report = DecodeReport::default();
    let mut filters = FilterSet::defaults(schema);
    let mut consumed = BTreeSet::new();

    for (path, spec) in schema.leaf_paths() {
        let decoded = match &spec.kind {
            DimensionKind::DateRange => {
                let start_key = format!("{path}{START_SUFFIX}");
                let end_key = format!("{path}{END_SUFFIX}");
                let start = params.get(&start_key);
                let end = params.get(&end_key);
                consumed.insert(start_key);
                consumed.insert(end_key);
                if start.is_none() && end.is_none() {
                    continue;
                }
                decode_dates(start, end)
            }
            _ => {
                let key = path.to_string();
                let Some(raw) = params.get(&key) else { continue };
                consumed.insert(key);
                decode_leaf(spec, raw)
            }
        };
        match decoded {
            Ok(value) => {
                if let Err(err) = filters.set(schema, &path, value) {
                    report.discard(param_name(prefix, &path), err.to_string());
                }
            }
            Err(reason) => report.discard(param_name(prefix, &path), reason),
        }
    }

    for name in params.keys().filter(|k| !consumed.contains(*k)) {
        report.discard(format!("{prefix}{name}"), "unknown filter parameter");
    }
    screen(schema, &mut filters, &mut report);

    let now = clock.now();
    let metadata = Metadata {
        source: FilterSource::Url,
        ..Metadata::initial(now)
    };
    Some((
        FilterState {
            filters,
            metadata,
            ui: UiState::default(),
        },
        report,
    ))
}

fn param_name(prefix: &str, path: &FilterPath) -> String {
    format!("{prefix}{path}")
}

fn decode_leaf(spec: &DimensionSpec, raw: &str) -> Result<FilterValue, String> {
    match &spec.kind {
        DimensionKind::List { .. } => {
            if raw.is_empty() {
                return Ok(FilterValue::List(Vec::new()));
            }
            Ok(FilterValue::List(raw.split(',').map(unescape_item).collect()))
        }
        DimensionKind::Range { .. } => decode_range(raw).map(FilterValue::Range),
        DimensionKind::Text { .. } => Ok(FilterValue::Text(raw.to_string())),
        DimensionKind::DateRange | DimensionKind::Group { .. } => {
            Err(format!("{} is not a scalar parameter", spec.name))
        }
    }
}

fn decode_dates(start: Option<&String>, end: Option<&String>) -> Result<FilterValue, String> {
    let date = |raw: Option<&String>| -> Result<_, String> {
        match raw.map(|s| s.trim()).filter(|s| !s.is_empty()) {
            None => Ok(None),
            Some(s) => parse_date(s)
                .map(Some)
                .ok_or_else(|| format!("{s:?} is not an ISO-8601 date")),
        }
    };
    Ok(FilterValue::DateRange(DateBounds::new(date(start)?, date(end)?)))
}

fn trim_query(query: &str) -> &str {
    query.strip_prefix('?').unwrap_or(query)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use chrono::NaiveDate;
    use pfe_core::{FixedClock, Timestamp};
    use pfe_schema::Selection;
    use pfe_state::{FilterAction, Reducer};
    use proptest::prelude::*;

    fn clock() -> FixedClock {
        FixedClock::new(Timestamp::parse("2025-01-15T09:30:00Z").unwrap())
    }

    fn reducer() -> Reducer {
        Reducer::new(Arc::new(Schema::portfolio()), Arc::new(clock()))
    }

    fn path(s: &str) -> FilterPath {
        FilterPath::new(s).unwrap()
    }

    fn with(r: &Reducer, edits: Vec<(&str, FilterValue)>) -> FilterState {
        let actions: Vec<FilterAction> = edits
            .into_iter()
            .map(|(p, v)| FilterAction::update(path(p), v, FilterSource::Manual))
            .collect();
        r.reduce_all(&r.initial_state(), &actions)
    }

    #[test]
    fn test_default_state_encodes_empty() {
        let r = reducer();
        assert_eq!(encode_query(r.schema(), &r.initial_state(), "f_"), "");
    }

    #[test]
    fn test_encoding_shape() {
        let r = reducer();
        let state = with(
            &r,
            vec![
                ("riskGrades", FilterValue::list(["CM1", "CM3"])),
                ("financialMetrics.revenue", FilterValue::range(Some(100.0), None)),
                ("creditLimit", FilterValue::range(None, Some(5000.5))),
            ],
        );
        let q = encode_query(r.schema(), &state, "f_");
        assert_eq!(
            q,
            "f_riskGrades=CM1%2CCM3&f_financialMetrics.revenue=100-&f_creditLimit=-5000.5"
        );
    }

    #[test]
    fn test_no_prefixed_params_is_none() {
        let r = reducer();
        assert!(decode_query(r.schema(), "?page=2&sort=name", "f_", &clock()).is_none());
        assert!(decode_query(r.schema(), "", "f_", &clock()).is_none());
    }

    #[test]
    fn test_decoded_state_is_url_version_one() {
        let r = reducer();
        let (state, report) =
            decode_query(r.schema(), "?f_riskGrades=CM2&page=4", "f_", &clock()).unwrap();
        assert!(report.is_clean());
        assert_eq!(state.metadata.source, FilterSource::Url);
        assert_eq!(state.version(), 1);
        assert_eq!(state.filters.get(&path("riskGrades")), Some(&FilterValue::list(["CM2"])));
    }

    #[test]
    fn test_negative_range_bounds() {
        for (raw, min, max) in [
            ("-12.5--3", Some(-12.5), Some(-3.0)),
            ("-12.5-", Some(-12.5), None),
            ("-40", None, Some(40.0)),
            ("--40", None, Some(-40.0)),
            ("5-10", Some(5.0), Some(10.0)),
            ("-", None, None),
        ] {
            assert_eq!(decode_range(raw).unwrap(), RangeBounds::new(min, max), "{raw}");
        }
        assert!(decode_range("12").is_err());
        assert!(decode_range("a-b").is_err());
        assert!(decode_range("inf-").is_err());
    }

    #[test]
    fn test_bad_param_discarded_alone() {
        let r = reducer();
        let q = "f_riskGrades=CM9&f_regions=north,south&f_creditLimit=abc-&f_colour=red";
        let (state, report) = decode_query(r.schema(), q, "f_", &clock()).unwrap();
        assert_eq!(state.filters.get(&path("regions")), Some(&FilterValue::list(["north", "south"])));
        assert_eq!(state.filters.get(&path("riskGrades")), Some(&FilterValue::List(vec![])));
        assert_eq!(state.filters.get(&path("creditLimit")), Some(&FilterValue::range(None, None)));
        let mut fields: Vec<&str> = report.discarded.iter().map(|d| d.field.as_str()).collect();
        fields.sort_unstable();
        assert_eq!(fields, vec!["f_colour", "f_creditLimit", "riskGrades"]);
    }

    #[test]
    fn test_last_duplicate_wins() {
        let r = reducer();
        let (state, _) =
            decode_query(r.schema(), "f_searchQuery=steel&f_searchQuery=cement", "f_", &clock()).unwrap();
        assert_eq!(state.filters.get(&path("searchQuery")), Some(&FilterValue::text("cement")));
    }

    #[test]
    fn test_dates_and_escaped_items() {
        let r = reducer();
        let state = with(
            &r,
            vec![
                (
                    "dateRange",
                    FilterValue::DateRange(DateBounds::new(None, NaiveDate::from_ymd_opt(2024, 12, 31))),
                ),
                ("complianceStatus.gst", FilterValue::list(["Not Registered", "Regular"])),
                ("searchQuery", FilterValue::text("a,b & 100% c=d")),
            ],
        );
        let q = encode_query(r.schema(), &state, "f_");
        assert!(q.contains("f_dateRange.endDate=2024-12-31"));
        assert!(!q.contains("startDate"));
        let (back, report) = decode_query(r.schema(), &q, "f_", &clock()).unwrap();
        assert!(report.is_clean(), "{report:?}");
        assert_eq!(back.filters, state.filters);
    }

    #[test]
    fn test_merge_keeps_foreign_params() {
        let r = reducer();
        let state = with(&r, vec![("riskGrades", FilterValue::list(["CM4"]))]);
        let merged = merge_query("?tab=grid&f_riskGrades=CM1&f_regions=east", r.schema(), &state, "f_");
        assert_eq!(merged, "tab=grid&f_riskGrades=CM4");
    }

    fn leaf_sample(spec: &DimensionSpec) -> FilterValue {
        match &spec.kind {
            DimensionKind::List { vocabulary, selection } => match (vocabulary, selection) {
                (Some(words), Selection::Multi) => FilterValue::list(words.iter().rev().cloned()),
                (Some(words), Selection::Single) => FilterValue::list(words.last().cloned()),
                (None, _) => FilterValue::list(["alpha, beta", "50%"]),
            },
            DimensionKind::Range { domain } => {
                FilterValue::range(Some(domain.min), Some(domain.min + (domain.max - domain.min) / 3.0))
            }
            DimensionKind::DateRange => FilterValue::DateRange(DateBounds::new(
                NaiveDate::from_ymd_opt(2024, 4, 1),
                NaiveDate::from_ymd_opt(2025, 3, 31),
            )),
            DimensionKind::Text { .. } => FilterValue::text("steel, tubes & pipes"),
            DimensionKind::Group { .. } => unreachable!("leaf paths never name a group"),
        }
    }

    #[test]
    fn test_every_single_leaf_state_round_trips() {
        let r = reducer();
        for (leaf, spec) in r.schema().leaf_paths() {
            let state = r.reduce(
                &r.initial_state(),
                &FilterAction::update(leaf.clone(), leaf_sample(spec), FilterSource::Manual),
            );
            assert_eq!(state.version(), 2, "{leaf}");
            let q = encode_query(r.schema(), &state, "f_");
            assert!(q.starts_with(&format!("f_{leaf}")), "{leaf}: {q}");
            let (back, report) = decode_query(r.schema(), &q, "f_", &clock()).unwrap();
            assert!(report.is_clean(), "{leaf}: {report:?}");
            assert_eq!(back.filters, state.filters, "{leaf}");
        }
    }

    fn sorted_pair(a: f64, b: f64) -> (f64, f64) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    proptest! {
        #[test]
        fn prop_reachable_states_round_trip(
            grades in proptest::sample::subsequence(pfe_schema::RISK_GRADES.to_vec(), 0..=7),
            audit in proptest::sample::subsequence(vec!["Unqualified", "Qualified", "Adverse", "Disclaimer", "Pending"], 0..=5),
            margin in (-100.0f64..100.0, -100.0f64..100.0),
            revenue_min in proptest::option::of(0.0f64..1_000_000.0),
            search in "[a-zA-Z0-9,%&=+ ]{0,40}",
        ) {
            let r = reducer();
            let (lo, hi) = sorted_pair(margin.0, margin.1);
            let state = with(&r, vec![
                ("riskGrades", FilterValue::list(grades)),
                ("complianceStatus.audit", FilterValue::list(audit)),
                ("financialMetrics.ebitdaMargin", FilterValue::range(Some(lo), Some(hi))),
                ("financialMetrics.revenue", FilterValue::range(revenue_min, None)),
                ("searchQuery", FilterValue::text(search)),
            ]);
            let q = encode_query(r.schema(), &state, "f_");
            match decode_query(r.schema(), &q, "f_", &clock()) {
                Some((back, report)) => {
                    prop_assert!(report.is_clean());
                    prop_assert_eq!(back.filters, state.filters);
                }
                None => prop_assert!(state.filters.is_default()),
            }
        }
    }
}
