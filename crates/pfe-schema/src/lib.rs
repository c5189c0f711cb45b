//! # pfe-schema: The Dimension Table
//!
//! Declarative description of every filter dimension: its kind, its
//! canonical empty value, its closed vocabulary or numeric domain, and how
//! chart clicks select it. Every other component consults this table instead
//! of probing the runtime shape of a value.
//!
//! ## Modules
//!
//! - [`kind`]: `DimensionKind`, `RangeDomain`, `Selection`.
//! - [`value`]: `FilterValue` and its range/date payloads, serialized in
//!   the canonical shape consumed by the query layer.
//! - [`table`]: `Schema`, `DimensionSpec`, and the built-in
//!   [`Schema::portfolio()`] table.
//! - [`decode`]: schema-directed decoding of JSON fragments into values.
//! - [`check`]: JSON-Schema fragments generated per kind and checked with
//!   the `jsonschema` crate before typed decoding.
//!
//! ## Crate Policy
//!
//! - Adding a dimension is a table entry, never a new code path.
//! - Decoding is a trust boundary: malformed fragments are rejected with
//!   structured violations naming the offending path.

pub mod check;
pub mod decode;
pub mod error;
pub mod kind;
pub mod table;
pub mod value;

pub use check::{kind_schema, KindChecker};
pub use decode::parse_date;
pub use error::{SchemaError, Violation};
pub use kind::{DimensionKind, RangeDomain, Selection, ValueKind};
pub use table::{DimensionSpec, Schema, RISK_GRADES, SEARCH_DIMENSION};
pub use value::{DateBounds, FilterValue, RangeBounds};
