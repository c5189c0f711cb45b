//! # pfe-validate: Field and Combination Rules
//!
//! Pure evaluation of filter values and states. Nothing here dispatches an
//! action or mutates a state; callers decide what to do with the findings.
//!
//! - [`field`]: `validate_field` and `sanitize_field` for one dimension.
//! - [`combination`]: `validate_combination`: exclusion, contradiction,
//!   performance and data-availability conflicts.
//! - [`rules`]: the rule tables the combination checks read.
//! - [`issue`]: field issue variants and their stable codes.

pub mod combination;
pub mod field;
pub mod issue;
pub mod rules;

pub use combination::{conflict_id, validate_combination, CombinationContext};
pub use field::{sanitize_field, validate_field, validate_field_on, FieldValidation};
pub use issue::{codes, FieldIssue};
