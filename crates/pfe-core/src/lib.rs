//! # pfe-core: Foundational Types for the Portfolio Filter Engine
//!
//! Leaf crate of the workspace. Defines the primitives every other crate
//! shares: UTC timestamps and the injectable clock, the provenance tag
//! stamped on each mutation, dotted filter paths, session identifiers,
//! and the canonical byte pipeline used to derive stable conflict ids.
//!
//! ## Key Design Principles
//!
//! 1. **Newtypes for domain primitives.** `FilterPath` and `SessionId` are
//!    distinct types; no bare strings are passed where a path is expected.
//!
//! 2. **Injectable time.** Every transition that stamps a timestamp takes it
//!    from a [`Clock`]. Production code uses [`SystemClock`]; tests and the
//!    resolver's determinism guarantee rely on [`FixedClock`].
//!
//! 3. **Single provenance enum.** [`FilterSource`] is the one definition of
//!    edit origins, including the precedence order used for tie-breaks.
//!
//! 4. **Stable identities.** Anything that needs a deterministic identifier
//!    hashes [`CanonicalBytes`] through [`sha256_hex()`], so the same
//!    logical input always yields the same id.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `pfe-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod canonical;
pub mod digest;
pub mod error;
pub mod identity;
pub mod path;
pub mod source;
pub mod temporal;

pub use canonical::CanonicalBytes;
pub use digest::{sha256_hex, short_digest};
pub use error::{CanonicalizationError, PfeError};
pub use identity::SessionId;
pub use path::FilterPath;
pub use source::FilterSource;
pub use temporal::{Clock, FixedClock, SystemClock, Timestamp};
