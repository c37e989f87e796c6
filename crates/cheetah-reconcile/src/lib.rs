//! Dependency-ordered, batched table reconciliation.
//!
//! This crate brings a pipeline's table state back to empty so that a
//! declared configuration can be installed on a clean slate:
//!
//! - [`Catalog`]: Enumerates objects of the requested kinds
//! - [`ordering`]: The fixed precedence over kind groups
//! - [`batch`]: Scoped device transactions around a run of removals
//! - [`TableReconciler`]: Clears one object, or every group in order
//! - [`ClearOutcome`]: Per-object result; failures never escape an object
//!
//! # Ordering
//!
//! Match entries reference selector groups and selector groups reference
//! action-profile members, so objects are cleared group by group:
//!
//! ```text
//! MATCH_DIRECT, MATCH_INDIRECT_SELECTOR ──> SELECTOR ──> ACTION_PROFILE
//! ```
//!
//! # Example
//!
//! ```ignore
//! use cheetah_reconcile::{ReconcilerConfig, TableReconciler};
//!
//! let reconciler = TableReconciler::new(session.clone(), ReconcilerConfig::default());
//! let report = reconciler.clear_all().await?;
//! for line in report.lines() {
//!     println!("{}", line);
//! }
//! ```

pub mod batch;
mod catalog;
mod error;
pub mod ordering;
mod outcome;
mod reconciler;

pub use batch::{with_batch, BatchScope, Batched};
pub use catalog::Catalog;
pub use error::{ClearFailure, ReconcileError, Result};
pub use ordering::{ordered_kind_groups, KindGroup};
pub use outcome::{ClearOutcome, DefaultReset, ObjectReport, ReconcileReport};
pub use reconciler::{ReconcilerConfig, TableReconciler};
