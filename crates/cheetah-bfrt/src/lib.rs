//! BFRuntime session boundary for the Cheetah load-balancer pipeline.
//!
//! The dataplane program is compiled separately and exposes its tables,
//! selectors, action profiles and registers as named objects. This crate
//! models those objects and the operations the control plane needs on them.
//!
//! # Architecture
//!
//! - [`types`]: Object kinds, entries, keys and register cells
//! - [`error`]: bf_status codes and the [`BfrtError`] type
//! - [`session`]: The [`BfrtSession`] trait, one live connection to a pipeline
//! - [`sim`]: [`SimSession`], an in-memory pipeline with fault injection
//!
//! # Example
//!
//! ```ignore
//! use cheetah_bfrt::{BfrtSession, BfrtResult};
//!
//! async fn count(session: &dyn BfrtSession, table: &str) -> BfrtResult<usize> {
//!     match session.entries(table).await {
//!         Ok(entries) => Ok(entries.len()),
//!         Err(e) if e.is_not_found() => Ok(0),
//!         Err(e) => Err(e),
//!     }
//! }
//! ```

pub mod error;
pub mod session;
pub mod sim;
pub mod types;

pub use error::{BfrtError, BfrtResult, BfrtStatus};
pub use session::BfrtSession;
pub use sim::{SessionCall, SimObject, SimRegister, SimSession, SimSnapshot};
pub use types::{
    ActionSpec, DataplaneObject, DirectCounter, Entry, EntryKey, EntryRef, FieldValue,
    ObjectKind, RegisterCell, ACTION_MEMBER_ID, COUNTER_SPEC_BYTES, COUNTER_SPEC_PKTS,
    SELECTOR_GROUP_ID,
};
