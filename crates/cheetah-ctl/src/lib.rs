//! Control plane for the Cheetah load-balancer pipeline.
//!
//! Brings a switch's forwarding tables back to a declared state:
//!
//! 1. clear every match table, selector and action profile in dependency
//!    order ([`cheetah_reconcile`])
//! 2. install the static client, bucket and server-id rules
//!    ([`StaticStateLoader`])
//! 3. zero the configured registers
//! 4. dump tables and registers for verification ([`Inspector`])
//!
//! The deployment (clients, backend hosts, registers) is read from a TOML
//! file, see [`Config`].

pub mod config;
pub mod counters;
pub mod error;
pub mod flow;
pub mod inspector;
pub mod loader;
pub mod pipeline;
pub mod rules;

pub use config::{Config, DEFAULT_CONFIG_PATH};
pub use counters::clear_counters;
pub use error::{ConfigError, LoadError, RunError};
pub use flow::{run, Phases, RunReport};
pub use inspector::{Inspector, Snapshot};
pub use loader::{LoadReport, StaticStateLoader};
pub use rules::{ForwardingRule, LoadPlan, MatchKey};
