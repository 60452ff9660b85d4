//! Reconciliation subsystem.
//!
//! # Data Flow
//! ```text
//! origin Snapshot + replica Snapshot
//!     → entities.rs (per selected entity kind)
//!         → diff.rs (keyed add / update / delete sets)
//!         → apply.rs (ordered, best-effort execution through a sink)
//!             → sinks.rs (item operations → Appliance calls)
//!         → wholesale.rs (blocked services, access list)
//!     → toggles.rs (scalar and composite settings)
//!     → EntityReport / ToggleReport
//! ```
//!
//! # Design Decisions
//! - One generic keyed reconciler parameterized by identity, attribute
//!   equality and add/update/delete callbacks; entity kinds only supply those
//! - Item failures are recorded, never propagated: the rest of the batch,
//!   the other kinds and the toggles still run
//! - Delete/add ordering is a per entity kind policy, not a global rule
//! - Nothing is remembered between runs; every run re-derives the plan

pub mod apply;
pub mod diff;
pub mod entities;
pub mod report;
pub mod sinks;
pub mod toggles;
pub mod wholesale;

pub use apply::{apply, ApplyOrder, ApplyResult, ItemOutcome, ItemSink, Operation};
pub use diff::{dedup_last_wins, diff, Diff, Keyed, Update};
pub use entities::EntityReconciler;
pub use report::{EntityReport, ItemError};
pub use toggles::{Toggle, ToggleOutcome, ToggleReport, ToggleSynchronizer};
