//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! orchestrator / reconcile produce:
//!     → tracing events and spans (run_id, replica host, entity kind)
//!     → metrics.rs (operation, toggle and replica counters, run histogram)
//!
//! main installs the consumers:
//!     → logging.rs (pretty or JSON subscriber with env filter)
//!     → metrics.rs (optional Prometheus listener)
//! ```
//!
//! # Design Decisions
//! - Library code only emits; global subscriber and recorder setup happen in
//!   `main`, so tests run without any installed backend
//! - Metric updates are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use self::metrics::init_metrics;
