//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM / SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → every subscriber's recv() resolves
//!     → interval loop stops scheduling runs
//!     → the run in progress finishes (bounded by its own deadline)
//! ```
//!
//! # Design Decisions
//! - A run is never interrupted by a signal; only the next run is skipped
//! - Single-shot mode needs no lifecycle handling at all

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::{spawn_signal_handler, wait_for_signal};
