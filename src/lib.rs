//! guardsync: mirror an origin filtering appliance's configuration onto
//! replicas.

pub mod config;
pub mod model;
pub mod remote;
pub mod snapshot;
pub mod reconcile;
pub mod orchestrator;
pub mod observability;
pub mod lifecycle;

pub use config::schema::SyncConfig;
pub use orchestrator::{Orchestrator, RunReport};
pub use remote::{Appliance, Connector, HttpConnector};
