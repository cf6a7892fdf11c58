//! Core types for stowage.
//!
//! This crate provides the data model shared by the operation engine:
//! item references, operation requests, history records, the status
//! taxonomy with its aggregation rule, and engine configuration.

mod config;
mod error;
mod item;
mod operation;
mod record;
mod status;

pub use config::{DeleteConfirmationPolicy, EngineConfig, EngineConfigBuilder};
pub use error::CoreError;
pub use item::{ItemKind, ItemReference};
pub use operation::{
    CollisionDecision, NameCollisionPolicy, OperationKind, OperationOptions,
    OperationOptionsBuilder, OperationRequest,
};
pub use record::OperationRecord;
pub use status::{ItemStatus, OperationOutcome, ReturnStatus, StatusAggregator};
