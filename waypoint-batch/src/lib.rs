//! Batch coordinator for Waypoint
//!
//! Queues heterogeneous HTTP operations, orders them by dependency and
//! priority, and dispatches them in bounded concurrent batches. GETs in a
//! batch are coalesced into one multi-URL request when possible.

pub mod config;
pub mod coordinator;
pub mod errors;
pub mod executor;
pub mod operation;
pub mod queue;

pub use config::BatchConfig;
pub use coordinator::{BatchCoordinator, BatchCoordinatorBuilder, BatchStats};
pub use errors::{BatchError, BatchResult};
pub use executor::OperationExecutor;
pub use operation::{default_operation_name, Operation, OperationRequest, OperationResult};
pub use queue::OperationQueue;
