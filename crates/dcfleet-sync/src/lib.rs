mod audit;
mod pass;

pub mod cache;
pub mod engine;
pub mod error;
pub mod handler;
pub mod resource;

pub use cache::MasterResourceCache;
pub use engine::SyncEngine;
pub use error::SyncError;
pub use handler::{ResourceSyncHandler, SyncOutcome};
pub use resource::{MasterResource, ObservedResource, ResourceProvider};
