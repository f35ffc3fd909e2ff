mod service_set;
mod sync_service;

pub use service_set::{ManagedServiceSet, ReconcileReport};
pub use sync_service::SyncService;
