pub mod cli;
pub mod domain;
pub mod infra;
pub mod services;

// Make test_support available for integration tests
pub mod test_support;

pub use domain::{
    Container, ContainerRef, ContainerRuntime, ManagedService, SpecCatalog, SpecMap,
    Specification, StartOutcome, StopOutcome,
};
pub use infra::{FileSpecCatalog, PodmanAdapter};
pub use services::{ManagedServiceSet, ReconcileReport, SyncService};
