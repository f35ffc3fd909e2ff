mod container;
mod service;
mod spec;
pub mod traits;

pub use container::{Container, ContainerRef, LabeledContainer};
pub use service::{
    CONTAINER_LABEL, MANAGED_LABEL, MANAGED_VALUE, ManagedService, NAME_LABEL, NODE_LABEL,
    POD_LABEL, ServiceRequest, service_container_name,
};
pub use spec::{SpecMap, Specification, SyncParams};
pub use traits::{ContainerRuntime, LabelFilter, SpecCatalog, StartOutcome, StopOutcome};
