pub mod config;
pub mod podman_adapter;
pub mod spec_catalog;

pub use podman_adapter::PodmanAdapter;
pub use spec_catalog::FileSpecCatalog;
