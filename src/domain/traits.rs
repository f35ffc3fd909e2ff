use super::{Container, LabeledContainer, ServiceRequest, SpecMap};
use anyhow::Result;
use std::fmt::Debug;

/// Result of launching a sync process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// A service with the same identity is already up. Not an error.
    AlreadyRunning,
}

/// Result of tearing down a sync process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    /// Nothing to remove; the service was already gone.
    AlreadyStopped,
}

/// Label equality filter used to list containers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelFilter {
    pub labels: Vec<(String, String)>,
}

impl LabelFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.push((key.into(), value.into()));
        self
    }

    /// Parses a `key=value,key2=value2` selector expression. Terms without
    /// `=` match on presence of the key with an empty value.
    pub fn parse(selector: &str) -> Self {
        selector
            .split(',')
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .fold(Self::new(), |filter, term| match term.split_once('=') {
                Some((k, v)) => filter.with(k.trim(), v.trim()),
                None => filter.with(term, ""),
            })
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Trait for container runtime operations
pub trait ContainerRuntime: Send + Sync + Debug {
    /// List all containers carrying every label in `filter`
    fn list_containers(&self, filter: &LabelFilter) -> Result<Vec<LabeledContainer>>;

    /// List running containers matching a pod, a label selector and a container name
    fn find_containers(&self, pod: &str, selector: &str, container: &str)
    -> Result<Vec<Container>>;

    /// Launch a sync process
    fn run_service(&self, request: &ServiceRequest) -> Result<StartOutcome>;

    /// Remove a sync process by runtime id
    fn remove_service(&self, id: &str) -> Result<StopOutcome>;
}

/// Source of the desired state.
pub trait SpecCatalog {
    fn all_specs(&self) -> Result<SpecMap>;
}

impl SpecCatalog for SpecMap {
    fn all_specs(&self) -> Result<SpecMap> {
        Ok(self.clone())
    }
}
