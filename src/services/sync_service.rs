use crate::domain::{
    CONTAINER_LABEL, Container, ContainerRuntime, MANAGED_LABEL, MANAGED_VALUE, ManagedService,
    NAME_LABEL, NODE_LABEL, POD_LABEL, ServiceRequest, Specification, StartOutcome, StopOutcome,
    service_container_name,
};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// One sync process bound to a single target container.
pub struct SyncService {
    runtime: Arc<dyn ContainerRuntime>,
    name: String,
    container: Container,
    spec: Specification,
    /// Runtime id of a service found by discovery
    service_id: Option<String>,
}

impl SyncService {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        name: &str,
        container: Container,
        spec: Specification,
    ) -> Self {
        Self {
            runtime,
            name: name.to_string(),
            container,
            spec,
            service_id: None,
        }
    }

    /// Handle on a discovered service. Only good for stopping: the target id
    /// and sync parameters are not known from labels.
    pub fn from_managed(runtime: Arc<dyn ContainerRuntime>, service: &ManagedService) -> Self {
        let binding = &service.container;
        Self {
            runtime,
            name: service.name.clone(),
            container: Container::new(
                "",
                binding.pod_name.as_str(),
                binding.name.as_str(),
                binding.node_name.as_str(),
            ),
            spec: Specification::default(),
            service_id: Some(service.id.clone()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the service's own container. Stable for a given name and
    /// binding so a second start collides with the first.
    pub fn container_name(&self) -> String {
        service_container_name(&self.name, &self.container.binding())
    }

    pub fn labels(&self) -> BTreeMap<String, String> {
        [
            (MANAGED_LABEL, MANAGED_VALUE),
            (NAME_LABEL, self.name.as_str()),
            (POD_LABEL, self.container.pod_name.as_str()),
            (CONTAINER_LABEL, self.container.name.as_str()),
            (NODE_LABEL, self.container.node_name.as_str()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    fn request(&self) -> ServiceRequest {
        ServiceRequest {
            container_name: self.container_name(),
            target_id: self.container.id.clone(),
            labels: self.labels(),
            sync: self.spec.sync.clone(),
        }
    }

    pub fn start(&self) -> Result<StartOutcome> {
        let outcome = self
            .runtime
            .run_service(&self.request())
            .with_context(|| format!("starting sync service {}", self.name))?;

        if outcome == StartOutcome::Started {
            info!(
                name = %self.name,
                pod = %self.container.pod_name,
                container = %self.container.name,
                node = %self.container.node_name,
                "started sync service"
            );
        }

        Ok(outcome)
    }

    /// Removes the service's container, by runtime id when discovery
    /// supplied one and by name otherwise.
    pub fn stop(&self) -> Result<StopOutcome> {
        let target = match &self.service_id {
            Some(id) => id.clone(),
            None => self.container_name(),
        };
        let outcome = self
            .runtime
            .remove_service(&target)
            .with_context(|| format!("stopping sync service {}", self.name))?;

        debug!(name = %self.name, ?outcome, "stop requested");
        Ok(outcome)
    }
}
