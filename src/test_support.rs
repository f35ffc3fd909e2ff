use crate::domain::{
    CONTAINER_LABEL, Container, ContainerRef, ContainerRuntime, LabelFilter, LabeledContainer,
    MANAGED_LABEL, MANAGED_VALUE, NAME_LABEL, NODE_LABEL, POD_LABEL, ServiceRequest, StartOutcome,
    StopOutcome, service_container_name,
};
use anyhow::{Result, bail};
use std::collections::BTreeMap;
use std::sync::RwLock;

#[derive(Debug, Clone)]
pub struct MockService {
    pub id: String,
    pub container_name: String,
    pub labels: BTreeMap<String, String>,
    pub running: bool,
}

#[derive(Debug, Clone)]
pub struct MockTarget {
    pub container: Container,
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
struct FailRule {
    operation: String,
    /// Calls of `operation` allowed to succeed before failures start
    allowed: usize,
}

/// In-memory runtime recording every call as `op:arg`.
#[derive(Debug)]
pub struct MockRuntime {
    services: RwLock<Vec<MockService>>,
    targets: RwLock<Vec<MockTarget>>,
    commands: RwLock<Vec<String>>,
    fail_on: RwLock<Option<FailRule>>,
    next_id: RwLock<usize>,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self {
            services: RwLock::new(Vec::new()),
            targets: RwLock::new(Vec::new()),
            commands: RwLock::new(Vec::new()),
            fail_on: RwLock::new(None),
            next_id: RwLock::new(0),
        }
    }

    /// Seeds an already running managed service on node `n1`. An empty
    /// `name` leaves the name label off.
    pub fn add_service(&self, id: &str, name: &str, pod: &str, container: &str) {
        let mut labels = BTreeMap::new();
        labels.insert(MANAGED_LABEL.to_string(), MANAGED_VALUE.to_string());
        if !name.is_empty() {
            labels.insert(NAME_LABEL.to_string(), name.to_string());
        }
        labels.insert(POD_LABEL.to_string(), pod.to_string());
        labels.insert(CONTAINER_LABEL.to_string(), container.to_string());
        labels.insert(NODE_LABEL.to_string(), "n1".to_string());

        let binding = ContainerRef {
            pod_name: pod.to_string(),
            name: container.to_string(),
            node_name: "n1".to_string(),
        };
        self.services.write().unwrap().push(MockService {
            id: id.to_string(),
            container_name: service_container_name(name, &binding),
            labels,
            running: true,
        });
    }

    /// Marks a seeded service as exited. It stays listed and keeps its name.
    pub fn set_service_exited(&self, id: &str) {
        for service in self.services.write().unwrap().iter_mut() {
            if service.id == id {
                service.running = false;
            }
        }
    }

    /// Seeds a target container that selector queries can match.
    pub fn add_target(&self, container: Container, labels: &[(&str, &str)]) {
        self.targets.write().unwrap().push(MockTarget {
            container,
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        });
    }

    pub fn remove_target(&self, id: &str) {
        self.targets
            .write()
            .unwrap()
            .retain(|t| t.container.id != id);
    }

    /// Every call of `operation` fails.
    pub fn set_fail_on(&self, operation: &str) {
        self.set_fail_after(operation, 0);
    }

    /// The first `allowed` calls of `operation` succeed, later ones fail.
    pub fn set_fail_after(&self, operation: &str, allowed: usize) {
        *self.fail_on.write().unwrap() = Some(FailRule {
            operation: operation.to_string(),
            allowed,
        });
    }

    pub fn clear_failures(&self) {
        *self.fail_on.write().unwrap() = None;
    }

    pub fn get_commands(&self) -> Vec<String> {
        self.commands.read().unwrap().clone()
    }

    pub fn clear_commands(&self) {
        self.commands.write().unwrap().clear();
    }

    pub fn count_commands(&self, prefix: &str) -> usize {
        self.commands
            .read()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    /// Container names of the services currently up.
    pub fn running_services(&self) -> Vec<String> {
        self.services
            .read()
            .unwrap()
            .iter()
            .filter(|s| s.running)
            .map(|s| s.container_name.clone())
            .collect()
    }

    fn record_command(&self, cmd: &str) {
        self.commands.write().unwrap().push(cmd.to_string());
    }

    fn check_fail(&self, operation: &str) -> Result<()> {
        let mut fail_on = self.fail_on.write().unwrap();
        if let Some(rule) = fail_on.as_mut() {
            if rule.operation == operation {
                if rule.allowed == 0 {
                    bail!("Mock failure on: {}", operation);
                }
                rule.allowed -= 1;
            }
        }
        Ok(())
    }
}

impl Default for MockRuntime {
    fn default() -> Self {
        Self::new()
    }
}

fn matches(labels: &BTreeMap<String, String>, filter: &LabelFilter) -> bool {
    filter.labels.iter().all(|(k, v)| match labels.get(k) {
        Some(value) => v.is_empty() || value == v,
        None => false,
    })
}

impl ContainerRuntime for MockRuntime {
    fn list_containers(&self, filter: &LabelFilter) -> Result<Vec<LabeledContainer>> {
        self.record_command("list");
        self.check_fail("list")?;

        Ok(self
            .services
            .read()
            .unwrap()
            .iter()
            .filter(|s| matches(&s.labels, filter))
            .map(|s| LabeledContainer {
                id: s.id.clone(),
                names: vec![s.container_name.clone()],
                labels: s.labels.clone(),
                running: s.running,
            })
            .collect())
    }

    fn find_containers(
        &self,
        pod: &str,
        selector: &str,
        container: &str,
    ) -> Result<Vec<Container>> {
        self.record_command(&format!("find:{}:{}:{}", pod, selector, container));
        self.check_fail("find")?;

        let filter = LabelFilter::parse(selector);
        Ok(self
            .targets
            .read()
            .unwrap()
            .iter()
            .filter(|t| pod.is_empty() || t.container.pod_name == pod)
            .filter(|t| container.is_empty() || t.container.name == container)
            .filter(|t| matches(&t.labels, &filter))
            .map(|t| t.container.clone())
            .collect())
    }

    fn run_service(&self, request: &ServiceRequest) -> Result<StartOutcome> {
        self.record_command(&format!("start:{}", request.container_name));
        self.check_fail("start")?;

        let mut services = self.services.write().unwrap();
        if services
            .iter()
            .any(|s| s.container_name == request.container_name)
        {
            return Ok(StartOutcome::AlreadyRunning);
        }

        let mut next_id = self.next_id.write().unwrap();
        *next_id += 1;
        services.push(MockService {
            id: format!("svc-{}", *next_id),
            container_name: request.container_name.clone(),
            labels: request.labels.clone(),
            running: true,
        });
        Ok(StartOutcome::Started)
    }

    fn remove_service(&self, id: &str) -> Result<StopOutcome> {
        self.record_command(&format!("stop:{}", id));
        self.check_fail("stop")?;

        let mut services = self.services.write().unwrap();
        let before = services.len();
        services.retain(|s| s.id != id && s.container_name != id);

        Ok(if services.len() < before {
            StopOutcome::Stopped
        } else {
            StopOutcome::AlreadyStopped
        })
    }
}
