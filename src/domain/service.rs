use super::container::{ContainerRef, LabeledContainer};
use super::spec::SyncParams;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Label marking a container as owned by podsync.
pub const MANAGED_LABEL: &str = "heritage";
pub const MANAGED_VALUE: &str = "podsync";

pub const NAME_LABEL: &str = "name";
pub const POD_LABEL: &str = "pod";
pub const CONTAINER_LABEL: &str = "container";
pub const NODE_LABEL: &str = "node";

/// A sync process discovered from the runtime's current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedService {
    pub name: String,
    pub container: ContainerRef,
    /// Runtime id of the service's own container
    pub id: String,
    /// False for a sync container that exited or never came up
    pub running: bool,
}

impl ManagedService {
    /// Builds a service from a labeled runtime container. Returns `None` when
    /// the container carries no service name.
    pub fn from_labels(cntr: &LabeledContainer) -> Option<Self> {
        let name = cntr.label(NAME_LABEL).filter(|n| !n.is_empty())?;
        let label = |key: &str| cntr.label(key).unwrap_or_default().to_string();

        Some(Self {
            name: name.to_string(),
            container: ContainerRef {
                pod_name: label(POD_LABEL),
                name: label(CONTAINER_LABEL),
                node_name: label(NODE_LABEL),
            },
            id: cntr.id.clone(),
            running: cntr.running,
        })
    }
}

/// Name of the container running the sync process for `name` bound to
/// `binding`.
///
/// The readable part alone is ambiguous once names contain `-`, so a digest
/// of the length-prefixed tuple is appended.
pub fn service_container_name(name: &str, binding: &ContainerRef) -> String {
    let mut hasher = Sha256::new();
    for part in [
        name,
        binding.pod_name.as_str(),
        binding.name.as_str(),
        binding.node_name.as_str(),
    ] {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    let digest = format!("{:x}", hasher.finalize());

    sanitize(&format!(
        "{}-{}-{}-{}-{}",
        MANAGED_VALUE,
        name,
        binding.pod_name,
        binding.name,
        &digest[..12]
    ))
}

fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Everything the runtime needs to launch one sync process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRequest {
    /// Deterministic name of the service container
    pub container_name: String,
    /// Runtime id of the target container to attach to
    pub target_id: String,
    pub labels: BTreeMap<String, String>,
    pub sync: SyncParams,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labeled(pairs: &[(&str, &str)]) -> LabeledContainer {
        LabeledContainer {
            id: "svc-1".into(),
            names: vec!["podsync-web".into()],
            running: true,
            labels: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_from_labels_reads_triplet() {
        let cntr = labeled(&[
            (MANAGED_LABEL, MANAGED_VALUE),
            (NAME_LABEL, "web"),
            (POD_LABEL, "p1"),
            (CONTAINER_LABEL, "c1"),
            (NODE_LABEL, "n1"),
        ]);

        let svc = ManagedService::from_labels(&cntr).unwrap();
        assert_eq!(svc.name, "web");
        assert_eq!(svc.id, "svc-1");
        assert_eq!(svc.container.pod_name, "p1");
        assert_eq!(svc.container.name, "c1");
        assert_eq!(svc.container.node_name, "n1");
        assert!(svc.running);
    }

    #[test]
    fn test_from_labels_requires_name() {
        let cntr = labeled(&[(MANAGED_LABEL, MANAGED_VALUE), (POD_LABEL, "p1")]);
        assert!(ManagedService::from_labels(&cntr).is_none());
    }

    #[test]
    fn test_from_labels_tolerates_missing_triplet() {
        let cntr = labeled(&[(NAME_LABEL, "web")]);
        let svc = ManagedService::from_labels(&cntr).unwrap();
        assert_eq!(svc.container, ContainerRef::default());
    }

    fn binding(pod: &str, container: &str) -> ContainerRef {
        ContainerRef {
            pod_name: pod.to_string(),
            name: container.to_string(),
            node_name: "n1".to_string(),
        }
    }

    #[test]
    fn test_container_name_is_stable() {
        let name = service_container_name("web", &binding("p1", "c1"));
        assert!(name.starts_with("podsync-web-p1-c1-"));
        assert_eq!(name, service_container_name("web", &binding("p1", "c1")));
    }

    #[test]
    fn test_container_name_separates_hyphenated_parts() {
        let left = service_container_name("a-b", &binding("c", "x"));
        let right = service_container_name("a", &binding("b-c", "x"));
        assert_ne!(left, right);
    }

    #[test]
    fn test_container_name_depends_on_node() {
        let mut other = binding("p1", "c1");
        other.node_name = "n2".to_string();
        assert_ne!(
            service_container_name("web", &binding("p1", "c1")),
            service_container_name("web", &other)
        );
    }

    #[test]
    fn test_sanitize_replaces_invalid_chars() {
        assert_eq!(sanitize("podsync-a/b c:d"), "podsync-a-b-c-d");
    }
}
