use std::collections::BTreeMap;
use std::fmt;

/// A target container reported by the runtime for a pod/selector query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    /// Runtime identity (container id)
    pub id: String,
    pub pod_name: String,
    pub name: String,
    pub node_name: String,
}

impl Container {
    pub fn new(
        id: impl Into<String>,
        pod_name: impl Into<String>,
        name: impl Into<String>,
        node_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            pod_name: pod_name.into(),
            name: name.into(),
            node_name: node_name.into(),
        }
    }

    pub fn binding(&self) -> ContainerRef {
        ContainerRef {
            pod_name: self.pod_name.clone(),
            name: self.name.clone(),
            node_name: self.node_name.clone(),
        }
    }
}

/// The (pod, container, node) triplet a sync service is bound to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ContainerRef {
    pub pod_name: String,
    pub name: String,
    pub node_name: String,
}

impl fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.pod_name, self.name, self.node_name)
    }
}

/// Raw container entry as listed by the runtime, labels included.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabeledContainer {
    pub id: String,
    pub names: Vec<String>,
    pub labels: BTreeMap<String, String>,
    pub running: bool,
}

impl LabeledContainer {
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_drops_runtime_id() {
        let cntr = Container::new("abc123", "web-0", "app", "node-1");
        let binding = cntr.binding();

        assert_eq!(binding.pod_name, "web-0");
        assert_eq!(binding.name, "app");
        assert_eq!(binding.node_name, "node-1");
        assert_eq!(binding.to_string(), "web-0/app@node-1");
    }

    #[test]
    fn test_label_lookup() {
        let mut cntr = LabeledContainer::default();
        cntr.labels.insert("name".into(), "web".into());

        assert_eq!(cntr.label("name"), Some("web"));
        assert_eq!(cntr.label("pod"), None);
    }
}
