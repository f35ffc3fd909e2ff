use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Sync parameters handed through to the sync process. The reconciler never
/// inspects them.
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct SyncParams {
    #[serde(default)]
    pub local_path: PathBuf,
    #[serde(default)]
    pub remote_path: PathBuf,
    /// Restart the remote process after files change
    #[serde(default = "default_reload")]
    pub reload: bool,
    #[serde(default)]
    pub local_read_only: bool,
    #[serde(default)]
    pub remote_read_only: bool,
}

fn default_reload() -> bool {
    true
}

/// Desired-state declaration for one sync target.
///
/// `name` is filled in from the catalog key; it is the join key between
/// desired state and the services discovered at runtime.
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct Specification {
    #[serde(skip)]
    pub name: String,
    #[serde(default)]
    pub pod: String,
    #[serde(default)]
    pub selector: String,
    #[serde(default)]
    pub container: String,
    #[serde(flatten)]
    pub sync: SyncParams,
}

impl Specification {
    pub fn new(
        name: impl Into<String>,
        pod: impl Into<String>,
        selector: impl Into<String>,
        container: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            pod: pod.into(),
            selector: selector.into(),
            container: container.into(),
            sync: SyncParams {
                reload: true,
                ..SyncParams::default()
            },
        }
    }

    pub fn with_name(mut self, name: String) -> Self {
        self.name = name;
        self
    }

    pub fn with_paths(mut self, local: impl Into<PathBuf>, remote: impl Into<PathBuf>) -> Self {
        self.sync.local_path = local.into();
        self.sync.remote_path = remote.into();
        self
    }
}

/// The full desired catalog, keyed by specification name.
///
/// Backed by a `BTreeMap` so a reconcile pass walks specs in name order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecMap {
    items: BTreeMap<String, Specification>,
}

impl SpecMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a spec under its own name, replacing any previous entry.
    pub fn insert(&mut self, spec: Specification) -> Option<Specification> {
        self.items.insert(spec.name.clone(), spec)
    }

    pub fn get(&self, name: &str) -> Option<&Specification> {
        self.items.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.items.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Specification)> {
        self.items.iter()
    }
}

impl FromIterator<Specification> for SpecMap {
    fn from_iter<I: IntoIterator<Item = Specification>>(iter: I) -> Self {
        let mut map = SpecMap::new();
        for spec in iter {
            map.insert(spec);
        }
        map
    }
}
