use crate::domain::{SpecCatalog, SpecMap, Specification};
use anyhow::{Context, Result, bail};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Spec catalog backed by a YAML file mapping names to specifications.
///
/// The file is read on every call so each reconcile pass sees the latest
/// edits. A missing file is an empty catalog.
#[derive(Debug, Clone)]
pub struct FileSpecCatalog {
    path: PathBuf,
}

impl FileSpecCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SpecCatalog for FileSpecCatalog {
    fn all_specs(&self) -> Result<SpecMap> {
        if !self.path.exists() {
            debug!("no spec file at {:?}, catalog is empty", self.path);
            return Ok(SpecMap::new());
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("reading specs from {:?}", self.path))?;
        parse_specs(&content).with_context(|| format!("parsing specs in {:?}", self.path))
    }
}

pub fn parse_specs(content: &str) -> Result<SpecMap> {
    let has_content = content
        .lines()
        .map(str::trim)
        .any(|line| !line.is_empty() && !line.starts_with('#'));
    if !has_content {
        return Ok(SpecMap::new());
    }

    let raw: BTreeMap<String, Specification> = serde_yml::from_str(content)?;
    specs_from_map(raw)
}

/// Converts the raw name -> spec map into a validated catalog
fn specs_from_map(raw: BTreeMap<String, Specification>) -> Result<SpecMap> {
    let mut specs = SpecMap::new();

    for (name, spec) in raw {
        validate_name(&name)?;

        if spec.pod.trim().is_empty() && spec.selector.trim().is_empty() {
            bail!("Spec '{}' needs a pod or a selector", name);
        }
        if spec.sync.local_path.as_os_str().is_empty() {
            bail!("Spec '{}' has no local_path", name);
        }
        if spec.sync.remote_path.as_os_str().is_empty() {
            bail!("Spec '{}' has no remote_path", name);
        }

        let mut spec = spec.with_name(name);
        let local = shellexpand::tilde(spec.sync.local_path.to_string_lossy().as_ref()).into_owned();
        spec.sync.local_path = PathBuf::from(local);

        specs.insert(spec);
    }

    Ok(specs)
}

fn validate_name(name: &str) -> Result<()> {
    let Some(first_char) = name.chars().next() else {
        bail!("Empty spec name found");
    };

    if !first_char.is_alphanumeric() {
        bail!("Spec name '{}' must start with a letter or digit", name);
    }

    for c in name.chars() {
        if !c.is_alphanumeric() && c != '_' && c != '.' && c != '-' {
            bail!("Spec name '{}' contains invalid character '{}'", name, c);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_specs_from_yaml() {
        let yaml = r#"
web:
  pod: web-pod
  selector: app=web
  container: app
  local_path: /home/dev/web
  remote_path: /usr/src/app
api:
  selector: app=api
  local_path: /home/dev/api
  remote_path: /srv
  reload: false
  remote_read_only: true
"#;

        let specs = parse_specs(yaml).unwrap();
        assert_eq!(specs.len(), 2);

        let web = specs.get("web").unwrap();
        assert_eq!(web.name, "web");
        assert_eq!(web.pod, "web-pod");
        assert_eq!(web.selector, "app=web");
        assert_eq!(web.container, "app");
        assert!(web.sync.reload);
        assert_eq!(web.sync.remote_path, PathBuf::from("/usr/src/app"));

        let api = specs.get("api").unwrap();
        assert_eq!(api.pod, "");
        assert_eq!(api.container, "");
        assert!(!api.sync.reload);
        assert!(api.sync.remote_read_only);
        assert!(!api.sync.local_read_only);
    }

    #[test]
    fn comment_only_file_is_empty() {
        assert!(parse_specs("# nothing here\n\n").unwrap().is_empty());
        assert!(parse_specs("{}").unwrap().is_empty());
    }

    #[test]
    fn rejects_spec_without_target() {
        let yaml = r#"
web:
  container: app
  local_path: /a
  remote_path: /b
"#;
        let err = parse_specs(yaml).unwrap_err();
        assert!(err.to_string().contains("needs a pod or a selector"));
    }

    #[test]
    fn rejects_spec_without_paths() {
        let yaml = r#"
web:
  pod: p1
  local_path: /a
"#;
        assert!(parse_specs(yaml).is_err());
    }

    #[test]
    fn validates_spec_name() {
        assert!(validate_name("web-1.beta_2").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("-web").is_err());
        assert!(validate_name("web/app").is_err());
    }

    #[test]
    fn missing_file_is_empty_catalog() {
        let catalog = FileSpecCatalog::new("/nonexistent/podsync/specs.yml");
        assert!(catalog.all_specs().unwrap().is_empty());
    }
}
