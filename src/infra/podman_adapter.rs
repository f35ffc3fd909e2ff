use crate::domain::{
    Container, ContainerRuntime, LabelFilter, LabeledContainer, ServiceRequest, StartOutcome,
    StopOutcome,
};
use crate::infra::config::AppConfig;
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::process::{Command, Output, Stdio};
use tracing::debug;

/// Mount point of the local directory inside a sync container.
pub const LOCAL_MOUNT: &str = "/podsync/local";

/// Container runtime backed by the podman CLI.
#[derive(Debug, Clone)]
pub struct PodmanAdapter {
    bin: String,
    sync_image: String,
    node_name: String,
}

impl PodmanAdapter {
    pub fn new(
        bin: impl Into<String>,
        sync_image: impl Into<String>,
        node_name: impl Into<String>,
    ) -> Self {
        Self {
            bin: bin.into(),
            sync_image: sync_image.into(),
            node_name: node_name.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.podman_bin(), config.sync_image(), config.node_name())
    }

    pub fn is_available(&self) -> bool {
        Command::new(&self.bin)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn output<I, S>(&self, args: I, context: &str) -> Result<Output>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        Command::new(&self.bin)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .with_context(|| context.to_string())
    }

    /// `all` includes exited containers.
    fn ps(&self, all: bool, filters: Vec<String>, context: &str) -> Result<Vec<PsEntry>> {
        let mut args = vec!["ps".to_string(), "--format".into(), "json".into()];
        if all {
            args.push("--all".into());
        }
        for filter in filters {
            args.push("--filter".into());
            args.push(filter);
        }

        let output = self.output(&args, context)?;
        ensure_success(&output, context)?;
        parse_ps_output(&String::from_utf8_lossy(&output.stdout))
            .with_context(|| format!("decoding podman output ({context})"))
    }

    pub fn run_args(&self, request: &ServiceRequest) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "run".into(),
            "-d".into(),
            "--name".into(),
            request.container_name.clone(),
        ];

        for (key, value) in &request.labels {
            args.push("--label".into());
            args.push(format!("{key}={value}"));
        }

        args.push("--volumes-from".into());
        args.push(request.target_id.clone());

        let sync = &request.sync;
        let mut mount = format!("{}:{LOCAL_MOUNT}", sync.local_path.display());
        if sync.local_read_only {
            mount.push_str(":ro");
        }
        args.push("-v".into());
        args.push(mount);

        let env = [
            ("PODSYNC_LOCAL_PATH", LOCAL_MOUNT.to_string()),
            ("PODSYNC_REMOTE_PATH", sync.remote_path.display().to_string()),
            ("PODSYNC_RELOAD", sync.reload.to_string()),
            ("PODSYNC_REMOTE_READ_ONLY", sync.remote_read_only.to_string()),
        ];
        for (key, value) in env {
            args.push("-e".into());
            args.push(format!("{key}={value}"));
        }

        args.push(self.sync_image.clone());
        args
    }
}

impl ContainerRuntime for PodmanAdapter {
    fn list_containers(&self, filter: &LabelFilter) -> Result<Vec<LabeledContainer>> {
        let entries = self.ps(true, label_filters(filter), "listing labeled containers")?;

        Ok(entries
            .into_iter()
            .map(|entry| LabeledContainer {
                running: entry.is_running(),
                id: entry.id,
                names: entry.names,
                labels: entry.labels.unwrap_or_default(),
            })
            .collect())
    }

    fn find_containers(
        &self,
        pod: &str,
        selector: &str,
        container: &str,
    ) -> Result<Vec<Container>> {
        let mut filters = Vec::new();
        if !pod.is_empty() {
            filters.push(format!("pod={pod}"));
        }
        filters.extend(label_filters(&LabelFilter::parse(selector)));

        let context = format!("listing containers for pod {pod:?} ({selector})");
        let entries = self.ps(false, filters, &context)?;
        let cntrs: Vec<Container> = entries
            .into_iter()
            .filter(|entry| !entry.is_infra)
            .filter_map(|entry| entry.into_target(container, &self.node_name))
            .collect();

        debug!(
            pod = pod,
            selector = selector,
            container = container,
            found = cntrs.len(),
            "resolved containers"
        );
        Ok(cntrs)
    }

    fn run_service(&self, request: &ServiceRequest) -> Result<StartOutcome> {
        let context = format!("starting container {}", request.container_name);
        let output = self.output(self.run_args(request), &context)?;

        if output.status.success() {
            return Ok(StartOutcome::Started);
        }
        if is_name_conflict(&String::from_utf8_lossy(&output.stderr)) {
            return Ok(StartOutcome::AlreadyRunning);
        }

        ensure_success(&output, &context)?;
        Ok(StartOutcome::Started)
    }

    fn remove_service(&self, id: &str) -> Result<StopOutcome> {
        let context = format!("removing container {id}");
        let output = self.output(["rm", "-f", id], &context)?;

        if output.status.success() {
            let removed = !String::from_utf8_lossy(&output.stdout).trim().is_empty();
            return Ok(if removed {
                StopOutcome::Stopped
            } else {
                StopOutcome::AlreadyStopped
            });
        }
        if is_missing_container(&String::from_utf8_lossy(&output.stderr)) {
            return Ok(StopOutcome::AlreadyStopped);
        }

        ensure_success(&output, &context)?;
        Ok(StopOutcome::Stopped)
    }
}

/// One entry of `podman ps --format json`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PsEntry {
    id: String,
    #[serde(default)]
    names: Vec<String>,
    #[serde(default)]
    labels: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pod_name: String,
    #[serde(default)]
    is_infra: bool,
    #[serde(default)]
    state: String,
}

impl PsEntry {
    fn is_running(&self) -> bool {
        self.state.eq_ignore_ascii_case("running")
    }

    /// Converts to a target container when its name matches `container`.
    /// Podman names pod members `<pod>-<container>`; an empty `container`
    /// matches anything.
    fn into_target(self, container: &str, node_name: &str) -> Option<Container> {
        let prefix = format!("{}-", self.pod_name);
        let short_name = self
            .names
            .iter()
            .map(|name| {
                if self.pod_name.is_empty() {
                    name.as_str()
                } else {
                    name.strip_prefix(&prefix).unwrap_or(name)
                }
            })
            .find(|name| container.is_empty() || *name == container)?
            .to_string();

        Some(Container::new(self.id, self.pod_name, short_name, node_name))
    }
}

fn parse_ps_output(stdout: &str) -> Result<Vec<PsEntry>> {
    if stdout.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_yml::from_str(stdout)?)
}

fn label_filters(filter: &LabelFilter) -> Vec<String> {
    filter
        .labels
        .iter()
        .map(|(key, value)| {
            if value.is_empty() {
                format!("label={key}")
            } else {
                format!("label={key}={value}")
            }
        })
        .collect()
}

fn is_name_conflict(stderr: &str) -> bool {
    stderr.contains("already in use")
}

fn is_missing_container(stderr: &str) -> bool {
    stderr.to_lowercase().contains("no such container")
}

fn ensure_success(output: &Output, context: &str) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }

    bail!(
        "podman returned status {:?} ({context}): {}",
        output.status,
        String::from_utf8_lossy(&output.stderr).trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SyncParams;
    use std::path::PathBuf;

    const PS_JSON: &str = r#"[
  {
    "Id": "aaa111",
    "Names": ["web-pod-app"],
    "Labels": {"app": "web"},
    "PodName": "web-pod",
    "IsInfra": false,
    "State": "running"
  },
  {
    "Id": "bbb222",
    "Names": ["web-pod-infra"],
    "Labels": null,
    "PodName": "web-pod",
    "IsInfra": true
  },
  {
    "Id": "ccc333",
    "Names": ["standalone"],
    "PodName": ""
  },
  {
    "Id": "ddd444",
    "Names": ["podsync-web-p1-c1-0123456789ab"],
    "Labels": {"heritage": "podsync"},
    "PodName": "",
    "State": "exited"
  }
]"#;

    fn adapter() -> PodmanAdapter {
        PodmanAdapter::new("podman", "sync:latest", "node-1")
    }

    #[test]
    fn parses_ps_json() {
        let entries = parse_ps_output(PS_JSON).unwrap();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].id, "aaa111");
        assert_eq!(
            entries[0].labels.as_ref().and_then(|l| l.get("app")),
            Some(&"web".to_string())
        );
        assert!(entries[1].is_infra);
        assert!(entries[2].labels.is_none());
    }

    #[test]
    fn reads_container_state() {
        let entries = parse_ps_output(PS_JSON).unwrap();
        assert!(entries[0].is_running());
        assert!(!entries[1].is_running());
        assert!(!entries[3].is_running());
    }

    #[test]
    fn parses_empty_ps_output() {
        assert!(parse_ps_output("").unwrap().is_empty());
        assert!(parse_ps_output("[]").unwrap().is_empty());
    }

    #[test]
    fn into_target_strips_pod_prefix() {
        let mut entries = parse_ps_output(PS_JSON).unwrap().into_iter();
        let web = entries.next().unwrap();

        let target = web.into_target("app", "node-1").unwrap();
        assert_eq!(target, Container::new("aaa111", "web-pod", "app", "node-1"));
    }

    #[test]
    fn into_target_filters_by_name() {
        let entries = parse_ps_output(PS_JSON).unwrap();
        let standalone = entries.into_iter().nth(2).unwrap();

        assert!(standalone.into_target("other", "n").is_none());
    }

    #[test]
    fn into_target_matches_any_when_name_empty() {
        let entries = parse_ps_output(PS_JSON).unwrap();
        let standalone = entries.into_iter().nth(2).unwrap();

        let target = standalone.into_target("", "n").unwrap();
        assert_eq!(target.name, "standalone");
        assert_eq!(target.pod_name, "");
    }

    #[test]
    fn builds_label_filters() {
        let filter = LabelFilter::parse("app=web,canary");
        assert_eq!(label_filters(&filter), vec!["label=app=web", "label=canary"]);
    }

    #[test]
    fn builds_run_args() {
        let mut labels = BTreeMap::new();
        labels.insert("heritage".to_string(), "podsync".to_string());
        labels.insert("name".to_string(), "web".to_string());

        let request = ServiceRequest {
            container_name: "podsync-web-p1-c1".into(),
            target_id: "aaa111".into(),
            labels,
            sync: SyncParams {
                local_path: PathBuf::from("/home/dev/web"),
                remote_path: PathBuf::from("/app"),
                reload: true,
                local_read_only: true,
                remote_read_only: false,
            },
        };

        let args = adapter().run_args(&request);
        let joined = args.join(" ");

        assert_eq!(&args[..4], ["run", "-d", "--name", "podsync-web-p1-c1"]);
        assert!(joined.contains("--label heritage=podsync"));
        assert!(joined.contains("--label name=web"));
        assert!(joined.contains("--volumes-from aaa111"));
        assert!(joined.contains("-v /home/dev/web:/podsync/local:ro"));
        assert!(joined.contains("-e PODSYNC_REMOTE_PATH=/app"));
        assert!(joined.contains("-e PODSYNC_RELOAD=true"));
        assert_eq!(args.last().map(String::as_str), Some("sync:latest"));
    }

    #[test]
    fn classifies_runtime_errors() {
        assert!(is_name_conflict(
            "Error: creating container storage: the container name \"podsync-web\" is already in use by abc"
        ));
        assert!(!is_name_conflict("Error: image not known"));
        assert!(is_missing_container("Error: no container with name or ID \"x\" found: no such container"));
        assert!(!is_missing_container("permission denied"));
    }
}
