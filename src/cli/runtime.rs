use crate::domain::{ContainerRuntime, SpecCatalog};
use crate::infra::config::{AppConfig, load_app_config};
use crate::infra::{FileSpecCatalog, PodmanAdapter};
use crate::services::{ManagedServiceSet, ReconcileReport};
use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};

/// Wires the config, the spec catalog and a runtime handle together for the
/// command line.
pub struct Runtime {
    config_dir: PathBuf,
    config: AppConfig,
    runtime: Arc<dyn ContainerRuntime>,
    catalog: FileSpecCatalog,
}

impl Runtime {
    pub fn new(config_dir: &Path) -> Result<Self> {
        let config = load_app_config(config_dir)?;
        let runtime = Arc::new(PodmanAdapter::from_config(&config));
        Ok(Self::build(config_dir, config, runtime))
    }

    pub fn with_runtime(config_dir: &Path, runtime: Arc<dyn ContainerRuntime>) -> Result<Self> {
        let config = load_app_config(config_dir)?;
        Ok(Self::build(config_dir, config, runtime))
    }

    fn build(config_dir: &Path, config: AppConfig, runtime: Arc<dyn ContainerRuntime>) -> Self {
        let catalog = FileSpecCatalog::new(config.specs_path(config_dir));
        Self {
            config_dir: config_dir.to_path_buf(),
            config,
            runtime,
            catalog,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn catalog(&self) -> &FileSpecCatalog {
        &self.catalog
    }

    /// One discovery + reconcile pass.
    pub fn reconcile_once(&self) -> Result<ReconcileReport> {
        let services = ManagedServiceSet::discover(self.runtime.clone())?;
        services.reconcile(&self.catalog)
    }

    /// Runs passes every `interval`. A failed pass is logged and the next
    /// one retries from fresh state. `max_passes` of `None` runs forever.
    pub fn reconcile_every(&self, interval: Duration, max_passes: Option<usize>) -> Result<()> {
        let mut passes = 0;
        loop {
            match self.reconcile_once() {
                Ok(report) => info!("Reconcile pass done: {}", report),
                Err(e) => error!("Reconcile pass failed: {:#}", e),
            }

            passes += 1;
            if max_passes.is_some_and(|max| passes >= max) {
                return Ok(());
            }

            thread::sleep(interval);
        }
    }

    pub fn reconcile(&self, interval: Option<&str>) -> Result<()> {
        match interval {
            Some(raw) => {
                let interval = parse_duration(raw)?;
                info!("Reconciling every {:?} using specs in {:?}", interval, self.catalog.path());
                self.reconcile_every(interval, None)
            }
            None => {
                let report = self.reconcile_once()?;
                info!("Reconcile pass done: {}", report);
                Ok(())
            }
        }
    }

    pub fn list(&self) -> Result<()> {
        let services = ManagedServiceSet::discover(self.runtime.clone())?;

        if services.is_empty() {
            println!("No managed services running");
            return Ok(());
        }

        for service in services.items() {
            let state = if service.running { "" } else { " (exited)" };
            println!("{:<24} {}{}", service.name, service.container, state);
        }

        Ok(())
    }

    /// Stops every managed service, or only those registered under `name`.
    pub fn stop(&self, name: Option<&str>) -> Result<usize> {
        let services = ManagedServiceSet::discover(self.runtime.clone())?;
        let targets = match name {
            Some(name) => services.filter(name),
            None => services,
        };

        if targets.is_empty() {
            warn!("No matching managed services");
            return Ok(0);
        }

        let stopped = targets.stop().context("stopping managed services")?;
        info!("Stopped {} service(s)", stopped);
        Ok(stopped)
    }

    pub fn specs(&self) -> Result<()> {
        let specs = self.catalog.all_specs()?;

        if specs.is_empty() {
            println!("No specs defined in {:?}", self.catalog.path());
            return Ok(());
        }

        for (name, spec) in specs.iter() {
            println!(
                "{:<24} pod={:?} selector={:?} container={:?} {} -> {}",
                name,
                spec.pod,
                spec.selector,
                spec.container,
                spec.sync.local_path.display(),
                spec.sync.remote_path.display()
            );
        }

        Ok(())
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }
}

/// Parses `500ms`, `10s` or `2m`.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if let Some(stripped) = s.strip_suffix("ms") {
        let millis: u64 = stripped.parse()?;
        Ok(Duration::from_millis(millis))
    } else if let Some(stripped) = s.strip_suffix('s') {
        let secs: u64 = stripped.parse()?;
        Ok(Duration::from_secs(secs))
    } else if let Some(stripped) = s.strip_suffix('m') {
        let mins: u64 = stripped.parse()?;
        Ok(Duration::from_secs(mins * 60))
    } else {
        Err(anyhow!("Invalid duration format: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration(" 2m ").unwrap(), Duration::from_secs(120));
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("xs").is_err());
    }
}
