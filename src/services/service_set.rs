use crate::domain::{
    ContainerRuntime, LabelFilter, MANAGED_LABEL, MANAGED_VALUE, ManagedService, SpecCatalog,
    SpecMap, StartOutcome, StopOutcome,
};
use crate::services::SyncService;
use anyhow::{Context, Result};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Counters collected over one reconcile pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub started: usize,
    pub already_running: usize,
    pub stopped: usize,
    /// Specs with no matching container this pass
    pub skipped: usize,
}

impl ReconcileReport {
    /// True when the pass issued no state-changing call.
    pub fn is_converged(&self) -> bool {
        self.started == 0 && self.stopped == 0
    }
}

impl fmt::Display for ReconcileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} started, {} already running, {} stopped, {} skipped",
            self.started, self.already_running, self.stopped, self.skipped
        )
    }
}

/// The services currently tagged as managed, as reported by the runtime.
///
/// A set is a snapshot: it is built by [`ManagedServiceSet::discover`] and
/// never updated afterwards. Callers discover again before every pass.
#[derive(Debug)]
pub struct ManagedServiceSet {
    runtime: Arc<dyn ContainerRuntime>,
    items: Vec<ManagedService>,
}

impl ManagedServiceSet {
    pub fn discover(runtime: Arc<dyn ContainerRuntime>) -> Result<Self> {
        let filter = LabelFilter::new().with(MANAGED_LABEL, MANAGED_VALUE);
        let cntrs = runtime
            .list_containers(&filter)
            .context("could not obtain container list")?;

        let mut items = Vec::with_capacity(cntrs.len());
        for cntr in &cntrs {
            match ManagedService::from_labels(cntr) {
                Some(service) => {
                    debug!(
                        name = %service.name,
                        pod = %service.container.pod_name,
                        container = %service.container.name,
                        node = %service.container.node_name,
                        "found service"
                    );
                    items.push(service);
                }
                None => warn!(id = %cntr.id, "managed container without a service name, ignoring"),
            }
        }

        Ok(Self { runtime, items })
    }

    pub fn from_services(runtime: Arc<dyn ContainerRuntime>, items: Vec<ManagedService>) -> Self {
        Self { runtime, items }
    }

    pub fn items(&self) -> &[ManagedService] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Services registered under `name`.
    pub fn filter(&self, name: &str) -> Self {
        Self {
            runtime: self.runtime.clone(),
            items: self
                .items
                .iter()
                .filter(|service| service.name == name)
                .cloned()
                .collect(),
        }
    }

    /// Stops every service in the set, returning how many were actually
    /// running. Fails on the first error.
    pub fn stop(&self) -> Result<usize> {
        let mut stopped = 0;
        for service in &self.items {
            if self.stop_service(service)? == StopOutcome::Stopped {
                stopped += 1;
            }
        }
        Ok(stopped)
    }

    /// Starts services for specs that lack them and stops the ones that are
    /// no longer required.
    pub fn reconcile(&self, catalog: &dyn SpecCatalog) -> Result<ReconcileReport> {
        let specs = catalog
            .all_specs()
            .context("could not load specifications")?;
        let mut report = ReconcileReport::default();

        self.compact(&specs, &mut report)?;
        self.update(&specs, &mut report)?;

        debug!(%report, "reconcile pass finished");
        Ok(report)
    }

    fn compact(&self, specs: &SpecMap, report: &mut ReconcileReport) -> Result<()> {
        for service in &self.items {
            if specs.contains(&service.name) {
                continue;
            }

            info!(name = %service.name, "removing orphaned service");
            if self
                .stop_service(service)
                .context("unable to stop service that is no longer needed")?
                == StopOutcome::Stopped
            {
                report.stopped += 1;
            }
        }

        Ok(())
    }

    fn update(&self, specs: &SpecMap, report: &mut ReconcileReport) -> Result<()> {
        for (name, spec) in specs.iter() {
            let cntrs = self
                .runtime
                .find_containers(&spec.pod, &spec.selector, &spec.container)
                .with_context(|| format!("unable to get container list for {name}"))?;

            let existing = self.filter(name);

            if cntrs.is_empty() {
                debug!(
                    name = %name,
                    pod = %spec.pod,
                    selector = %spec.selector,
                    container = %spec.container,
                    "no matching running containers"
                );
                report.stopped += existing.stop()?;
                report.skipped += 1;
                continue;
            }

            // Services bound to a container that no longer matches, and
            // services whose own container is not running. The latter would
            // block a restart under the same container name.
            for service in existing.items() {
                let bound = cntrs.iter().any(|c| c.binding() == service.container);
                if bound && service.running {
                    continue;
                }
                if bound {
                    info!(name = %name, binding = %service.container, "service not running, replacing");
                } else {
                    info!(name = %name, binding = %service.container, "target gone, stopping service");
                }
                if self.stop_service(service)? == StopOutcome::Stopped {
                    report.stopped += 1;
                }
            }

            for cntr in cntrs {
                let binding = cntr.binding();
                let service = SyncService::new(self.runtime.clone(), name, cntr, spec.clone());

                match service.start()? {
                    StartOutcome::Started => report.started += 1,
                    StartOutcome::AlreadyRunning => {
                        debug!(name = %name, %binding, "already running");
                        report.already_running += 1;
                    }
                }
            }
        }

        Ok(())
    }

    fn stop_service(&self, service: &ManagedService) -> Result<StopOutcome> {
        let outcome = SyncService::from_managed(self.runtime.clone(), service)
            .stop()
            .with_context(|| format!("unable to stop service {}", service.name))?;

        match outcome {
            StopOutcome::Stopped => info!(
                name = %service.name,
                binding = %service.container,
                "stopped service"
            ),
            StopOutcome::AlreadyStopped => {
                debug!(name = %service.name, "service already stopped")
            }
        }

        Ok(outcome)
    }
}
