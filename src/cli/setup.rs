use crate::infra::PodmanAdapter;
use crate::infra::config::{
    DEFAULT_CONFIG_NAME, ensure_config_dir, install_default_config, load_app_config,
};
use anyhow::Result;
use std::path::Path;
use tracing::{info, warn};

pub fn install(config_dir: &Path) -> Result<()> {
    info!("Preparing config in {:?}", config_dir);

    ensure_config_dir(config_dir)?;
    install_default_config(config_dir)?;

    info!(
        "Config ready. Edit {:?} and the spec file to taste",
        config_dir.join(DEFAULT_CONFIG_NAME)
    );

    Ok(())
}

/// Checks that the runtime binary and the spec file are reachable.
pub fn doctor(config_dir: &Path) -> Result<()> {
    let config = load_app_config(config_dir)?;
    let adapter = PodmanAdapter::from_config(&config);

    if adapter.is_available() {
        info!("{} available", config.podman_bin());
    } else {
        warn!("{} not found in PATH", config.podman_bin());
    }

    let specs_path = config.specs_path(config_dir);
    if specs_path.exists() {
        info!("spec file found at {:?}", specs_path);
    } else {
        warn!("spec file missing at {:?} (run 'podsync init')", specs_path);
    }

    info!("node name: {}", config.node_name());
    info!("sync image: {}", config.sync_image());

    Ok(())
}
