use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_CONFIG_NAME: &str = "podsync.toml";
pub const DEFAULT_SPECS_NAME: &str = "specs.yml";
pub const DEFAULT_PODMAN_BIN: &str = "podman";
pub const DEFAULT_SYNC_IMAGE: &str = "docker.io/syncthing/syncthing:latest";

pub const PODSYNC_TOML: &str = include_str!("../../config/default_podsync.toml");
pub const SPECS_YML: &str = include_str!("../../config/default_specs.yml");

pub fn default_config_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/root"))
        .join(".config/podsync")
}

pub fn ensure_config_dir(config_dir: &Path) -> Result<()> {
    fs::create_dir_all(config_dir).with_context(|| format!("creating {:?}", config_dir))
}

fn default_node_name() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.trim().is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct RuntimeConfig {
    pub podman_bin: Option<String>,
    pub sync_image: Option<String>,
    pub node_name: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct SpecsConfig {
    pub file: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub specs: SpecsConfig,
}

impl AppConfig {
    /// Merges another AppConfig into self.
    /// Values from `other` overwrite values in `self` if present.
    pub fn merge(&mut self, other: AppConfig) {
        if let Some(bin) = other.runtime.podman_bin {
            self.runtime.podman_bin = Some(bin);
        }
        if let Some(image) = other.runtime.sync_image {
            self.runtime.sync_image = Some(image);
        }
        if let Some(node) = other.runtime.node_name {
            self.runtime.node_name = Some(node);
        }
        if let Some(file) = other.specs.file {
            self.specs.file = Some(file);
        }
    }

    fn apply_defaults(&mut self) {
        if self.runtime.podman_bin.is_none() {
            self.runtime.podman_bin = Some(DEFAULT_PODMAN_BIN.to_string());
        }
        if self.runtime.sync_image.is_none() {
            self.runtime.sync_image = Some(DEFAULT_SYNC_IMAGE.to_string());
        }
        if self.runtime.node_name.is_none() {
            self.runtime.node_name = Some(default_node_name());
        }
        if self.specs.file.is_none() {
            self.specs.file = Some(PathBuf::from(DEFAULT_SPECS_NAME));
        }
    }

    pub fn podman_bin(&self) -> &str {
        self.runtime.podman_bin.as_deref().unwrap_or(DEFAULT_PODMAN_BIN)
    }

    pub fn sync_image(&self) -> &str {
        self.runtime.sync_image.as_deref().unwrap_or(DEFAULT_SYNC_IMAGE)
    }

    pub fn node_name(&self) -> String {
        self.runtime
            .node_name
            .clone()
            .unwrap_or_else(default_node_name)
    }

    /// Location of the spec catalog. Tilde is expanded; relative paths are
    /// taken from `config_dir`.
    pub fn specs_path(&self, config_dir: &Path) -> PathBuf {
        let file = self
            .specs
            .file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SPECS_NAME));
        let expanded = PathBuf::from(shellexpand::tilde(file.to_string_lossy().as_ref()).into_owned());

        if expanded.is_absolute() {
            expanded
        } else {
            config_dir.join(expanded)
        }
    }
}

fn read_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
    toml::from_str(&content).with_context(|| format!("parsing {:?}", path))
}

/// Loads `podsync.toml` from the config directory, overlaid by the one in the
/// current working directory.
pub fn load_app_config(config_dir: &Path) -> Result<AppConfig> {
    load_app_config_from(config_dir, Path::new("./"))
}

pub fn load_app_config_from(config_dir: &Path, local_dir: &Path) -> Result<AppConfig> {
    let mut app_config = AppConfig::default();

    let global_config_path = config_dir.join(DEFAULT_CONFIG_NAME);
    if global_config_path.exists() {
        debug!("loading global config from {:?}", global_config_path);
        app_config = read_config(&global_config_path)?;
    }

    let local_config_path = local_dir.join(DEFAULT_CONFIG_NAME);
    if local_config_path.exists() && local_config_path != global_config_path {
        debug!("loading local config from {:?}", local_config_path);
        app_config.merge(read_config(&local_config_path)?);
    }

    app_config.apply_defaults();
    Ok(app_config)
}

pub fn install_default_config(target_dir: &Path) -> Result<()> {
    ensure_config_dir(target_dir)?;

    let files = [
        (DEFAULT_CONFIG_NAME, PODSYNC_TOML),
        (DEFAULT_SPECS_NAME, SPECS_YML),
    ];

    for (name, content) in files {
        let target = target_dir.join(name);

        if target.exists() {
            continue;
        }

        fs::write(&target, content).with_context(|| format!("writing template to {:?}", target))?;
    }

    Ok(())
}
