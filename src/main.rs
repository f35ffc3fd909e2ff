use anyhow::Result;
use clap::{Parser, Subcommand};
use podsync::cli::{Runtime, setup};
use podsync::infra::config::default_config_dir;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "podsync",
    about = "Keeps per-container sync services aligned with declared specs"
)]
struct Cli {
    /// Config directory (default: ~/.config/podsync)
    #[arg(long, env = "PODSYNC_CONFIG_DIR", default_value_os_t = default_config_dir())]
    config_dir: PathBuf,

    /// Log level used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start missing sync services and stop the ones no longer wanted
    Reconcile {
        /// Repeat the pass on this interval (e.g. 10s, 1m)
        #[arg(long)]
        interval: Option<String>,
    },
    /// List managed services currently running
    List,
    /// Stop all managed services, or those under NAME
    Stop { name: Option<String> },
    /// Show the validated spec catalog
    Specs,
    /// Install default config files
    Init,
    /// Check runtime and config availability
    Doctor,
}

fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let config_dir = PathBuf::from(
        shellexpand::tilde(cli.config_dir.to_string_lossy().as_ref()).into_owned(),
    );

    match cli.command {
        Commands::Init => setup::install(&config_dir),
        Commands::Doctor => setup::doctor(&config_dir),
        Commands::Reconcile { interval } => Runtime::new(&config_dir)?.reconcile(interval.as_deref()),
        Commands::List => Runtime::new(&config_dir)?.list(),
        Commands::Stop { name } => Runtime::new(&config_dir)?
            .stop(name.as_deref())
            .map(|_| ()),
        Commands::Specs => Runtime::new(&config_dir)?.specs(),
    }
}
