mod client;
mod logging;
mod modules;
mod rules;
mod run;

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::bail;
use clap::{Parser, Subcommand};
use scriptling_host::ordering::load_order;
use scriptling_host::{ConfigLoadError, HostConfig, discover_modules};
use tracing::info;

use crate::rules::RuleRuntime;

#[derive(Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enables debug mode (repeat for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    debug: u8,

    /// Also write logs to the data directory
    #[arg(long)]
    log_file: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List module folders in load order
    Modules {
        /// Modules directory (overrides config)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Run a simulated client with the built-in and installed modules
    Run {
        /// Stop after this many ticks (default: run until Ctrl-C)
        #[arg(long)]
        ticks: Option<u64>,

        /// Modules directory (overrides config)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Write an example config file
    InitConfig,
}

fn load_config() -> anyhow::Result<HostConfig> {
    match HostConfig::load() {
        Ok(config) => Ok(config),
        Err(ConfigLoadError::NotFound) => {
            info!(
                "No config at {}, using defaults",
                HostConfig::config_path().display()
            );
            Ok(HostConfig::default())
        }
        Err(e) => Err(e.into()),
    }
}

fn create_example_config() -> anyhow::Result<()> {
    let config_path = HostConfig::config_path();

    // Never overwrite an existing config file
    if config_path.exists() {
        bail!(
            "Config file already exists at {}. Please edit it manually or delete it to create a new one.",
            config_path.display()
        );
    }

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let example_config = r#"# Scriptling Configuration

[scripting]
enabled = true
# modules_dir = "/path/to/modules"
hot_reload = true
hot_reload_interval_ms = 1000

# Per-module settings; `enabled = false` keeps a module from loading
# [scripting.modules.some_module]
# enabled = false

[dispatch]
min_priority = -1000
max_priority = 1000
# Disable a trigger after this many faults
# max_faults = 3
fault_log_capacity = 64
"#;

    fs::write(&config_path, example_config)?;
    info!("Created example config at {}", config_path.display());
    eprintln!("Config file created at: {}", config_path.display());

    Ok(())
}

fn list_modules(config: &HostConfig, dir: Option<PathBuf>) -> anyhow::Result<()> {
    let modules_dir = dir.unwrap_or_else(|| config.scripting.modules_dir());
    let sources = discover_modules(&modules_dir, Arc::new(RuleRuntime), &config.scripting);

    if sources.is_empty() {
        println!("No modules found in {}", modules_dir.display());
        return Ok(());
    }

    let metadata: Vec<_> = sources.iter().map(|s| s.metadata().clone()).collect();
    let plan = load_order(&metadata);

    println!("Modules in {} (load order):", modules_dir.display());
    for (n, &i) in plan.order.iter().enumerate() {
        let module = &metadata[i];
        let kind = if module.entry.is_some() { "" } else { " [library]" };
        print!("{:>3}. {} {}{}", n + 1, module.name, module.version_or_default(), kind);
        if !module.requires.is_empty() {
            print!("  requires: {}", module.requires.join(", "));
        }
        println!();
        if let Some(description) = &module.description {
            println!("       {}", description);
        }
    }

    if !plan.rejected.is_empty() {
        println!("Cannot load:");
        for (_, error) in &plan.rejected {
            println!("  {}", error);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = logging::init_logging(cli.debug, cli.log_file)?;

    match cli.command {
        Command::Modules { dir } => list_modules(&load_config()?, dir),
        Command::Run { ticks, dir } => {
            info!("Starting scriptling host...");
            run::run(load_config()?, ticks, dir).await
        }
        Command::InitConfig => create_example_config(),
    }
}
