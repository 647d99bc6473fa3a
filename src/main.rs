//! CLI entry point for inserv-manager
//!
//! Assembles the control tree over the configured bench, runs one command
//! against it and tears it down before exiting.
//!
//! # Usage
//!
//! ```bash
//! inserv-manager tree
//! inserv-manager set local/sig_gen/frequency 1e6
//! inserv-manager invoke local/sig_gen/trigger --times 3
//! inserv-manager --bench benches/optics.toml shell
//! ```

// Global allocator (Microsoft Rust Guidelines: M-MIMALLOC-APPS)
#[cfg(not(test))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use inserv_binding::{assemble, ControlTree};
use inserv_manager::{config::AppConfig, logging, render, session_params, Shell};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "inserv-manager")]
#[command(about = "Live control tree over remote instrument servers", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./inserv-manager.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Bench file describing the simulated instrument servers
    #[arg(long, global = true)]
    bench: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble and print the control tree
    Tree {
        /// Only this server or server/device
        filter: Option<String>,
    },

    /// Commit an edit through an attribute's control
    Set {
        /// server/device/attribute
        path: String,
        /// Choice label or index, number, or text
        value: String,
    },

    /// Activate an action trigger
    Invoke {
        /// server/device/action
        path: String,
        /// Number of activations
        #[arg(long, default_value_t = 1)]
        times: u32,
    },

    /// Interactive prompt
    Shell,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(bench) = cli.bench {
        config.bench.path = Some(bench);
    }
    logging::init(&config.logging)?;

    let gateway = Arc::new(config.load_bench()?.into_gateway()?);
    let mut tree = assemble(gateway.clone(), &config.assembly_options())
        .await
        .context("Failed to assemble control tree")?;
    eprint!("{}", render::render_report(tree.report()));

    let (outcome, mut tree) = match cli.command {
        Commands::Tree { filter } => {
            print!("{}", render::render_tree(&tree, filter.as_deref()));
            (Ok(()), tree)
        }
        Commands::Set { path, value } => {
            let outcome = set(&mut tree, &path, &value).await;
            (outcome, tree)
        }
        Commands::Invoke { path, times } => {
            let outcome = invoke(&mut tree, &path, times).await;
            (outcome, tree)
        }
        Commands::Shell => match session_params(config.assembly_options().controls) {
            Ok(params) => {
                let mut shell = Shell::new(tree, gateway, params);
                let stdin = BufReader::new(tokio::io::stdin());
                let outcome = shell.run(stdin, &mut std::io::stdout()).await;
                (outcome, shell.into_tree())
            }
            Err(e) => (Err(e.context("Failed to start shell")), tree),
        },
    };

    let report = tree.teardown().await;
    if report.failures.is_empty() {
        info!(released = report.released, "Shutdown complete");
    } else {
        warn!(
            released = report.released,
            failures = report.failures.len(),
            "Shutdown left subscriptions behind"
        );
    }
    outcome
}

async fn set(tree: &mut ControlTree, path: &str, value: &str) -> Result<()> {
    let outcome = tree.commit_input(path, value).await;
    tree.process_notifications();
    if let Ok(binding) = tree.binding(path) {
        println!("{}", render::binding_line(binding, 0));
    }
    outcome.with_context(|| format!("Failed to set {path}"))
}

async fn invoke(tree: &mut ControlTree, path: &str, times: u32) -> Result<()> {
    let mut stdout = std::io::stdout();
    for n in 1..=times {
        tree.activate(path)
            .await
            .with_context(|| format!("Activation {n} of {path} failed"))?;
        writeln!(stdout, "invoked {path} ({n}/{times})")?;
    }
    Ok(())
}
