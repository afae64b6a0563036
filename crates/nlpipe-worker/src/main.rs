//! `nlpipe-worker`: spawns a worker pool against a filesystem store
//! (spec.md §6.4).
//!
//! Workers always consume the [`nlpipe_core::Store`] abstraction
//! directly (DESIGN.md's "Client variants" decision) — there is no
//! HTTP-remote worker variant, since the out-of-scope "optional
//! pluggable HTTP-client mirror of the filesystem client" (spec.md §1)
//! is not implemented here.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use nlpipe_core::{Registry, Service, Store};
use nlpipe_worker::{spawn_pool, WorkerConfig, DEFAULT_POLL_INTERVAL};

/// Long-polling worker pool for NLPipe modules.
#[derive(Parser)]
#[command(name = "nlpipe-worker", author, version, propagate_version = true)]
struct Cli {
    /// Store root directory.
    #[arg(env = "NLPIPE_DIR")]
    root: PathBuf,

    /// Modules to process; one pool is started per module.
    #[arg(required = true)]
    modules: Vec<String>,

    /// Worker units per module.
    #[arg(long, default_value_t = 1)]
    processes: usize,

    /// Exit each pool once its queue is observed empty, instead of
    /// polling forever.
    #[arg(long)]
    quit: bool,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_tracing(cli.verbose);

    let store = Store::new(&cli.root);
    let mut registry = Registry::new();
    nlpipe_modules::register_builtins(&mut registry).context("registering built-in processors")?;
    let service = Service::new(store, registry);

    let mut handles = Vec::new();
    for module in &cli.modules {
        let config = WorkerConfig {
            concurrency: cli.processes,
            quit_on_empty: cli.quit,
            poll_interval: DEFAULT_POLL_INTERVAL,
        };
        let pool = spawn_pool(service.clone(), module.clone(), config)
            .with_context(|| format!("starting worker pool for module {module}"))?;
        handles.extend(pool);
    }

    if cli.quit {
        for handle in handles {
            handle.await?;
        }
    } else {
        tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;
        tracing::info!("shutdown requested, exiting (in-flight tasks are not cancelled)");
    }

    Ok(())
}

fn setup_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_writer(std::io::stderr)
        .init();
}
