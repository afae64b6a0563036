//! `nlpipe-server`: the REST facade binary (spec.md §6.4).

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use nlpipe_core::auth::Authenticator;
use nlpipe_core::{Registry, Service, Store};
use nlpipe_server::{AppState, Server, ServerConfig};

/// The NLPipe REST facade: a content-addressed task queue exposed over
/// HTTP (spec.md §4.4).
#[derive(Parser)]
#[command(name = "nlpipe-server", author, version, propagate_version = true)]
struct Cli {
    /// Store root directory. Defaults to a fresh temporary directory if
    /// neither this nor `NLPIPE_DIR` is given.
    #[arg(env = "NLPIPE_DIR")]
    root: Option<PathBuf>,

    #[arg(long, env = "NLPIPE_HOST", default_value = "127.0.0.1")]
    host: IpAddr,

    #[arg(long, env = "NLPIPE_PORT", default_value_t = 5001)]
    port: u16,

    /// Modules to also run embedded worker pools for, as a convenience
    /// (spec.md §4.4: "does not itself spawn workers ... only as a
    /// convenience").
    #[arg(long = "workers", num_args = 0.., value_name = "MODULE")]
    worker_modules: Vec<String>,

    /// Worker units per module named in `--workers`.
    #[arg(long, default_value_t = 1)]
    processes: usize,

    #[arg(long)]
    disable_authentication: bool,

    /// Read the token-signing secret from this file instead of deriving
    /// it from host identity (DESIGN.md Open Question 2) — needed
    /// whenever tokens must survive a server restart.
    #[arg(long, env = "NLPIPE_SECRET_FILE")]
    secret_file: Option<PathBuf>,

    /// Print an admin bearer token to stdout on startup.
    #[arg(long)]
    print_token: bool,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_tracing(cli.verbose);

    let root = cli.root.clone().unwrap_or_else(|| std::env::temp_dir().join("nlpipe"));
    let store = Store::new(&root);
    let mut registry = Registry::new();
    nlpipe_modules::register_builtins(&mut registry).context("registering built-in processors")?;
    let service = Service::new(store, registry.clone());

    let authenticator = if cli.disable_authentication {
        tracing::warn!("starting with authentication disabled");
        None
    } else if let Some(path) = &cli.secret_file {
        let secret = std::fs::read(path)
            .with_context(|| format!("reading secret file {}", path.display()))?;
        Some(Authenticator::from_secret(&secret))
    } else {
        Some(Authenticator::from_host_identity())
    };

    if cli.print_token {
        match &authenticator {
            Some(auth) => {
                let token = auth.issue_token().context("issuing admin token")?;
                println!("{token}");
            }
            None => println!("(authentication disabled, no token needed)"),
        }
    }

    let mut worker_handles = Vec::new();
    for module in &cli.worker_modules {
        let config = nlpipe_worker::WorkerConfig {
            concurrency: cli.processes,
            quit_on_empty: false,
            poll_interval: nlpipe_worker::DEFAULT_POLL_INTERVAL,
        };
        let handles = nlpipe_worker::spawn_pool(service.clone(), module.clone(), config)
            .with_context(|| format!("starting embedded worker pool for module {module}"))?;
        worker_handles.extend(handles);
    }

    let state = Arc::new(AppState::new(service, authenticator));
    let config = ServerConfig {
        bind_address: cli.host,
        port: cli.port,
        root,
        disable_authentication: cli.disable_authentication,
    };
    let server = Server::start(state, &config).await.context("starting HTTP listener")?;
    println!("listening on {}", server.url());

    tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;
    server.stop().await;
    for handle in worker_handles {
        handle.abort();
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
