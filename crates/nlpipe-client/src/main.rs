//! `nlpipe-client`: the one-shot CLI driver (spec.md §6.4).
//!
//! `<server>` is either an `http(s)://` URL (routed through
//! [`nlpipe_client::HttpClient`]) or a store root directory (routed
//! through [`nlpipe_client::FsClient`]) — see [`nlpipe_client::open`].
//! Document payloads are read from a file path argument, or from stdin
//! when that argument is `-`, matching
//! `original_source/nlpipe/client.py`'s `_read_doc` helper.

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// One-shot NLPipe client: submit documents, poll status, fetch
/// results, or manually resolve a task from the command line.
#[derive(Parser)]
#[command(name = "nlpipe-client", author, version, propagate_version = true)]
struct Cli {
    /// Server URL (`http://host:port`) or store root directory.
    server: String,

    /// Module to act on.
    module: String,

    #[command(subcommand)]
    action: Action,

    /// Bearer token for HTTP transport; ignored for a filesystem server.
    #[arg(long, env = "NLPIPE_TOKEN", global = true)]
    token: Option<String>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Action {
    /// Query a task's status.
    Status { id: String },

    /// Fetch a task's stored result (must be `DONE`).
    Result {
        id: String,
        #[arg(long)]
        format: Option<String>,
    },

    /// Submit a document for processing, printing its id.
    Process {
        /// Document path, or `-` to read from stdin.
        doc: PathBuf,
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        reset_error: bool,
        #[arg(long)]
        reset_pending: bool,
    },

    /// Submit a document and block until it reaches a terminal state,
    /// printing the result (or failing on `ERROR`).
    ProcessInline {
        doc: PathBuf,
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        format: Option<String>,
    },

    /// Query the status of several ids at once.
    BulkStatus { ids: Vec<String> },

    /// Fetch the results of several ids at once.
    BulkResult {
        ids: Vec<String>,
        #[arg(long)]
        format: Option<String>,
    },

    /// Manually store a result for a task (operator/testing escape
    /// hatch; bypasses the worker pool entirely).
    StoreResult { id: String, doc: PathBuf },

    /// Manually store an error for a task.
    StoreError { id: String, doc: PathBuf },
}

fn read_doc(path: &PathBuf) -> Result<Vec<u8>> {
    if path.as_os_str() == "-" {
        let mut buf = Vec::new();
        io::stdin().read_to_end(&mut buf).context("reading document from stdin")?;
        Ok(buf)
    } else {
        fs::read(path).with_context(|| format!("reading document from {}", path.display()))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_tracing(cli.verbose);

    let client = nlpipe_client::open(&cli.server, cli.token).context("connecting to server")?;
    let module = cli.module.as_str();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.action {
        Action::Status { id } => {
            let status = client.status(module, &id).await?;
            writeln!(out, "{status}")?;
        }
        Action::Result { id, format } => {
            let result = client.result(module, &id, format.as_deref()).await?;
            out.write_all(&result)?;
        }
        Action::Process { doc, id, reset_error, reset_pending } => {
            let bytes = read_doc(&doc)?;
            let id = client.process(module, &bytes, id.as_deref(), reset_error, reset_pending).await?;
            writeln!(out, "{id}")?;
        }
        Action::ProcessInline { doc, id, format } => {
            let bytes = read_doc(&doc)?;
            let result = client.process_inline(module, &bytes, id.as_deref(), format.as_deref()).await?;
            out.write_all(&result)?;
        }
        Action::BulkStatus { ids } => {
            let statuses = client.bulk_status(module, &ids).await?;
            let body = serde_json::to_string(&statuses)?;
            writeln!(out, "{body}")?;
        }
        Action::BulkResult { ids, format } => {
            let results = client.bulk_result(module, &ids, format.as_deref()).await?;
            let as_text: std::collections::HashMap<String, String> = results
                .into_iter()
                .map(|(id, bytes)| (id, String::from_utf8_lossy(&bytes).into_owned()))
                .collect();
            let body = serde_json::to_string(&as_text)?;
            writeln!(out, "{body}")?;
        }
        Action::StoreResult { id, doc } => {
            let bytes = read_doc(&doc)?;
            client.store_result(module, &id, &bytes).await?;
        }
        Action::StoreError { id, doc } => {
            let bytes = read_doc(&doc)?;
            client.store_error(module, &id, &bytes).await?;
        }
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
