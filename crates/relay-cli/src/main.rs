//! mcp-relay: serve the relay over HTTP, or run a single tool call.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use relay_config::{CliOverrides, RelayConfig};
use relay_mcp::credentials::PROVIDER_KEY_SECRET;
use relay_mcp::{ClientIdentity, CredentialResolver, HttpTransport, SecretStore, ToolExecutor};
use relay_store::{MemoryCache, MemoryStore};
use relay_types::ServerDescriptor;
use serde_json::Value;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "mcp-relay", version, about = "Relay tool calls to remote MCP servers")]
struct Cli {
    /// Enable verbose/debug logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Configuration directory (default: ~/.mcp-relay)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the tool relay and connection endpoints until Ctrl-C
    Serve {
        /// Address to listen on (overrides MCP_RELAY_LISTEN)
        #[arg(long)]
        listen: Option<String>,
    },
    /// Run one tool call and print its result
    Call(CallArgs),
}

#[derive(Args)]
struct CallArgs {
    /// MCP endpoint URL
    #[arg(long, required_unless_present_all = ["namespace", "connection_id"])]
    url: Option<String>,

    /// Tool to invoke
    #[arg(long)]
    tool: String,

    /// Tool arguments as a JSON object
    #[arg(long, default_value = "{}")]
    args: String,

    /// Per-call API key for the target server
    #[arg(long)]
    api_key: Option<String>,

    /// Provider namespace of a managed connection
    #[arg(long, requires = "connection_id")]
    namespace: Option<String>,

    /// Managed connection id
    #[arg(long, requires = "namespace")]
    connection_id: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = match (&cli.command, cli.verbose) {
        (_, true) => "debug",
        (Command::Serve { .. }, false) => "info",
        (Command::Call(_), false) => "warn",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();

    let listen = match &cli.command {
        Command::Serve { listen } => listen.clone(),
        Command::Call(_) => None,
    };
    let config = RelayConfig::load(CliOverrides {
        listen,
        config_dir: cli.config_dir,
    })
    .context("Failed to load configuration")?;

    match cli.command {
        Command::Serve { .. } => relay_server::start_server(config)
            .await
            .context("Relay server failed"),
        Command::Call(args) => call(&config, args).await,
    }
}

fn descriptor(args: &CallArgs) -> ServerDescriptor {
    let server = match (&args.namespace, &args.connection_id) {
        (Some(ns), Some(id)) => ServerDescriptor::managed(ns, id),
        _ => ServerDescriptor::new(args.url.clone().unwrap_or_default()),
    };
    match &args.api_key {
        Some(key) => server.with_api_key(key.clone()),
        None => server,
    }
}

/// Run the tool through the executor against an in-memory audit log.
async fn call(config: &RelayConfig, args: CallArgs) -> Result<()> {
    let arguments: Value =
        serde_json::from_str(&args.args).context("--args must be a JSON object")?;
    if !arguments.is_object() {
        anyhow::bail!("--args must be a JSON object");
    }

    let mut secrets = SecretStore::from_env().with_overrides(config.secrets.clone());
    if let Some(key) = &config.provider.api_key {
        secrets.insert(PROVIDER_KEY_SECRET, key.clone());
    }
    let resolver = CredentialResolver::new(secrets, config.provider.base_url.clone());
    let transport = HttpTransport::new(resolver, Duration::from_millis(config.mcp.timeout_ms))
        .context("Failed to create HTTP client")?;

    let audit = Arc::new(MemoryStore::new());
    let client = ClientIdentity {
        name: config.mcp.client_name.clone(),
        version: config.mcp.client_version.clone(),
        protocol_version: config.mcp.protocol_version.clone(),
    };
    let executor = ToolExecutor::new(
        Arc::new(transport),
        Arc::new(MemoryCache::new()),
        audit.clone(),
        client,
    );

    let server = descriptor(&args);
    let result = executor.execute(&server, &args.tool, arguments).await;
    println!("{result}");

    if let Some(entry) = audit.audit_entries().last() {
        tracing::debug!("{} finished in {}ms", entry.tool_name, entry.duration_ms);
    }
    if result.starts_with("Error:") {
        std::process::exit(1);
    }
    Ok(())
}
