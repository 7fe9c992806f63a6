//! netmon - command line client for a network monitoring server's REST API.
//!
//! Authenticates with the OAuth2 password grant, then either reports the
//! session, prints the bearer header set, or fetches a JSON resource.
//!
//! Exit codes:
//! - 0: success
//! - 1: runtime error (resolution, unreachable port, token rejected, ...)
//! - 2: argument validation error (clap handles this automatically)

mod prompt;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use netmon_core::api::ApiClient;
use netmon_core::auth::{CredentialResolver, CredentialStore, Protocol, SessionManager};
use netmon_core::config::Config;

use prompt::TerminalPrompt;

#[derive(Parser)]
#[command(name = "netmon", version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args)]
struct ConnectionArgs {
    /// Server hostname or IP address. Falls back to the config file.
    #[arg(long, short = 's', global = true, env = "NETMON_SERVER")]
    server: Option<String>,

    /// http or https
    #[arg(long, global = true)]
    protocol: Option<Protocol>,

    #[arg(long, global = true)]
    port: Option<u16>,

    /// Token endpoint path appended to the base URI.
    #[arg(long, global = true)]
    token_path: Option<String>,

    #[arg(long, short = 'u', global = true, env = "NETMON_USERNAME")]
    username: Option<String>,

    /// Prefer the NETMON_PASSWORD environment variable to keep the
    /// password out of process listings and shell history.
    #[arg(long, global = true, env = "NETMON_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Accept invalid TLS certificates for this run.
    #[arg(long, global = true)]
    ignore_ssl_errors: bool,

    /// Store the password in the OS keychain after a successful connect.
    #[arg(long, global = true)]
    save_password: bool,

    /// Remove the stored password for this user and server before connecting.
    #[arg(long, global = true, conflicts_with = "save_password")]
    forget_password: bool,

    /// Use this config file instead of the default location.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Authenticate and print the session summary
    Connect,
    /// Authenticate and print the bearer header set
    Token,
    /// Authenticate and GET a JSON resource relative to the base URI
    Get {
        /// Resource path, e.g. /api/v1/devices
        path: String,
    },
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let args = cli.connection;

    let config_path = match args.config {
        Some(ref path) => path.clone(),
        None => Config::config_path()?,
    };
    let mut config = match Config::load_from(&config_path) {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "Failed to load config, using defaults");
            Config::default()
        }
    };
    apply_overrides(&mut config, &args);

    let target = config.connect_target(args.server.as_deref())?;
    debug!(?target, "Connection target");

    let username = args.username.clone().or_else(|| config.last_username.clone());
    if args.forget_password {
        if let Some(ref user) = username {
            match CredentialStore::delete(user, &target.server) {
                Ok(()) => info!(username = %user, "Stored password removed"),
                Err(e) => warn!(error = %e, "Failed to remove stored password"),
            }
        }
    }
    let password = args.password.clone().or_else(|| {
        if args.forget_password {
            return None;
        }
        let user = username.as_deref()?;
        if !CredentialStore::has_credentials(user, &target.server) {
            return None;
        }
        match CredentialStore::get_password(user, &target.server) {
            Ok(password) => Some(password),
            Err(e) => {
                warn!(error = %e, "Failed to read stored password");
                None
            }
        }
    });

    let credentials = CredentialResolver::new()
        .username(username)
        .password(password)
        .resolve(&mut TerminalPrompt)?;

    let manager = Arc::new(SessionManager::with_options(config.session_options())?);
    debug!(options = ?manager.options(), "Session options");
    let result = manager
        .connect(&target, credentials.clone())
        .await
        .with_context(|| format!("Failed to connect to {}", target.server))?;
    info!(base_uri = %result.base_uri, "Connected");

    if args.save_password {
        if let Err(e) =
            CredentialStore::store(credentials.username(), &target.server, credentials.password())
        {
            warn!(error = %e, "Failed to store credentials");
        }
    }

    config.server = Some(target.server.clone());
    config.last_username = Some(credentials.username().to_string());
    if let Err(e) = config.save_to(&config_path) {
        warn!(error = %e, "Failed to save config");
    }

    match cli.command {
        Command::Connect => println!("{}", result),
        Command::Token => {
            let headers = manager.ensure_valid_session().await?;
            for (name, value) in headers.iter() {
                println!("{}: {}", name, value.to_str().unwrap_or("<binary>"));
            }
            if let Some(session) = manager.session().await {
                eprintln!("Token valid for {} more minutes", session.minutes_until_expiry());
            }
        }
        Command::Get { path } => {
            let client = ApiClient::new(manager);
            let body: serde_json::Value = client
                .get(&path)
                .await
                .with_context(|| format!("GET {} failed", path))?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
    }

    Ok(())
}

/// Command line flags win over the config file.
fn apply_overrides(config: &mut Config, args: &ConnectionArgs) {
    if let Some(protocol) = args.protocol {
        config.protocol = protocol;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(ref token_path) = args.token_path {
        config.token_path = token_path.clone();
    }
    if args.ignore_ssl_errors {
        config.ignore_ssl_errors = true;
    }
}
