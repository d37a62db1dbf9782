//! Command-line client for the theatre catalog backend.
//!
//! SYSTEM CONTEXT
//! ==============
//! Same services as the browser client, with the session persisted in a JSON
//! file instead of `localStorage`. Endpoint settings come from flags first,
//! then the `STAGEDOOR_*` environment. A session the server rejects is cleared
//! from the file and the command fails with a "log in again" error.

#[cfg(test)]
#[path = "main_test.rs"]
mod main_test;

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use stagedoor::config::{self, ApiConfig, ConfigError};
use stagedoor::guard::{AppRoute, GuardDecision};
use stagedoor::storage::FileStorage;
use stagedoor::transport::{HeaderOverrides, ReqwestTransport, Transport, TransportError};
use stagedoor::types::{Credentials, Registration, Theatre};
use stagedoor::{ApiError, AppContext, SessionStore};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("cannot locate a session file; pass --session-file or set STAGEDOOR_SESSION_FILE")]
    NoSessionFile,
    #[error("transport setup failed: {0}")]
    Transport(#[from] TransportError),
    #[error("session expired; log in again")]
    SessionExpired,
    #[error("server returned {status}: {message}")]
    Server { status: u16, message: String },
    #[error("request failed: {0}")]
    Request(String),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

impl From<ApiError> for CliError {
    fn from(err: ApiError) -> Self {
        match &err {
            ApiError::SessionInvalidated => Self::SessionExpired,
            ApiError::Rejected { status, .. } => Self::Server { status: *status, message: err.message() },
            _ => Self::Request(err.to_string()),
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "stagedoor-cli", about = "Theatre catalog API CLI")]
struct Cli {
    /// Auth API base URL [env: STAGEDOOR_API_BASE_URL]
    #[arg(long)]
    base_url: Option<String>,

    /// Catalog resource URL [env: STAGEDOOR_CATALOG_URL]
    #[arg(long)]
    catalog_url: Option<String>,

    /// Send the session token to the catalog [env: STAGEDOOR_CATALOG_AUTH]
    #[arg(long)]
    catalog_auth: Option<bool>,

    #[arg(long, env = "STAGEDOOR_SESSION_FILE")]
    session_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and store the session.
    Login {
        #[arg(long)]
        user: String,
        #[arg(long, env = "STAGEDOOR_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Complete a staged registration with the token printed by `login`.
    Register(RegisterArgs),
    Profile,
    Logout,
    /// Show the stored session without calling the server.
    Status,
    Refresh,
    /// Show the route guard decision for an application path.
    Route { path: String },
    Theatre(TheatreCommand),
}

#[derive(Args, Debug)]
struct RegisterArgs {
    token: String,
    #[arg(long)]
    first_name: String,
    #[arg(long)]
    last_name: String,
    /// Date of birth, `YYYY-MM-DD`.
    #[arg(long)]
    dob: String,
}

#[derive(Args, Debug)]
struct TheatreCommand {
    #[command(subcommand)]
    command: TheatreSubcommand,
}

#[derive(Subcommand, Debug)]
enum TheatreSubcommand {
    List,
    Show {
        id: String,
    },
    Create(TheatreFields),
    Update {
        id: String,
        #[command(flatten)]
        fields: TheatreFields,
    },
    Delete {
        id: String,
    },
}

#[derive(Args, Debug)]
struct TheatreFields {
    #[arg(long)]
    title: String,
    #[arg(long, default_value = "")]
    description: String,
}

impl From<TheatreFields> for Theatre {
    fn from(fields: TheatreFields) -> Self {
        Self { title: fields.title, description: fields.description, ..Self::default() }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), CliError> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(&cli, |key| std::env::var(key).ok())?;
    let path = session_path(cli.session_file.clone(), dirs::config_dir())?;
    tracing::debug!(path = %path.display(), base = %config.api_base_url, "starting");

    let transport = ReqwestTransport::new(Duration::from_secs(config.request_timeout_secs))?;
    let session = SessionStore::new(FileStorage::new(path.clone()));
    let ctx = AppContext::new(&config, transport, session, || {
        tracing::warn!("server rejected the session; stored session cleared");
    });
    run(&ctx, cli.command, &path).await
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Flags win over `env`.
fn load_config(cli: &Cli, env: impl Fn(&str) -> Option<String>) -> Result<ApiConfig, ConfigError> {
    ApiConfig::from_lookup(|key| flag_value(cli, key).or_else(|| env(key)))
}

fn flag_value(cli: &Cli, key: &str) -> Option<String> {
    match key {
        config::API_BASE_URL_VAR => cli.base_url.clone(),
        config::CATALOG_URL_VAR => cli.catalog_url.clone(),
        config::CATALOG_AUTH_VAR => cli.catalog_auth.map(|enabled| enabled.to_string()),
        _ => None,
    }
}

fn session_path(explicit: Option<PathBuf>, config_dir: Option<PathBuf>) -> Result<PathBuf, CliError> {
    explicit
        .or_else(|| config_dir.map(|dir| dir.join("stagedoor").join("session.json")))
        .ok_or(CliError::NoSessionFile)
}

async fn run<T: Transport>(ctx: &AppContext<T>, command: Command, session_file: &Path) -> Result<(), CliError> {
    match command {
        Command::Login { user, password } => {
            let response = ctx.auth.login(&Credentials { user_name: user, password }).await?;
            if let Some(token) = response.pending_registration() {
                println!("registration required; run: stagedoor-cli register {token} --first-name <NAME> --last-name <NAME> --dob <YYYY-MM-DD>");
            } else {
                println!("logged in as {}", response.user_name.as_deref().unwrap_or("(unknown)"));
            }
            Ok(())
        }
        Command::Register(args) => {
            let fields = Registration { first_name: args.first_name, last_name: args.last_name, dob: args.dob };
            let response = ctx.auth.register(&fields, &HeaderOverrides::bearer(&args.token)).await?;
            print_json(&response)
        }
        Command::Profile => print_json(&ctx.auth.profile().await?),
        Command::Logout => {
            if let Err(e) = ctx.auth.logout().await {
                tracing::warn!(error = %e, "server logout failed");
            }
            println!("logged out");
            Ok(())
        }
        Command::Status => {
            let session = ctx.session().session();
            print_json(&json!({
                "authenticated": ctx.auth.is_authenticated(),
                "userName": session.and_then(|s| s.user_name),
                "sessionFile": session_file.display().to_string(),
            }))
        }
        Command::Refresh => {
            ctx.auth.refresh().await?;
            println!("session refreshed");
            Ok(())
        }
        Command::Route { path } => {
            let route = AppRoute::parse(&path);
            println!("{}", describe_decision(&route, ctx.decide(&route)));
            Ok(())
        }
        Command::Theatre(theatre) => run_theatre(ctx, theatre.command).await,
    }
}

async fn run_theatre<T: Transport>(ctx: &AppContext<T>, command: TheatreSubcommand) -> Result<(), CliError> {
    match command {
        TheatreSubcommand::List => print_json(&ctx.catalog.list().await?),
        TheatreSubcommand::Show { id } => print_json(&ctx.catalog.by_id(&id).await?),
        TheatreSubcommand::Create(fields) => print_json(&ctx.catalog.create(&fields.into()).await?),
        TheatreSubcommand::Update { id, fields } => print_json(&ctx.catalog.update(&id, &fields.into()).await?),
        TheatreSubcommand::Delete { id } => {
            let removed = ctx.catalog.delete(&id).await?;
            match removed {
                Some(record) => print_json(&record),
                None => {
                    println!("deleted {id}");
                    Ok(())
                }
            }
        }
    }
}

fn describe_decision(route: &AppRoute, decision: GuardDecision) -> String {
    match decision {
        GuardDecision::Render => format!("render {}", route.path()),
        GuardDecision::Redirect(to) => format!("redirect {} -> {to}", route.path()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
