//! oppnote CLI
//!
//! Files an email and its attachments as a note on a CRM opportunity.

mod commands;
mod config;
mod mail;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use oppnote_client::{AuthClient, CrmClient};
use oppnote_core::Session;
use oppnote_session::{FileBackend, SessionStore};
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::OppnoteConfig;

/// oppnote: file emails as notes on CRM opportunities.
#[derive(Parser, Debug)]
#[command(name = "oppnote", version, about)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, env = "OPPNOTE_CONFIG", default_value = "oppnote.toml", global = true)]
    config: PathBuf,

    /// CRM REST API base URL.
    #[arg(long, env = "OPPNOTE_API_URL", global = true)]
    api_url: Option<String>,

    /// GraphQL authentication endpoint.
    #[arg(long, env = "OPPNOTE_AUTH_URL", global = true)]
    auth_url: Option<String>,

    /// Output format.
    #[arg(long, default_value = "text", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and store the session.
    Login(commands::login::LoginArgs),
    /// Sign out and remove the stored session.
    Logout,
    /// Show the signed-in user.
    Whoami,
    /// Browse opportunities.
    Opportunities(commands::opportunities::OpportunitiesArgs),
    /// List the attachments of a message.
    Attachments(commands::attachments::AttachmentsArgs),
    /// File a message as a note on an opportunity.
    Sync(commands::sync::SyncArgs),
}

/// Everything a command needs, built once from configuration.
pub struct App {
    pub config: OppnoteConfig,
    pub store: SessionStore,
}

impl App {
    pub fn crm(&self) -> anyhow::Result<CrmClient> {
        Ok(CrmClient::builder(&self.config.crm.api_base_url)
            .timeout(self.config.crm.timeout())
            .build()?)
    }

    pub fn auth(&self) -> anyhow::Result<AuthClient> {
        Ok(AuthClient::with_timeout(
            &self.config.crm.auth_url,
            self.config.crm.timeout(),
        )?)
    }

    /// The stored session, or an error telling the user to sign in.
    pub fn session(&self) -> anyhow::Result<Session> {
        let session = self
            .store
            .current()
            .ok_or_else(|| anyhow::anyhow!("not signed in; run `oppnote login` first"))?;
        if session.access_token_expired(chrono::Utc::now()) {
            tracing::warn!("access token has expired; remote calls will likely be rejected");
        }
        Ok(session)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = OppnoteConfig::load(&cli.config)?
        .with_overrides(cli.api_url.as_deref(), cli.auth_url.as_deref());
    let store = SessionStore::open(FileBackend::new(config.session.resolved_path()));
    let app = App { config, store };

    match cli.command {
        Command::Login(args) => commands::login::run(&app, &args, &cli.format).await,
        Command::Logout => commands::logout::run(&app),
        Command::Whoami => commands::whoami::run(&app, &cli.format),
        Command::Opportunities(args) => {
            commands::opportunities::run(&app, &args, &cli.format).await
        }
        Command::Attachments(args) => commands::attachments::run(&args, &cli.format).await,
        Command::Sync(args) => commands::sync::run(&app, &args, &cli.format).await,
    }
}
