use anyhow::{Context, Result, bail};
use clap::Parser;
use std::{env, time::Duration};

/// JWT secrets that must never reach a running server.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me", "dev-secret-change-me"];

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub max_connections: u32,
    pub jwt_secret: String,
    pub asset_store_url: String,
    pub asset_timeout_secs: u64,
    pub reconcile_interval_secs: u64,
    pub reconcile_stale_after_secs: u64,
}

/// What the process should do after loading configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Serve,
    Migrate,
    IssueToken(String),
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Photo moderation and role administration API")]
pub struct Args {
    /// Host to bind to (overrides MODERATION_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides MODERATION_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides MODERATION_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Base URL of the remote asset store (overrides MODERATION_ASSET_STORE_URL)
    #[arg(long)]
    pub asset_store_url: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,

    /// Print a signed bearer token for USERNAME carrying their current roles, then exit
    #[arg(long, value_name = "USERNAME")]
    pub issue_token: Option<String>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and the requested command.
    pub fn from_env_and_args() -> Result<(Self, Command)> {
        let args = Args::parse();

        let env_host = env::var("MODERATION_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = env_number("MODERATION_PORT", 5001u16)?;
        let env_db = env::var("MODERATION_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/moderation.db".into());
        let env_asset_store = env::var("MODERATION_ASSET_STORE_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:3000/photos".into());

        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.unwrap_or(env_db),
            max_connections: env_number("MODERATION_MAX_CONNECTIONS", 5u32)?,
            jwt_secret: env::var("MODERATION_JWT_SECRET").unwrap_or_default(),
            asset_store_url: args.asset_store_url.unwrap_or(env_asset_store),
            asset_timeout_secs: env_number("MODERATION_ASSET_TIMEOUT_SECS", 10u64)?,
            reconcile_interval_secs: env_number("MODERATION_RECONCILE_INTERVAL_SECS", 60u64)?,
            reconcile_stale_after_secs: env_number(
                "MODERATION_RECONCILE_STALE_AFTER_SECS",
                300u64,
            )?,
        };

        let command = if args.migrate {
            Command::Migrate
        } else if let Some(username) = args.issue_token {
            Command::IssueToken(username)
        } else {
            Command::Serve
        };

        if command != Command::Migrate {
            cfg.ensure_secret()?;
        }

        Ok((cfg, command))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn asset_timeout(&self) -> Duration {
        Duration::from_secs(self.asset_timeout_secs)
    }

    fn ensure_secret(&self) -> Result<()> {
        if self.jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&self.jwt_secret.as_str()) {
            bail!("MODERATION_JWT_SECRET is unset or still a placeholder");
        }
        Ok(())
    }
}

fn env_number<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}
