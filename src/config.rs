use anyhow::{Context, Result};
use clap::Parser;
use std::{env, fmt, str::FromStr, time::Duration};

use crate::services::session_store::MAX_SESSION_TTL;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Shared secret slave nodes and first-party clients sign requests with.
    pub node_secret: String,
    pub session_ttl: Duration,
    pub sweep_interval: Duration,
    pub public_key_ttl: Duration,
    pub max_body_bytes: usize,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database_url", &self.database_url)
            .field("node_secret", &"<redacted>")
            .field("session_ttl", &self.session_ttl)
            .field("sweep_interval", &self.sweep_interval)
            .field("public_key_ttl", &self.public_key_ttl)
            .field("max_body_bytes", &self.max_body_bytes)
            .finish()
    }
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Upload callback authentication gateway")]
pub struct Args {
    /// Host to bind to (overrides CALLBACK_GATEWAY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides CALLBACK_GATEWAY_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides CALLBACK_GATEWAY_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Seconds an upload may take before its callback session expires
    /// (overrides CALLBACK_GATEWAY_SESSION_TTL)
    #[arg(long)]
    pub session_ttl: Option<u64>,

    /// Largest callback body accepted, in bytes (overrides CALLBACK_GATEWAY_MAX_BODY_BYTES)
    #[arg(long)]
    pub max_body_bytes: Option<usize>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        let cfg = Self::merge(args, |name| env::var(name))?;
        Ok((cfg, migrate))
    }

    /// Merge CLI arguments over values read through `var`.
    pub fn merge<F>(args: Args, var: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        let env_host = var("CALLBACK_GATEWAY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = parse_var(&var, "CALLBACK_GATEWAY_PORT", 5212)?;
        let env_db = var("CALLBACK_GATEWAY_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/callback_gateway.db".into());
        let node_secret = var("CALLBACK_GATEWAY_NODE_SECRET").unwrap_or_default();
        if node_secret.is_empty() {
            anyhow::bail!("CALLBACK_GATEWAY_NODE_SECRET must be set");
        }
        let env_ttl = parse_var(&var, "CALLBACK_GATEWAY_SESSION_TTL", 3600)?;
        let sweep = parse_var(&var, "CALLBACK_GATEWAY_SWEEP_INTERVAL", 60)?;
        let key_ttl = parse_var(&var, "CALLBACK_GATEWAY_PUBLIC_KEY_TTL", 86_400)?;
        let env_body = parse_var(&var, "CALLBACK_GATEWAY_MAX_BODY_BYTES", 1024 * 1024)?;

        let session_ttl = Duration::from_secs(args.session_ttl.unwrap_or(env_ttl));
        if session_ttl.is_zero() || session_ttl > MAX_SESSION_TTL {
            anyhow::bail!(
                "session TTL must be between 1 and {} seconds",
                MAX_SESSION_TTL.as_secs()
            );
        }
        if sweep == 0 {
            anyhow::bail!("CALLBACK_GATEWAY_SWEEP_INTERVAL must be greater than zero");
        }

        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.unwrap_or(env_db),
            node_secret,
            session_ttl,
            sweep_interval: Duration::from_secs(sweep),
            public_key_ttl: Duration::from_secs(key_ttl),
            max_body_bytes: args.max_body_bytes.unwrap_or(env_body),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<F, T>(var: &F, name: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Result<String, env::VarError>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}
