use clap::Parser;
use std::{net::SocketAddr, str::FromStr};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid environment variable format for {0}: {1}")]
    InvalidVar(String, String),
    #[error(transparent)]
    DotEnvError(#[from] dotenvy::Error),
}

/// Command-line flags. Every flag falls back to an environment variable.
#[derive(Parser, Debug)]
#[command(author, version, about = "Bicycle color photo gallery")]
pub struct Args {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8082)]
    pub port: u16,

    /// Host to bind to
    #[arg(long, env = "BIND_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Development mode: no cache headers, templates and static files read from disk
    #[arg(long, env = "DEV_MODE")]
    pub dev_mode: bool,

    /// Log every request and response
    #[arg(long, env = "LOG_REQUESTS")]
    pub log_requests: bool,

    /// Expose the moderation routes under /_admin/
    #[arg(long, env = "ENABLE_ADMIN")]
    pub enable_admin: bool,

    /// Keep objects in process memory instead of the bucket (local demo only)
    #[arg(long, env = "MEMORY_STORE")]
    pub memory_store: bool,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub photo_bucket_name: String,
    pub aws_region: String,
    // Optional endpoint for LocalStack / MinIO
    pub endpoint_url: Option<String>,
    pub dev_mode: bool,
    pub log_requests: bool,
    pub enable_admin: bool,
    pub memory_store: bool,
}

impl Config {
    /// Loads configuration from the command line and environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignores errors, relies on env vars otherwise)
        dotenvy::dotenv().ok();
        Self::from_args(Args::parse(), |name| std::env::var(name).ok())
    }

    /// Builds the configuration from parsed flags and an environment lookup.
    pub fn from_args(
        args: Args,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let bind_address_str = format!("{}:{}", args.host, args.port);
        let bind_address = SocketAddr::from_str(&bind_address_str)
            .map_err(|e| ConfigError::InvalidVar("BIND_HOST".into(), e.to_string()))?;

        let photo_bucket_name = match env("PHOTO_BUCKET_NAME") {
            Some(name) if !name.trim().is_empty() => name,
            _ if args.memory_store => "memory".to_string(),
            _ => return Err(ConfigError::MissingVar("PHOTO_BUCKET_NAME".into())),
        };

        let aws_region = env("AWS_DEFAULT_REGION").unwrap_or_else(|| "us-east-1".to_string());
        let endpoint_url = env("AWS_ENDPOINT_URL").filter(|url| !url.trim().is_empty());

        Ok(Config {
            bind_address,
            photo_bucket_name,
            aws_region,
            endpoint_url,
            dev_mode: args.dev_mode,
            log_requests: args.log_requests,
            enable_admin: args.enable_admin,
            memory_store: args.memory_store,
        })
    }

    /// Configuration used by router tests: in-memory store, admin enabled.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Config {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8082)),
            photo_bucket_name: "memory".to_string(),
            aws_region: "us-east-1".to_string(),
            endpoint_url: None,
            dev_mode: false,
            log_requests: false,
            enable_admin: true,
            memory_store: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{CommandFactory, FromArgMatches};
    use std::collections::HashMap;

    /// Parses flags with every env fallback removed, so the outcome does not
    /// depend on the test process environment.
    fn parse(argv: &[&str]) -> Args {
        let matches = Args::command()
            .mut_args(|arg| arg.env(None::<&'static str>))
            .try_get_matches_from(argv.iter().copied())
            .unwrap();
        Args::from_arg_matches(&matches).unwrap()
    }

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_listen_on_8082() {
        let args = parse(&["cycle_colors"]);
        let config = Config::from_args(args, lookup(&[("PHOTO_BUCKET_NAME", "bikes")])).unwrap();
        assert_eq!(config.bind_address.port(), 8082);
        assert_eq!(config.photo_bucket_name, "bikes");
        assert_eq!(config.aws_region, "us-east-1");
        assert!(!config.enable_admin);
        assert!(!config.dev_mode);
    }

    #[test]
    fn flags_override_defaults() {
        let args = parse(&["cycle_colors", "--port", "9000", "--dev-mode"]);
        let config = Config::from_args(args, lookup(&[("PHOTO_BUCKET_NAME", "bikes")])).unwrap();
        assert_eq!(config.bind_address.port(), 9000);
        assert!(config.dev_mode);
    }

    #[test]
    fn bucket_is_required_without_memory_store() {
        let args = parse(&["cycle_colors"]);
        let err = Config::from_args(args, lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(ref v) if v == "PHOTO_BUCKET_NAME"));
    }

    #[test]
    fn memory_store_needs_no_bucket() {
        let args = parse(&["cycle_colors", "--memory-store", "--enable-admin"]);
        let config = Config::from_args(args, lookup(&[])).unwrap();
        assert!(config.memory_store);
        assert!(config.enable_admin);
    }

    #[test]
    fn bad_host_is_rejected() {
        let args = parse(&["cycle_colors", "--host", "not a host"]);
        let err = Config::from_args(args, lookup(&[("PHOTO_BUCKET_NAME", "bikes")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidVar(..)));
    }
}
