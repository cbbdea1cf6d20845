use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    pub api_url: String,
    pub token_file: PathBuf,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let api_url =
            env::var("HEALTHHUB_API_URL").unwrap_or_else(|_| "http://127.0.0.1:8000".to_string());
        let token_file = env::var("HEALTHHUB_TOKEN_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".healthhub").join("session.json"));
        let timeout_secs = env::var("HEALTHHUB_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(15);

        Ok(Self {
            api_url,
            token_file,
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// Settings for the local development backend.
#[derive(Clone, Debug)]
pub struct DevServerConfig {
    pub bind_addr: String,
    pub access_token_ttl_minutes: i64,
    pub seed_admin: Option<(String, String)>,
}

impl DevServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8000".to_string());
        let access_token_ttl_minutes = env::var("ACCESS_TOKEN_TTL_MINUTES")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(60);
        let seed_admin = match (env::var("SEED_ADMIN_USERNAME"), env::var("SEED_ADMIN_PASSWORD")) {
            (Ok(user), Ok(pass)) if !user.is_empty() && !pass.is_empty() => Some((user, pass)),
            (Ok(_), Err(_)) => anyhow::bail!("SEED_ADMIN_USERNAME is set but SEED_ADMIN_PASSWORD is not"),
            _ => None,
        };

        Ok(Self {
            bind_addr,
            access_token_ttl_minutes,
            seed_admin,
        })
    }
}
