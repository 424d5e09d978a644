// ==============================================================================
// config.rs - Gateway Configuration
// ==============================================================================
// Description: Startup configuration read once from the environment
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================
//
// Configuration is immutable after startup. `Config` is built in main.rs,
// wrapped in an Arc and handed to every component constructor.
//
// ==============================================================================

use anyhow::{bail, Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

// ==============================================================================
// DEFAULTS
// ==============================================================================

const DEFAULT_TOKEN_TTL_SECS: u64 = 24 * 60 * 60;
const DEFAULT_RATE_WINDOW_SECS: u64 = 60;
const DEFAULT_RATE_THRESHOLD: u32 = 100;
const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000";
const DEFAULT_STATIC_DIR: &str = "./static";
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Secrets shorter than this are accepted but logged as weak
const RECOMMENDED_SECRET_LEN: usize = 32;

/// Credential and admission policy shared by the governance components
#[derive(Clone)]
pub struct GovernanceConfig {
    /// HMAC key for credential signatures
    pub secret: String,

    /// Lifetime of an issued credential
    pub token_ttl: Duration,

    /// Length of one fixed rate-limit window
    pub rate_window: Duration,

    /// Requests admitted per key per window
    pub rate_threshold: u32,
}

// Keep the secret out of logs
impl std::fmt::Debug for GovernanceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GovernanceConfig")
            .field("secret", &"<redacted>")
            .field("token_ttl", &self.token_ttl)
            .field("rate_window", &self.rate_window)
            .field("rate_threshold", &self.rate_threshold)
            .finish()
    }
}

/// Process-level settings that do not affect governance policy
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,

    /// PostgreSQL URL for user records; in-memory store when unset
    pub database_url: Option<String>,

    pub cors_allowed_origins: Vec<String>,

    /// Serve the bundled login page from `static_dir`
    pub login_page: bool,
    pub static_dir: PathBuf,

    /// Period of the background revocation / bucket sweep
    pub sweep_interval: Duration,

    /// Use the first X-Forwarded-For entry as the rate-limit key
    pub trust_forwarded_for: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub governance: GovernanceConfig,
    pub server: ServerConfig,
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = lookup("TOKEN_SECRET")
            .filter(|s| !s.is_empty())
            .context("TOKEN_SECRET must be set")?;

        if secret.len() < RECOMMENDED_SECRET_LEN {
            warn!(
                "TOKEN_SECRET is shorter than {} bytes; use a longer random secret",
                RECOMMENDED_SECRET_LEN
            );
        }

        let token_ttl = positive_secs(&lookup, "TOKEN_TTL_SECS", DEFAULT_TOKEN_TTL_SECS)?;
        let rate_window =
            positive_secs(&lookup, "RATE_LIMIT_WINDOW_SECS", DEFAULT_RATE_WINDOW_SECS)?;
        let sweep_interval =
            positive_secs(&lookup, "SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL_SECS)?;

        let rate_threshold: u32 =
            parse_or(&lookup, "RATE_LIMIT_MAX_REQUESTS", DEFAULT_RATE_THRESHOLD)?;
        if rate_threshold == 0 {
            bail!("RATE_LIMIT_MAX_REQUESTS must be greater than zero");
        }

        let listen_addr = parse_or(
            &lookup,
            "LISTEN_ADDR",
            SocketAddr::from_str(DEFAULT_LISTEN_ADDR).context("Invalid default listen address")?,
        )?;

        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| DEFAULT_CORS_ORIGINS.to_string())
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            governance: GovernanceConfig {
                secret,
                token_ttl,
                rate_window,
                rate_threshold,
            },
            server: ServerConfig {
                listen_addr,
                database_url: lookup("DATABASE_URL").filter(|s| !s.is_empty()),
                cors_allowed_origins,
                login_page: parse_or(&lookup, "LOGIN_PAGE", false)?,
                static_dir: lookup("STATIC_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_STATIC_DIR)),
                sweep_interval,
                trust_forwarded_for: parse_or(&lookup, "TRUST_FORWARDED_FOR", false)?,
            },
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Invalid value for {}: {} ({})", key, raw, e)),
        None => Ok(default),
    }
}

fn positive_secs<F>(lookup: &F, key: &str, default: u64) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let secs: u64 = parse_or(lookup, key, default)?;
    if secs == 0 {
        bail!("{} must be greater than zero", key);
    }
    Ok(Duration::from_secs(secs))
}
