//! Environment-driven configuration for the admin panel server.
//!
//! Values come from the process environment after `dotenvy` has loaded
//! `.env.local` and `.env` (both optional). Parsing goes through a lookup
//! closure so tests never touch the real environment.

use anyhow::{anyhow, Context, Result};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:3000";
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3001";
const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 120;

/// Minimum length of `SESSION_SECRET` (cookie signing keys are 64 bytes).
pub const MIN_SESSION_SECRET_LEN: usize = 64;

#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub listen_addr: SocketAddr,
    pub admin_password: String,
    pub backend_url: String,
    pub admin_api_key: String,
    /// `None` means a fresh signing key per process (sessions die on restart).
    pub session_secret: Option<Vec<u8>>,
    pub secure_cookies: bool,
    pub backend_timeout: Duration,
}

impl AdminConfig {
    /// Load `.env.local` / `.env` and read the process environment.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::from_filename(".env.local");
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let listen_addr_raw =
            non_empty("ADMIN_PANEL_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
        let listen_addr = SocketAddr::from_str(&listen_addr_raw)
            .map_err(|err| anyhow!("invalid socket addr for ADMIN_PANEL_ADDR: {err}"))?;

        let admin_password =
            non_empty("ADMIN_PASSWORD").unwrap_or_else(|| DEFAULT_ADMIN_PASSWORD.to_string());
        let backend_url = non_empty("BACKEND_URL")
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let admin_api_key = non_empty("ADMIN_API_KEY").context("missing env: ADMIN_API_KEY")?;

        let session_secret = match non_empty("SESSION_SECRET") {
            Some(secret) if secret.len() < MIN_SESSION_SECRET_LEN => {
                return Err(anyhow!(
                    "SESSION_SECRET must be at least {MIN_SESSION_SECRET_LEN} bytes"
                ));
            }
            Some(secret) => Some(secret.into_bytes()),
            None => None,
        };

        let production = non_empty("APP_ENV")
            .map(|env| env.eq_ignore_ascii_case("production"))
            .unwrap_or(false);
        let secure_cookies = match non_empty("COOKIE_SECURE") {
            Some(raw) => parse_bool(&raw)
                .with_context(|| format!("invalid boolean for COOKIE_SECURE: {raw}"))?,
            None => production,
        };

        let backend_timeout = match non_empty("BACKEND_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .with_context(|| format!("invalid BACKEND_TIMEOUT_SECS: {raw}"))?,
            None => DEFAULT_BACKEND_TIMEOUT_SECS,
        };

        Ok(Self {
            listen_addr,
            admin_password,
            backend_url,
            admin_api_key,
            session_secret,
            secure_cookies,
            backend_timeout: Duration::from_secs(backend_timeout),
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
