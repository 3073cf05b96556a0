use std::{env, time::Duration};

use axum::body::Bytes;
use thiserror::Error;
use tracing::debug;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_BODY_LIMIT_MB: usize = 10;
const DEFAULT_IPFS_GATEWAY: &str = "https://ipfs.io";
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub body_limit_bytes: usize,
    /// Base URL of the IPFS gateway, without a trailing slash.
    pub ipfs_gateway: String,
    pub fetch_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: DEFAULT_PORT,
            body_limit_bytes: DEFAULT_BODY_LIMIT_MB * 1024 * 1024,
            ipfs_gateway: DEFAULT_IPFS_GATEWAY.to_string(),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
        }
    }
}

fn parse_var<T: std::str::FromStr>(
    name: &'static str,
    expected: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value.trim().parse::<T>().map_err(|_| ConfigError::Invalid {
            name,
            expected,
            value,
        }),
        Err(_) => Ok(default),
    }
}

pub fn get_env() -> Result<Config, ConfigError> {
    let body_limit_bytes = {
        let mb = parse_var(
            "BODY_LIMIT_MB",
            "a valid integer",
            DEFAULT_BODY_LIMIT_MB,
        )?;
        mb * 1024 * 1024
    };

    let port = parse_var(
        "PORT",
        "a valid number between 0 and 65535",
        DEFAULT_PORT,
    )?;

    let fetch_timeout = Duration::from_secs(parse_var(
        "FETCH_TIMEOUT_SECS",
        "a whole number of seconds",
        DEFAULT_FETCH_TIMEOUT_SECS,
    )?);

    let ipfs_gateway = env::var("IPFS_GATEWAY")
        .ok()
        .map(|gateway| gateway.trim().trim_end_matches('/').to_string())
        .filter(|gateway| !gateway.is_empty())
        .unwrap_or_else(|| DEFAULT_IPFS_GATEWAY.to_string());

    Ok(Config {
        port,
        body_limit_bytes,
        ipfs_gateway,
        fetch_timeout,
    })
}

/// Single GET, no retries. Non-2xx statuses are errors.
pub async fn download_bytes(client: &reqwest::Client, url: &str) -> Result<Bytes, reqwest::Error> {
    debug!("Downloading image from {}", url);

    let response = client.get(url).send().await?.error_for_status()?;
    let bytes = response.bytes().await?;

    debug!("Downloaded {} bytes from {}", bytes.len(), url);
    Ok(bytes)
}
