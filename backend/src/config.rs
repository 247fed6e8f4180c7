use anyhow::{Context, bail};
use std::time::Duration;

pub const DEFAULT_SERIAL_PORT: &str = "/dev/ttyACM0"; // or /dev/ttyUSB0
pub const DEFAULT_SERIAL_BAUD: u32 = 115_200;
pub const DEFAULT_BLYNK_SERVER: &str = "https://blynk.cloud";

/// Batch endpoint, updates several virtual pins in one request.
pub const BLYNK_BATCH_PATH: &str = "/external/api/batch/update";

const DEFAULT_SERIAL_TIMEOUT_MS: u64 = 1_000;
const DEFAULT_SERIAL_SETTLE_MS: u64 = 2_000;
const DEFAULT_PUSH_INTERVAL_MS: u64 = 1_000;
const DEFAULT_HTTP_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    pub serial_port: String,
    pub serial_baud: u32,
    pub serial_timeout: Duration,
    /// The ESP32 resets when the port opens; give it time to boot.
    pub serial_settle: Duration,
    pub blynk_server: String,
    pub blynk_token: String,
    pub push_interval: Duration,
    pub http_timeout: Duration,
}

impl BridgeConfig {
    /// Reads the process environment, after loading `.env` if one exists.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let blynk_token = match read("BLYNK_TOKEN") {
            Some(token) => token,
            None => bail!("BLYNK_TOKEN must be set to the dashboard device token"),
        };

        Ok(Self {
            serial_port: read("SERIAL_PORT").unwrap_or_else(|| DEFAULT_SERIAL_PORT.to_string()),
            serial_baud: parse_or(&read, "SERIAL_BAUD", DEFAULT_SERIAL_BAUD)?,
            serial_timeout: millis_or(&read, "SERIAL_TIMEOUT_MS", DEFAULT_SERIAL_TIMEOUT_MS)?,
            serial_settle: millis_or(&read, "SERIAL_SETTLE_MS", DEFAULT_SERIAL_SETTLE_MS)?,
            blynk_server: read("BLYNK_SERVER").unwrap_or_else(|| DEFAULT_BLYNK_SERVER.to_string()),
            blynk_token,
            push_interval: millis_or(&read, "PUSH_INTERVAL_MS", DEFAULT_PUSH_INTERVAL_MS)?,
            http_timeout: millis_or(&read, "HTTP_TIMEOUT_MS", DEFAULT_HTTP_TIMEOUT_MS)?,
        })
    }

    pub fn batch_url(&self) -> String {
        format!("{}{}", self.blynk_server.trim_end_matches('/'), BLYNK_BATCH_PATH)
    }
}

fn parse_or<T, R>(read: &R, key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    R: Fn(&str) -> Option<String>,
{
    match read(key) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("{key} has an invalid value {raw:?}")),
        None => Ok(default),
    }
}

fn millis_or<R>(read: &R, key: &str, default_ms: u64) -> anyhow::Result<Duration>
where
    R: Fn(&str) -> Option<String>,
{
    parse_or(read, key, default_ms).map(Duration::from_millis)
}
