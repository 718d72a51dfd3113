//! Process configuration, loaded from environment variables. Config-file
//! parsing is out of scope, so this follows the
//! teacher's `main.rs` convention of plain `std::env::var` reads with
//! fallbacks rather than a config-file crate.

use std::collections::HashMap;
use std::time::Duration;

const DEFAULT_CACHE_TTL_SECS: u64 = 180;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 4000;
const DEFAULT_FORWARD_DEPTH_LIMIT: u32 = 16;
const DEFAULT_OUTBOUND_GATEWAY_TARGET: &str = "sip/outbound-gw";
const HOME_SERVER_CONTACT_PREFIX: &str = "HOME_SERVER_CONTACTS_";

#[derive(Debug, Clone)]
pub struct SwitchboardConfig {
    pub database_url: String,
    /// `None` selects the in-process cache backend.
    pub redis_url: Option<String>,
    pub cache_ttl: Duration,
    pub request_timeout: Duration,
    pub forward_depth_limit: u32,
    pub outbound_gateway_target: String,
    pub local_server_id: i64,
    pub home_server_contacts: HashMap<i64, String>,
    pub control_channel_addr: String,
    pub http_addr: String,
}

impl SwitchboardConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;
        let redis_url = std::env::var("REDIS_URL").ok();
        let cache_ttl = Duration::from_secs(
            env_parse("CACHE_TTL_SECS", DEFAULT_CACHE_TTL_SECS)?,
        );
        let request_timeout = Duration::from_millis(
            env_parse("REQUEST_TIMEOUT_MS", DEFAULT_REQUEST_TIMEOUT_MS)?,
        );
        let forward_depth_limit = env_parse("FORWARD_DEPTH_LIMIT", DEFAULT_FORWARD_DEPTH_LIMIT)?;
        let outbound_gateway_target = std::env::var("OUTBOUND_GATEWAY_TARGET")
            .unwrap_or_else(|_| DEFAULT_OUTBOUND_GATEWAY_TARGET.to_string());
        let local_server_id = env_parse("LOCAL_SERVER_ID", 1i64)?;
        let home_server_contacts = collect_home_server_contacts();
        let control_channel_addr =
            std::env::var("CONTROL_CHANNEL_ADDR").unwrap_or_else(|_| "0.0.0.0:5038".to_string());
        let http_addr =
            std::env::var("HTTP_ADDR").unwrap_or_else(|_| "0.0.0.0:8088".to_string());

        Ok(Self {
            database_url,
            redis_url,
            cache_ttl,
            request_timeout,
            forward_depth_limit,
            outbound_gateway_target,
            local_server_id,
            home_server_contacts,
            control_channel_addr,
            http_addr,
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {key}: {e}")),
        Err(_) => Ok(default),
    }
}

/// `HOME_SERVER_CONTACTS_<id>=<address>` pairs collected at startup - the
/// home-server-id to contact-address map is a small static table.
fn collect_home_server_contacts() -> HashMap<i64, String> {
    std::env::vars()
        .filter_map(|(key, value)| {
            key.strip_prefix(HOME_SERVER_CONTACT_PREFIX)
                .and_then(|suffix| suffix.parse::<i64>().ok())
                .map(|id| (id, value))
        })
        .collect()
}
