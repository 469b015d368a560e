use config::ConfigError;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::time::Duration;

use crate::airdrop::estimator::FeeSchedule;
use crate::airdrop::executor::ExecutorConfig;
use crate::airdrop::service::AirdropSettings;
use crate::ledger::models::{xrp_to_drops, Network};

#[derive(Debug, Clone)]
pub struct SigningApiConfig {
    pub url: String,
    pub api_key: String,
    pub api_secret: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    pub default_network: Network,
    pub testnet_rpc_url: String,
    pub mainnet_rpc_url: String,
    /// `None` disables interactive signing
    pub signing: Option<SigningApiConfig>,
    pub max_recipients: usize,
    pub transaction_delay: Duration,
    pub ledger_timeout: Duration,
    pub submit_timeout: Duration,
    pub signing_timeout: Duration,
    pub max_concurrent_tasks: usize,
    pub max_parallel_submissions: usize,
    pub task_cleanup_after: chrono::Duration,
    pub fees: FeeSchedule,
    pub allowed_origins: Vec<String>,
    pub rate_limit_requests: u32,
    pub rate_limit_period_seconds: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let signing = match (
            optional("SIGNING_API_KEY"),
            optional("SIGNING_API_SECRET"),
        ) {
            (Some(api_key), Some(api_secret)) => Some(SigningApiConfig {
                url: string_or("SIGNING_API_URL", "https://xumm.app/api/v1/platform"),
                api_key,
                api_secret,
            }),
            _ => None,
        };

        let fees = FeeSchedule {
            fee_per_tx_drops: parse_or("FEE_PER_TRANSACTION_DROPS", 12)?,
            base_reserve_drops: xrp_setting("BASE_RESERVE_XRP", Decimal::from(10))?,
            owner_reserve_drops: xrp_setting("OWNER_RESERVE_XRP", Decimal::from(2))?,
        };

        Ok(Self {
            bind_address: string_or("BIND_ADDRESS", "127.0.0.1:5000"),
            default_network: parse_or("DEFAULT_NETWORK", Network::Testnet)?,
            testnet_rpc_url: string_or("TESTNET_RPC_URL", "https://s.altnet.rippletest.net:51234"),
            mainnet_rpc_url: string_or("MAINNET_RPC_URL", "https://xrplcluster.com"),
            signing,
            max_recipients: parse_or("MAX_RECIPIENTS_PER_AIRDROP", 1000)?,
            transaction_delay: seconds_setting("TRANSACTION_DELAY_SECONDS", 1.0)?,
            ledger_timeout: Duration::from_secs(parse_or("LEDGER_TIMEOUT_SECONDS", 10)?),
            submit_timeout: Duration::from_secs(parse_or("SUBMIT_TIMEOUT_SECONDS", 120)?),
            signing_timeout: Duration::from_secs(parse_or("SIGNING_TIMEOUT_SECONDS", 300)?),
            max_concurrent_tasks: parse_or("MAX_CONCURRENT_TASKS", 5)?,
            max_parallel_submissions: parse_or("MAX_PARALLEL_SUBMISSIONS", 1)?,
            task_cleanup_after: chrono::Duration::hours(parse_or("TASK_CLEANUP_AFTER_HOURS", 24)?),
            fees,
            allowed_origins: optional("ALLOWED_ORIGINS")
                .map(|origins| {
                    origins
                        .split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            rate_limit_requests: parse_or("RATE_LIMIT_REQUESTS", 60)?,
            rate_limit_period_seconds: parse_or("RATE_LIMIT_PERIOD_SECONDS", 60)?,
        })
    }

    pub fn airdrop_settings(&self) -> AirdropSettings {
        AirdropSettings {
            max_recipients: self.max_recipients,
            max_concurrent_tasks: self.max_concurrent_tasks,
            fees: self.fees,
            executor: ExecutorConfig {
                tx_delay: self.transaction_delay,
                call_timeout: self.ledger_timeout,
                submit_timeout: self.submit_timeout,
                signing_timeout: self.signing_timeout,
                max_parallel_submissions: self.max_parallel_submissions.max(1),
            },
        }
    }

    pub fn rpc_url(&self, network: Network) -> &str {
        match network {
            Network::Testnet => &self.testnet_rpc_url,
            Network::Mainnet => &self.mainnet_rpc_url,
        }
    }
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn string_or(key: &str, default: &str) -> String {
    optional(key).unwrap_or_else(|| default.to_string())
}

fn parse_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ConfigError::Message(format!("{} is invalid: {}", key, e))),
        None => Ok(default),
    }
}

/// Fractional seconds; negative, NaN and out-of-range values are rejected
fn seconds_setting(key: &str, default: f64) -> Result<Duration, ConfigError> {
    let seconds: f64 = parse_or(key, default)?;
    Duration::try_from_secs_f64(seconds)
        .map_err(|e| ConfigError::Message(format!("{} is invalid: {}", key, e)))
}

fn xrp_setting(key: &str, default: Decimal) -> Result<u64, ConfigError> {
    let xrp: Decimal = parse_or(key, default)?;
    xrp_to_drops(xrp)
        .ok_or_else(|| ConfigError::Message(format!("{} is not a valid XRP amount", key)))
}
