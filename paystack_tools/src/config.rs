use std::time::Duration;

use log::*;
use ppe_common::Secret;

const DEFAULT_API_URL: &str = "https://api.paystack.co";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct PaystackConfig {
    pub api_url: String,
    pub secret_key: Secret<String>,
    /// Applied to every request. A gateway call that exceeds this is reported as a timeout rather
    /// than left ambiguous.
    pub timeout: Duration,
}

impl Default for PaystackConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            secret_key: Secret::default(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl PaystackConfig {
    pub fn new_from_env_or_default() -> Self {
        let api_url = std::env::var("PPE_PAYSTACK_API_URL").unwrap_or_else(|_| {
            info!("PPE_PAYSTACK_API_URL not set, using {DEFAULT_API_URL}");
            DEFAULT_API_URL.to_string()
        });
        let secret_key = Secret::new(std::env::var("PPE_PAYSTACK_SECRET_KEY").unwrap_or_else(|_| {
            warn!("PPE_PAYSTACK_SECRET_KEY not set, using a (probably useless) default");
            "sk_test_00000000000000".to_string()
        }));
        let timeout = std::env::var("PPE_PAYSTACK_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        Self { api_url, secret_key, timeout }
    }
}
