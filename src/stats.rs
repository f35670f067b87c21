/// Pool statistics client: fetches the provider stats for a wallet address
/// and reduces them to a single accumulated balance.
use crate::config::PoolConfig;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

/// Provider statistics payload returned by the pool API.
///
/// Only the fields the watchdog cares about are modeled; everything else in
/// the response is ignored.
#[derive(Debug, Default, Deserialize)]
pub struct ProviderStats {
    #[serde(default)]
    pub result: ProviderResult,
    #[serde(default)]
    pub method: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProviderResult {
    #[serde(default)]
    pub stats: Vec<AlgoStats>,
    #[serde(default)]
    pub addr: String,
}

/// Per-algorithm stats record. The balance arrives as a decimal string;
/// the speed fields in the payload are not modeled, only summed balances
/// matter to the watchdog.
#[derive(Debug, Default, Deserialize)]
pub struct AlgoStats {
    #[serde(default)]
    pub balance: String,
    #[serde(default)]
    pub algo: i64,
}

/// HTTP client for the pool stats endpoint.
pub struct StatsClient {
    http: reqwest::Client,
    api_base: String,
}

impl StatsClient {
    /// Build a client with the configured request timeout.
    ///
    /// The timeout must stay well under the poll interval so a hung request
    /// can never wedge the monitor loop.
    pub fn new(config: &PoolConfig) -> Result<Self, StatsError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StatsError::Http { source: e })?;
        Ok(Self {
            http,
            api_base: config.api_base.clone(),
        })
    }

    /// Fetch the accumulated unpaid balance for the wallet.
    ///
    /// Sums every per-algorithm balance in the payload; records whose balance
    /// fails decimal parsing are logged and skipped. An empty stats list
    /// yields 0.0, indistinguishable from a genuinely zero balance.
    pub async fn fetch(&self, wallet: &str) -> Result<f64, StatsError> {
        let url = format!("{}{}", self.api_base, wallet);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| StatsError::Http { source: e })?;
        let body = response
            .text()
            .await
            .map_err(|e| StatsError::Http { source: e })?;

        let stats = parse_provider_stats(&body)?;
        Ok(sum_balances(&stats))
    }
}

/// Parse the response body into a stats payload.
///
/// The pool serves an HTML maintenance page when it is offline; that case is
/// distinguished from plain deserialization failures so the monitor can
/// report "service offline" instead of a JSON error.
pub fn parse_provider_stats(body: &str) -> Result<ProviderStats, StatsError> {
    match serde_json::from_str(body) {
        Ok(stats) => Ok(stats),
        Err(e) => {
            if body.trim_start().starts_with("<!DOCTYPE html>") {
                Err(StatsError::Offline)
            } else {
                Err(StatsError::Deserialize { source: e })
            }
        }
    }
}

/// Sum the per-algorithm balances, skipping unparseable records.
pub fn sum_balances(stats: &ProviderStats) -> f64 {
    let mut total = 0.0;
    for record in &stats.result.stats {
        match record.balance.parse::<f64>() {
            Ok(b) => total += b,
            Err(e) => {
                warn!(
                    balance = %record.balance,
                    algo = record.algo,
                    error = %e,
                    "failed to parse balance record, skipping"
                );
            }
        }
    }
    total
}

/// Errors from the stats client, ordered roughly by distance from the wire.
#[derive(Debug)]
pub enum StatsError {
    /// Transport-level failure: connect, timeout, TLS, or body read.
    Http { source: reqwest::Error },
    /// The pool returned its HTML maintenance page instead of JSON.
    Offline,
    /// The body was not the expected JSON shape.
    Deserialize { source: serde_json::Error },
}

impl std::fmt::Display for StatsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatsError::Http { source } => write!(f, "stats request failed: {source}"),
            StatsError::Offline => write!(f, "pool web service is offline"),
            StatsError::Deserialize { source } => {
                write!(f, "failed to deserialize stats payload: {source}")
            }
        }
    }
}

impl std::error::Error for StatsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StatsError::Http { source } => Some(source),
            StatsError::Deserialize { source } => Some(source),
            StatsError::Offline => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEALTHY_BODY: &str = r#"{
        "result": {
            "stats": [
                {"balance": "0.00431", "rejected_speed": "0", "algo": 24, "accepted_speed": "0.0017"},
                {"balance": "0.00069", "rejected_speed": "0", "algo": 33, "accepted_speed": "0.0102"}
            ],
            "addr": "3BmDmCzFwAYxeWKTF4mkyqCN8gW96GAaTt"
        },
        "method": "stats.provider"
    }"#;

    #[test]
    fn test_parse_healthy_payload() {
        let stats = parse_provider_stats(HEALTHY_BODY).unwrap();
        assert_eq!(stats.method, "stats.provider");
        assert_eq!(stats.result.stats.len(), 2);
        assert_eq!(stats.result.addr, "3BmDmCzFwAYxeWKTF4mkyqCN8gW96GAaTt");
        assert_eq!(stats.result.stats[0].balance, "0.00431");
        assert_eq!(stats.result.stats[1].algo, 33);
    }

    #[test]
    fn test_sum_balances_adds_all_records() {
        let stats = parse_provider_stats(HEALTHY_BODY).unwrap();
        let total = sum_balances(&stats);
        assert!((total - 0.005).abs() < 1e-12);
    }

    #[test]
    fn test_sum_balances_skips_unparseable_record() {
        let body = r#"{
            "result": {
                "stats": [
                    {"balance": "0.5", "algo": 1},
                    {"balance": "not-a-number", "algo": 2},
                    {"balance": "0.25", "algo": 3}
                ],
                "addr": "abc"
            },
            "method": "stats.provider"
        }"#;
        let stats = parse_provider_stats(body).unwrap();
        assert!((sum_balances(&stats) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_empty_stats_list_sums_to_zero() {
        let body = r#"{"result": {"stats": [], "addr": "abc"}, "method": "stats.provider"}"#;
        let stats = parse_provider_stats(body).unwrap();
        assert_eq!(sum_balances(&stats), 0.0);
    }

    #[test]
    fn test_html_prologue_is_offline() {
        let body = "<!DOCTYPE html>\n<html><body>We are down for maintenance</body></html>";
        let err = parse_provider_stats(body).unwrap_err();
        assert!(matches!(err, StatsError::Offline));
        assert_eq!(err.to_string(), "pool web service is offline");
    }

    #[test]
    fn test_html_prologue_after_whitespace_is_offline() {
        let body = "\n  <!DOCTYPE html><html></html>";
        let err = parse_provider_stats(body).unwrap_err();
        assert!(matches!(err, StatsError::Offline));
    }

    #[test]
    fn test_garbage_body_is_deserialize_error() {
        let err = parse_provider_stats("{\"result\": [}").unwrap_err();
        assert!(matches!(err, StatsError::Deserialize { .. }));
        assert!(err.to_string().contains("failed to deserialize"));
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let body = r#"{
            "result": {
                "stats": [{"balance": "1.5", "algo": 7, "extra": {"nested": true}}],
                "addr": "abc",
                "payments": []
            },
            "method": "stats.provider",
            "version": 2
        }"#;
        let stats = parse_provider_stats(body).unwrap();
        assert_eq!(sum_balances(&stats), 1.5);
    }

    #[test]
    fn test_missing_stats_field_defaults_to_empty() {
        let body = r#"{"result": {"addr": "abc"}, "method": "stats.provider"}"#;
        let stats = parse_provider_stats(body).unwrap();
        assert!(stats.result.stats.is_empty());
        assert_eq!(sum_balances(&stats), 0.0);
    }
}
