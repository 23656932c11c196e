// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bridge configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Topic prefix used when `BASE_TOPIC` is not set.
pub const DEFAULT_BASE_TOPIC: &str = "ECO16BT";

/// Configuration for the MQTT side of the bridge and its device operations.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use ensto_lib::bridge::BridgeConfig;
///
/// let config = BridgeConfig::new("192.168.1.50")
///     .with_credentials("bridge", "secret")
///     .with_base_topic("heating")
///     .with_availability_interval(Duration::from_secs(300));
///
/// assert_eq!(config.port, 1883);
/// assert_eq!(config.base_topic, "heating");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    /// Broker host name or address.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// MQTT client identifier.
    pub client_id: String,
    /// Optional (username, password) for the broker.
    pub credentials: Option<(String, String)>,
    /// Prefix of every topic the bridge uses.
    pub base_topic: String,
    /// Directory holding `pairing-<address>.json` files.
    pub pairing_dir: PathBuf,
    /// MQTT keep-alive interval.
    pub keep_alive: Duration,
    /// Pause before reconnecting to the broker after an error.
    pub reconnect_interval: Duration,
    /// Interval between `online` availability publications.
    pub availability_interval: Duration,
    /// Interval between `state` publications, if polling is enabled.
    pub poll_interval: Option<Duration>,
    /// Interval between full device reports, if reporting is enabled.
    pub report_interval: Option<Duration>,
    /// Timeout for connecting and pairing with a thermostat.
    pub connect_timeout: Duration,
    /// Timeout for each read or write on an open session.
    pub operation_timeout: Duration,
    /// Retry policy for failed commands.
    pub retry: RetryPolicy,
}

impl BridgeConfig {
    /// Creates a configuration for the given broker host.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// Reads the configuration from process environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `MQTT_BROKER` | required |
    /// | `MQTT_PORT` | `1883` |
    /// | `MQTT_CLIENT_ID` | `ensto-bridge` |
    /// | `MQTT_USERNAME` / `MQTT_PASSWORD` | none |
    /// | `BASE_TOPIC` | `ECO16BT` |
    /// | `PAIRING_FILES_PATH` | `./` |
    /// | `REPORT_INTERVAL` | off; seconds between full device reports |
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if `MQTT_BROKER` is unset and
    /// `ConfigError::Invalid` if `MQTT_PORT` is not a port number or
    /// `REPORT_INTERVAL` is not a positive number of seconds.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    ///
    /// Empty values count as unset.
    ///
    /// # Errors
    ///
    /// As for [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let host = get("MQTT_BROKER").ok_or(ConfigError::Missing("MQTT_BROKER"))?;
        let mut config = Self::new(host);

        if let Some(port) = get("MQTT_PORT") {
            config.port = port.trim().parse().map_err(|_| ConfigError::Invalid {
                var: "MQTT_PORT",
                value: port.clone(),
            })?;
        }
        if let Some(client_id) = get("MQTT_CLIENT_ID") {
            config.client_id = client_id;
        }
        if let Some(username) = get("MQTT_USERNAME") {
            let password = get("MQTT_PASSWORD").unwrap_or_default();
            config.credentials = Some((username, password));
        }
        if let Some(base) = get("BASE_TOPIC") {
            config.base_topic = base.trim_matches('/').to_string();
        }
        if let Some(dir) = get("PAIRING_FILES_PATH") {
            config.pairing_dir = PathBuf::from(dir);
        }
        if let Some(secs) = get("REPORT_INTERVAL") {
            let invalid = || ConfigError::Invalid {
                var: "REPORT_INTERVAL",
                value: secs.clone(),
            };
            let secs: u64 = secs.trim().parse().map_err(|_| invalid())?;
            if secs == 0 {
                return Err(invalid());
            }
            config.report_interval = Some(Duration::from_secs(secs));
        }
        Ok(config)
    }

    /// Sets the broker port (default: 1883).
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the MQTT client identifier.
    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    /// Sets broker credentials.
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    /// Sets the topic prefix (default: `ECO16BT`).
    #[must_use]
    pub fn with_base_topic(mut self, base: impl Into<String>) -> Self {
        self.base_topic = base.into();
        self
    }

    /// Sets the pairing file directory (default: current directory).
    #[must_use]
    pub fn with_pairing_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.pairing_dir = dir.into();
        self
    }

    /// Sets the keep-alive interval (default: 45 seconds).
    #[must_use]
    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Sets the broker reconnect pause (default: 10 seconds).
    #[must_use]
    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// Sets the availability interval (default: 900 seconds).
    #[must_use]
    pub fn with_availability_interval(mut self, interval: Duration) -> Self {
        self.availability_interval = interval;
        self
    }

    /// Polls every device's live readings at `interval` (default: off).
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Publishes a full report of every device at `interval` (default: off).
    #[must_use]
    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = Some(interval);
        self
    }

    /// Sets the thermostat connect timeout (default: 30 seconds).
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the per-operation timeout (default: 10 seconds).
    #[must_use]
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Sets the command retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Client identifier for the command listener connection.
    #[must_use]
    pub fn listener_client_id(&self) -> String {
        format!("{}-listener", self.client_id)
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 1883,
            client_id: "ensto-bridge".to_string(),
            credentials: None,
            base_topic: DEFAULT_BASE_TOPIC.to_string(),
            pairing_dir: PathBuf::from("./"),
            keep_alive: Duration::from_secs(45),
            reconnect_interval: Duration::from_secs(10),
            availability_interval: Duration::from_secs(900),
            poll_interval: None,
            report_interval: None,
            connect_timeout: Duration::from_secs(30),
            operation_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
        }
    }
}

/// Retry policy for bridge commands that failed transiently.
///
/// Only failures for which [`Error::is_transient`](crate::Error::is_transient)
/// holds are retried. A rejected reset code never is.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use ensto_lib::bridge::RetryPolicy;
///
/// let policy = RetryPolicy::new()
///     .with_max_retries(3)
///     .with_initial_delay(Duration::from_secs(5));
///
/// assert!(policy.should_retry(2));
/// assert!(!policy.should_retry(3));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Whether failed commands are retried at all.
    pub enabled: bool,
    /// Maximum number of retries per command (None = infinite).
    pub max_retries: Option<u32>,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on the delay between retries.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f32,
}

impl RetryPolicy {
    /// Creates a retry policy with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a policy that never retries.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Sets the maximum number of retries.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Retries until the command succeeds or fails permanently.
    #[must_use]
    pub fn with_infinite_retries(mut self) -> Self {
        self.max_retries = None;
        self
    }

    /// Sets the delay before the first retry.
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the upper bound on the delay between retries.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    #[must_use]
    pub fn with_backoff_multiplier(mut self, multiplier: f32) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Calculates the delay before retry number `attempt` (zero based).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return self.initial_delay;
        }

        let multiplier = self
            .backoff_multiplier
            .powi(i32::try_from(attempt).unwrap_or(i32::MAX));

        // Safe: delays are seconds or minutes, far from f32 precision limits
        #[allow(clippy::cast_precision_loss)]
        let delay_ms = self.initial_delay.as_millis() as f32 * multiplier;

        // Safe: delay_ms is non-negative; the cast saturates on overflow
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let delay = Duration::from_millis(delay_ms as u64);

        delay.min(self.max_delay)
    }

    /// Returns true if retry number `attempt` (zero based) is allowed.
    #[must_use]
    pub fn should_retry(&self, attempt: u32) -> bool {
        self.enabled && self.max_retries.is_none_or(|max| attempt < max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: Some(10),
            initial_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(300),
            backoff_multiplier: 2.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_follow_the_listener() {
        let config = BridgeConfig::default();
        assert_eq!(config.base_topic, "ECO16BT");
        assert_eq!(config.keep_alive, Duration::from_secs(45));
        assert_eq!(config.reconnect_interval, Duration::from_secs(10));
        assert_eq!(config.availability_interval, Duration::from_secs(900));
        assert_eq!(config.pairing_dir, PathBuf::from("./"));
        assert_eq!(config.poll_interval, None);
        assert_eq!(config.report_interval, None);
    }

    #[test]
    fn from_lookup_reads_all_variables() {
        let config = BridgeConfig::from_lookup(env(&[
            ("MQTT_BROKER", "broker.local"),
            ("MQTT_PORT", "1884"),
            ("MQTT_CLIENT_ID", "house"),
            ("MQTT_USERNAME", "user"),
            ("MQTT_PASSWORD", "pass"),
            ("BASE_TOPIC", "heating/"),
            ("PAIRING_FILES_PATH", "/etc/ensto"),
        ]))
        .unwrap();

        assert_eq!(config.host, "broker.local");
        assert_eq!(config.port, 1884);
        assert_eq!(config.client_id, "house");
        assert_eq!(config.listener_client_id(), "house-listener");
        assert_eq!(
            config.credentials,
            Some(("user".to_string(), "pass".to_string()))
        );
        assert_eq!(config.base_topic, "heating");
        assert_eq!(config.pairing_dir, PathBuf::from("/etc/ensto"));
    }

    #[test]
    fn from_lookup_requires_broker() {
        let err = BridgeConfig::from_lookup(env(&[("MQTT_BROKER", "  ")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("MQTT_BROKER"));
    }

    #[test]
    fn from_lookup_rejects_bad_port() {
        let err = BridgeConfig::from_lookup(env(&[("MQTT_BROKER", "b"), ("MQTT_PORT", "70000")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "MQTT_PORT", .. }));
    }

    #[test]
    fn from_lookup_reads_report_interval() {
        let config =
            BridgeConfig::from_lookup(env(&[("MQTT_BROKER", "b"), ("REPORT_INTERVAL", " 600 ")]))
                .unwrap();
        assert_eq!(config.report_interval, Some(Duration::from_secs(600)));

        for bad in ["0", "ten"] {
            let err =
                BridgeConfig::from_lookup(env(&[("MQTT_BROKER", "b"), ("REPORT_INTERVAL", bad)]))
                    .unwrap_err();
            assert!(matches!(
                err,
                ConfigError::Invalid {
                    var: "REPORT_INTERVAL",
                    ..
                }
            ));
        }
    }

    #[test]
    fn retry_policy_default() {
        let policy = RetryPolicy::default();
        assert!(policy.enabled);
        assert_eq!(policy.max_retries, Some(10));
        assert_eq!(policy.initial_delay, Duration::from_secs(10));
    }

    #[test]
    fn retry_policy_disabled() {
        assert!(!RetryPolicy::disabled().should_retry(0));
    }

    #[test]
    fn retry_delay_backs_off_and_caps() {
        let policy = RetryPolicy::new()
            .with_initial_delay(Duration::from_secs(1))
            .with_backoff_multiplier(2.0)
            .with_max_delay(Duration::from_secs(10));

        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(8));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_secs(10));
    }

    #[test]
    fn infinite_retries() {
        let policy = RetryPolicy::new().with_infinite_retries();
        assert!(policy.should_retry(u32::MAX - 1));
    }
}
