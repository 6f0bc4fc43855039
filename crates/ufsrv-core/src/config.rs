//! Configuration for the ufsrv send and receive services.
//!
//! # Example
//!
//! ```
//! use ufsrv_core::config::ClientConfigBuilder;
//! use std::time::Duration;
//!
//! let config = ClientConfigBuilder::new()
//!     .with_account("uid-ada", 2)
//!     .with_worker_concurrency(8)
//!     .with_initial_retry_delay(Duration::from_secs(10))
//!     .build_validated()
//!     .unwrap();
//! assert_eq!(config.account.device_id, 2);
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;
use ufsrv_crypto::DEFAULT_DEVICE_ID;
use ufsrv_protocol::{DecryptPolicy, TransportType};
use ufsrv_store::RetryPolicy;

/// Default number of envelopes decrypted in parallel.
const DEFAULT_WORKER_CONCURRENCY: usize = 4;

/// Default delay before the first outbox retry, in seconds.
const DEFAULT_INITIAL_RETRY_DELAY_SECS: u64 = 30;

/// Default cap on the outbox retry delay, in seconds.
const DEFAULT_MAX_RETRY_DELAY_SECS: u64 = 480;

/// Default number of failed attempts before a job is abandoned.
const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default job lifetime, in seconds (7 days).
const DEFAULT_JOB_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Main client configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Local account identity.
    pub account: AccountConfig,

    /// Outgoing command settings.
    pub send: SendConfig,

    /// Incoming envelope settings.
    pub receive: ReceiveConfig,

    /// Outbox retry settings.
    pub outbox: OutboxConfig,
}

impl ClientConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Receive policy handed to the envelope cipher.
    pub fn decrypt_policy(&self) -> DecryptPolicy {
        DecryptPolicy {
            trust_sender_e2ee_flag: self.receive.trust_sender_e2ee_flag,
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.account.account_id.trim().is_empty() {
            return Err(ConfigError::Missing("account.account_id".into()));
        }

        if self.account.device_id == 0 {
            return Err(ConfigError::InvalidValue {
                field: "account.device_id".into(),
                reason: "device id must be greater than zero".into(),
            });
        }

        if self.send.default_transport == TransportType::Undefined {
            return Err(ConfigError::InvalidValue {
                field: "send.default_transport".into(),
                reason: "a default transport must be chosen".into(),
            });
        }

        if self.receive.worker_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "receive.worker_concurrency".into(),
                reason: "worker concurrency must be greater than zero".into(),
            });
        }

        if self.outbox.initial_retry_delay.as_secs() == 0 {
            return Err(ConfigError::InvalidValue {
                field: "outbox.initial_retry_delay".into(),
                reason: "initial retry delay must be at least one second".into(),
            });
        }

        if self.outbox.max_retry_delay < self.outbox.initial_retry_delay {
            return Err(ConfigError::InvalidValue {
                field: "outbox.max_retry_delay".into(),
                reason: "maximum retry delay must not be below the initial delay".into(),
            });
        }

        if self.outbox.max_retries == 0 {
            return Err(ConfigError::InvalidValue {
                field: "outbox.max_retries".into(),
                reason: "max retries must be greater than zero".into(),
            });
        }

        if self.outbox.job_ttl < self.outbox.max_retry_delay {
            return Err(ConfigError::InvalidValue {
                field: "outbox.job_ttl".into(),
                reason: "job TTL must cover at least one retry delay".into(),
            });
        }

        Ok(())
    }
}

/// Local account identity.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Account identifier (ufsrv uid).
    pub account_id: String,

    /// Local device id.
    pub device_id: u32,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            account_id: String::new(),
            device_id: DEFAULT_DEVICE_ID,
        }
    }
}

/// Outgoing command settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SendConfig {
    /// Channel used for commands that do not choose one.
    pub default_transport: TransportType,

    /// Queue a command in the outbox when no session exists with a
    /// destination device, instead of failing the send.
    pub queue_on_missing_session: bool,
}

impl Default for SendConfig {
    fn default() -> Self {
        Self {
            default_transport: TransportType::ApiService,
            queue_on_missing_session: true,
        }
    }
}

/// Incoming envelope settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReceiveConfig {
    /// Honour a sender's "not end-to-end encrypted" declaration on legacy
    /// envelopes.
    pub trust_sender_e2ee_flag: bool,

    /// Envelopes decrypted in parallel by the receive pipeline.
    ///
    /// Ratchet access stays serialized by the session lock; this only bounds
    /// decoding, bypass and native-push work.
    pub worker_concurrency: usize,
}

impl Default for ReceiveConfig {
    fn default() -> Self {
        Self {
            trust_sender_e2ee_flag: true,
            worker_concurrency: DEFAULT_WORKER_CONCURRENCY,
        }
    }
}

/// Outbox retry settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutboxConfig {
    /// Delay before the first retry.
    #[serde(with = "duration_serde")]
    pub initial_retry_delay: Duration,

    /// Upper bound for the retry delay.
    #[serde(with = "duration_serde")]
    pub max_retry_delay: Duration,

    /// Failed attempts after which a job is abandoned.
    pub max_retries: u32,

    /// Age after which an undelivered job expires.
    #[serde(with = "duration_serde")]
    pub job_ttl: Duration,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            initial_retry_delay: Duration::from_secs(DEFAULT_INITIAL_RETRY_DELAY_SECS),
            max_retry_delay: Duration::from_secs(DEFAULT_MAX_RETRY_DELAY_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            job_ttl: Duration::from_secs(DEFAULT_JOB_TTL_SECS),
        }
    }
}

impl OutboxConfig {
    /// Retry policy for a [`CommandOutbox`](ufsrv_store::CommandOutbox).
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            initial_delay_secs: secs(self.initial_retry_delay),
            max_delay_secs: secs(self.max_retry_delay),
            max_retries: self.max_retries,
            ttl_secs: secs(self.job_ttl),
        }
    }
}

fn secs(duration: Duration) -> i64 {
    i64::try_from(duration.as_secs()).unwrap_or(i64::MAX)
}

/// Builder for constructing `ClientConfig` with custom values.
#[derive(Clone, Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    /// Build the final configuration.
    pub fn build(self) -> ClientConfig {
        self.config
    }

    /// Build and validate the configuration.
    ///
    /// Returns an error if validation fails.
    pub fn build_validated(self) -> Result<ClientConfig, ConfigError> {
        let config = self.build();
        config.validate()?;
        Ok(config)
    }

    // ===== Account Configuration =====

    /// Set the local account and device.
    pub fn with_account(mut self, account_id: impl Into<String>, device_id: u32) -> Self {
        self.config.account.account_id = account_id.into();
        self.config.account.device_id = device_id;
        self
    }

    // ===== Send Configuration =====

    /// Set the default transport.
    pub fn with_default_transport(mut self, transport: TransportType) -> Self {
        self.config.send.default_transport = transport;
        self
    }

    /// Fail sends to devices without a session instead of queueing them.
    pub fn disable_outbox_queueing(mut self) -> Self {
        self.config.send.queue_on_missing_session = false;
        self
    }

    // ===== Receive Configuration =====

    /// Ignore senders' end-to-end encryption declarations and always decrypt.
    pub fn distrust_sender_e2ee_flag(mut self) -> Self {
        self.config.receive.trust_sender_e2ee_flag = false;
        self
    }

    /// Set the receive pipeline concurrency.
    pub fn with_worker_concurrency(mut self, workers: usize) -> Self {
        self.config.receive.worker_concurrency = workers;
        self
    }

    // ===== Outbox Configuration =====

    /// Set the delay before the first retry.
    pub fn with_initial_retry_delay(mut self, delay: Duration) -> Self {
        self.config.outbox.initial_retry_delay = delay;
        self
    }

    /// Set the retry delay cap.
    pub fn with_max_retry_delay(mut self, delay: Duration) -> Self {
        self.config.outbox.max_retry_delay = delay;
        self
    }

    /// Set the number of failed attempts before a job is abandoned.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.config.outbox.max_retries = retries;
        self
    }

    /// Set the job lifetime.
    pub fn with_job_ttl(mut self, ttl: Duration) -> Self {
        self.config.outbox.job_ttl = ttl;
        self
    }
}

/// Configuration error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Invalid configuration value.
    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue {
        /// The field name.
        field: String,
        /// The reason it's invalid.
        reason: String,
    },

    /// Missing required configuration.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

/// Serde support for Duration serialization.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    #[derive(Serialize, Deserialize)]
    struct DurationRepr {
        secs: u64,
        nanos: u32,
    }

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let repr = DurationRepr {
            secs: duration.as_secs(),
            nanos: duration.subsec_nanos(),
        };
        repr.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let repr = DurationRepr::deserialize(deserializer)?;
        Ok(Duration::new(repr.secs, repr.nanos))
    }
}
