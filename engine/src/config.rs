//! Engine configuration.
//!
//! Built explicitly by the application (see the `venue` crate's `Config::from_env`)
//! and handed to [`FulfillmentEngine::new`](crate::FulfillmentEngine::new). Nothing in
//! the engine reads process-wide state.

use crate::passes::PassCatalog;
use chrono::Duration;
use std::fmt;
use thiserror::Error;

/// Errors raised while assembling engine configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The credential signing secret is empty.
    #[error("Credential signing secret must not be empty")]
    EmptySigningKey,

    /// A pass type definition could not be parsed.
    #[error("Invalid pass type definition '{0}' (expected name:seconds:cents)")]
    InvalidPassType(String),

    /// A configuration value is out of range.
    #[error("Invalid configuration value for {key}: {reason}")]
    InvalidValue {
        /// Offending key
        key: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

/// Process-wide secret used to sign credential codes.
///
/// Rotating it invalidates every outstanding unredeemed credential when signature
/// re-derivation is enabled.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningKey(Vec<u8>);

impl SigningKey {
    /// Wrap raw key bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptySigningKey`] if `bytes` is empty.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, ConfigError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(ConfigError::EmptySigningKey);
        }
        Ok(Self(bytes))
    }

    /// Raw key bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningKey(<{} bytes redacted>)", self.0.len())
    }
}

/// Default cap on entrance passes bought in one call.
pub const DEFAULT_MAX_PASSES_PER_PURCHASE: u32 = 20;

/// Configuration for [`FulfillmentEngine`](crate::FulfillmentEngine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Secret for credential signatures
    pub signing_key: SigningKey,
    /// TTL applied when an issuance does not override it (`None` = no expiry)
    pub default_credential_ttl: Option<Duration>,
    /// Re-derive and compare the MAC at redemption before claiming
    pub verify_signatures: bool,
    /// Entrance pass tiers on sale
    pub pass_catalog: PassCatalog,
    /// Largest `quantity` accepted by one entrance pass purchase
    pub max_passes_per_purchase: u32,
}

impl EngineConfig {
    /// Configuration with defaults: no default TTL, signature re-derivation on,
    /// the default pass catalog and [`DEFAULT_MAX_PASSES_PER_PURCHASE`].
    #[must_use]
    pub fn new(signing_key: SigningKey) -> Self {
        Self {
            signing_key,
            default_credential_ttl: None,
            verify_signatures: true,
            pass_catalog: PassCatalog::default(),
            max_passes_per_purchase: DEFAULT_MAX_PASSES_PER_PURCHASE,
        }
    }

    /// Set the default credential TTL.
    #[must_use]
    pub const fn with_default_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.default_credential_ttl = ttl;
        self
    }

    /// Enable or disable signature re-derivation at redemption.
    #[must_use]
    pub const fn with_verify_signatures(mut self, verify: bool) -> Self {
        self.verify_signatures = verify;
        self
    }

    /// Cap the number of passes one purchase may request.
    #[must_use]
    pub const fn with_max_passes_per_purchase(mut self, max: u32) -> Self {
        self.max_passes_per_purchase = max;
        self
    }

    /// Replace the pass catalog.
    #[must_use]
    pub fn with_pass_catalog(mut self, catalog: PassCatalog) -> Self {
        self.pass_catalog = catalog;
        self
    }
}
