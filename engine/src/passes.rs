//! Entrance pass tiers.

use crate::config::ConfigError;
use chrono::Duration;
use fulfillment_core::error::{FulfillmentError, Result};
use fulfillment_core::types::Money;
use std::collections::BTreeMap;

/// One pass tier: how long it admits and what it costs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassType {
    /// Tier name as sold (`day`, `weekend`, ...)
    pub name: String,
    /// Validity window measured from purchase
    pub validity: Duration,
    /// Unit price
    pub price: Money,
}

impl PassType {
    /// Create a tier.
    #[must_use]
    pub fn new(name: impl Into<String>, validity: Duration, price: Money) -> Self {
        Self {
            name: name.into(),
            validity,
            price,
        }
    }
}

/// Tiers on sale, keyed by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassCatalog {
    types: BTreeMap<String, PassType>,
}

impl PassCatalog {
    /// Empty catalog.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            types: BTreeMap::new(),
        }
    }

    /// Add or replace a tier.
    #[must_use]
    pub fn with(mut self, pass_type: PassType) -> Self {
        self.types.insert(pass_type.name.clone(), pass_type);
        self
    }

    /// Look up a tier.
    ///
    /// # Errors
    ///
    /// Returns [`FulfillmentError::InvalidType`] for names not in the catalog.
    pub fn get(&self, name: &str) -> Result<&PassType> {
        self.types
            .get(name)
            .ok_or_else(|| FulfillmentError::InvalidType(name.to_string()))
    }

    /// Tier names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// Parse `name:seconds:cents[,name:seconds:cents...]`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPassType`] for malformed entries or non-positive
    /// validity.
    pub fn parse(definition: &str) -> std::result::Result<Self, ConfigError> {
        let mut catalog = Self::empty();
        for entry in definition.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let invalid = || ConfigError::InvalidPassType(entry.to_string());

            let mut parts = entry.split(':');
            let (Some(name), Some(seconds), Some(cents), None) =
                (parts.next(), parts.next(), parts.next(), parts.next())
            else {
                return Err(invalid());
            };

            let name = name.trim();
            let seconds: i64 = seconds.trim().parse().map_err(|_| invalid())?;
            let cents: u64 = cents.trim().parse().map_err(|_| invalid())?;
            if name.is_empty() || seconds <= 0 {
                return Err(invalid());
            }
            let validity = Duration::try_seconds(seconds).ok_or_else(invalid)?;

            catalog = catalog.with(PassType::new(name, validity, Money::from_cents(cents)));
        }
        Ok(catalog)
    }
}

impl Default for PassCatalog {
    fn default() -> Self {
        Self::empty()
            .with(PassType::new("day", Duration::hours(24), Money::from_cents(2_500)))
            .with(PassType::new("weekend", Duration::hours(72), Money::from_cents(6_000)))
            .with(PassType::new("season", Duration::days(120), Money::from_cents(35_000)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;

    #[test]
    fn default_tiers() {
        let catalog = PassCatalog::default();
        assert_eq!(catalog.get("day").unwrap().validity, Duration::hours(24));
        assert_eq!(catalog.get("weekend").unwrap().validity, Duration::hours(72));
        assert_eq!(catalog.get("season").unwrap().validity, Duration::days(120));
        assert_eq!(catalog.names().collect::<Vec<_>>(), ["day", "season", "weekend"]);
    }

    #[test]
    fn unknown_tier_is_invalid_type() {
        assert_eq!(
            PassCatalog::default().get("lifetime"),
            Err(FulfillmentError::InvalidType("lifetime".into()))
        );
    }

    #[test]
    fn parses_definitions() {
        let catalog = PassCatalog::parse("vip:3600:9900, day:86400:2000").unwrap();
        let vip = catalog.get("vip").unwrap();
        assert_eq!(vip.validity, Duration::hours(1));
        assert_eq!(vip.price, Money::from_cents(9_900));
        assert_eq!(catalog.get("day").unwrap().price, Money::from_cents(2_000));
    }

    #[test]
    fn rejects_malformed_definitions() {
        for bad in ["vip", "vip:10", "vip:ten:100", "vip:0:100", ":10:100", "vip:10:100:extra"] {
            assert!(
                matches!(PassCatalog::parse(bad), Err(ConfigError::InvalidPassType(_))),
                "{bad} should be rejected"
            );
        }
    }
}
