//! Tenant registry: static API-key-to-tenant lookup.
//!
//! The registry is built once at startup from the configured
//! `key1:tenant1,key2:tenant2` string and never mutated afterwards, so
//! lookups need no synchronization.

use crate::error::{GranaryError, Result};
use std::collections::HashMap;

/// Immutable mapping from API key to tenant identifier.
#[derive(Debug, Clone)]
pub struct TenantRegistry {
    keys: HashMap<String, String>,
}

impl TenantRegistry {
    /// Parse a registry from a `key:tenant,key:tenant` string.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Err(GranaryError::Config(
                "API key configuration is empty. Format: key1:tenant1,key2:tenant2".to_string(),
            ));
        }

        let mut keys = HashMap::new();
        for pair in raw.split(',') {
            let mut parts = pair.splitn(2, ':');
            let key = parts.next().map(str::trim).unwrap_or_default();
            let tenant = parts.next().map(str::trim).unwrap_or_default();

            if key.is_empty() || tenant.is_empty() {
                return Err(GranaryError::Config(format!(
                    "Invalid API key entry {:?}. Expected format: key:tenant",
                    pair
                )));
            }

            keys.insert(key.to_string(), tenant.to_string());
        }

        if keys.is_empty() {
            return Err(GranaryError::Config(
                "No valid API keys found in configuration".to_string(),
            ));
        }

        Ok(Self { keys })
    }

    /// Resolve an API key to its tenant identifier.
    pub fn resolve(&self, api_key: &str) -> Option<&str> {
        self.keys.get(api_key).map(String::as_str)
    }

    /// Number of registered keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_pair() {
        let registry = TenantRegistry::parse("key-abc:tenant-1").unwrap();
        assert_eq!(registry.resolve("key-abc"), Some("tenant-1"));
        assert_eq!(registry.resolve("other"), None);
    }

    #[test]
    fn test_parse_multiple_pairs_with_whitespace() {
        let registry = TenantRegistry::parse(" k1:acme , k2:globex ").unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.resolve("k1"), Some("acme"));
        assert_eq!(registry.resolve("k2"), Some("globex"));
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert!(TenantRegistry::parse("").is_err());
        assert!(TenantRegistry::parse("   ").is_err());
    }

    #[test]
    fn test_parse_rejects_malformed_pair() {
        assert!(TenantRegistry::parse("justakey").is_err());
        assert!(TenantRegistry::parse("k1:t1,nocolon").is_err());
        assert!(TenantRegistry::parse(":tenant").is_err());
        assert!(TenantRegistry::parse("key:").is_err());
    }

    #[test]
    fn test_key_with_colon_in_tenant() {
        // Only the first colon splits the pair.
        let registry = TenantRegistry::parse("k1:tenant:with:colons").unwrap();
        assert_eq!(registry.resolve("k1"), Some("tenant:with:colons"));
    }
}
