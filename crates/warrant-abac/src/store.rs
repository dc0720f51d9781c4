//! Policy persistence.
//!
//! [`PolicyStore`] is the seam between the decision engine and wherever
//! policies live. Implementations index policies by the canonical key of the
//! [`KeyCodec`] they expose, so grants built from any store are comparable.
//!
//! [`MemoryDriver`] keeps everything in a `BTreeMap` and answers lookups by
//! scanning every key against the compiled query. That is fine for tens to
//! low thousands of policies.

use crate::error::StoreError;
use crate::key::{KeyCodec, Query};
use crate::policy::Policy;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::debug;
use warrant_config::WarrantConfig;

/// Pluggable policy storage.
///
/// `set` must reject a policy whose key is already present with
/// [`StoreError::Conflict`] and leave the stored one untouched.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Codec used to key stored policies.
    fn codec(&self) -> &KeyCodec;

    /// Removes every policy.
    async fn clear(&mut self) -> Result<(), StoreError>;

    /// Returns all policies whose key matches `query`.
    async fn get(&self, query: &Query) -> Result<Vec<Policy>, StoreError>;

    /// Inserts a policy.
    async fn set(&mut self, policy: Policy) -> Result<(), StoreError>;

    /// Removes the policy with the same key, returning whether one existed.
    async fn delete(&mut self, policy: &Policy) -> Result<bool, StoreError>;

    /// Whether a policy with the same key is stored.
    async fn has(&self, policy: &Policy) -> Result<bool, StoreError>;
}

/// In-process reference store.
#[derive(Debug, Clone, Default)]
pub struct MemoryDriver {
    codec: KeyCodec,
    policies: BTreeMap<String, Policy>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_codec(codec: KeyCodec) -> Self {
        Self {
            codec,
            policies: BTreeMap::new(),
        }
    }

    pub fn from_config(config: &WarrantConfig) -> crate::Result<Self> {
        Ok(Self::with_codec(KeyCodec::from_config(config)?))
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    fn key(&self, policy: &Policy) -> Result<String, StoreError> {
        self.codec
            .encode(policy)
            .map_err(|err| StoreError::Unkeyable(err.to_string()))
    }
}

#[async_trait]
impl PolicyStore for MemoryDriver {
    fn codec(&self) -> &KeyCodec {
        &self.codec
    }

    async fn clear(&mut self) -> Result<(), StoreError> {
        self.policies.clear();
        Ok(())
    }

    async fn get(&self, query: &Query) -> Result<Vec<Policy>, StoreError> {
        // A value that cannot be parsed can never appear in a stored key.
        let matcher = match self.codec.compile(query) {
            Ok(matcher) => matcher,
            Err(err) => {
                debug!(query = %query, error = %err, "Query cannot match any key");
                return Ok(Vec::new());
            }
        };

        Ok(self
            .policies
            .iter()
            .filter(|(key, _)| matcher.is_match(key))
            .map(|(_, policy)| policy.clone())
            .collect())
    }

    async fn set(&mut self, policy: Policy) -> Result<(), StoreError> {
        let key = self.key(&policy)?;
        if self.policies.contains_key(&key) {
            return Err(StoreError::Conflict { key });
        }
        self.policies.insert(key, policy);
        Ok(())
    }

    async fn delete(&mut self, policy: &Policy) -> Result<bool, StoreError> {
        match self.codec.encode(policy) {
            Ok(key) => Ok(self.policies.remove(&key).is_some()),
            Err(_) => Ok(false),
        }
    }

    async fn has(&self, policy: &Policy) -> Result<bool, StoreError> {
        match self.codec.encode(policy) {
            Ok(key) => Ok(self.policies.contains_key(&key)),
            Err(_) => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{ALL, ANY};

    async fn seeded() -> MemoryDriver {
        let mut driver = MemoryDriver::new();
        for policy in [
            Policy::new("admin", ANY, ALL),
            Policy::new("user", "read:own", "article"),
            Policy::new("user", "read:shared", "article").with_filter(["*", "!owner"]),
            Policy::new("guest", "read", "article:published"),
        ] {
            driver.set(policy).await.unwrap();
        }
        driver
    }

    #[tokio::test]
    async fn test_set_rejects_duplicate_key() {
        let mut driver = seeded().await;

        let duplicate = Policy::new("user", "read:own", "article").with_field(["title"]);
        let err = driver.set(duplicate).await.unwrap_err();
        assert_eq!(
            err,
            StoreError::Conflict {
                key: "user:null:read:own:article:all".to_string()
            }
        );

        // Original retained.
        let stored = driver
            .get(&Query::new().subject("user").action("read:own"))
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert!(stored[0].field.is_empty());
    }

    #[tokio::test]
    async fn test_get_scans_matching_keys() {
        let driver = seeded().await;

        let user = driver.get(&Query::new().subject("user")).await.unwrap();
        assert_eq!(user.len(), 2);

        let strict_read = Query::new().action("read");
        let strict = driver.get(&strict_read).await.unwrap();
        assert_eq!(strict.len(), 1);
        assert_eq!(strict[0].subject, "guest");

        let loose = driver.get(&strict_read.with_strict(false)).await.unwrap();
        let subjects: Vec<&str> = loose.iter().map(|p| p.subject.as_str()).collect();
        assert_eq!(subjects, vec!["guest", "user", "user"]);

        assert_eq!(driver.get(&Query::new()).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_unparsable_query_matches_nothing() {
        let driver = seeded().await;
        let query = Query::new().subject("user").action("read:own:extra");
        assert!(driver.get(&query).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_has_and_clear() {
        let mut driver = seeded().await;
        let guest = Policy::new("guest", "read", "article:published");

        assert!(driver.has(&guest).await.unwrap());
        assert!(driver.delete(&guest).await.unwrap());
        assert!(!driver.has(&guest).await.unwrap());
        assert!(!driver.delete(&guest).await.unwrap());
        assert_eq!(driver.len(), 3);

        driver.clear().await.unwrap();
        assert!(driver.is_empty());
    }

    #[tokio::test]
    async fn test_unkeyable_policy() {
        let mut driver = MemoryDriver::new();
        let broken = Policy::new("", "read", "article");

        assert!(matches!(
            driver.set(broken.clone()).await,
            Err(StoreError::Unkeyable(_))
        ));
        assert!(!driver.has(&broken).await.unwrap());
    }

    #[tokio::test]
    async fn test_prefixed_driver() {
        let mut config = WarrantConfig::default();
        config.codec.prefix = "tenant-7".to_string();
        let mut driver = MemoryDriver::from_config(&config).unwrap();

        driver
            .set(Policy::new("user", "read:own", "article"))
            .await
            .unwrap();
        let found = driver.get(&Query::new().subject("user")).await.unwrap();
        assert_eq!(found.len(), 1);
    }
}
