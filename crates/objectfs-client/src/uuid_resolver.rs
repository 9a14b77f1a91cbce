//! UUID to network address resolution
//!
//! Services are addressed by UUID. [`CachingUuidResolver`] asks the
//! directory service for a UUID's address mappings and caches the chosen
//! address for as long as the mapping's TTL allows.

use async_trait::async_trait;
use objectfs_common::{AddressMapping, ClientOptions, Error, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Directory service lookups needed by the client
#[async_trait]
pub trait DirectoryService: Send + Sync {
    /// All address mappings registered for `uuid`
    async fn get_address_mappings(&self, uuid: &str) -> Result<Vec<AddressMapping>>;
}

/// Resolves a service UUID to `address:port`
#[async_trait]
pub trait UuidResolver: Send + Sync {
    async fn uuid_to_address(&self, uuid: &str) -> Result<String>;
}

/// One cached resolution
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedAddress {
    pub address: String,
    pub ttl: Duration,
    pub created: Instant,
}

impl CachedAddress {
    #[must_use]
    pub fn new(address: impl Into<String>, ttl: Duration) -> Self {
        Self {
            address: address.into(),
            ttl,
            created: Instant::now(),
        }
    }

    /// Whether the entry may still be used at `now`
    #[must_use]
    pub fn is_valid_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created) < self.ttl
    }
}

/// Outcome of the non-blocking cache probe
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CacheProbe {
    Hit(String),
    /// No entry, or the expired entry was evicted
    Miss,
    /// Another task holds the lock
    Contended,
}

/// UUID to address cache with lazy TTL eviction
#[derive(Debug, Default)]
pub struct AddressCache {
    entries: Mutex<HashMap<String, CachedAddress>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl AddressCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look `uuid` up without waiting for the lock
    pub fn probe(&self, uuid: &str) -> CacheProbe {
        let Some(mut entries) = self.entries.try_lock() else {
            return CacheProbe::Contended;
        };
        let probe = match entries.get(uuid) {
            Some(entry) if entry.is_valid_at(Instant::now()) => {
                CacheProbe::Hit(entry.address.clone())
            }
            Some(_) => {
                entries.remove(uuid);
                debug!(uuid, "evicted expired address");
                CacheProbe::Miss
            }
            None => CacheProbe::Miss,
        };
        drop(entries);

        let counter = if matches!(probe, CacheProbe::Hit(_)) {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        probe
    }

    /// Cache `address` for `uuid`, replacing any previous entry
    pub fn insert(&self, uuid: impl Into<String>, address: impl Into<String>, ttl: Duration) {
        self.entries
            .lock()
            .insert(uuid.into(), CachedAddress::new(address, ttl));
    }

    /// Drop the entry for `uuid`
    pub fn invalidate(&self, uuid: &str) -> bool {
        self.entries.lock().remove(uuid).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    #[must_use]
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

/// [`UuidResolver`] backed by the directory service and an [`AddressCache`]
pub struct CachingUuidResolver<D> {
    directory: D,
    cache: AddressCache,
    /// Preferred mapping protocol
    protocol: String,
}

impl<D: DirectoryService> CachingUuidResolver<D> {
    /// Create a resolver preferring the protocol selected by `options`
    pub fn new(directory: D, options: &ClientOptions) -> Self {
        Self {
            directory,
            cache: AddressCache::new(),
            protocol: options.protocol().to_string(),
        }
    }

    #[must_use]
    pub fn cache(&self) -> &AddressCache {
        &self.cache
    }

    #[must_use]
    pub fn directory(&self) -> &D {
        &self.directory
    }

    /// Ask the directory service and cache the answer
    async fn refresh(&self, uuid: &str) -> Result<String> {
        let mappings = self.directory.get_address_mappings(uuid).await?;
        let mapping = mappings
            .iter()
            .find(|m| m.protocol == self.protocol)
            .or_else(|| mappings.first())
            .ok_or_else(|| Error::UnknownUuid(uuid.to_string()))?;

        let address = mapping.socket_address();
        self.cache.insert(
            uuid,
            address.clone(),
            Duration::from_secs(u64::from(mapping.ttl_s)),
        );
        debug!(
            uuid,
            address = %address,
            protocol = %mapping.protocol,
            ttl_s = mapping.ttl_s,
            "resolved service address"
        );
        Ok(address)
    }
}

#[async_trait]
impl<D: DirectoryService> UuidResolver for CachingUuidResolver<D> {
    async fn uuid_to_address(&self, uuid: &str) -> Result<String> {
        match self.cache.probe(uuid) {
            CacheProbe::Hit(address) => Ok(address),
            CacheProbe::Miss | CacheProbe::Contended => self.refresh(uuid).await,
        }
    }
}
