//! Privilege sets and the store they are read from.
//!
//! Privileges are loaded into an external cache by a separate login flow;
//! the engine only ever reads them. [`PrivilegeCache`] is the seam: the
//! engine is generic over it, and [`InMemoryPrivilegeCache`] is the bundled
//! implementation for tests and single-process hosts.
//!
//! A cache distinguishes three outcomes on purpose:
//!
//! - `Ok(Some(set))`: the principal has an entry (possibly empty)
//! - `Ok(None)`: the principal has no entry
//! - `Err(_)`: the store could not be consulted

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::CacheError;

// ============================================================================
// PrivilegeSet
// ============================================================================

/// The opaque tokens a principal holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrivilegeSet(BTreeSet<String>);

impl PrivilegeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exact, case-sensitive membership.
    pub fn contains(&self, token: &str) -> bool {
        self.0.contains(token)
    }

    pub fn insert(&mut self, token: impl Into<String>) -> bool {
        self.0.insert(token.into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for PrivilegeSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

// ============================================================================
// Codec
// ============================================================================

/// Serializes a privilege set as a JSON array of strings.
pub fn encode_privileges(set: &PrivilegeSet) -> Result<Vec<u8>, CacheError> {
    serde_json::to_vec(set).map_err(|e| CacheError::Codec(e.to_string()))
}

/// Decodes a stored entry. Empty input means the key holds nothing.
pub fn decode_privileges(bytes: &[u8]) -> Result<Option<PrivilegeSet>, CacheError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(bytes)
        .map(Some)
        .map_err(|e| CacheError::Codec(e.to_string()))
}

// ============================================================================
// PrivilegeCache
// ============================================================================

/// Read/write access to per-principal privilege sets.
///
/// Implementations must be safe to call concurrently; the engine shares one
/// cache across every in-flight decision.
pub trait PrivilegeCache: Send + Sync {
    /// Fetches the set stored for `principal`.
    fn get(
        &self,
        principal: &str,
    ) -> impl Future<Output = Result<Option<PrivilegeSet>, CacheError>> + Send;

    /// Stores `set` for `principal`, replacing any previous entry.
    fn put(
        &self,
        principal: &str,
        set: PrivilegeSet,
    ) -> impl Future<Output = Result<(), CacheError>> + Send;

    /// Removes the entry for `principal`.
    fn remove(&self, principal: &str) -> impl Future<Output = Result<(), CacheError>> + Send;
}

impl<C: PrivilegeCache> PrivilegeCache for Arc<C> {
    fn get(
        &self,
        principal: &str,
    ) -> impl Future<Output = Result<Option<PrivilegeSet>, CacheError>> + Send {
        (**self).get(principal)
    }

    fn put(
        &self,
        principal: &str,
        set: PrivilegeSet,
    ) -> impl Future<Output = Result<(), CacheError>> + Send {
        (**self).put(principal, set)
    }

    fn remove(&self, principal: &str) -> impl Future<Output = Result<(), CacheError>> + Send {
        (**self).remove(principal)
    }
}

/// Process-local privilege store.
///
/// Entries are kept in their encoded form so that a malformed payload behaves
/// the same way it would coming from a remote store.
#[derive(Debug, Default)]
pub struct InMemoryPrivilegeCache {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryPrivilegeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the cache from `(principal, tokens)` pairs.
    pub fn with_entries<P, I, T>(entries: impl IntoIterator<Item = (P, I)>) -> Result<Self, CacheError>
    where
        P: Into<String>,
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let cache = Self::new();
        {
            let mut map = cache.write()?;
            for (principal, tokens) in entries {
                let set: PrivilegeSet = tokens.into_iter().collect();
                map.insert(principal.into(), encode_privileges(&set)?);
            }
        }
        Ok(cache)
    }

    /// Stores a raw payload without encoding it.
    pub fn put_raw(&self, principal: impl Into<String>, bytes: Vec<u8>) -> Result<(), CacheError> {
        self.write()?.insert(principal.into(), bytes);
        Ok(())
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, Vec<u8>>>, CacheError> {
        self.entries
            .write()
            .map_err(|_| CacheError::Unavailable("privilege cache lock poisoned".to_string()))
    }

    fn lookup(&self, principal: &str) -> Result<Option<PrivilegeSet>, CacheError> {
        let map = self
            .entries
            .read()
            .map_err(|_| CacheError::Unavailable("privilege cache lock poisoned".to_string()))?;
        match map.get(principal) {
            Some(bytes) => decode_privileges(bytes),
            None => Ok(None),
        }
    }
}

impl PrivilegeCache for InMemoryPrivilegeCache {
    async fn get(&self, principal: &str) -> Result<Option<PrivilegeSet>, CacheError> {
        self.lookup(principal)
    }

    async fn put(&self, principal: &str, set: PrivilegeSet) -> Result<(), CacheError> {
        let bytes = encode_privileges(&set)?;
        self.write()?.insert(principal.to_string(), bytes);
        Ok(())
    }

    async fn remove(&self, principal: &str) -> Result<(), CacheError> {
        self.write()?.remove(principal);
        Ok(())
    }
}
