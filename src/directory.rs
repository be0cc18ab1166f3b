//! Tenant directory: namespace/domain lookups behind an in-process map (L1) and a distributed
//! cache (L2) in front of the tenant store.
//!
//! Every failure below the directory (store errors, cache errors, undecodable payloads, inactive
//! or schema-less tenants) surfaces as `DirectoryError::NotFound`; the cause is logged here.
//! Entries are never invalidated by the store, so staleness is bounded by the TTL. `forget`
//! exists for callers that own the tenant mutation path.

use crate::cache::DistributedCache;
use crate::error::{DirectoryError, StoreError};
use crate::store::TenantStore;
use crate::tenant::{normalize, Tenant};
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_TTL: Duration = Duration::from_secs(180);
pub const DEFAULT_KEY_PREFIX: &str = "tenancy";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LookupKey {
    Namespace,
    Domain,
}

impl LookupKey {
    fn as_str(&self) -> &'static str {
        match self {
            LookupKey::Namespace => "namespace",
            LookupKey::Domain => "domain",
        }
    }
}

#[derive(Clone, Debug)]
pub struct DirectoryOptions {
    pub ttl: Duration,
    pub key_prefix: String,
}

impl Default for DirectoryOptions {
    fn default() -> Self {
        DirectoryOptions {
            ttl: DEFAULT_TTL,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

#[derive(Clone, Debug)]
struct Entry {
    tenant: Arc<Tenant>,
    expires_at: Instant,
}

#[derive(Default)]
struct L1 {
    by_namespace: HashMap<String, Entry>,
    by_domain: HashMap<String, Entry>,
}

impl L1 {
    fn map(&self, kind: LookupKey) -> &HashMap<String, Entry> {
        match kind {
            LookupKey::Namespace => &self.by_namespace,
            LookupKey::Domain => &self.by_domain,
        }
    }
}

pub struct TenantDirectory {
    store: Arc<dyn TenantStore>,
    cache: Option<Arc<dyn DistributedCache>>,
    ttl: Duration,
    key_prefix: String,
    l1: RwLock<L1>,
}

impl TenantDirectory {
    pub fn new(
        store: Arc<dyn TenantStore>,
        cache: Option<Arc<dyn DistributedCache>>,
        opts: DirectoryOptions,
    ) -> Self {
        let ttl = if opts.ttl.is_zero() { DEFAULT_TTL } else { opts.ttl };
        let prefix = opts.key_prefix.trim().trim_end_matches(':').to_string();
        let key_prefix = if prefix.is_empty() {
            DEFAULT_KEY_PREFIX.to_string()
        } else {
            prefix
        };
        TenantDirectory {
            store,
            cache,
            ttl,
            key_prefix,
            l1: RwLock::new(L1::default()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// L2 key, e.g. `tenancy:tenant:namespace:acme`.
    pub fn cache_key(&self, kind: LookupKey, key: &str) -> String {
        format!("{}:tenant:{}:{}", self.key_prefix, kind.as_str(), normalize(key))
    }

    pub async fn get_by_namespace(&self, namespace: &str) -> Result<Arc<Tenant>, DirectoryError> {
        self.lookup(LookupKey::Namespace, namespace).await
    }

    pub async fn get_by_domain(&self, domain: &str) -> Result<Arc<Tenant>, DirectoryError> {
        self.lookup(LookupKey::Domain, domain).await
    }

    /// Domains of active tenants, straight from the store (the CORS gate caches these itself).
    pub async fn list_domains(&self) -> Result<Vec<String>, StoreError> {
        self.store.list_domains().await
    }

    async fn lookup(&self, kind: LookupKey, raw: &str) -> Result<Arc<Tenant>, DirectoryError> {
        let key = normalize(raw);
        if key.is_empty() {
            return Err(DirectoryError::NotFound);
        }

        if let Some(tenant) = self.from_l1(kind, &key) {
            return Ok(tenant);
        }

        if let Some(tenant) = self.from_l2(kind, &key).await {
            self.put_l1(&tenant);
            return Ok(tenant);
        }

        let found = match kind {
            LookupKey::Namespace => self.store.get_by_namespace(&key).await,
            LookupKey::Domain => self.store.get_by_domain(&key).await,
        };
        let tenant = match found {
            Ok(Some(t)) if t.is_routable() => Arc::new(t),
            Ok(_) => return Err(DirectoryError::NotFound),
            Err(e) => {
                tracing::warn!(kind = kind.as_str(), key = %key, error = %e, "tenant store lookup failed");
                return Err(DirectoryError::NotFound);
            }
        };

        self.put_l1(&tenant);
        self.put_l2(&tenant).await;
        Ok(tenant)
    }

    fn from_l1(&self, kind: LookupKey, key: &str) -> Option<Arc<Tenant>> {
        let l1 = self.l1.read();
        let entry = l1.map(kind).get(key)?;
        if entry.expires_at <= Instant::now() || !entry.tenant.is_routable() {
            return None;
        }
        Some(entry.tenant.clone())
    }

    async fn from_l2(&self, kind: LookupKey, key: &str) -> Option<Arc<Tenant>> {
        let cache = self.cache.as_ref()?;
        let cache_key = self.cache_key(kind, key);
        let bytes = match cache.get(&cache_key).await {
            Ok(Some(b)) if !b.is_empty() => b,
            Ok(_) => return None,
            Err(e) => {
                tracing::warn!(key = %cache_key, error = %e, "tenant cache read failed");
                return None;
            }
        };
        match serde_json::from_slice::<Tenant>(&bytes) {
            Ok(t) if t.is_routable() => Some(Arc::new(t)),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(key = %cache_key, error = %e, "failed to decode tenant from cache");
                None
            }
        }
    }

    /// TTL for this tenant: the directory TTL, cut short by `active_to`. None when already expired.
    fn ttl_for(&self, tenant: &Tenant) -> Option<Duration> {
        let now = Utc::now();
        if tenant.is_expired_at(now) {
            return None;
        }
        match tenant.active_to {
            Some(to) => {
                let remaining = (to - now).to_std().ok()?;
                Some(remaining.min(self.ttl))
            }
            None => Some(self.ttl),
        }
    }

    fn put_l1(&self, tenant: &Arc<Tenant>) {
        let Some(ttl) = self.ttl_for(tenant) else {
            return;
        };
        let entry = Entry {
            tenant: tenant.clone(),
            expires_at: Instant::now() + ttl,
        };
        let mut l1 = self.l1.write();
        let ns = tenant.namespace_key();
        if !ns.is_empty() {
            l1.by_namespace.insert(ns, entry.clone());
        }
        if let Some(domain) = tenant.domain_key() {
            l1.by_domain.insert(domain, entry);
        }
    }

    async fn put_l2(&self, tenant: &Tenant) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };
        let Some(ttl) = self.ttl_for(tenant) else {
            return;
        };
        let data = match serde_json::to_vec(tenant) {
            Ok(d) => d,
            Err(e) => {
                tracing::error!(namespace = %tenant.namespace, error = %e, "failed to encode tenant for cache");
                return;
            }
        };
        let mut keys = Vec::with_capacity(2);
        let ns = tenant.namespace_key();
        if !ns.is_empty() {
            keys.push(self.cache_key(LookupKey::Namespace, &ns));
        }
        if let Some(domain) = tenant.domain_key() {
            keys.push(self.cache_key(LookupKey::Domain, &domain));
        }
        for key in keys {
            if let Err(e) = cache.set(&key, data.clone(), ttl).await {
                tracing::warn!(key = %key, error = %e, "failed to cache tenant");
            }
        }
    }

    /// Drop every cached entry for this tenant (both tiers, both keys).
    pub async fn forget(&self, tenant: &Tenant) {
        let ns = tenant.namespace_key();
        let domain = tenant.domain_key();
        {
            let mut l1 = self.l1.write();
            l1.by_namespace.remove(&ns);
            if let Some(d) = &domain {
                l1.by_domain.remove(d);
            }
        }
        let Some(cache) = self.cache.as_ref() else {
            return;
        };
        let mut keys = vec![self.cache_key(LookupKey::Namespace, &ns)];
        if let Some(d) = &domain {
            keys.push(self.cache_key(LookupKey::Domain, d));
        }
        for key in keys {
            if let Err(e) = cache.delete(&key).await {
                tracing::warn!(key = %key, error = %e, "failed to evict tenant from cache");
            }
        }
    }
}

impl std::fmt::Debug for TenantDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantDirectory")
            .field("ttl", &self.ttl)
            .field("key_prefix", &self.key_prefix)
            .field("l2", &self.cache.is_some())
            .finish()
    }
}
