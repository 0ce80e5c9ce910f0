// ABOUTME: Memoized client construction keyed by region and credentials.
// ABOUTME: Deployments in the same region with the same credentials share one client.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Opaque handle to a credential set. The crate never inspects it; it only
/// keys client caching. Debug output is redacted so handles never leak into
/// logs.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CredentialsHandle(String);

impl CredentialsHandle {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CredentialsHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CredentialsHandle(<redacted>)")
    }
}

/// Cache key: one client per region per credential set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientKey {
    pub region: String,
    pub credentials: CredentialsHandle,
}

impl ClientKey {
    pub fn new(region: impl Into<String>, credentials: CredentialsHandle) -> Self {
        Self {
            region: region.into(),
            credentials,
        }
    }
}

/// Builds and memoizes control plane clients.
///
/// The builder closure is injected by the surrounding system (which owns
/// credential resolution); this crate only guarantees that repeated requests
/// for the same key return the same client.
pub struct ClientFactory<C> {
    build: Box<dyn Fn(&ClientKey) -> Arc<C> + Send + Sync>,
    cache: Mutex<HashMap<ClientKey, Arc<C>>>,
}

impl<C> ClientFactory<C> {
    pub fn new<F>(build: F) -> Self
    where
        F: Fn(&ClientKey) -> Arc<C> + Send + Sync + 'static,
    {
        Self {
            build: Box::new(build),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// A factory that hands out the same client for every key. Useful when
    /// the caller already holds a configured client (tests do this).
    pub fn fixed(client: Arc<C>) -> Self
    where
        C: Send + Sync + 'static,
    {
        Self::new(move |_| Arc::clone(&client))
    }

    pub fn client(&self, key: &ClientKey) -> Arc<C> {
        let mut cache = self.cache.lock();
        if let Some(existing) = cache.get(key) {
            return Arc::clone(existing);
        }
        let built = (self.build)(key);
        cache.insert(key.clone(), Arc::clone(&built));
        built
    }
}

impl<C> fmt::Debug for ClientFactory<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientFactory")
            .field("cached", &self.cache.lock().len())
            .finish()
    }
}
