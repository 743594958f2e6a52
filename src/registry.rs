//! Registry of telemetry clients.
//!
//! Holds at most one live client under the reserved id [`LIVE_CLIENT_ID`] plus any
//! number of named recording clients, and tracks which one is active. All
//! operations share one lock; reads from the clients themselves are not covered
//! by it.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::{debug, info};

/// Reserved id of the live client.
pub const LIVE_CLIENT_ID: &str = "live";

/// Identifier of a registered client.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientId(String);

impl ClientId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn live() -> Self {
        Self(LIVE_CLIENT_ID.to_string())
    }

    pub fn is_live(&self) -> bool {
        self.0 == LIVE_CLIENT_ID
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClientId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ClientId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Registry failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("client id '{0}' is reserved for the live client")]
    Reserved(ClientId),

    #[error("client '{0}' is already registered")]
    AlreadyRegistered(ClientId),

    #[error("no client registered as '{0}'")]
    NotFound(ClientId),
}

struct Entries<C> {
    clients: BTreeMap<ClientId, Arc<C>>,
    active: ClientId,
}

/// Named clients plus the active selection.
pub struct ClientRegistry<C> {
    inner: Mutex<Entries<C>>,
}

impl<C> Default for ClientRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> ClientRegistry<C> {
    /// Empty registry; the live id is active even while no live client is installed.
    pub fn new() -> Self {
        Self { inner: Mutex::new(Entries { clients: BTreeMap::new(), active: ClientId::live() }) }
    }

    pub fn with_live(live: C) -> Self {
        let registry = Self::new();
        registry.set_live(live);
        registry
    }

    /// Install or replace the live client.
    pub fn set_live(&self, live: C) {
        self.lock().clients.insert(ClientId::live(), Arc::new(live));
        debug!("Live client installed");
    }

    /// Register a recording client.
    pub fn add(&self, id: impl Into<ClientId>, client: C) -> Result<Arc<C>, RegistryError> {
        let id = id.into();
        if id.is_live() {
            return Err(RegistryError::Reserved(id));
        }
        let mut entries = self.lock();
        if entries.clients.contains_key(&id) {
            return Err(RegistryError::AlreadyRegistered(id));
        }
        let client = Arc::new(client);
        entries.clients.insert(id.clone(), Arc::clone(&client));
        info!(id = %id, clients = entries.clients.len(), "Client registered");
        Ok(client)
    }

    /// Remove a recording client. Removing the active client makes the live id active.
    pub fn remove(&self, id: impl Into<ClientId>) -> Result<Arc<C>, RegistryError> {
        let id = id.into();
        if id.is_live() {
            return Err(RegistryError::Reserved(id));
        }
        let mut entries = self.lock();
        let client = entries.clients.remove(&id).ok_or_else(|| RegistryError::NotFound(id.clone()))?;
        if entries.active == id {
            entries.active = ClientId::live();
            debug!(id = %id, "Active client removed; live is active");
        }
        info!(id = %id, "Client removed");
        Ok(client)
    }

    pub fn get(&self, id: &ClientId) -> Option<Arc<C>> {
        self.lock().clients.get(id).cloned()
    }

    pub fn contains(&self, id: &ClientId) -> bool {
        self.lock().clients.contains_key(id)
    }

    pub fn set_active(&self, id: impl Into<ClientId>) -> Result<(), RegistryError> {
        let id = id.into();
        let mut entries = self.lock();
        if !entries.clients.contains_key(&id) {
            return Err(RegistryError::NotFound(id));
        }
        debug!(from = %entries.active, to = %id, "Active client changed");
        entries.active = id;
        Ok(())
    }

    pub fn active_id(&self) -> ClientId {
        self.lock().active.clone()
    }

    /// The active client, if one is registered under the active id.
    pub fn active(&self) -> Option<Arc<C>> {
        let entries = self.lock();
        entries.clients.get(&entries.active).cloned()
    }

    /// Registered ids in order.
    pub fn ids(&self) -> Vec<ClientId> {
        self.lock().clients.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().clients.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Entries<C>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C> fmt::Debug for ClientRegistry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.lock();
        f.debug_struct("ClientRegistry")
            .field("ids", &entries.clients.keys().collect::<Vec<_>>())
            .field("active", &entries.active)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn live_id_is_reserved() {
        let registry = ClientRegistry::with_live("live channel");
        assert_eq!(registry.add("live", "impostor"), Err(RegistryError::Reserved(ClientId::live())));
        assert_eq!(registry.remove("live"), Err(RegistryError::Reserved(ClientId::live())));
        assert_eq!(registry.get(&ClientId::live()).as_deref(), Some(&"live channel"));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let registry = ClientRegistry::new();
        registry.add("s1", 1).unwrap();
        assert_eq!(registry.add("s1", 2), Err(RegistryError::AlreadyRegistered(ClientId::new("s1"))));
        assert_eq!(registry.get(&ClientId::new("s1")).as_deref(), Some(&1));
    }

    #[test]
    fn removing_active_client_falls_back_to_live() {
        let registry = ClientRegistry::with_live(0);
        registry.add("s1", 1).unwrap();
        registry.add("s2", 2).unwrap();

        registry.set_active("s1").unwrap();
        assert_eq!(registry.active().as_deref(), Some(&1));

        registry.remove("s2").unwrap();
        assert_eq!(registry.active_id(), ClientId::new("s1"));

        registry.remove("s1").unwrap();
        assert_eq!(registry.active_id(), ClientId::live());
        assert_eq!(registry.active().as_deref(), Some(&0));
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let registry: ClientRegistry<u8> = ClientRegistry::new();
        assert_eq!(registry.set_active("nope"), Err(RegistryError::NotFound(ClientId::new("nope"))));
        assert_eq!(registry.remove("nope"), Err(RegistryError::NotFound(ClientId::new("nope"))));
        assert!(registry.get(&ClientId::new("nope")).is_none());
    }

    #[test]
    fn live_is_active_before_it_is_installed() {
        let registry = ClientRegistry::new();
        assert_eq!(registry.active_id(), ClientId::live());
        assert!(registry.active().is_none());

        registry.set_live("late");
        assert_eq!(registry.active().as_deref(), Some(&"late"));
        assert_eq!(registry.ids(), vec![ClientId::live()]);
    }

    #[test]
    fn ids_are_sorted() {
        let registry = ClientRegistry::new();
        registry.add("b", ()).unwrap();
        registry.add("a", ()).unwrap();
        assert_eq!(registry.ids(), vec![ClientId::new("a"), ClientId::new("b")]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn shared_across_threads() {
        let registry = Arc::new(ClientRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.add(format!("s{i}"), i).unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.len(), 8);
    }

    #[test]
    fn poisoned_lock_is_recovered() {
        let registry = Arc::new(ClientRegistry::new());
        registry.add("s1", 1).unwrap();

        let poisoner = Arc::clone(&registry);
        let _ = thread::spawn(move || {
            let _guard = poisoner.lock();
            panic!("poison the registry lock");
        })
        .join();

        assert_eq!(registry.get(&ClientId::new("s1")).as_deref(), Some(&1));
        registry.add("s2", 2).unwrap();
    }
}
