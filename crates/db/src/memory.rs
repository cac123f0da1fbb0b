//! In-process admin backend with the same duplicate semantics as MongoDB.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::anyhow;
use async_trait::async_trait;

use rms_kernel::{AdminBackend, EntityKind, NewUser, ProvisionError, RoleGrant};

#[derive(Debug, Default)]
struct DatabaseState {
    users: BTreeMap<String, Vec<RoleGrant>>,
    /// Collection name to document count.
    collections: BTreeMap<String, u64>,
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    databases: Mutex<BTreeMap<String, DatabaseState>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend `count` documents were written to a collection, creating it
    /// implicitly the way a first insert does.
    pub fn insert_documents(
        &self,
        database: &str,
        collection: &str,
        count: u64,
    ) -> anyhow::Result<()> {
        let mut databases = self.lock()?;
        *databases
            .entry(database.to_string())
            .or_default()
            .collections
            .entry(collection.to_string())
            .or_default() += count;
        Ok(())
    }

    /// Every user created so far, keyed by `(database, username)`.
    pub fn users(&self) -> anyhow::Result<Vec<(String, String)>> {
        let databases = self.lock()?;
        Ok(databases
            .iter()
            .flat_map(|(db, state)| {
                state
                    .users
                    .keys()
                    .map(move |user| (db.clone(), user.clone()))
            })
            .collect())
    }

    fn lock(&self) -> anyhow::Result<MutexGuard<'_, BTreeMap<String, DatabaseState>>> {
        self.databases
            .lock()
            .map_err(|_| anyhow!("memory backend lock poisoned"))
    }
}

#[async_trait]
impl AdminBackend for MemoryBackend {
    async fn create_user(&self, database: &str, user: &NewUser) -> Result<(), ProvisionError> {
        let mut databases = self.lock()?;
        let state = databases.entry(database.to_string()).or_default();
        if state.users.contains_key(&user.username) {
            return Err(ProvisionError::already_exists(
                EntityKind::User,
                &user.username,
            ));
        }
        state
            .users
            .insert(user.username.clone(), user.roles.clone());
        Ok(())
    }

    async fn create_collection(&self, database: &str, name: &str) -> Result<(), ProvisionError> {
        let mut databases = self.lock()?;
        let state = databases.entry(database.to_string()).or_default();
        if state.collections.contains_key(name) {
            return Err(ProvisionError::already_exists(EntityKind::Collection, name));
        }
        state.collections.insert(name.to_string(), 0);
        Ok(())
    }

    async fn user_grants(
        &self,
        database: &str,
        username: &str,
    ) -> Result<Option<Vec<RoleGrant>>, ProvisionError> {
        let databases = self.lock()?;
        Ok(databases
            .get(database)
            .and_then(|state| state.users.get(username))
            .cloned())
    }

    async fn collection_names(&self, database: &str) -> Result<Vec<String>, ProvisionError> {
        let databases = self.lock()?;
        Ok(databases
            .get(database)
            .map(|state| state.collections.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn count_documents(
        &self,
        database: &str,
        collection: &str,
    ) -> Result<u64, ProvisionError> {
        let databases = self.lock()?;
        Ok(databases
            .get(database)
            .and_then(|state| state.collections.get(collection))
            .copied()
            .unwrap_or(0))
    }
}
