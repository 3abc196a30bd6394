//! In-memory set of authorized identities
//!
//! Seeded from the admin store at startup and kept in sync on every
//! successful `/addadmin`. The store is always written before the cache.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::storage::{AdminStore, Identity, StorageResult};

#[derive(Clone)]
pub struct AuthorizationCache {
    admins: Arc<dyn AdminStore>,
    authorized: Arc<RwLock<HashSet<Identity>>>,
}

impl AuthorizationCache {
    /// Load stored admins and make sure every `initial` identity is one
    ///
    /// Failing to read the store is an error. Failing to persist an initial
    /// identity is only logged; the identity is still authorized for this run.
    pub async fn load(admins: Arc<dyn AdminStore>, initial: &[Identity]) -> StorageResult<Self> {
        let mut authorized: HashSet<Identity> = admins
            .list_admins()
            .await?
            .into_iter()
            .map(|admin| admin.identity)
            .collect();

        for &identity in initial {
            match admins.insert_admin_if_absent(identity, None).await {
                Ok(true) => info!("registered initial admin {identity}"),
                Ok(false) => {}
                Err(e) => warn!("failed to persist initial admin {identity}: {e}"),
            }
            authorized.insert(identity);
        }

        Ok(Self {
            admins,
            authorized: Arc::new(RwLock::new(authorized)),
        })
    }

    pub async fn is_authorized(&self, identity: Identity) -> bool {
        self.authorized.read().await.contains(&identity)
    }

    /// Persist `identity` as an admin and authorize it
    ///
    /// Returns `false` if it was already a stored admin.
    pub async fn authorize(
        &self,
        identity: Identity,
        username: Option<String>,
    ) -> StorageResult<bool> {
        let inserted = self.admins.insert_admin_if_absent(identity, username).await?;
        self.authorized.write().await.insert(identity);
        Ok(inserted)
    }

    pub async fn len(&self) -> usize {
        self.authorized.read().await.len()
    }
}
