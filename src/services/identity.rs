//! Identity store seam used by the auth middleware and the login flow.
//!
//! The store is the source of truth for "does this principal still exist".
//! Sessions only cache a snapshot (`CachedIdentity`); every authenticated
//! request re-resolves the live `Identity` through this trait.
use async_trait::async_trait;
use std::fmt;

use crate::repos::error::RepoError;

/// Stable identifier of a user row.
pub type UserId = i64;

/// An authenticated principal as loaded from the identity store.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: UserId,
    pub email: String,
    pub password_hash: String,
}

// password_hash stays out of logs (RequestContext is Debug-printed in traces).
impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("id", &self.id)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Snapshot stored in the token cache at login.
///
/// Never mutated in place; a new login stores a new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedIdentity {
    pub user_id: UserId,
    pub login_name: String,
}

impl From<&Identity> for CachedIdentity {
    fn from(identity: &Identity) -> Self {
        Self {
            user_id: identity.id,
            login_name: identity.email.clone(),
        }
    }
}

#[async_trait]
pub trait IdentityStore: Send + Sync + 'static {
    /// Login name is the user's email address.
    async fn find_by_login_name(&self, login_name: &str) -> Result<Option<Identity>, RepoError>;

    async fn find_by_stable_id(&self, id: UserId) -> Result<Option<Identity>, RepoError>;
}

#[cfg(test)]
pub mod memory {
    //! In-memory identity store for middleware and service tests.
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use parking_lot::RwLock;

    use super::{Identity, IdentityStore, UserId};
    use crate::repos::error::RepoError;

    #[derive(Default)]
    pub struct MemoryIdentityStore {
        users: RwLock<HashMap<UserId, Identity>>,
        lookups: AtomicUsize,
        failing: AtomicBool,
    }

    impl MemoryIdentityStore {
        pub fn with_users(users: impl IntoIterator<Item = Identity>) -> Self {
            let store = Self::default();
            for user in users {
                store.insert(user);
            }
            store
        }

        pub fn insert(&self, identity: Identity) {
            self.users.write().insert(identity.id, identity);
        }

        pub fn remove(&self, id: UserId) {
            self.users.write().remove(&id);
        }

        /// Makes every subsequent lookup fail with a backend error.
        pub fn fail(&self) {
            self.failing.store(true, Ordering::SeqCst);
        }

        pub fn lookups(&self) -> usize {
            self.lookups.load(Ordering::SeqCst)
        }

        fn check(&self) -> Result<(), RepoError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(RepoError::Db(sqlx::Error::PoolTimedOut));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl IdentityStore for MemoryIdentityStore {
        async fn find_by_login_name(
            &self,
            login_name: &str,
        ) -> Result<Option<Identity>, RepoError> {
            self.check()?;
            Ok(self
                .users
                .read()
                .values()
                .find(|u| u.email == login_name)
                .cloned())
        }

        async fn find_by_stable_id(&self, id: UserId) -> Result<Option<Identity>, RepoError> {
            self.check()?;
            Ok(self.users.read().get(&id).cloned())
        }
    }

    pub fn identity(id: UserId, email: &str) -> Identity {
        Identity {
            id,
            email: email.to_string(),
            password_hash: String::new(),
        }
    }
}
