/*
 * Responsibility
 * - Shared context handed to handlers (AppState)
 * - Middleware states built from the same token cache / identity store
 * - Clone is cheap (pool handle + Arcs)
 */
use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::middleware::auth::{AccessState, ExemptionSet};
use crate::middleware::request_log::RequestLogState;
use crate::repos::user_repo::UserRepo;
use crate::services::auth::SessionService;
use crate::services::identity::IdentityStore;
use crate::services::token_cache::TokenCache;

#[derive(Clone, Debug)]
pub struct AppState {
    pub db: PgPool,
    pub users: UserRepo,
    pub sessions: SessionService,
    pub tokens: TokenCache,
    pub access: AccessState,
    pub request_log: RequestLogState,
}

impl AppState {
    pub fn new(db: PgPool, config: &Config) -> Self {
        let users = UserRepo::new(db.clone());
        let identities: Arc<dyn IdentityStore> = Arc::new(users.clone());
        Self::with_identities(db, users, identities, config)
    }

    /// Same wiring, but sessions and the access check resolve principals
    /// through `identities` instead of the users table.
    pub fn with_identities(
        db: PgPool,
        users: UserRepo,
        identities: Arc<dyn IdentityStore>,
        config: &Config,
    ) -> Self {
        let tokens = TokenCache::new(config.token_ttl, config.token_cache_capacity);
        let sessions = SessionService::new(identities.clone(), tokens.clone());
        let access = AccessState::new(
            tokens.clone(),
            ExemptionSet::new(&config.exempt_paths),
            identities,
        );
        let request_log = RequestLogState {
            proxy_count: config.proxy_count,
        };

        Self {
            db,
            users,
            sessions,
            tokens,
            access,
            request_log,
        }
    }
}
