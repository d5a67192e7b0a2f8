//! Login / logout: mints bearer tokens into the token cache.
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::error::AppError;
use crate::repos::error::RepoError;
use crate::services::auth::bearer::{fingerprint, mint_token};
use crate::services::identity::{CachedIdentity, IdentityStore};
use crate::services::password::verify_password;
use crate::services::token_cache::TokenCache;

#[derive(Debug, Error)]
pub enum LoginError {
    // Unknown login name and wrong password are deliberately the same variant.
    #[error("invalid login")]
    InvalidLogin,
    #[error(transparent)]
    Store(#[from] RepoError),
    #[error("password verification task failed")]
    Verifier,
}

impl From<LoginError> for AppError {
    fn from(e: LoginError) -> Self {
        match e {
            LoginError::InvalidLogin => AppError::bad_request("INVALID_LOGIN", "invalid credentials"),
            LoginError::Store(err) => err.into(),
            LoginError::Verifier => AppError::Internal,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_in: u64,
}

#[derive(Clone)]
pub struct SessionService {
    identities: Arc<dyn IdentityStore>,
    tokens: TokenCache,
}

impl fmt::Debug for SessionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionService")
            .field("ttl_seconds", &self.tokens.ttl().as_secs())
            .finish()
    }
}

impl SessionService {
    pub fn new(identities: Arc<dyn IdentityStore>, tokens: TokenCache) -> Self {
        Self { identities, tokens }
    }

    /// Verify `login_name`/`password` and open a new session.
    pub async fn login(&self, login_name: &str, password: &str) -> Result<IssuedToken, LoginError> {
        let identity = self
            .identities
            .find_by_login_name(login_name)
            .await?
            .ok_or(LoginError::InvalidLogin)?;

        // argon2 is CPU-bound; keep it off the async workers.
        let hash = identity.password_hash.clone();
        let password = password.to_owned();
        let verified = tokio::task::spawn_blocking(move || verify_password(&hash, &password))
            .await
            .map_err(|_| LoginError::Verifier)?;
        if !verified {
            return Err(LoginError::InvalidLogin);
        }

        let token = mint_token();
        self.tokens.store(token.clone(), CachedIdentity::from(&identity));
        tracing::info!(user_id = identity.id, token = %fingerprint(&token), "session issued");

        Ok(IssuedToken {
            token,
            expires_in: self.tokens.ttl().as_secs(),
        })
    }

    pub fn logout(&self, token: &str) -> bool {
        let revoked = self.tokens.revoke(token);
        tracing::info!(token = %fingerprint(token), revoked, "session revoked");
        revoked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::identity::Identity;
    use crate::services::identity::memory::MemoryIdentityStore;
    use crate::services::password::hash_password;

    fn service() -> (SessionService, TokenCache) {
        let store = MemoryIdentityStore::with_users([Identity {
            id: 1,
            email: "a@example.com".into(),
            password_hash: hash_password("secret").unwrap(),
        }]);
        let tokens = TokenCache::default();
        (SessionService::new(Arc::new(store), tokens.clone()), tokens)
    }

    #[tokio::test]
    async fn login_stores_session_in_cache() {
        let (svc, tokens) = service();
        let issued = svc.login("a@example.com", "secret").await.unwrap();

        let cached = tokens.lookup(&issued.token).expect("cached");
        assert_eq!(cached.user_id, 1);
        assert_eq!(cached.login_name, "a@example.com");
        assert_eq!(issued.expires_in, 600);
    }

    #[tokio::test]
    async fn bad_password_and_unknown_user_look_the_same() {
        let (svc, tokens) = service();

        let wrong = svc.login("a@example.com", "nope").await.unwrap_err();
        let unknown = svc.login("b@example.com", "secret").await.unwrap_err();

        assert!(matches!(wrong, LoginError::InvalidLogin));
        assert!(matches!(unknown, LoginError::InvalidLogin));
        assert!(tokens.is_empty());
    }

    #[tokio::test]
    async fn logout_revokes_token() {
        let (svc, tokens) = service();
        let issued = svc.login("a@example.com", "secret").await.unwrap();

        assert!(svc.logout(&issued.token));
        assert!(tokens.lookup(&issued.token).is_none());
        assert!(!svc.logout(&issued.token));
    }
}
