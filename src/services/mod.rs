/*
 * Responsibility
 * - Domain logic that does not know about HTTP routing
 */
pub mod auth;
pub mod embed;
pub mod identity;
pub mod password;
pub mod token_cache;
