/*
 * Responsibility
 * - SQLx access to Postgres, one module per table group
 */
pub mod bookmark_repo;
pub mod error;
pub mod folder_repo;
pub mod user_repo;
