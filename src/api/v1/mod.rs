/*
 * Responsibility
 * - v1 public surface (routes() and the extractors used by middleware)
 */
pub mod dto;
pub mod extractors;
pub mod handlers;
mod routes;

pub use routes::routes;
