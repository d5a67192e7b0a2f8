/*
 * Responsibility
 * - Middleware public surface
 * - Request order: request id → request_log → CORS / body limit / timeout
 *   → auth::access → embed → handler
 */
pub mod auth;
pub mod cors;
pub mod embed;
pub mod http;
pub mod request_log;
