/*!
 * Request context and the extractors that expose it to handlers
 *
 * Public API:
 * - RequestContext / MissingIdentity
 * - Ctx (whole context), AuthUser (identity or 401)
 */

mod core;
mod types;

pub use core::{AuthUser, Ctx};
pub use types::{MissingIdentity, RequestContext};
