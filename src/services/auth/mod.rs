pub mod bearer;
pub mod session;

pub use session::{IssuedToken, SessionService};
