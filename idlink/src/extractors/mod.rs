//! Axum extractors for idlink handlers
//!
//! - [`ValidatedJson`]: JSON body checked with `validator`
//! - [`CurrentSession`]: the request's session, new if none was presented
//! - [`Authenticated`]: a session that carries a user, or 401

mod session;
mod validated;

pub use session::{Authenticated, AuthenticatedSession, CurrentSession};
pub use validated::ValidatedJson;
