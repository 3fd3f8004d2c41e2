//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, transactions)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Session layer (tower-sessions)
//!
//! Identity is resolved per handler by the [`CurrentIdentity`] and
//! [`RequireUser`] extractors.

pub mod identity;
pub mod request_id;
pub mod session;

pub use identity::{CurrentIdentity, RequireUser, complete_login, complete_logout};
pub use request_id::request_id_middleware;
pub use session::create_session_layer;
