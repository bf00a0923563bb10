//! HTTP middleware stack for the API.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID
//! 4. Security headers
//! 5. Per-group layers: login rate limit, cart gate, admin gate

pub mod cookies;
pub mod gate;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;

pub use gate::{CurrentAdmin, CurrentCart, require_admin, require_cart};
pub use rate_limit::login_rate_limiter;
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
