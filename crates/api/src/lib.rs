//! Dam Nation shop API library.
//!
//! Catalog, cart, and checkout endpoints over HTTP/JSON. Carts are anonymous
//! and bound to a client by a signed session credential carried in a cookie;
//! admin access uses a second credential whose role is re-checked against the
//! user store on every request.
//!
//! The binary in `main.rs` wires these modules to `PostgreSQL` and Stripe.
//! With the `test-support` feature the same router can be built over the
//! in-memory store for in-process tests.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod payments;
pub mod routes;
pub mod services;
pub mod state;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use routes::app;
