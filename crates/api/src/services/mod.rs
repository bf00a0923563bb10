//! Business logic services.
//!
//! # Services
//!
//! - `credential` - Signed session credential codec
//! - `binding` - Resolve credential subjects against the stores
//! - `gate` - Cart and admin admission
//! - `cart` - Cart mutation engine
//! - `checkout` - Payment manifest assembly
//! - `auth` - Password accounts

pub mod auth;
pub mod binding;
pub mod cart;
pub mod checkout;
pub mod credential;
pub mod gate;
