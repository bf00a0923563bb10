//! Core types for Dam Nation.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod price;
pub mod quantity;
pub mod role;

pub use email::{Email, EmailError};
pub use id::*;
pub use price::{CurrencyCode, EmptyPriceRef, Price, PriceRef, UnknownCurrency};
pub use quantity::{Quantity, QuantityError};
pub use role::{Role, UnknownRole};
