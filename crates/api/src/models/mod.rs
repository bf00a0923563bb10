//! Domain models for the API.

pub mod cart;
pub mod product;
pub mod user;

pub use cart::{Cart, CartLine, LineItem};
pub use product::{Collection, NewCollection, NewProduct, Product};
pub use user::User;
