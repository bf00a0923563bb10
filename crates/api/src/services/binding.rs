//! Resolve credential claims against the authoritative stores.
//!
//! A verified credential only says which cart or user it names. This layer
//! confirms that the named row exists right now. Callers get a single
//! `NotFound` outcome for a missing row, a mismatched row, or a store
//! failure; the store failure is logged here.

use thiserror::Error;
use tracing::{instrument, warn};

use dam_nation_core::{CartId, UserId};

use crate::db::{CartStore, UserDirectory};
use crate::models::Cart;

/// The credential names nothing that currently exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BindingError {
    #[error("credential subject not found")]
    NotFound,
}

/// Looks up credential subjects. Admin status is read fresh on every call.
pub struct CredentialBinding<'a> {
    carts: &'a dyn CartStore,
    users: &'a dyn UserDirectory,
}

impl<'a> CredentialBinding<'a> {
    #[must_use]
    pub const fn new(carts: &'a dyn CartStore, users: &'a dyn UserDirectory) -> Self {
        Self { carts, users }
    }

    /// # Errors
    ///
    /// [`BindingError::NotFound`] if the cart does not exist or cannot be read.
    #[instrument(skip(self))]
    pub async fn resolve_cart(&self, cart_id: CartId) -> Result<Cart, BindingError> {
        match self.carts.get_cart(cart_id).await {
            Ok(Some(cart)) if cart.id == cart_id => Ok(cart),
            Ok(_) => Err(BindingError::NotFound),
            Err(e) => {
                warn!(error = %e, "Cart lookup failed during credential binding");
                Err(BindingError::NotFound)
            }
        }
    }

    /// Returns the user's current admin flag.
    ///
    /// # Errors
    ///
    /// [`BindingError::NotFound`] if the user does not exist or cannot be read.
    #[instrument(skip(self))]
    pub async fn resolve_admin(&self, user_id: UserId) -> Result<bool, BindingError> {
        match self.users.get_user(user_id).await {
            Ok(Some(user)) if user.id == user_id => Ok(user.is_admin),
            Ok(_) => Err(BindingError::NotFound),
            Err(e) => {
                warn!(error = %e, "User lookup failed during credential binding");
                Err(BindingError::NotFound)
            }
        }
    }
}
