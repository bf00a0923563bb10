//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::ApiConfig;
use crate::db::{CartStore, Catalog, UserDirectory};
use crate::payments::PaymentGateway;
use crate::services::auth::AuthService;
use crate::services::binding::CredentialBinding;
use crate::services::cart::CartService;
use crate::services::checkout::CheckoutService;
use crate::services::credential::{CredentialCodec, CredentialError};
use crate::services::gate::Gate;

/// Error building application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("invalid credential signing key")]
    SigningKey(#[from] CredentialError),
}

/// Storage and provider handles the state is built from.
pub struct Backends {
    pub carts: Arc<dyn CartStore>,
    pub catalog: Arc<dyn Catalog>,
    pub users: Arc<dyn UserDirectory>,
    pub payments: Arc<dyn PaymentGateway>,
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`. Services borrow from it for
/// the duration of one request.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    codec: CredentialCodec,
    backends: Backends,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the credential signing key is unusable.
    pub fn new(config: ApiConfig, backends: Backends) -> Result<Self, StateError> {
        let codec = CredentialCodec::new(&config.credentials.signing_key)?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                codec,
                backends,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn codec(&self) -> &CredentialCodec {
        &self.inner.codec
    }

    #[must_use]
    pub fn carts(&self) -> &dyn CartStore {
        self.inner.backends.carts.as_ref()
    }

    #[must_use]
    pub fn catalog(&self) -> &dyn Catalog {
        self.inner.backends.catalog.as_ref()
    }

    #[must_use]
    pub fn users(&self) -> &dyn UserDirectory {
        self.inner.backends.users.as_ref()
    }

    #[must_use]
    pub fn payments(&self) -> &dyn PaymentGateway {
        self.inner.backends.payments.as_ref()
    }

    #[must_use]
    pub fn gate(&self) -> Gate<'_> {
        Gate::new(self.codec(), CredentialBinding::new(self.carts(), self.users()))
    }

    #[must_use]
    pub fn cart_service(&self) -> CartService<'_> {
        CartService::new(self.carts(), self.catalog())
    }

    #[must_use]
    pub fn checkout_service(&self) -> CheckoutService<'_> {
        CheckoutService::new(self.cart_service())
    }

    #[must_use]
    pub fn auth_service(&self) -> AuthService<'_> {
        AuthService::new(self.users())
    }
}
