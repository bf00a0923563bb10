//! Payment provider integration.
//!
//! Checkout hands a [`PaymentManifest`] to a [`PaymentGateway`] and gets back
//! the hosted payment page URL. The provider owns prices and totals; the shop
//! only sends price references and quantities.

pub mod stripe;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

pub use stripe::StripeClient;

use crate::services::checkout::PaymentManifest;

/// Errors from the payment provider.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Network or transport failure.
    #[error("payment provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider answered with an error status.
    #[error("payment provider rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Provider answered 2xx with a body we cannot use.
    #[error("invalid payment provider response: {0}")]
    InvalidResponse(String),
}

/// Creates hosted payment sessions.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a session for `manifest` and return the URL to redirect the
    /// shopper to.
    async fn create_session(&self, manifest: &PaymentManifest) -> Result<Url, PaymentError>;
}
