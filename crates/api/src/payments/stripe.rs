//! Stripe Checkout client.
//!
//! Creates Checkout Sessions through the form-encoded REST API. Each manifest
//! line becomes `line_items[i][price]` / `line_items[i][quantity]`, and the
//! manifest metadata is copied to `metadata[...]` so webhooks can find the
//! cart again.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::{info, instrument};
use url::Url;

use super::{PaymentError, PaymentGateway};
use crate::config::StripeConfig;
use crate::services::checkout::PaymentManifest;

const SESSIONS_PATH: &str = "v1/checkout/sessions";

/// Stripe Checkout API client.
#[derive(Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    endpoint: Url,
    success_url: Url,
    cancel_url: Url,
}

#[derive(Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

impl StripeClient {
    /// Create a new Stripe client.
    ///
    /// # Errors
    ///
    /// Returns error if the key is not a valid header value, the endpoint
    /// cannot be built, or the HTTP client fails to build.
    pub fn new(config: &StripeConfig) -> Result<Self, PaymentError> {
        let mut headers = HeaderMap::new();

        let mut auth_value =
            HeaderValue::from_str(&format!("Bearer {}", config.secret_key.expose_secret()))
                .map_err(|e| PaymentError::InvalidResponse(format!("Invalid API key format: {e}")))?;
        auth_value.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_value);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        let endpoint = config
            .api_base
            .join(SESSIONS_PATH)
            .map_err(|e| PaymentError::InvalidResponse(format!("Invalid API base: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            success_url: config.success_url.clone(),
            cancel_url: config.cancel_url.clone(),
        })
    }

    /// Form body for a Checkout Session.
    fn session_form(&self, manifest: &PaymentManifest) -> Vec<(String, String)> {
        let mut form = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), self.success_url.to_string()),
            ("cancel_url".to_string(), self.cancel_url.to_string()),
            ("client_reference_id".to_string(), manifest.cart_id.to_string()),
        ];

        for (i, line) in manifest.line_items.iter().enumerate() {
            form.push((format!("line_items[{i}][price]"), line.price_ref.to_string()));
            form.push((format!("line_items[{i}][quantity]"), line.quantity.to_string()));
        }

        for (key, value) in &manifest.metadata {
            form.push((format!("metadata[{key}]"), value.clone()));
        }

        form
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    #[instrument(skip(self, manifest), fields(cart_id = %manifest.cart_id, lines = manifest.line_items.len()))]
    async fn create_session(&self, manifest: &PaymentManifest) -> Result<Url, PaymentError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header("Idempotency-Key", &manifest.idempotency_key)
            .form(&self.session_form(manifest))
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .ok()
                .and_then(|e| e.error.message)
                .unwrap_or(body);
            return Err(PaymentError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let session: SessionResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::InvalidResponse(e.to_string()))?;
        let url = session
            .url
            .ok_or_else(|| PaymentError::InvalidResponse(format!("session {} has no url", session.id)))?;
        let url = Url::parse(&url).map_err(|e| PaymentError::InvalidResponse(e.to_string()))?;

        info!(session_id = %session.id, "Checkout session created");
        Ok(url)
    }
}
