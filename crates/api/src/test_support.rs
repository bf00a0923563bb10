//! In-process test harness.
//!
//! Builds the real router over [`MemoryStore`] and a [`RecordingGateway`]
//! so tests can drive every endpoint with `tower::ServiceExt::oneshot`.
//! Only compiled for tests and with the `test-support` feature.
#![allow(clippy::missing_panics_doc)]

use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use chrono::{Duration, Utc};
use cookie::Cookie;
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;
use url::Url;

use dam_nation_core::{CurrencyCode, Price, PriceRef, ProductId};

use crate::config::{ApiConfig, CredentialConfig, SentryConfig, StripeConfig};
use crate::db::MemoryStore;
use crate::models::{Product, User};
use crate::payments::{PaymentError, PaymentGateway};
use crate::services::checkout::PaymentManifest;
use crate::state::{AppState, Backends};

/// Signing key used by [`test_config`].
pub const TEST_SIGNING_KEY: &str = "Xq4vB8nM2kL7pR1tZ9wC3yH6jF0dS5gA";

/// Session URL returned by a successful [`RecordingGateway`].
pub const TEST_SESSION_URL: &str = "https://checkout.stripe.com/c/pay/cs_test_dam_nation";

fn url(s: &str) -> Url {
    Url::parse(s).expect("static test URL is valid")
}

/// Configuration for in-process tests. Cookies are not `Secure`.
#[must_use]
pub fn test_config() -> ApiConfig {
    ApiConfig {
        database_url: SecretString::from("postgres://localhost/dam_nation_test"),
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        base_url: url("http://localhost:8080"),
        trust_proxy_headers: false,
        credentials: CredentialConfig {
            signing_key: SecretString::from(TEST_SIGNING_KEY),
            cart_cookie: "dam-nation-shop".to_owned(),
            admin_cookie: "dam-nation-shop-admin".to_owned(),
            ttl: Duration::hours(24),
            secure_cookies: false,
        },
        stripe: StripeConfig {
            secret_key: SecretString::from("sk_test_unused"),
            api_base: url("http://127.0.0.1:9"),
            success_url: url("http://localhost:8080/checkout/success"),
            cancel_url: url("http://localhost:8080/checkout/cancel"),
        },
        sentry: SentryConfig {
            dsn: None,
            environment: None,
            sample_rate: 1.0,
            traces_sample_rate: 0.0,
        },
    }
}

/// [`PaymentGateway`] that records manifests instead of calling a provider.
pub struct RecordingGateway {
    calls: AtomicUsize,
    manifests: Mutex<Vec<PaymentManifest>>,
    fail: bool,
}

impl Default for RecordingGateway {
    fn default() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            manifests: Mutex::new(Vec::new()),
            fail: false,
        }
    }
}

impl RecordingGateway {
    /// A gateway whose every call is rejected by the "provider".
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Number of `create_session` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The URL returned on success.
    #[must_use]
    pub fn url(&self) -> Url {
        url(TEST_SESSION_URL)
    }

    /// Manifest of the most recent call.
    pub fn last_manifest(&self) -> Option<PaymentManifest> {
        self.manifests
            .lock()
            .expect("manifest lock poisoned")
            .last()
            .cloned()
    }
}

#[async_trait]
impl PaymentGateway for RecordingGateway {
    async fn create_session(&self, manifest: &PaymentManifest) -> Result<Url, PaymentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.manifests
            .lock()
            .expect("manifest lock poisoned")
            .push(manifest.clone());
        if self.fail {
            return Err(PaymentError::Rejected {
                status: 400,
                message: "No such price".to_owned(),
            });
        }
        Ok(self.url())
    }
}

/// A decoded test response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// `name=value` of a cookie set by this response, ready for a `Cookie` header.
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| Cookie::parse(v.to_owned()).ok())
            .find(|c| c.name() == name)
            .map(|c| format!("{}={}", c.name(), c.value()))
    }
}

/// The full router over in-memory backends.
pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub gateway: Arc<RecordingGateway>,
    router: Router,
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TestApp {
    #[must_use]
    pub fn new() -> Self {
        Self::with_gateway(RecordingGateway::default())
    }

    #[must_use]
    pub fn with_gateway(gateway: RecordingGateway) -> Self {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(gateway);
        let state = AppState::new(
            test_config(),
            Backends {
                carts: store.clone(),
                catalog: store.clone(),
                users: store.clone(),
                payments: gateway.clone(),
            },
        )
        .expect("test signing key is valid");
        let router = crate::app(state.clone());

        Self {
            state,
            store,
            gateway,
            router,
        }
    }

    /// Cart cookie name.
    #[must_use]
    pub fn cart_cookie(&self) -> &str {
        &self.state.config().credentials.cart_cookie
    }

    /// Admin cookie name.
    #[must_use]
    pub fn admin_cookie(&self) -> &str {
        &self.state.config().credentials.admin_cookie
    }

    /// Send a request with an optional `Cookie` header and JSON body.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("valid test request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("readable body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Insert a catalog product with a fixed id.
    pub async fn seed_product(&self, id: i32, price_ref: &str) -> Product {
        let product = Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            description: String::new(),
            price: Price::from_cents(2000, CurrencyCode::USD),
            price_ref: PriceRef::parse(price_ref).expect("non-empty price ref"),
            created_at: Utc::now(),
        };
        self.store.insert_product(product.clone()).await;
        product
    }

    /// Register a user directly through the auth service.
    pub async fn create_user(&self, email: &str, password: &str, is_admin: bool) -> User {
        self.state
            .auth_service()
            .register(email, password, is_admin)
            .await
            .expect("user registers")
    }

    /// `POST /api/new-cart`; returns the cart cookie.
    pub async fn new_cart(&self) -> String {
        let response = self.send(Method::POST, "/api/new-cart", None, None).await;
        assert_eq!(response.status, StatusCode::CREATED);
        response
            .cookie(self.cart_cookie())
            .expect("new-cart sets the cart cookie")
    }

    /// Log in and return the admin cookie.
    pub async fn login(&self, email: &str, password: &str) -> String {
        let response = self
            .send(
                Method::POST,
                "/api/auth/login",
                None,
                Some(serde_json::json!({ "email": email, "password": password })),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
        response
            .cookie(self.admin_cookie())
            .expect("login sets the admin cookie")
    }
}
