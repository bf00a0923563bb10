//! Stateless session credentials.
//!
//! A credential is an HS256 JWS in compact form:
//! `base64url(header) . base64url(claims) . base64url(hmac)`, signed with the
//! single `JWT_KEY` secret. Two claim shapes exist:
//!
//! - cart: `{"cartID", "iat", "exp"}`
//! - admin: `{"userID", "role", "cartID"?, "iat", "exp"}`
//!
//! Parsing checks the header, the MAC, and the claim shape. It does not look
//! at the clock; callers decide expiry with [`Claims::is_expired`]. Every
//! failure is the same opaque [`CredentialError`] so a caller cannot learn
//! which check rejected a token.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use dam_nation_core::{CartId, Role, UserId};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "HS256";
const TOKEN_TYPE: &str = "JWT";

/// A credential failed to issue or verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid credential")]
pub struct CredentialError;

/// Who a credential is issued to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    /// An anonymous cart.
    Cart(CartId),
    /// A logged-in user, optionally still holding a cart.
    Admin {
        user_id: UserId,
        role: Role,
        cart_id: Option<CartId>,
    },
}

/// Claims of a cart credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartClaims {
    pub cart_id: CartId,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Claims of an admin credential.
///
/// `role` is what the token says, not what the user is. Admin access is
/// granted only after the stored flag is re-read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminClaims {
    pub user_id: UserId,
    pub role: Role,
    pub cart_id: Option<CartId>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Verified claims of either shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claims {
    Cart(CartClaims),
    Admin(AdminClaims),
}

impl Claims {
    /// The cart this credential is bound to, if any.
    #[must_use]
    pub const fn cart_id(&self) -> Option<CartId> {
        match self {
            Self::Cart(c) => Some(c.cart_id),
            Self::Admin(a) => a.cart_id,
        }
    }

    #[must_use]
    pub const fn expires_at(&self) -> DateTime<Utc> {
        match self {
            Self::Cart(c) => c.expires_at,
            Self::Admin(a) => a.expires_at,
        }
    }

    /// A credential is valid while `now < exp`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }
}

/// A freshly signed token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCredential {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct Header {
    alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    typ: Option<String>,
}

/// Wire form of the claims. Classified into [`Claims`] after decoding.
#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawClaims {
    #[serde(rename = "cartID", default, skip_serializing_if = "Option::is_none")]
    cart_id: Option<CartId>,
    #[serde(rename = "userID", default, skip_serializing_if = "Option::is_none")]
    user_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<Role>,
    iat: i64,
    exp: i64,
}

impl RawClaims {
    fn classify(self) -> Result<Claims, CredentialError> {
        if self.exp <= self.iat {
            return Err(CredentialError);
        }
        let issued_at = DateTime::from_timestamp(self.iat, 0).ok_or(CredentialError)?;
        let expires_at = DateTime::from_timestamp(self.exp, 0).ok_or(CredentialError)?;

        match (self.cart_id, self.user_id, self.role) {
            (Some(cart_id), None, None) => Ok(Claims::Cart(CartClaims {
                cart_id,
                issued_at,
                expires_at,
            })),
            (cart_id, Some(user_id), Some(role)) => Ok(Claims::Admin(AdminClaims {
                user_id,
                role,
                cart_id,
                issued_at,
                expires_at,
            })),
            _ => Err(CredentialError),
        }
    }
}

/// Issues and verifies session credentials with one symmetric key.
#[derive(Clone)]
pub struct CredentialCodec {
    mac: HmacSha256,
}

impl std::fmt::Debug for CredentialCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCodec").finish_non_exhaustive()
    }
}

impl CredentialCodec {
    /// Create a codec keyed with `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError`] if the key is rejected by the MAC.
    pub fn new(key: &SecretString) -> Result<Self, CredentialError> {
        let mac = HmacSha256::new_from_slice(key.expose_secret().as_bytes())
            .map_err(|_| CredentialError)?;
        Ok(Self { mac })
    }

    /// Sign a credential for `subject`, valid for `ttl` from `now`.
    ///
    /// Timestamps have one-second resolution.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError`] if `ttl` is not positive or the claims
    /// cannot be encoded.
    pub fn issue(
        &self,
        subject: Subject,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<IssuedCredential, CredentialError> {
        if ttl <= Duration::zero() {
            return Err(CredentialError);
        }
        let iat = now.timestamp();
        let exp = iat.checked_add(ttl.num_seconds()).ok_or(CredentialError)?;
        let expires_at = DateTime::from_timestamp(exp, 0).ok_or(CredentialError)?;

        let raw = match subject {
            Subject::Cart(cart_id) => RawClaims {
                cart_id: Some(cart_id),
                user_id: None,
                role: None,
                iat,
                exp,
            },
            Subject::Admin {
                user_id,
                role,
                cart_id,
            } => RawClaims {
                cart_id,
                user_id: Some(user_id),
                role: Some(role),
                iat,
                exp,
            },
        };

        let header = Header {
            alg: ALGORITHM.to_owned(),
            typ: Some(TOKEN_TYPE.to_owned()),
        };
        let header = encode_json(&header)?;
        let payload = encode_json(&raw)?;

        Ok(IssuedCredential {
            token: self.sign(&header, &payload),
            expires_at,
        })
    }

    /// Verify a token and return its claims.
    ///
    /// Does not check expiry.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError`] for any malformed, tampered, foreign, or
    /// wrongly shaped token.
    pub fn parse(&self, token: &str) -> Result<Claims, CredentialError> {
        let mut parts = token.split('.');
        let (Some(header), Some(payload), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(CredentialError);
        };

        // Algorithm is pinned before the MAC is even looked at
        let header: Header = decode_json(header)?;
        if header.alg != ALGORITHM || header.typ.is_some_and(|t| t != TOKEN_TYPE) {
            return Err(CredentialError);
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| CredentialError)?;
        let mut mac = self.mac.clone();
        mac.update(signing_input(token).as_bytes());
        mac.verify_slice(&signature).map_err(|_| CredentialError)?;

        let raw: RawClaims = decode_json(payload)?;
        raw.classify()
    }

    fn sign(&self, header: &str, payload: &str) -> String {
        let input = format!("{header}.{payload}");
        let mut mac = self.mac.clone();
        mac.update(input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        format!("{input}.{signature}")
    }
}

/// `header.payload` prefix of a three-part token.
fn signing_input(token: &str) -> &str {
    token.rsplit_once('.').map_or("", |(input, _)| input)
}

fn encode_json<T: Serialize>(value: &T) -> Result<String, CredentialError> {
    let json = serde_json::to_vec(value).map_err(|_| CredentialError)?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

fn decode_json<T: for<'de> Deserialize<'de>>(segment: &str) -> Result<T, CredentialError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| CredentialError)?;
    serde_json::from_slice(&bytes).map_err(|_| CredentialError)
}
