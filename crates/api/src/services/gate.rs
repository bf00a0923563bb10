//! Authorization decisions for cart and admin requests.
//!
//! The gate turns an optional bearer token into an admitted session or a
//! uniform [`PermissionDenied`]. The concrete reason is logged at `debug`
//! and never returned. Admission has no side effects, so running it for a
//! GET and for a mutation is the same.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;

use dam_nation_core::{CartId, Role, UserId};

use super::binding::CredentialBinding;
use super::credential::{Claims, CredentialCodec};

/// Request rejected by a gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("permission denied")]
pub struct PermissionDenied;

/// A request admitted to a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartSession {
    pub cart_id: CartId,
    pub expires_at: DateTime<Utc>,
}

/// A request admitted as an admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminSession {
    pub user_id: UserId,
    /// Cart named by the same credential, if the admin also has one.
    pub cart_id: Option<CartId>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
enum Denial {
    Missing,
    Invalid,
    Expired,
    WrongKind,
    Unbound,
    NotAdmin,
}

fn deny(reason: Denial) -> PermissionDenied {
    debug!(?reason, "Request denied by gate");
    PermissionDenied
}

/// Pure admit/deny logic shared by the cart and admin middleware.
pub struct Gate<'a> {
    codec: &'a CredentialCodec,
    binding: CredentialBinding<'a>,
}

impl<'a> Gate<'a> {
    #[must_use]
    pub const fn new(codec: &'a CredentialCodec, binding: CredentialBinding<'a>) -> Self {
        Self { codec, binding }
    }

    fn verify(&self, token: Option<&str>, now: DateTime<Utc>) -> Result<Claims, PermissionDenied> {
        let token = token.ok_or_else(|| deny(Denial::Missing))?;
        let claims = self.codec.parse(token).map_err(|_| deny(Denial::Invalid))?;
        if claims.is_expired(now) {
            return Err(deny(Denial::Expired));
        }
        Ok(claims)
    }

    /// Admit a request to the cart named by its credential.
    ///
    /// Cart credentials and admin credentials that carry a cart are accepted.
    ///
    /// # Errors
    ///
    /// [`PermissionDenied`] if the token is missing, invalid, expired, names
    /// no cart, or names a cart that does not exist.
    pub async fn admit_cart(
        &self,
        token: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<CartSession, PermissionDenied> {
        let claims = self.verify(token, now)?;
        let cart_id = claims.cart_id().ok_or_else(|| deny(Denial::WrongKind))?;
        let cart = self
            .binding
            .resolve_cart(cart_id)
            .await
            .map_err(|_| deny(Denial::Unbound))?;

        Ok(CartSession {
            cart_id: cart.id,
            expires_at: claims.expires_at(),
        })
    }

    /// Admit a request from a user who is an admin right now.
    ///
    /// # Errors
    ///
    /// [`PermissionDenied`] if the token is missing, invalid, expired, not an
    /// admin credential, or the user is unknown or no longer an admin.
    pub async fn admit_admin(
        &self,
        token: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<AdminSession, PermissionDenied> {
        let Claims::Admin(claims) = self.verify(token, now)? else {
            return Err(deny(Denial::WrongKind));
        };
        if claims.role != Role::Admin {
            return Err(deny(Denial::NotAdmin));
        }
        let is_admin = self
            .binding
            .resolve_admin(claims.user_id)
            .await
            .map_err(|_| deny(Denial::Unbound))?;
        if !is_admin {
            return Err(deny(Denial::NotAdmin));
        }

        Ok(AdminSession {
            user_id: claims.user_id,
            cart_id: claims.cart_id,
            expires_at: claims.expires_at,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;
    use secrecy::SecretString;

    use dam_nation_core::Email;

    use super::*;
    use crate::db::{CartStore, MemoryStore, UserDirectory};
    use crate::services::credential::Subject;

    fn codec(key: &str) -> CredentialCodec {
        CredentialCodec::new(&SecretString::from(key)).unwrap()
    }

    const KEY: &str = "Pm4Rt8Wq2Zx6Cv0Bn5Lk9Hj3Gf7Ds1Ae";
    const FOREIGN: &str = "Yu7Io3Pa9Sd1Fg5Hj2Kl8Zx4Cv6Bn0Mq";

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_760_000_000, 0).unwrap()
    }

    fn token(codec: &CredentialCodec, subject: Subject) -> String {
        codec.issue(subject, Duration::hours(1), now()).unwrap().token
    }

    #[tokio::test]
    async fn test_admit_cart() {
        let store = MemoryStore::new();
        let cart = store.create_cart(CartId::generate()).await.unwrap();
        let codec = codec(KEY);
        let gate = Gate::new(&codec, CredentialBinding::new(&store, &store));

        let session = gate
            .admit_cart(Some(&token(&codec, Subject::Cart(cart.id))), now())
            .await
            .unwrap();
        assert_eq!(session.cart_id, cart.id);
        assert_eq!(session.expires_at, now() + Duration::hours(1));
    }

    #[tokio::test]
    async fn test_cart_gate_denials() {
        let store = MemoryStore::new();
        let cart = store.create_cart(CartId::generate()).await.unwrap();
        let codec = codec(KEY);
        let gate = Gate::new(&codec, CredentialBinding::new(&store, &store));
        let good = token(&codec, Subject::Cart(cart.id));

        // missing
        assert_eq!(gate.admit_cart(None, now()).await, Err(PermissionDenied));
        // expired
        assert_eq!(
            gate.admit_cart(Some(&good), now() + Duration::hours(1)).await,
            Err(PermissionDenied)
        );
        // foreign key, cart exists
        let foreign = token(&self::codec(FOREIGN), Subject::Cart(cart.id));
        assert_eq!(gate.admit_cart(Some(&foreign), now()).await, Err(PermissionDenied));
        // valid signature, unknown cart
        let unknown = token(&codec, Subject::Cart(CartId::generate()));
        assert_eq!(gate.admit_cart(Some(&unknown), now()).await, Err(PermissionDenied));
        // admin credential without a cart
        let admin = token(
            &codec,
            Subject::Admin {
                user_id: UserId::new(1),
                role: Role::Admin,
                cart_id: None,
            },
        );
        assert_eq!(gate.admit_cart(Some(&admin), now()).await, Err(PermissionDenied));
    }

    #[tokio::test]
    async fn test_admin_credential_with_cart_opens_cart() {
        let store = MemoryStore::new();
        let cart = store.create_cart(CartId::generate()).await.unwrap();
        let codec = codec(KEY);
        let gate = Gate::new(&codec, CredentialBinding::new(&store, &store));
        let combined = token(
            &codec,
            Subject::Admin {
                user_id: UserId::new(1),
                role: Role::Admin,
                cart_id: Some(cart.id),
            },
        );

        let session = gate.admit_cart(Some(&combined), now()).await.unwrap();
        assert_eq!(session.cart_id, cart.id);
    }

    #[tokio::test]
    async fn test_admin_gate_rechecks_flag() {
        let store = MemoryStore::new();
        let email = Email::parse("owner@shop.test").unwrap();
        let user = store.create_user(&email, "hash", true).await.unwrap();
        let codec = codec(KEY);
        let gate = Gate::new(&codec, CredentialBinding::new(&store, &store));
        let admin = token(
            &codec,
            Subject::Admin {
                user_id: user.id,
                role: Role::Admin,
                cart_id: None,
            },
        );

        let session = gate.admit_admin(Some(&admin), now()).await.unwrap();
        assert_eq!(session.user_id, user.id);

        store.set_admin(user.id, false).await.unwrap();
        assert_eq!(gate.admit_admin(Some(&admin), now()).await, Err(PermissionDenied));
    }

    #[tokio::test]
    async fn test_admin_gate_denials() {
        let store = MemoryStore::new();
        let email = Email::parse("owner@shop.test").unwrap();
        let user = store.create_user(&email, "hash", true).await.unwrap();
        let cart = store.create_cart(CartId::generate()).await.unwrap();
        let codec = codec(KEY);
        let gate = Gate::new(&codec, CredentialBinding::new(&store, &store));

        // cart credential
        let cart_token = token(&codec, Subject::Cart(cart.id));
        assert_eq!(gate.admit_admin(Some(&cart_token), now()).await, Err(PermissionDenied));
        // customer role claim for an admin user
        let customer = token(
            &codec,
            Subject::Admin {
                user_id: user.id,
                role: Role::Customer,
                cart_id: None,
            },
        );
        assert_eq!(gate.admit_admin(Some(&customer), now()).await, Err(PermissionDenied));
        // unknown user
        let ghost = token(
            &codec,
            Subject::Admin {
                user_id: UserId::new(999),
                role: Role::Admin,
                cart_id: None,
            },
        );
        assert_eq!(gate.admit_admin(Some(&ghost), now()).await, Err(PermissionDenied));
        // foreign signature
        let foreign = token(
            &self::codec(FOREIGN),
            Subject::Admin {
                user_id: user.id,
                role: Role::Admin,
                cart_id: None,
            },
        );
        assert_eq!(gate.admit_admin(Some(&foreign), now()).await, Err(PermissionDenied));
    }
}
