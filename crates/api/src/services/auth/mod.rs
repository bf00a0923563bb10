//! Authentication service.
//!
//! Email and password accounts. Passwords are hashed with Argon2id; the
//! admin flag on the account is what the admin gate re-reads per request.

mod error;

pub use error::AuthError;

use std::sync::LazyLock;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use tracing::{info, instrument};

use dam_nation_core::{Email, UserId};

use crate::db::{RepositoryError, UserDirectory};
use crate::models::User;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length (Argon2 input is bounded to keep hashing cheap).
const MAX_PASSWORD_LENGTH: usize = 128;

/// Hash verified when the email matches no account, so a miss costs the same
/// Argon2 work as a wrong password.
static UNKNOWN_USER_HASH: LazyLock<String> = LazyLock::new(|| {
    hash_password("dam-nation-unknown-user").expect("Argon2 hashes a fixed password")
});

#[cfg(test)]
thread_local! {
    static VERIFY_CALLS: std::cell::Cell<usize> = const { std::cell::Cell::new(0) };
}

/// Authentication service over a [`UserDirectory`].
pub struct AuthService<'a> {
    users: &'a dyn UserDirectory,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(users: &'a dyn UserDirectory) -> Self {
        Self { users }
    }

    /// Register a new user with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        is_admin: bool,
    ) -> Result<User, AuthError> {
        let email = Email::parse(email)?;
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        let user = self
            .users
            .create_user(&email, &password_hash, is_admin)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        info!(user_id = %user.id, is_admin, "User registered");
        Ok(user)
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        // A malformed email is just another unknown account
        let account = match Email::parse(email) {
            Ok(email) => self.users.get_credentials_by_email(&email).await?,
            Err(_) => None,
        };

        // Exactly one Argon2 verify on every path
        let password_hash = account
            .as_ref()
            .map_or(UNKNOWN_USER_HASH.as_str(), |(_, hash)| hash.as_str());
        verify_password(password, password_hash)?;

        account
            .map(|(user, _)| user)
            .ok_or(AuthError::InvalidCredentials)
    }

    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if there is no such user.
    pub async fn get_user(&self, id: UserId) -> Result<User, AuthError> {
        self.users.get_user(id).await?.ok_or(AuthError::UserNotFound)
    }

    /// Grant or revoke admin. Takes effect on the user's next admin request.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if there is no such user.
    #[instrument(skip(self))]
    pub async fn set_admin(&self, id: UserId, is_admin: bool) -> Result<User, AuthError> {
        if !self.users.set_admin(id, is_admin).await? {
            return Err(AuthError::UserNotFound);
        }
        info!(user_id = %id, is_admin, "Admin flag changed");
        self.get_user(id).await
    }
}

/// Validate password requirements.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` if the password is too short or too long.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if len > MAX_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at most {MAX_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
///
/// # Errors
///
/// Returns `AuthError::InvalidCredentials` if the password doesn't match.
/// Returns `AuthError::PasswordHash` if the stored hash is malformed.
pub fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    #[cfg(test)]
    VERIFY_CALLS.with(|calls| calls.set(calls.get() + 1));

    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::PasswordHash)?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}
