//! User management commands.

use tracing::{info, warn};

use dam_nation_api::db::{PgStore, UserDirectory};
use dam_nation_api::services::auth::{AuthError, AuthService};
use dam_nation_core::Email;

use super::{CliError, connect};

/// Create a user.
///
/// # Errors
///
/// Returns an error if the email or password is invalid or the email is
/// already registered.
pub async fn create(email: &str, password: &str, is_admin: bool) -> Result<(), CliError> {
    let store = PgStore::new(connect().await?);

    let user = AuthService::new(&store)
        .register(email, password, is_admin)
        .await?;

    info!(
        "User created successfully! ID: {}, Email: {}, Admin: {}",
        user.id, user.email, user.is_admin
    );
    Ok(())
}

/// Grant or revoke admin for the user with `email`.
///
/// Takes effect on the user's next admin request; outstanding credentials
/// are not trusted for the role.
///
/// # Errors
///
/// Returns an error if no user has that email.
pub async fn set_admin(email: &str, is_admin: bool) -> Result<(), CliError> {
    let email = Email::parse(email).map_err(AuthError::from)?;
    let store = PgStore::new(connect().await?);

    let (user, _) = store
        .get_credentials_by_email(&email)
        .await?
        .ok_or(AuthError::UserNotFound)?;

    if user.is_admin == is_admin {
        warn!(user_id = %user.id, is_admin, "Admin flag already set; nothing to do");
        return Ok(());
    }

    let user = AuthService::new(&store).set_admin(user.id, is_admin).await?;
    info!(user_id = %user.id, email = %user.email, is_admin = user.is_admin, "Admin flag updated");
    Ok(())
}
