//! User model.

use chrono::{DateTime, Utc};
use serde::Serialize;

use dam_nation_core::{Email, Role, UserId};

/// A registered user. The password hash never leaves the store layer
/// except through [`crate::db::UserDirectory::get_credentials_by_email`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    #[must_use]
    pub const fn role(&self) -> Role {
        Role::from_admin_flag(self.is_admin)
    }
}
