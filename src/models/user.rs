use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::utils::token::generate_user_id;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub external_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub id: String,
    pub external_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl NewUser {
    /// Builds a row with a freshly generated local id.
    pub fn new(
        external_id: impl Into<String>,
        email: impl Into<String>,
        first_name: Option<String>,
        last_name: Option<String>,
    ) -> Self {
        Self {
            id: generate_user_id(),
            external_id: external_id.into(),
            email: email.into(),
            first_name: first_name.unwrap_or_default(),
            last_name: last_name.unwrap_or_default(),
        }
    }
}

/// Partial update. `None` leaves the column unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserChanges {
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl UserChanges {
    pub fn new(email: impl Into<String>, first_name: Option<String>, last_name: Option<String>) -> Self {
        Self {
            email: email.into(),
            first_name: first_name.filter(|v| !v.is_empty()),
            last_name: last_name.filter(|v| !v.is_empty()),
        }
    }
}
