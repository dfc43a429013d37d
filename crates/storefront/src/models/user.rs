//! Customer accounts.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use bulava_core::{Email, Phone, UserId};

/// A stored customer account.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub phone: Option<Phone>,
    /// Relative path of the uploaded avatar image.
    pub avatar: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a new account. Text fields left empty are stored as empty.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: Email,
    pub phone: Option<Phone>,
    pub avatar: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: String,
    pub city: String,
    pub postal_code: String,
}

impl NewUser {
    /// An account with only an email address.
    #[must_use]
    pub const fn with_email(email: Email) -> Self {
        Self {
            email,
            phone: None,
            avatar: None,
            date_of_birth: None,
            address: String::new(),
            city: String::new(),
            postal_code: String::new(),
        }
    }
}
