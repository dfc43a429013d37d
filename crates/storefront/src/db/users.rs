//! User repository.
//!
//! Accounts are stored but not yet tied to sessions or orders.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use tracing::instrument;

use bulava_core::{Email, Phone, UserId};

use super::RepositoryError;
use crate::models::{NewUser, User};

const USER_COLUMNS: &str = "id, email, phone, avatar, date_of_birth, address, city, \
     postal_code, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i32,
    email: String,
    phone: Option<String>,
    avatar: Option<String>,
    date_of_birth: Option<NaiveDate>,
    address: String,
    city: String,
    postal_code: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        let phone = row
            .phone
            .as_deref()
            .map(Phone::parse)
            .transpose()
            .map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid phone in database: {e}"))
            })?;

        Ok(Self {
            id: UserId::new(row.id),
            email,
            phone,
            avatar: row.avatar,
            date_of_birth: row.date_of_birth,
            address: row.address,
            city: row.city,
            postal_code: row.postal_code,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by their email address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored row is invalid.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(email.as_str())
            .fetch_optional(self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored row is invalid.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    /// Users, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, RepositoryError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2"
        );
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool)
            .await?
            .into_iter()
            .map(User::try_from)
            .collect()
    }

    /// Create a new user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    #[instrument(skip(self, user))]
    pub async fn create(&self, user: &NewUser) -> Result<User, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO users (email, phone, avatar, date_of_birth, address, city, postal_code)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(user.email.as_str())
            .bind(user.phone.as_ref().map(Phone::as_str))
            .bind(user.avatar.as_deref())
            .bind(user.date_of_birth)
            .bind(&user.address)
            .bind(&user.city)
            .bind(&user.postal_code)
            .fetch_one(self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_unique_violation()
                {
                    return RepositoryError::Conflict("email already exists".to_owned());
                }
                RepositoryError::Database(e)
            })?;

        User::try_from(row)
    }
}
