//! Public order reference shown to buyers and sent to payment providers.

use core::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Errors that can occur when parsing an [`OrderReference`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderReferenceError {
    #[error("order reference must start with {prefix}")]
    MissingPrefix { prefix: &'static str },
    #[error("order reference must end with {len} upper-case hex characters")]
    InvalidSuffix { len: usize },
}

/// An order reference of the form `ORDER-` followed by 12 upper-case hex
/// characters, e.g. `ORDER-3F2A9C01B7DE`.
///
/// ```
/// use bulava_core::OrderReference;
///
/// let reference = OrderReference::generate();
/// assert!(reference.as_str().starts_with("ORDER-"));
/// assert_eq!(OrderReference::parse(reference.as_str()), Ok(reference));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderReference(String);

impl OrderReference {
    pub const PREFIX: &'static str = "ORDER-";
    const SUFFIX_LEN: usize = 12;

    /// Generate a fresh reference from a random UUID.
    #[must_use]
    pub fn generate() -> Self {
        let hex = Uuid::new_v4().simple().to_string();
        let suffix: String = hex
            .chars()
            .take(Self::SUFFIX_LEN)
            .map(|c| c.to_ascii_uppercase())
            .collect();
        Self(format!("{}{suffix}", Self::PREFIX))
    }

    /// Parse a reference received from a provider or the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix is missing or the suffix is not exactly
    /// 12 upper-case hex characters.
    pub fn parse(s: &str) -> Result<Self, OrderReferenceError> {
        let suffix = s
            .strip_prefix(Self::PREFIX)
            .ok_or(OrderReferenceError::MissingPrefix {
                prefix: Self::PREFIX,
            })?;
        let valid = suffix.len() == Self::SUFFIX_LEN
            && suffix
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(&b));
        if !valid {
            return Err(OrderReferenceError::InvalidSuffix {
                len: Self::SUFFIX_LEN,
            });
        }
        Ok(Self(s.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for OrderReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for OrderReference {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for OrderReference {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for OrderReference {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0.as_str(), buf)
    }
}
