//! Buyer contact details captured at checkout.
//!
//! Both fields are optional on an order, but when present they are validated
//! before anything is written.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing an [`Email`] or [`Phone`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ContactError {
    /// The input string is empty after trimming.
    #[error("{field} cannot be empty")]
    Empty {
        /// Which contact field was empty.
        field: &'static str,
    },
    /// The input string is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong {
        /// Which contact field was too long.
        field: &'static str,
        /// Maximum allowed length.
        max: usize,
    },
    /// The email does not have the `local@domain` shape.
    #[error("email must look like name@domain")]
    InvalidEmail,
    /// The phone number does not match `+?1?` followed by 9 to 15 digits.
    #[error("phone number must contain 9 to 15 digits, optionally prefixed with +")]
    InvalidPhone,
}

/// An email address.
///
/// ## Constraints
///
/// - Length: 1-254 characters (RFC 5321 limit)
/// - Exactly one `@`, with a non-empty local part and domain
/// - The domain contains a dot that is neither its first nor last character
///
/// ```
/// use bulava_core::Email;
///
/// assert!(Email::parse("buyer@example.com.ua").is_ok());
/// assert!(Email::parse("buyer@localhost").is_err());
/// assert!(Email::parse("@example.com").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// Maximum length of an email address (RFC 5321).
    pub const MAX_LENGTH: usize = 254;

    /// Parse an `Email`, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed input is empty, too long, or not
    /// shaped like `local@domain.tld`.
    pub fn parse(s: &str) -> Result<Self, ContactError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ContactError::Empty { field: "email" });
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(ContactError::TooLong {
                field: "email",
                max: Self::MAX_LENGTH,
            });
        }

        let (local, domain) = s.split_once('@').ok_or(ContactError::InvalidEmail)?;
        if local.is_empty() || domain.contains('@') || s.chars().any(char::is_whitespace) {
            return Err(ContactError::InvalidEmail);
        }
        if domain.starts_with('.') || domain.ends_with('.') || !domain.contains('.') {
            return Err(ContactError::InvalidEmail);
        }

        Ok(Self(s.to_owned()))
    }

    /// Returns the email address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `Email` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A phone number in loose international form: an optional `+`, an optional
/// leading `1`, then 9 to 15 digits.
///
/// Spaces, dashes, and parentheses are stripped before validation so that
/// `+380 (67) 123-45-67` is accepted and stored as `+380671234567`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Phone(String);

impl Phone {
    const MIN_DIGITS: usize = 9;
    const MAX_DIGITS: usize = 15;

    /// Parse a `Phone`, normalizing common separators away.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty or does not match the accepted
    /// shape after normalization.
    pub fn parse(s: &str) -> Result<Self, ContactError> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
            .collect();
        if normalized.is_empty() {
            return Err(ContactError::Empty { field: "phone" });
        }

        let digits = normalized.strip_prefix('+').unwrap_or(&normalized);
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ContactError::InvalidPhone);
        }

        // The optional leading `1` may be consumed as a prefix or counted as a
        // digit, so anything from MIN to MAX + 1 digits starting with 1 fits.
        let len = digits.len();
        let fits = (Self::MIN_DIGITS..=Self::MAX_DIGITS).contains(&len)
            || (len == Self::MAX_DIGITS + 1 && digits.starts_with('1'));
        if !fits {
            return Err(ContactError::InvalidPhone);
        }

        Ok(Self(normalized))
    }

    /// Returns the normalized phone number.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `Phone` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Phone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
