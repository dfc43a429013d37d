//! Order status and the rules for moving between statuses.

use serde::{Deserialize, Serialize};

/// Lifecycle status of an order.
///
/// Orders are created `Pending`. Only payment reconciliation moves them
/// elsewhere, and only along the edges allowed by [`OrderStatus::transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Paid,
    Cancelled,
    Refunded,
    Processing,
}

/// Outcome of asking to move an order from one status to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTransition {
    /// The order already has the requested status (duplicate delivery).
    Unchanged,
    /// The move is allowed.
    Applied,
    /// The move would go backwards and must be ignored.
    Rejected,
}

impl OrderStatus {
    /// All statuses, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::Paid,
        Self::Cancelled,
        Self::Refunded,
        Self::Processing,
    ];

    /// Database and wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
            Self::Processing => "processing",
        }
    }

    /// Whether the provider has reached a final decision for this order.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Paid | Self::Cancelled | Self::Refunded)
    }

    /// Whether the buyer's cart can be emptied once the order has this status.
    #[must_use]
    pub const fn confirms_payment(self) -> bool {
        matches!(self, Self::Paid | Self::Processing)
    }

    /// Decide whether an order in `self` may move to `next`.
    ///
    /// Allowed edges:
    ///
    /// ```text
    /// pending    -> any
    /// processing -> paid | cancelled | refunded
    /// paid       -> refunded
    /// cancelled  -> paid | refunded
    /// refunded   -> (none)
    /// ```
    ///
    /// A cancelled order may still become paid: the payment confirmation is
    /// evidence that money moved, and it must not be lost.
    #[must_use]
    pub const fn transition(self, next: Self) -> StatusTransition {
        if self as u8 == next as u8 {
            return StatusTransition::Unchanged;
        }

        let allowed = match self {
            Self::Pending => true,
            Self::Processing => next.is_terminal(),
            Self::Paid => matches!(next, Self::Refunded),
            Self::Cancelled => matches!(next, Self::Paid | Self::Refunded),
            Self::Refunded => false,
        };

        if allowed {
            StatusTransition::Applied
        } else {
            StatusTransition::Rejected
        }
    }

    /// The transition `reported` takes and the status the order ends in.
    /// Unchanged and rejected reports leave the order where it is.
    #[must_use]
    pub const fn resolve(self, reported: Self) -> (StatusTransition, Self) {
        let transition = self.transition(reported);
        match transition {
            StatusTransition::Applied => (transition, reported),
            StatusTransition::Unchanged | StatusTransition::Rejected => (transition, self),
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("invalid order status: {s}"))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for OrderStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for OrderStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(s.parse()?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for OrderStatus {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.as_str(), buf)
    }
}
