//! Listing sort whitelist.

use serde::Serialize;

/// A whitelisted listing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SortOrder {
    #[serde(rename = "price")]
    PriceAsc,
    #[serde(rename = "-price")]
    PriceDesc,
    #[serde(rename = "name")]
    NameAsc,
    #[serde(rename = "-name")]
    NameDesc,
    #[serde(rename = "created_at")]
    CreatedAtAsc,
    /// Newest first.
    #[default]
    #[serde(rename = "-created_at")]
    CreatedAtDesc,
    #[serde(rename = "discount_price")]
    DiscountPriceAsc,
    #[serde(rename = "-discount_price")]
    DiscountPriceDesc,
}

impl SortOrder {
    pub const ALL: [Self; 8] = [
        Self::PriceAsc,
        Self::PriceDesc,
        Self::NameAsc,
        Self::NameDesc,
        Self::CreatedAtAsc,
        Self::CreatedAtDesc,
        Self::DiscountPriceAsc,
        Self::DiscountPriceDesc,
    ];

    /// Parse a `sort` query value. Missing or unknown tokens fall back to
    /// newest first.
    #[must_use]
    pub fn parse(token: Option<&str>) -> Self {
        token
            .and_then(|token| Self::ALL.into_iter().find(|s| s.as_str() == token.trim()))
            .unwrap_or_default()
    }

    /// The query-string token for this order.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PriceAsc => "price",
            Self::PriceDesc => "-price",
            Self::NameAsc => "name",
            Self::NameDesc => "-name",
            Self::CreatedAtAsc => "created_at",
            Self::CreatedAtDesc => "-created_at",
            Self::DiscountPriceAsc => "discount_price",
            Self::DiscountPriceDesc => "-discount_price",
        }
    }

    /// `ORDER BY` body. The product id breaks ties so pages never overlap.
    #[must_use]
    pub const fn order_by(self) -> &'static str {
        match self {
            Self::PriceAsc => "p.price ASC, p.id ASC",
            Self::PriceDesc => "p.price DESC, p.id DESC",
            Self::NameAsc => "p.name ASC, p.id ASC",
            Self::NameDesc => "p.name DESC, p.id DESC",
            Self::CreatedAtAsc => "p.created_at ASC, p.id ASC",
            Self::CreatedAtDesc => "p.created_at DESC, p.id DESC",
            Self::DiscountPriceAsc => "p.discount_price ASC, p.id ASC",
            Self::DiscountPriceDesc => "p.discount_price DESC, p.id DESC",
        }
    }
}
