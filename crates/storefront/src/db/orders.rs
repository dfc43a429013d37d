//! Order repository.
//!
//! Orders and their items are written in one transaction. Status updates
//! lock the order row so concurrent provider callbacks serialize.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::instrument;

use bulava_core::{
    OrderId, OrderItemId, OrderReference, OrderStatus, ProductId, StatusTransition,
};

use super::RepositoryError;
use crate::models::{NewOrder, Order, OrderItem, OrderLookup, OrderWithItems};

const ORDER_COLUMNS: &str = "id, order_id, payment_provider, provider_session_id, \
     provider_payment_id, provider_order_id, email, phone, subtotal, discount, total, \
     status, created_at, updated_at";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    order_id: String,
    payment_provider: String,
    provider_session_id: Option<String>,
    provider_payment_id: Option<String>,
    provider_order_id: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    subtotal: Decimal,
    discount: Decimal,
    total: Decimal,
    status: OrderStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let order_id = OrderReference::parse(&row.order_id).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid order reference in database: {e}"))
        })?;

        Ok(Self {
            id: OrderId::new(row.id),
            order_id,
            payment_provider: row.payment_provider,
            provider_session_id: row.provider_session_id,
            provider_payment_id: row.provider_payment_id,
            provider_order_id: row.provider_order_id,
            email: row.email,
            phone: row.phone,
            subtotal: row.subtotal,
            discount: row.discount,
            total: row.total,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: i32,
    order_id: i32,
    product_id: Option<i32>,
    product_name: String,
    quantity: i32,
    unit_price: Decimal,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: OrderItemId::new(row.id),
            order_id: OrderId::new(row.order_id),
            product_id: row.product_id.map(ProductId::new),
            product_name: row.product_name,
            quantity: row.quantity,
            unit_price: row.unit_price,
        }
    }
}

// =============================================================================
// Status Updates
// =============================================================================

/// A status reported by a payment provider, plus any transaction ids it sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub status: OrderStatus,
    pub provider_payment_id: Option<String>,
    pub provider_order_id: Option<String>,
}

/// What happened when a [`StatusUpdate`] was applied.
#[derive(Debug, Clone)]
pub struct StatusChange {
    /// The order after the update.
    pub order: Order,
    /// Status before the update.
    pub previous: OrderStatus,
    pub transition: StatusTransition,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert an order in `pending` status together with its items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the order reference already exists.
    /// Returns `RepositoryError::Database` for other database errors. Nothing
    /// is written on error.
    #[instrument(skip(self, new_order), fields(order_id = %new_order.order_id, items = new_order.items.len()))]
    pub async fn create(&self, new_order: &NewOrder) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r"
            INSERT INTO orders (order_id, payment_provider, email, phone, subtotal, discount, total, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {ORDER_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(&new_order.order_id)
            .bind(new_order.payment_provider)
            .bind(new_order.email.as_ref().map(bulava_core::Email::as_str))
            .bind(new_order.phone.as_ref().map(bulava_core::Phone::as_str))
            .bind(new_order.subtotal)
            .bind(new_order.discount)
            .bind(new_order.total)
            .bind(OrderStatus::Pending)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_unique_violation()
                {
                    return RepositoryError::Conflict("order reference already exists".to_owned());
                }
                RepositoryError::Database(e)
            })?;
        let order = Order::try_from(row)?;

        for item in &new_order.items {
            sqlx::query(
                r"
                INSERT INTO order_item (order_id, product_id, product_name, quantity, unit_price)
                VALUES ($1, $2, $3, $4, $5)
                ",
            )
            .bind(order.id)
            .bind(item.product_id)
            .bind(&item.product_name)
            .bind(item.quantity)
            .bind(item.unit_price)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(order)
    }

    /// Record the provider's checkout session id on an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn set_provider_session(
        &self,
        id: OrderId,
        session_id: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE orders SET provider_session_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(session_id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Get an order by its public reference.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored row is invalid.
    #[instrument(skip(self), fields(order_id = %reference))]
    pub async fn get_by_reference(
        &self,
        reference: &OrderReference,
    ) -> Result<Option<Order>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = $1");
        sqlx::query_as::<_, OrderRow>(&sql)
            .bind(reference)
            .fetch_optional(self.pool)
            .await?
            .map(Order::try_from)
            .transpose()
    }

    /// Get an order and its items by public reference.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored row is invalid.
    #[instrument(skip(self), fields(order_id = %reference))]
    pub async fn get_with_items(
        &self,
        reference: &OrderReference,
    ) -> Result<Option<OrderWithItems>, RepositoryError> {
        let Some(order) = self.get_by_reference(reference).await? else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, OrderItemRow>(
            r"
            SELECT id, order_id, product_id, product_name, quantity, unit_price
            FROM order_item
            WHERE order_id = $1
            ORDER BY id
            ",
        )
        .bind(order.id)
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(OrderItem::from)
        .collect();

        Ok(Some(OrderWithItems { order, items }))
    }

    /// Apply a provider-reported status to an order.
    ///
    /// Runs in a transaction holding `SELECT ... FOR UPDATE` on the order
    /// row. The status only changes when [`OrderStatus::transition`] allows
    /// it; provider transaction ids are recorded whenever present.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no order matches `lookup`.
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self, update), fields(lookup = %lookup, status = %update.status))]
    pub async fn apply_status(
        &self,
        lookup: &OrderLookup,
        update: &StatusUpdate,
    ) -> Result<StatusChange, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current = lock_order(&mut tx, lookup)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        let previous = current.status;
        let (transition, next) = previous.resolve(update.status);

        let sql = format!(
            r"
            UPDATE orders
            SET status = $2,
                provider_payment_id = COALESCE($3, provider_payment_id),
                provider_order_id = COALESCE($4, provider_order_id),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(current.id)
            .bind(next)
            .bind(update.provider_payment_id.as_deref())
            .bind(update.provider_order_id.as_deref())
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(StatusChange {
            order: Order::try_from(row)?,
            previous,
            transition,
        })
    }
}

/// Find and lock the order a provider event refers to.
async fn lock_order(
    tx: &mut Transaction<'_, Postgres>,
    lookup: &OrderLookup,
) -> Result<Option<Order>, RepositoryError> {
    let row = match lookup {
        OrderLookup::Reference(reference) => {
            let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = $1 FOR UPDATE");
            sqlx::query_as::<_, OrderRow>(&sql)
                .bind(reference.as_str())
                .fetch_optional(&mut **tx)
                .await?
        }
        OrderLookup::ProviderPaymentId(payment_id) => {
            let sql = format!(
                "SELECT {ORDER_COLUMNS} FROM orders WHERE provider_payment_id = $1 \
                 ORDER BY id DESC LIMIT 1 FOR UPDATE"
            );
            sqlx::query_as::<_, OrderRow>(&sql)
                .bind(payment_id)
                .fetch_optional(&mut **tx)
                .await?
        }
    };

    row.map(Order::try_from).transpose()
}
