//! Product detail handler.

use axum::{
    Json,
    extract::{Path, State},
};
use tracing::instrument;

use crate::db::CatalogRepository;
use crate::error::{AppError, Result};
use crate::models::ProductDetail;
use crate::state::AppState;

/// Product detail with its category and gallery images.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ProductDetail>> {
    CatalogRepository::new(state.pool())
        .get_product_detail(&slug)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("product {slug}")))
}
