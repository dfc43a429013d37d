//! Catalog listing handler.

use axum::{
    Json,
    extract::{RawQuery, State},
};
use tracing::instrument;

use crate::catalog::{CatalogPage, CatalogQuery};
use crate::db::CatalogRepository;
use crate::error::Result;
use crate::state::AppState;

/// Filtered, sorted, paginated product listing.
///
/// The raw query string is parsed by [`CatalogQuery::parse`] so repeated
/// keys keep every value. An unknown category slug is a 404.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> Result<Json<CatalogPage>> {
    let query = CatalogQuery::parse(raw.as_deref());
    let page = CatalogRepository::new(state.pool()).list(&query).await?;
    Ok(Json(page))
}
