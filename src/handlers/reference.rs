use crate::{
    reference::{TaxRate, Unit},
    AppState,
};
use axum::{extract::State, routing::get, Json, Router};

#[utoipa::path(
    get,
    path = "/units",
    responses(
        (status = 200, description = "Units a material may reference", body = [Unit])
    ),
    tag = "reference"
)]
pub async fn list_units(State(state): State<AppState>) -> Json<Vec<Unit>> {
    Json(state.reference.units())
}

#[utoipa::path(
    get,
    path = "/tax-rates",
    responses(
        (status = 200, description = "Tax rates a material may reference", body = [TaxRate])
    ),
    tag = "reference"
)]
pub async fn list_tax_rates(State(state): State<AppState>) -> Json<Vec<TaxRate>> {
    Json(state.reference.tax_rates())
}

pub fn reference_routes() -> Router<AppState> {
    Router::new()
        .route("/units", get(list_units))
        .route("/tax-rates", get(list_tax_rates))
}
