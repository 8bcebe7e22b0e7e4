use crate::{
    entities::material,
    errors::{ErrorResponse, ServiceError},
    handlers::common::{created_response, success_response, MessageResponse},
    services::materials::MaterialInput,
    AppState,
};
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    response::Response,
    routing::{get, put},
    Json, Router,
};

#[utoipa::path(
    post,
    path = "/materials",
    request_body = MaterialInput,
    responses(
        (status = 201, description = "Material added", body = MessageResponse),
        (status = 400, description = "Missing field or unknown reference id", body = ErrorResponse),
        (status = 409, description = "Duplicate batchNumber + materialName", body = ErrorResponse),
        (status = 500, description = "Store failure", body = ErrorResponse)
    ),
    tag = "materials"
)]
pub async fn create_material(
    State(state): State<AppState>,
    payload: Result<Json<MaterialInput>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let Json(input) = payload?;
    let message = state.services.materials.create_material(input).await?;
    Ok(created_response(MessageResponse::new(message)))
}

#[utoipa::path(
    get,
    path = "/materials",
    responses(
        (status = 200, description = "All stored materials", body = [material::Model]),
        (status = 500, description = "Store failure", body = ErrorResponse)
    ),
    tag = "materials"
)]
pub async fn list_materials(
    State(state): State<AppState>,
) -> Result<Json<Vec<material::Model>>, ServiceError> {
    let materials = state.services.materials.list_materials().await?;
    Ok(Json(materials))
}

#[utoipa::path(
    put,
    path = "/materials/{id}",
    params(
        ("id" = i32, Path, description = "Material id")
    ),
    request_body = MaterialInput,
    responses(
        (status = 200, description = "Material updated", body = MessageResponse),
        (status = 400, description = "Unknown reference id or malformed request", body = ErrorResponse),
        (status = 409, description = "Pair owned by another material", body = ErrorResponse),
        (status = 500, description = "Store failure", body = ErrorResponse)
    ),
    tag = "materials"
)]
pub async fn update_material(
    State(state): State<AppState>,
    id: Result<Path<i32>, PathRejection>,
    payload: Result<Json<MaterialInput>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let Path(id) = id?;
    let Json(input) = payload?;
    let message = state.services.materials.update_material(id, input).await?;
    Ok(success_response(MessageResponse::new(message)))
}

#[utoipa::path(
    delete,
    path = "/materials/{id}",
    params(
        ("id" = i32, Path, description = "Material id")
    ),
    responses(
        (status = 200, description = "Material deleted", body = MessageResponse),
        (status = 500, description = "Malformed id or store failure", body = ErrorResponse)
    ),
    tag = "materials"
)]
pub async fn delete_material(
    State(state): State<AppState>,
    id: Result<Path<i32>, PathRejection>,
) -> Result<Response, ServiceError> {
    // Delete has no client-error outcome; an id the store cannot use is a store failure
    let Path(id) = id.map_err(|rejection| ServiceError::InternalError(rejection.body_text()))?;
    let message = state.services.materials.delete_material(id).await?;
    Ok(success_response(MessageResponse::new(message)))
}

pub fn material_routes() -> Router<AppState> {
    Router::new()
        .route("/materials", get(list_materials).post(create_material))
        .route("/materials/:id", put(update_material).delete(delete_material))
}
