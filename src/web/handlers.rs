use axum::{
    Json,
    extract::{Path, State},
};
use serde_json::{Value, json};
use tracing::info;

use crate::{
    record::ReconciledRecord,
    web::{
        error::{AppError, AppResult},
        repository::{Resolution, resolve},
        state::AppState,
    },
};

pub async fn healthcheck() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn list_postal_codes(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<ReconciledRecord>>> {
    let records = state.repo.list().await?;
    Ok(Json(records))
}

pub async fn get_postal_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> AppResult<Json<ReconciledRecord>> {
    info!(code = %code, "postal code requested");

    match resolve(state.repo.as_ref(), &code).await? {
        Resolution::Resolved(record) => Ok(Json(record)),
        Resolution::NotFound => Err(AppError::postal_code_not_found()),
    }
}
