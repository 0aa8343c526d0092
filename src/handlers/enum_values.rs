use super::common::success_response;
use crate::{
    auth::{authorize, Operation, Principal, Resource},
    errors::ServiceError,
    handlers::AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    response::Response,
    routing::{get, patch},
    Router,
};
use serde::de::IgnoredAny;
use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Default, Deserialize)]
pub struct EnumValueQuery {
    /// Matched against code and display.
    pub search: Option<String>,
    /// Restrict to the values of one enumeration type.
    #[serde(rename = "type")]
    pub type_code: Option<String>,
}

/// Only `display` is editable; code and type sent along are ignored.
#[derive(Debug, Deserialize, Validate)]
pub struct EnumValueUpdate {
    #[validate(length(min = 1, max = 64))]
    pub display: String,
    #[serde(default)]
    pub code: Option<IgnoredAny>,
    #[serde(default, rename = "type")]
    pub type_ref: Option<IgnoredAny>,
}

async fn list_enum_values(
    State(state): State<AppState>,
    principal: Principal,
    Query(query): Query<EnumValueQuery>,
) -> Result<Response, ServiceError> {
    authorize(Some(&principal), Resource::EnumValues, Operation::View)?;

    let values = state
        .services
        .enum_values
        .list(query.search.as_deref(), query.type_code.as_deref())
        .await?;
    Ok(success_response(values))
}

async fn update_enum_value(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i32>,
    Json(form): Json<EnumValueUpdate>,
) -> Result<Response, ServiceError> {
    authorize(Some(&principal), Resource::EnumValues, Operation::Edit)?;
    form.validate()?;

    let updated = state
        .services
        .enum_values
        .update_display(id, &form.display)
        .await?;
    Ok(success_response(updated))
}

pub fn enum_value_routes() -> Router<AppState> {
    Router::new()
        .route("/enum-values", get(list_enum_values))
        .route("/enum-values/:id", patch(update_enum_value))
}
