use crate::transport::http::types::{AppState, HealthResponse};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Dispatcher is up; registry sizes", body = HealthResponse)
    )
)]
pub async fn healthcheck_handler(State(state): State<AppState>) -> impl IntoResponse {
    let (views, actions, tables) = state.registry.counts();
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
            views,
            actions,
            tables,
        }),
    )
}
