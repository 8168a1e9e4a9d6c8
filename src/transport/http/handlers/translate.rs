use crate::domain::DataAccessError;
use crate::transport::http::handlers::common::request_token;
use crate::transport::http::types::{error_reply, http_status, json_400, AppState};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::Value as JsonValue;

#[utoipa::path(
    post,
    path = "/translate",
    request_body = Envelope,
    responses(
        (status = 200, description = "Backend call succeeded", body = DispatchResponse),
        (status = 400, description = "Malformed envelope", body = DispatchResponse),
        (status = 401, description = "Missing bearer token", body = DispatchResponse),
        (status = 404, description = "Unknown view, action or record", body = DispatchResponse),
        (status = 501, description = "Reserved operation without backend mapping", body = DispatchResponse),
        (status = 503, description = "Backend failed, timed out or was unreachable", body = DispatchResponse),
        (status = 504, description = "Backend reply had an unexpected shape", body = DispatchResponse)
    ),
    security(("bearer" = []))
)]
pub async fn translate_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<JsonValue>, JsonRejection>,
) -> impl IntoResponse {
    let token = request_token(&headers);

    let Json(raw) = match body {
        Ok(b) => b,
        // Authentication is checked before the body.
        Err(_) if token.is_none() => {
            return error_reply(&DataAccessError::Unauthenticated("missing bearer token".to_string())).into_response()
        }
        Err(e) => return json_400(e, "envelope { subject, message }").into_response(),
    };

    let resp = state.dispatcher.dispatch_raw(&raw, token).await;
    (http_status(&resp), Json(resp)).into_response()
}
