use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
};

use crate::{
    dto::webhooks::{GatewayWebhookBody, WebhookOutcome},
    error::{AppError, AppResult},
    response::ApiResponse,
    services::order_service,
    signature,
    state::AppState,
};

pub const SIGNATURE_HEADER: &str = "x-gateway-signature";

pub fn router() -> Router<AppState> {
    Router::new().route("/gateway", post(gateway_webhook))
}

/// Server-to-server notification from the payment gateway. No cookie or
/// token auth; the body HMAC is the entire trust boundary and is checked
/// against the raw bytes before anything is parsed.
#[utoipa::path(
    post,
    path = "/api/webhooks/gateway",
    request_body = String,
    responses(
        (status = 200, description = "Event applied", body = ApiResponse<WebhookOutcome>),
        (status = 400, description = "Undecodable event payload"),
        (status = 401, description = "Missing or invalid signature"),
        (status = 500, description = "Store failure, sender should retry")
    ),
    tag = "Webhooks"
)]
pub async fn gateway_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<ApiResponse<WebhookOutcome>>> {
    let provided = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if !signature::verify_hmac_hex(
        &body,
        provided,
        state.config.gateway_webhook_secret.as_bytes(),
    ) {
        tracing::warn!("webhook signature verification failed");
        return Err(AppError::InvalidSignature);
    }

    let parsed: GatewayWebhookBody = serde_json::from_slice(&body)
        .map_err(|err| AppError::BadRequest(format!("invalid event body: {err}")))?;
    let notice = parsed.into_notice().map_err(AppError::BadRequest)?;

    let resp = order_service::apply_gateway_event(&state, notice).await?;
    Ok(Json(resp))
}
