use axum::{
    Json, Router,
    extract::State,
    routing::{get, post, put},
};

use crate::{
    dto::orders::{
        OrderList, PrecreateOrderRequest, SaveOrderRequest, SavedOrder, VerifyPaymentData,
        VerifyPaymentRequest,
    },
    error::AppResult,
    gateway::GatewayOrderDescriptor,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::order_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders).post(save_order))
        .route("/precreate", post(precreate_order))
        .route("/verify", put(verify_payment))
}

#[utoipa::path(
    post,
    path = "/api/orders/precreate",
    request_body = PrecreateOrderRequest,
    responses(
        (status = 200, description = "Gateway order created", body = ApiResponse<GatewayOrderDescriptor>),
        (status = 400, description = "Invalid amount or currency"),
        (status = 502, description = "Gateway unavailable")
    ),
    tag = "Orders"
)]
pub async fn precreate_order(
    State(state): State<AppState>,
    Json(payload): Json<PrecreateOrderRequest>,
) -> AppResult<Json<ApiResponse<GatewayOrderDescriptor>>> {
    let resp = order_service::precreate_order(&state, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/orders",
    request_body = SaveOrderRequest,
    responses(
        (status = 200, description = "Payment recorded (or replayed)", body = ApiResponse<SavedOrder>),
        (status = 401, description = "Unverified identity or bad payment proof"),
        (status = 403, description = "Caller does not own the claimed account")
    ),
    tag = "Orders"
)]
pub async fn save_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<SaveOrderRequest>,
) -> AppResult<Json<ApiResponse<SavedOrder>>> {
    let resp = order_service::record_payment(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/orders",
    responses(
        (status = 200, description = "Caller's orders, newest first", body = ApiResponse<OrderList>),
        (status = 401, description = "No resolvable identity")
    ),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = order_service::list_my_orders(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/orders/verify",
    request_body = VerifyPaymentRequest,
    responses(
        (status = 200, description = "Comparison result", body = ApiResponse<VerifyPaymentData>),
        (status = 400, description = "Malformed request")
    ),
    tag = "Orders"
)]
pub async fn verify_payment(
    State(state): State<AppState>,
    Json(payload): Json<VerifyPaymentRequest>,
) -> AppResult<Json<ApiResponse<VerifyPaymentData>>> {
    let resp = order_service::verify_payment(&state, &payload)?;
    Ok(Json(resp))
}
