use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::orders::{CheckoutOutcome, CheckoutRequest, OrderList},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_owner},
    models::{Order, OrderId},
    response::{ApiResponse, Meta},
    routes::{
        extract::{AppJson, AppPath, AppQuery},
        params::OrderListQuery,
    },
    state::AppState,
};

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders).post(checkout))
        .route("/{id}", get(get_order))
}

fn idempotency_key(headers: &HeaderMap) -> AppResult<Option<Uuid>> {
    let Some(value) = headers.get(IDEMPOTENCY_KEY_HEADER) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
        .map(Some)
        .ok_or_else(|| AppError::InvalidInput("Idempotency-Key must be a UUID".into()))
}

#[utoipa::path(
    post,
    path = "/api/orders",
    request_body = CheckoutRequest,
    params(
        ("Idempotency-Key" = Option<String>, Header, description = "UUID; repeating it returns the original order"),
    ),
    responses(
        (status = 201, description = "Order placed", body = ApiResponse<CheckoutOutcome>),
        (status = 200, description = "Earlier order with the same key", body = ApiResponse<CheckoutOutcome>),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Cart or product not found"),
        (status = 422, description = "Empty cart or insufficient stock"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn checkout(
    State(state): State<AppState>,
    user: AuthUser,
    headers: HeaderMap,
    AppJson(payload): AppJson<CheckoutRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<CheckoutOutcome>>)> {
    let request = CheckoutRequest {
        idempotency_key: idempotency_key(&headers)?,
        ..payload
    };
    let outcome = state.checkout.checkout(user.user_id, request).await?;
    let (status, message) = if outcome.replayed {
        (StatusCode::OK, "Order already placed")
    } else {
        (StatusCode::CREATED, "Checkout success")
    };
    Ok((status, Json(ApiResponse::single(message, outcome))))
}

#[utoipa::path(
    get,
    path = "/api/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("sort_order" = Option<String>, Query, description = "Sort order: asc, desc")
    ),
    responses(
        (status = 200, description = "Current user's orders", body = ApiResponse<OrderList>),
        (status = 400, description = "Unknown status"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
    AppQuery(query): AppQuery<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let (page, per_page, _) = query.pagination().normalize();
    let filter = query.to_filter()?;
    let (items, total) = state.orders.list_for_user(user.user_id, filter).await?;
    let meta = Meta::new(page, per_page, total);
    Ok(Json(ApiResponse::success("Ok", OrderList { items }, Some(meta))))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(("id" = i64, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order with items", body = ApiResponse<Order>),
        (status = 403, description = "Order belongs to another user"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<OrderId>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let order = state.orders.get_by_id(id).await?;
    ensure_owner(&user, order.user_id)?;
    Ok(Json(ApiResponse::single("OK", order)))
}
