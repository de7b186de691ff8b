use std::sync::Arc;

use axum::{
    extract::{Extension, OriginalUri, Path},
    response::{IntoResponse, Response},
    routing::{get, patch},
    Json, Router,
};

use cook_core::OrderId;
use cook_orders::OrderStatus;

use crate::app::dto::OrderResponse;
use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/:id", get(get_order))
        .route("/:id/status/:status", patch(update_order_status))
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    OriginalUri(uri): OriginalUri,
    Path(id): Path<String>,
) -> Response {
    let path = uri.path();
    let id: OrderId = match errors::parse(&id, path) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.orders.get_by_id(id).await {
        Ok(order) => Json(OrderResponse::from(&order)).into_response(),
        Err(e) => errors::use_case_error_to_response(e, path),
    }
}

/// `PATCH /orders/:id/status/:status`; a successful move is announced to the ordering context.
pub async fn update_order_status(
    Extension(services): Extension<Arc<AppServices>>,
    OriginalUri(uri): OriginalUri,
    Path((id, status)): Path<(String, String)>,
) -> Response {
    let path = uri.path();
    let id: OrderId = match errors::parse(&id, path) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let status: OrderStatus = match errors::parse(&status, path) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.orders.update_status(id, status).await {
        Ok(order) => Json(OrderResponse::from(&order)).into_response(),
        Err(e) => errors::use_case_error_to_response(e, path),
    }
}
