use std::sync::Arc;

use axum::{
    extract::{
        Extension, OriginalUri, Path, Query,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use cook_core::ProductId;
use cook_products::Category;

use crate::app::dto::{CategoryQuery, ProductRequest, ProductResponse};
use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_product).get(list_products))
        .route("/category", get(list_by_category))
        .route(
            "/:id",
            get(get_product).put(update_product).delete(inactivate_product),
        )
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    OriginalUri(uri): OriginalUri,
    body: Result<Json<ProductRequest>, JsonRejection>,
) -> Response {
    let path = uri.path();
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection(rejection, path),
    };
    let details = match body.into_details() {
        Ok(d) => d,
        Err(e) => return errors::domain_error_to_response(e, path),
    };

    match services.products.create(details).await {
        Ok(product) => (StatusCode::CREATED, Json(ProductResponse::from(&product))).into_response(),
        Err(e) => errors::use_case_error_to_response(e, path),
    }
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    OriginalUri(uri): OriginalUri,
) -> Response {
    match services.products.list_all().await {
        Ok(products) => {
            let body: Vec<ProductResponse> = products.iter().map(ProductResponse::from).collect();
            Json(body).into_response()
        }
        Err(e) => errors::use_case_error_to_response(e, uri.path()),
    }
}

/// `GET /products/category?category=DRINK&page=0&size=10`
///
/// Answers 204 with no body when the category holds no active products.
pub async fn list_by_category(
    Extension(services): Extension<Arc<AppServices>>,
    OriginalUri(uri): OriginalUri,
    query: Result<Query<CategoryQuery>, QueryRejection>,
) -> Response {
    let path = uri.path();
    let Query(query) = match query {
        Ok(q) => q,
        Err(rejection) => return errors::query_rejection(rejection, path),
    };
    let Some(raw) = query.category.as_deref() else {
        return errors::json_error(StatusCode::BAD_REQUEST, "category is required", path);
    };
    let category: Category = match errors::parse(raw, path) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    match services
        .products
        .list_by_category(category, query.page_request())
        .await
    {
        Ok(Some(page)) => Json(page.map(|p| ProductResponse::from(&p))).into_response(),
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::use_case_error_to_response(e, path),
    }
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    OriginalUri(uri): OriginalUri,
    Path(id): Path<String>,
) -> Response {
    let path = uri.path();
    let id: ProductId = match errors::parse(&id, path) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.products.get_by_id(id).await {
        Ok(product) => Json(ProductResponse::from(&product)).into_response(),
        Err(e) => errors::use_case_error_to_response(e, path),
    }
}

pub async fn update_product(
    Extension(services): Extension<Arc<AppServices>>,
    OriginalUri(uri): OriginalUri,
    Path(id): Path<String>,
    body: Result<Json<ProductRequest>, JsonRejection>,
) -> Response {
    let path = uri.path();
    let id: ProductId = match errors::parse(&id, path) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection(rejection, path),
    };
    let details = match body.into_details() {
        Ok(d) => d,
        Err(e) => return errors::domain_error_to_response(e, path),
    };

    match services.products.update(id, details).await {
        Ok(product) => Json(ProductResponse::from(&product)).into_response(),
        Err(e) => errors::use_case_error_to_response(e, path),
    }
}

/// Soft delete: the product stays readable by id with status `INACTIVE`.
pub async fn inactivate_product(
    Extension(services): Extension<Arc<AppServices>>,
    OriginalUri(uri): OriginalUri,
    Path(id): Path<String>,
) -> Response {
    let path = uri.path();
    let id: ProductId = match errors::parse(&id, path) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.products.inactivate(id).await {
        Ok(product) => Json(ProductResponse::from(&product)).into_response(),
        Err(e) => errors::use_case_error_to_response(e, path),
    }
}
