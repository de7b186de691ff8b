use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use cook_core::{DomainError, PageRequest};
use cook_orders::{Order, OrderProduct};
use cook_products::{Category, Price, Product, ProductDetails};

// -------------------------
// Request DTOs
// -------------------------

/// Body of `POST /products` and `PUT /products/:id`.
#[derive(Debug, Deserialize)]
pub struct ProductRequest {
    pub name: String,
    pub category: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(default)]
    pub description: String,
}

impl ProductRequest {
    pub fn into_details(self) -> Result<ProductDetails, DomainError> {
        let category: Category = self.category.parse()?;
        let price = Price::new(self.price)?;
        ProductDetails::new(self.name, category, price, self.description)
    }
}

#[derive(Debug, Deserialize)]
pub struct CategoryQuery {
    pub category: Option<String>,
    pub page: Option<i64>,
    pub size: Option<u64>,
}

impl CategoryQuery {
    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(
            self.page.unwrap_or(0),
            self.size.unwrap_or(PageRequest::DEFAULT_SIZE),
        )
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub description: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Product> for ProductResponse {
    fn from(p: &Product) -> Self {
        Self {
            id: *p.id_typed().as_uuid(),
            name: p.name().to_string(),
            category: p.category().as_str().to_string(),
            price: p.price().value(),
            description: p.description().to_string(),
            status: p.status().as_str().to_string(),
            created_at: p.created_at(),
            updated_at: p.updated_at(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderProductResponse {
    pub product_id: Uuid,
    pub customization: Option<String>,
}

impl From<&OrderProduct> for OrderProductResponse {
    fn from(line: &OrderProduct) -> Self {
        Self {
            product_id: *line.product_id.as_uuid(),
            customization: line.customization.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: Uuid,
    pub sequence: String,
    pub status: String,
    pub products: Vec<OrderProductResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Order> for OrderResponse {
    fn from(o: &Order) -> Self {
        Self {
            id: *o.id_typed().as_uuid(),
            sequence: o.sequence().to_string(),
            status: o.status().as_str().to_string(),
            products: o.products().iter().map(OrderProductResponse::from).collect(),
            created_at: o.created_at(),
            updated_at: o.updated_at(),
        }
    }
}
