use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

use cook_core::{PageRequest, PagedCollection, PersistenceError, ProductId};
use cook_products::{Category, Product, ProductDraft, ProductRepository, ProductSnapshot, ProductStatus};

use crate::db::{Database, PageQuery, SqlParam};

const COLUMNS: &str = "id, name, category, price, description, status, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PostgresProductRepository {
    db: Arc<Database>,
}

impl PostgresProductRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

/// Rows that fail value-object validation are reported as data-integrity errors.
fn product_from_row(row: &PgRow) -> Result<Product, PersistenceError> {
    let column = |e: sqlx::Error| PersistenceError::data_integrity(format!("product row: {e}"));

    let snapshot = ProductSnapshot {
        id: ProductId::from_uuid(row.try_get::<Uuid, _>("id").map_err(column)?),
        name: row.try_get("name").map_err(column)?,
        category: row.try_get("category").map_err(column)?,
        price: row.try_get::<Decimal, _>("price").map_err(column)?,
        description: row.try_get("description").map_err(column)?,
        status: row.try_get("status").map_err(column)?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(column)?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at").map_err(column)?,
    };
    let id = snapshot.id;

    Product::rehydrate(snapshot).map_err(|e| {
        PersistenceError::data_integrity(format!("product {id} failed validation: {e}"))
    })
}

fn first_product(rows: Option<Vec<PgRow>>) -> Result<Option<Product>, PersistenceError> {
    rows.and_then(|rows| rows.into_iter().next())
        .map(|row| product_from_row(&row))
        .transpose()
}

#[async_trait::async_trait]
impl ProductRepository for PostgresProductRepository {
    async fn create(&self, draft: ProductDraft) -> Result<Product, PersistenceError> {
        let details = draft.details();
        let statement = format!(
            "INSERT INTO product (name, category, price, description, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $6) RETURNING {COLUMNS}"
        );
        let params = [
            SqlParam::from(details.name.as_str()),
            SqlParam::from(details.category.as_str()),
            SqlParam::from(details.price.value()),
            SqlParam::from(details.description.as_str()),
            SqlParam::from(draft.status().as_str()),
            SqlParam::from(draft.created_at()),
        ];

        let rows = self.db.query("product.create", &statement, &params).await?;
        first_product(rows)?.ok_or_else(|| {
            PersistenceError::data_integrity("insert into product returned no row")
        })
    }

    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, PersistenceError> {
        let statement = format!("SELECT {COLUMNS} FROM product WHERE id = $1");
        let rows = self
            .db
            .query("product.find_by_id", &statement, &[SqlParam::from(*id.as_uuid())])
            .await?;
        first_product(rows)
    }

    async fn find_all(&self) -> Result<Vec<Product>, PersistenceError> {
        let statement = format!("SELECT {COLUMNS} FROM product ORDER BY created_at, id");
        let rows = self.db.query("product.find_all", &statement, &[]).await?;
        rows.unwrap_or_default().iter().map(product_from_row).collect()
    }

    async fn update(&self, product: &Product) -> Result<Option<Product>, PersistenceError> {
        let statement = format!(
            "UPDATE product SET name = $2, category = $3, price = $4, description = $5, \
             status = $6, updated_at = $7 WHERE id = $1 RETURNING {COLUMNS}"
        );
        let params = [
            SqlParam::from(*product.id_typed().as_uuid()),
            SqlParam::from(product.name()),
            SqlParam::from(product.category().as_str()),
            SqlParam::from(product.price().value()),
            SqlParam::from(product.description()),
            SqlParam::from(product.status().as_str()),
            SqlParam::from(product.updated_at()),
        ];
        let rows = self.db.query("product.update", &statement, &params).await?;
        first_product(rows)
    }

    async fn inactivate(&self, id: ProductId) -> Result<Option<Product>, PersistenceError> {
        let statement = format!(
            "UPDATE product SET status = $2, updated_at = $3 WHERE id = $1 RETURNING {COLUMNS}"
        );
        let params = [
            SqlParam::from(*id.as_uuid()),
            SqlParam::from(ProductStatus::Inactive.as_str()),
            SqlParam::from(Utc::now()),
        ];
        let rows = self.db.query("product.inactivate", &statement, &params).await?;
        first_product(rows)
    }

    async fn find_page_by_category(
        &self,
        category: Category,
        status: ProductStatus,
        page: PageRequest,
    ) -> Result<Option<PagedCollection<Product>>, PersistenceError> {
        let statement = format!(
            "SELECT {COLUMNS} FROM product WHERE category = $1 AND status = $2 ORDER BY created_at, id"
        );
        let rows = self
            .db
            .query_paginate(
                "product.find_page_by_category",
                PageQuery {
                    statement: &statement,
                    params: vec![category.as_str().into(), status.as_str().into()],
                    page,
                },
            )
            .await?;

        if rows.total_elements() == 0 {
            return Ok(None);
        }
        rows.try_map(|row| product_from_row(&row)).map(Some)
    }
}
