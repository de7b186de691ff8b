use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::postgres::PgRow;
use tracing::instrument;
use uuid::Uuid;

use cook_core::{OrderId, PersistenceError, ProductId};
use cook_orders::{Order, OrderProduct, OrderRepository, OrderSnapshot, OrderStatus};

use crate::db::{Database, SqlParam, bind_params, fail, map_sqlx_error};

const INSERT_ORDER: &str =
    "INSERT INTO orders (id, sequence, status, created_at, updated_at) VALUES ($1, $2, $3, $4, $5)";
const INSERT_LINE: &str =
    "INSERT INTO order_product (order_id, position, product_id, customization) VALUES ($1, $2, $3, $4)";
const SELECT_ORDER: &str =
    "SELECT id, sequence, status, created_at, updated_at FROM orders WHERE id = $1";
const SELECT_LINES: &str =
    "SELECT product_id, customization FROM order_product WHERE order_id = $1 ORDER BY position";
const UPDATE_STATUS: &str = "UPDATE orders SET status = $2, updated_at = $3 WHERE id = $1 \
     RETURNING id, sequence, status, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PostgresOrderRepository {
    db: Arc<Database>,
}

impl PostgresOrderRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    async fn load_lines(&self, id: OrderId) -> Result<Vec<OrderProduct>, PersistenceError> {
        let rows = self
            .db
            .query("order.load_lines", SELECT_LINES, &[SqlParam::from(*id.as_uuid())])
            .await?;

        rows.unwrap_or_default()
            .iter()
            .map(|row| {
                let product_id: Uuid = row.try_get("product_id").map_err(integrity)?;
                let customization: Option<String> = row.try_get("customization").map_err(integrity)?;
                Ok(OrderProduct::new(ProductId::from_uuid(product_id), customization))
            })
            .collect()
    }

    async fn hydrate(&self, row: &PgRow) -> Result<Order, PersistenceError> {
        let id = OrderId::from_uuid(row.try_get::<Uuid, _>("id").map_err(integrity)?);
        let snapshot = OrderSnapshot {
            id,
            sequence: row.try_get("sequence").map_err(integrity)?,
            status: row.try_get("status").map_err(integrity)?,
            products: self.load_lines(id).await?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(integrity)?,
            updated_at: row.try_get::<DateTime<Utc>, _>("updated_at").map_err(integrity)?,
        };

        Order::rehydrate(snapshot)
            .map_err(|e| PersistenceError::data_integrity(format!("order {id} failed validation: {e}")))
    }
}

fn integrity(e: sqlx::Error) -> PersistenceError {
    PersistenceError::data_integrity(format!("order row: {e}"))
}

#[async_trait::async_trait]
impl OrderRepository for PostgresOrderRepository {
    #[instrument(skip(self, order), fields(order_id = %order.id_typed(), lines = order.products().len()), err)]
    async fn create(&self, order: &Order) -> Result<Order, PersistenceError> {
        let mut tx = self.db.begin().await?;

        let params = [
            SqlParam::from(*order.id_typed().as_uuid()),
            SqlParam::from(order.sequence()),
            SqlParam::from(order.status().as_str()),
            SqlParam::from(order.created_at()),
            SqlParam::from(order.updated_at()),
        ];
        bind_params(sqlx::query(INSERT_ORDER), &params)
            .execute(&mut *tx)
            .await
            .map_err(|e| fail("order.create", INSERT_ORDER, &params, e))?;

        for (position, line) in order.products().iter().enumerate() {
            let params = [
                SqlParam::from(*order.id_typed().as_uuid()),
                SqlParam::from(position as i64),
                SqlParam::from(*line.product_id.as_uuid()),
                SqlParam::from(line.customization.clone()),
            ];
            bind_params(sqlx::query(INSERT_LINE), &params)
                .execute(&mut *tx)
                .await
                .map_err(|e| fail("order.create_line", INSERT_LINE, &params, e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("order.commit", e))?;

        Ok(order.clone())
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, PersistenceError> {
        let rows = self
            .db
            .query("order.find_by_id", SELECT_ORDER, &[SqlParam::from(*id.as_uuid())])
            .await?;

        match rows.and_then(|rows| rows.into_iter().next()) {
            Some(row) => self.hydrate(&row).await.map(Some),
            None => Ok(None),
        }
    }

    async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Option<Order>, PersistenceError> {
        let params = [
            SqlParam::from(*id.as_uuid()),
            SqlParam::from(status.as_str()),
            SqlParam::from(Utc::now()),
        ];
        let rows = self.db.query("order.update_status", UPDATE_STATUS, &params).await?;

        match rows.and_then(|rows| rows.into_iter().next()) {
            Some(row) => self.hydrate(&row).await.map(Some),
            None => Ok(None),
        }
    }
}
