use std::sync::Arc;

use cook_core::{OrderId, PersistenceError};

use crate::order::{Order, OrderStatus};

/// Storage port for kitchen orders.
#[async_trait::async_trait]
pub trait OrderRepository: Send + Sync {
    /// Insert the order and its product lines atomically.
    ///
    /// A duplicate id surfaces as [`PersistenceError::UniqueViolation`].
    async fn create(&self, order: &Order) -> Result<Order, PersistenceError>;

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, PersistenceError>;

    async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Option<Order>, PersistenceError>;
}

#[async_trait::async_trait]
impl<R> OrderRepository for Arc<R>
where
    R: OrderRepository + ?Sized,
{
    async fn create(&self, order: &Order) -> Result<Order, PersistenceError> {
        (**self).create(order).await
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, PersistenceError> {
        (**self).find_by_id(id).await
    }

    async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Option<Order>, PersistenceError> {
        (**self).update_status(id, status).await
    }
}
