use std::fmt::Display;
use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info};

use cook_core::{OrderId, PersistenceError};
use cook_messaging::MessagePublisher;
use cook_orders::{Order, OrderProduct, OrderRepository, OrderStatus};
use cook_products::ProductRepository;

use super::UseCaseError;

pub type OrderPublisher = Arc<dyn MessagePublisher<Order>>;

/// An order handed over by the ordering context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub id: OrderId,
    pub sequence: String,
    pub products: Vec<OrderProduct>,
}

/// Kitchen-side order use cases.
#[derive(Clone)]
pub struct OrderUseCases {
    orders: Arc<dyn OrderRepository>,
    products: Arc<dyn ProductRepository>,
    evolve: OrderPublisher,
}

fn not_found(id: OrderId) -> UseCaseError {
    UseCaseError::NotFound(format!("Order with id {id} not found"))
}

fn conflict(id: OrderId) -> UseCaseError {
    UseCaseError::Conflict(format!("Order already exists with id: {id}"))
}

fn failed(operation: &'static str, err: impl Display) -> UseCaseError {
    error!(operation, error = %err, "use case failed");
    UseCaseError::Failed(err.to_string())
}

impl OrderUseCases {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        products: Arc<dyn ProductRepository>,
        evolve: OrderPublisher,
    ) -> Self {
        Self {
            orders,
            products,
            evolve,
        }
    }

    /// Store a new order in `PREPARING`.
    ///
    /// Every referenced product must exist. A second create with the same id is a
    /// [`UseCaseError::Conflict`], including when two creates race on the insert.
    pub async fn create(&self, new_order: NewOrder) -> Result<Order, UseCaseError> {
        let NewOrder { id, sequence, products } = new_order;
        info!(order_id = %id, sequence = %sequence, lines = products.len(), "create order started");

        let existing = self
            .orders
            .find_by_id(id)
            .await
            .map_err(|e| failed("create order", e))?;
        if existing.is_some() {
            return Err(conflict(id));
        }

        for line in &products {
            let product = self
                .products
                .find_by_id(line.product_id)
                .await
                .map_err(|e| failed("create order", e))?;
            if product.is_none() {
                return Err(UseCaseError::NotFound(format!(
                    "Product with id {} not found",
                    line.product_id
                )));
            }
        }

        let order = Order::receive(id, sequence, products, Utc::now())?;

        match self.orders.create(&order).await {
            Ok(created) => {
                info!(order_id = %id, status = %created.status(), "order created");
                Ok(created)
            }
            Err(PersistenceError::UniqueViolation { .. }) => Err(conflict(id)),
            Err(e) => Err(failed("create order", e)),
        }
    }

    pub async fn get_by_id(&self, id: OrderId) -> Result<Order, UseCaseError> {
        self.orders
            .find_by_id(id)
            .await
            .map_err(|e| failed("get order", e))?
            .ok_or_else(|| not_found(id))
    }

    /// Move the order forward to `status`, then tell the ordering context.
    ///
    /// Backward moves are rejected as invalid input. Repeating the current status
    /// changes nothing and publishes nothing.
    pub async fn update_status(&self, id: OrderId, status: OrderStatus) -> Result<Order, UseCaseError> {
        info!(order_id = %id, %status, "update order status started");

        let mut order = self.get_by_id(id).await?;
        let previous = order.status();
        order.advance_to(status, Utc::now())?;
        if order.status() == previous {
            return Ok(order);
        }

        let updated = self
            .orders
            .update_status(id, order.status())
            .await
            .map_err(|e| failed("update order status", e))?
            .ok_or_else(|| not_found(id))?;

        info!(order_id = %id, from = %previous, to = %updated.status(), "order status updated");

        if let Err(err) = self.evolve.publish(&updated).await {
            error!(order_id = %id, error = %err, "publish failed after write");
        }
        Ok(updated)
    }

    pub async fn mark_ready(&self, id: OrderId) -> Result<Order, UseCaseError> {
        self.update_status(id, OrderStatus::Ready).await
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use cook_core::{DomainError, ProductId};
    use cook_messaging::{InMemoryQueue, QueueClient};
    use cook_products::{Category, Price, ProductDetails, ProductDraft};

    use super::*;
    use crate::config::QueueSettings;
    use crate::publishers::EvolveOrderPublisher;
    use crate::repositories::{InMemoryOrderRepository, InMemoryProductRepository};

    struct Fixture {
        queue: Arc<InMemoryQueue>,
        publisher: Arc<EvolveOrderPublisher<Arc<InMemoryQueue>>>,
        products: Arc<InMemoryProductRepository>,
        use_cases: OrderUseCases,
    }

    fn fixture() -> Fixture {
        let queue = Arc::new(InMemoryQueue::default());
        let publisher = Arc::new(
            EvolveOrderPublisher::new(QueueClient::new(queue.clone()), &QueueSettings::local("cook"))
                .unwrap(),
        );
        let products = Arc::new(InMemoryProductRepository::new());
        let use_cases = OrderUseCases::new(
            Arc::new(InMemoryOrderRepository::new()),
            products.clone(),
            publisher.clone(),
        );

        Fixture {
            queue,
            publisher,
            products,
            use_cases,
        }
    }

    async fn stocked_product(f: &Fixture) -> ProductId {
        let details = ProductDetails::new(
            "Burger",
            Category::MainCourse,
            Price::new(Decimal::new(1500, 2)).unwrap(),
            "",
        )
        .unwrap();
        f.products
            .create(ProductDraft::new(details, Utc::now()))
            .await
            .unwrap()
            .id_typed()
    }

    async fn new_order(f: &Fixture) -> NewOrder {
        NewOrder {
            id: OrderId::new(),
            sequence: "12".to_string(),
            products: vec![OrderProduct::new(stocked_product(f).await, Some("no onions".to_string()))],
        }
    }

    #[tokio::test]
    async fn created_orders_start_preparing() {
        let f = fixture();
        let order = f.use_cases.create(new_order(&f).await).await.unwrap();

        assert_eq!(order.status(), OrderStatus::Preparing);
        assert_eq!(f.use_cases.get_by_id(order.id_typed()).await.unwrap(), order);
    }

    #[tokio::test]
    async fn duplicate_create_is_a_conflict() {
        let f = fixture();
        let input = new_order(&f).await;
        f.use_cases.create(input.clone()).await.unwrap();

        let err = f.use_cases.create(input.clone()).await.unwrap_err();
        assert_eq!(
            err,
            UseCaseError::Conflict(format!("Order already exists with id: {}", input.id))
        );
    }

    #[tokio::test]
    async fn unknown_product_is_not_found() {
        let f = fixture();
        let missing = ProductId::new();
        let input = NewOrder {
            id: OrderId::new(),
            sequence: "1".to_string(),
            products: vec![OrderProduct::new(missing, None)],
        };

        let err = f.use_cases.create(input).await.unwrap_err();
        assert_eq!(err, UseCaseError::NotFound(format!("Product with id {missing} not found")));
    }

    #[tokio::test]
    async fn empty_order_is_invalid_input() {
        let f = fixture();
        let input = NewOrder {
            id: OrderId::new(),
            sequence: "1".to_string(),
            products: vec![],
        };

        let err = f.use_cases.create(input).await.unwrap_err();
        assert!(matches!(err, UseCaseError::InvalidInput(DomainError::InvariantViolation(_))));
    }

    #[tokio::test]
    async fn advancing_status_persists_and_publishes() {
        let f = fixture();
        let order = f.use_cases.create(new_order(&f).await).await.unwrap();

        let ready = f.use_cases.mark_ready(order.id_typed()).await.unwrap();
        assert_eq!(ready.status(), OrderStatus::Ready);
        assert_eq!(
            f.use_cases.get_by_id(order.id_typed()).await.unwrap().status(),
            OrderStatus::Ready
        );
        assert_eq!(
            f.queue.bodies(f.publisher.channel()),
            vec![format!(r#"{{"orderId":"{}"}}"#, order.id_typed())]
        );
    }

    #[tokio::test]
    async fn backward_move_is_rejected_without_publishing() {
        let f = fixture();
        let order = f.use_cases.create(new_order(&f).await).await.unwrap();
        f.use_cases
            .update_status(order.id_typed(), OrderStatus::Finished)
            .await
            .unwrap();

        let err = f
            .use_cases
            .update_status(order.id_typed(), OrderStatus::Ready)
            .await
            .unwrap_err();
        assert!(matches!(err, UseCaseError::InvalidInput(DomainError::InvariantViolation(_))));
        assert_eq!(f.queue.len(f.publisher.channel()), 1);
    }

    #[tokio::test]
    async fn same_status_is_a_quiet_no_op() {
        let f = fixture();
        let order = f.use_cases.create(new_order(&f).await).await.unwrap();

        let same = f
            .use_cases
            .update_status(order.id_typed(), OrderStatus::Preparing)
            .await
            .unwrap();
        assert_eq!(same, order);
        assert!(f.queue.is_empty(f.publisher.channel()));
    }

    #[tokio::test]
    async fn status_of_missing_order_is_not_found() {
        let f = fixture();
        let err = f.use_cases.mark_ready(OrderId::new()).await.unwrap_err();
        assert!(matches!(err, UseCaseError::NotFound(_)));
    }
}
