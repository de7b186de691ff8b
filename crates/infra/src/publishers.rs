//! Concrete publishers: product catalog changes and order evolution, sent to the
//! downstream order-assembly context.
//!
//! Each publisher resolves its channel from [`QueueSettings`] when it is built, so
//! a missing queue name fails at startup rather than on the first publish.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use cook_messaging::{ChannelId, ChannelPublisher, MessagePublisher, QueueClient, QueueTransport, TransportError};
use cook_orders::Order;
use cook_products::Product;

use crate::config::{ConfigError, QueuePurpose, QueueSettings};

/// Product state as the order-assembly context consumes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductMessage {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub status: String,
}

impl From<&Product> for ProductMessage {
    fn from(product: &Product) -> Self {
        Self {
            id: *product.id_typed().as_uuid(),
            name: product.name().to_string(),
            category: product.category().as_str().to_string(),
            description: product.description().to_string(),
            price: product.price().value(),
            status: product.status().as_str().to_string(),
        }
    }
}

/// Tells the ordering context an order's status changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvolveOrderMessage {
    pub order_id: Uuid,
}

/// Publishes a [`ProductMessage`] for one kind of catalog change.
#[derive(Debug)]
pub struct ProductEventPublisher<T> {
    event: &'static str,
    inner: ChannelPublisher<T, ProductMessage>,
}

impl<T> ProductEventPublisher<T> {
    fn build(
        event: &'static str,
        purpose: QueuePurpose,
        client: QueueClient<T>,
        settings: &QueueSettings,
    ) -> Result<Self, ConfigError> {
        let channel = settings.channel(purpose)?;
        Ok(Self {
            event,
            inner: ChannelPublisher::new(client, channel),
        })
    }

    pub fn created(client: QueueClient<T>, settings: &QueueSettings) -> Result<Self, ConfigError> {
        Self::build("product created", QueuePurpose::ProductCreated, client, settings)
    }

    pub fn updated(client: QueueClient<T>, settings: &QueueSettings) -> Result<Self, ConfigError> {
        Self::build("product updated", QueuePurpose::ProductUpdated, client, settings)
    }

    pub fn inactivated(client: QueueClient<T>, settings: &QueueSettings) -> Result<Self, ConfigError> {
        Self::build("product inactivated", QueuePurpose::ProductInactivated, client, settings)
    }

    pub fn channel(&self) -> &ChannelId {
        self.inner.channel()
    }
}

#[async_trait::async_trait]
impl<T> MessagePublisher<Product> for ProductEventPublisher<T>
where
    T: QueueTransport,
{
    async fn publish(&self, product: &Product) -> Result<(), TransportError> {
        self.inner.publish(&ProductMessage::from(product)).await?;
        info!(event = self.event, product_id = %product.id_typed(), channel = %self.channel(), "event published");
        Ok(())
    }
}

/// Publishes an [`EvolveOrderMessage`] on `ORDER_STATUS_UPDATE_QUEUE`.
#[derive(Debug)]
pub struct EvolveOrderPublisher<T> {
    inner: ChannelPublisher<T, EvolveOrderMessage>,
}

impl<T> EvolveOrderPublisher<T> {
    pub fn new(client: QueueClient<T>, settings: &QueueSettings) -> Result<Self, ConfigError> {
        let channel = settings.channel(QueuePurpose::OrderStatusUpdated)?;
        Ok(Self {
            inner: ChannelPublisher::new(client, channel),
        })
    }

    pub fn channel(&self) -> &ChannelId {
        self.inner.channel()
    }
}

#[async_trait::async_trait]
impl<T> MessagePublisher<Order> for EvolveOrderPublisher<T>
where
    T: QueueTransport,
{
    async fn publish(&self, order: &Order) -> Result<(), TransportError> {
        let message = EvolveOrderMessage {
            order_id: *order.id_typed().as_uuid(),
        };
        self.inner.publish(&message).await?;
        info!(order_id = %order.id_typed(), status = %order.status(), "order evolve event published");
        Ok(())
    }
}
