//! Queue listeners owned by this service.
//!
//! Only one today: new orders arriving from the ordering context on
//! `COOK_ORDER_CREATE_QUEUE`.

use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use cook_core::{OrderId, ProductId};
use cook_messaging::{MessageHandler, QueueClient, QueueListener};
use cook_orders::OrderProduct;

use crate::config::{ConfigError, QueuePurpose, QueueSettings};
use crate::use_cases::orders::NewOrder;
use crate::use_cases::{OrderUseCases, UseCaseError};

/// Upstream sends the sequence either as text or as a bare number.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SequenceValue {
    Text(String),
    Number(i64),
}

impl SequenceValue {
    pub fn into_string(self) -> String {
        match self {
            SequenceValue::Text(s) => s,
            SequenceValue::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderLine {
    pub id: Uuid,
    #[serde(default)]
    pub customization: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderMessage {
    pub id: Uuid,
    pub sequence: SequenceValue,
    /// Informational; kitchen orders always start `PREPARING`.
    #[serde(default)]
    pub status: Option<String>,
    pub products: Vec<CreateOrderLine>,
}

impl From<CreateOrderMessage> for NewOrder {
    fn from(message: CreateOrderMessage) -> Self {
        NewOrder {
            id: OrderId::from_uuid(message.id),
            sequence: message.sequence.into_string(),
            products: message
                .products
                .into_iter()
                .map(|line| OrderProduct::new(ProductId::from_uuid(line.id), line.customization))
                .collect(),
        }
    }
}

/// Creates the kitchen order; an order that already exists counts as done.
#[derive(Clone)]
pub struct CreateOrderHandler {
    use_cases: OrderUseCases,
}

impl std::fmt::Debug for CreateOrderHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreateOrderHandler").finish_non_exhaustive()
    }
}

impl CreateOrderHandler {
    pub fn new(use_cases: OrderUseCases) -> Self {
        Self { use_cases }
    }
}

#[async_trait::async_trait]
impl MessageHandler for CreateOrderHandler {
    type Message = CreateOrderMessage;

    fn name(&self) -> &'static str {
        "create-order"
    }

    async fn handle(&self, message: CreateOrderMessage) -> anyhow::Result<()> {
        let order_id = message.id;
        info!(%order_id, upstream_status = ?message.status, "create order message received");

        match self.use_cases.create(message.into()).await {
            Ok(_) => Ok(()),
            Err(UseCaseError::Conflict(msg)) => {
                info!(%order_id, reason = %msg, "order already processed; acknowledging duplicate");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}

pub type CreateOrderListener<T> = QueueListener<T, CreateOrderHandler>;

/// Bind the create-order handler to its queue; fails if the queue is not configured.
pub fn create_order_listener<T>(
    client: QueueClient<T>,
    settings: &QueueSettings,
    use_cases: OrderUseCases,
) -> Result<CreateOrderListener<T>, ConfigError> {
    let channel = settings.channel(QueuePurpose::OrderCreated)?;
    Ok(QueueListener::new(client, channel, CreateOrderHandler::new(use_cases)))
}
