use core::fmt;
use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cook_core::{DomainError, DomainResult, Entity, OrderId, ProductId, ValueObject};

/// Order status lifecycle, in kitchen order.
///
/// The declaration order is the lifecycle order, so `Ord` compares progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Received,
    Preparing,
    Ready,
    Finished,
}

impl OrderStatus {
    pub const ALL: &'static [OrderStatus] = &[
        OrderStatus::Received,
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::Finished,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Received => "RECEIVED",
            OrderStatus::Preparing => "PREPARING",
            OrderStatus::Ready => "READY",
            OrderStatus::Finished => "FINISHED",
        }
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                DomainError::validation(
                    "order status",
                    s,
                    "one of RECEIVED, PREPARING, READY, FINISHED",
                )
            })
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ValueObject for OrderStatus {}

/// A product line inside an order. Lives and dies with its order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderProduct {
    pub product_id: ProductId,
    pub customization: Option<String>,
}

impl OrderProduct {
    pub fn new(product_id: ProductId, customization: Option<String>) -> Self {
        Self {
            product_id,
            customization,
        }
    }
}

/// Raw persisted shape of an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSnapshot {
    pub id: OrderId,
    pub sequence: String,
    pub status: String,
    pub products: Vec<OrderProduct>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Aggregate root: Order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    sequence: String,
    status: OrderStatus,
    products: Vec<OrderProduct>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Order {
    /// Accept an order handed over by the ordering context.
    ///
    /// Orders enter the kitchen already `Preparing`.
    pub fn receive(
        id: OrderId,
        sequence: impl Into<String>,
        products: Vec<OrderProduct>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let sequence = sequence.into();
        if sequence.trim().is_empty() {
            return Err(DomainError::validation("order sequence", sequence, "a non-empty sequence"));
        }
        if products.is_empty() {
            return Err(DomainError::invariant(format!("order {id} has no products")));
        }

        Ok(Self {
            id,
            sequence,
            status: OrderStatus::Preparing,
            products,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rebuild an order from stored values; the status token is validated again.
    pub fn rehydrate(snapshot: OrderSnapshot) -> DomainResult<Self> {
        let status = snapshot.status.parse::<OrderStatus>()?;
        Ok(Self {
            id: snapshot.id,
            sequence: snapshot.sequence,
            status,
            products: snapshot.products,
            created_at: snapshot.created_at,
            updated_at: snapshot.updated_at,
        })
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn sequence(&self) -> &str {
        &self.sequence
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn products(&self) -> &[OrderProduct] {
        &self.products
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Move the order forward to `next`.
    ///
    /// Staying on the current status is a no-op; going backwards is rejected.
    pub fn advance_to(&mut self, next: OrderStatus, now: DateTime<Utc>) -> DomainResult<()> {
        if next < self.status {
            return Err(DomainError::invariant(format!(
                "order {} cannot move from {} back to {}",
                self.id, self.status, next
            )));
        }
        if next != self.status {
            self.status = next;
            self.updated_at = now;
        }
        Ok(())
    }

    pub fn set_status_ready(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.advance_to(OrderStatus::Ready, now)
    }

    pub fn set_status_finished(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.advance_to(OrderStatus::Finished, now)
    }

    /// Drop the product lines (the order itself stays).
    pub fn remove_products(&mut self, now: DateTime<Utc>) {
        if !self.products.is_empty() {
            self.products.clear();
            self.updated_at = now;
        }
    }
}

impl Entity for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
