use chrono::{DateTime, Utc};

use cook_core::{DomainError, DomainResult, Entity, ProductId};

use crate::value_objects::{Category, Price, ProductStatus};

/// Validated descriptive fields shared by creation and updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductDetails {
    pub name: String,
    pub category: Category,
    pub price: Price,
    pub description: String,
}

impl ProductDetails {
    pub fn new(
        name: impl Into<String>,
        category: Category,
        price: Price,
        description: impl Into<String>,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("product name", name, "a non-empty name"));
        }
        Ok(Self {
            name,
            category,
            price,
            description: description.into(),
        })
    }
}

/// A product that has not been stored yet and therefore has no id.
///
/// Always `Active`: new catalog entries start orderable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductDraft {
    details: ProductDetails,
    created_at: DateTime<Utc>,
}

impl ProductDraft {
    pub fn new(details: ProductDetails, now: DateTime<Utc>) -> Self {
        Self {
            details,
            created_at: now,
        }
    }

    pub fn details(&self) -> &ProductDetails {
        &self.details
    }

    pub fn status(&self) -> ProductStatus {
        ProductStatus::Active
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Attach the id assigned by storage.
    pub fn into_product(self, id: ProductId) -> Product {
        Product {
            id,
            details: self.details,
            status: ProductStatus::Active,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

/// Raw persisted shape of a product, before value objects are re-validated.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductSnapshot {
    pub id: ProductId,
    pub name: String,
    pub category: String,
    pub price: rust_decimal::Decimal,
    pub description: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Aggregate root: Product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    details: ProductDetails,
    status: ProductStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Product {
    /// Rebuild a product from stored values.
    ///
    /// Every value object is validated again; callers reading from storage should
    /// treat a failure here as corrupt data.
    pub fn rehydrate(snapshot: ProductSnapshot) -> DomainResult<Self> {
        let category = snapshot.category.parse::<Category>()?;
        let status = snapshot.status.parse::<ProductStatus>()?;
        let price = Price::new(snapshot.price)?;
        let details = ProductDetails::new(snapshot.name, category, price, snapshot.description)?;

        Ok(Self {
            id: snapshot.id,
            details,
            status,
            created_at: snapshot.created_at,
            updated_at: snapshot.updated_at,
        })
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.details.name
    }

    pub fn category(&self) -> Category {
        self.details.category
    }

    pub fn price(&self) -> Price {
        self.details.price
    }

    pub fn description(&self) -> &str {
        &self.details.description
    }

    pub fn status(&self) -> ProductStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_active(&self) -> bool {
        self.status == ProductStatus::Active
    }

    /// Replace the descriptive fields. Status is untouched.
    pub fn update_details(&mut self, details: ProductDetails, now: DateTime<Utc>) {
        self.details = details;
        self.updated_at = now;
    }

    /// Soft-delete. Inactivating twice is harmless.
    pub fn inactivate(&mut self, now: DateTime<Utc>) {
        if self.status != ProductStatus::Inactive {
            self.status = ProductStatus::Inactive;
            self.updated_at = now;
        }
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
