use std::fmt::Display;
use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info};

use cook_core::{PageRequest, PagedCollection, ProductId};
use cook_messaging::MessagePublisher;
use cook_products::{Category, Product, ProductDetails, ProductDraft, ProductRepository, ProductStatus};

use super::UseCaseError;

pub type ProductPublisher = Arc<dyn MessagePublisher<Product>>;

/// One publisher per catalog change, each bound to its own queue.
#[derive(Clone)]
pub struct ProductPublishers {
    pub created: ProductPublisher,
    pub updated: ProductPublisher,
    pub inactivated: ProductPublisher,
}

/// Catalog use cases: create, read, update and inactivate products.
#[derive(Clone)]
pub struct ProductUseCases {
    repository: Arc<dyn ProductRepository>,
    publishers: ProductPublishers,
}

fn not_found(id: ProductId) -> UseCaseError {
    UseCaseError::NotFound(format!("Product with id {id} not found"))
}

fn failed(operation: &'static str, err: impl Display) -> UseCaseError {
    error!(operation, error = %err, "use case failed");
    UseCaseError::Failed(err.to_string())
}

impl ProductUseCases {
    pub fn new(repository: Arc<dyn ProductRepository>, publishers: ProductPublishers) -> Self {
        Self {
            repository,
            publishers,
        }
    }

    pub async fn create(&self, details: ProductDetails) -> Result<Product, UseCaseError> {
        info!(name = %details.name, category = %details.category, "create product started");

        let product = self
            .repository
            .create(ProductDraft::new(details, Utc::now()))
            .await
            .map_err(|e| failed("create product", e))?;

        announce(&self.publishers.created, &product, "product created").await;
        Ok(product)
    }

    pub async fn list_all(&self) -> Result<Vec<Product>, UseCaseError> {
        self.repository
            .find_all()
            .await
            .map_err(|e| failed("list products", e))
    }

    pub async fn get_by_id(&self, id: ProductId) -> Result<Product, UseCaseError> {
        self.repository
            .find_by_id(id)
            .await
            .map_err(|e| failed("get product", e))?
            .ok_or_else(|| not_found(id))
    }

    /// Active products of `category`; `None` when the category has none at all.
    pub async fn list_by_category(
        &self,
        category: Category,
        page: PageRequest,
    ) -> Result<Option<PagedCollection<Product>>, UseCaseError> {
        self.repository
            .find_page_by_category(category, ProductStatus::Active, page)
            .await
            .map_err(|e| failed("list products by category", e))
    }

    pub async fn update(&self, id: ProductId, details: ProductDetails) -> Result<Product, UseCaseError> {
        info!(product_id = %id, "update product started");

        let mut product = self.get_by_id(id).await?;
        product.update_details(details, Utc::now());

        let updated = self
            .repository
            .update(&product)
            .await
            .map_err(|e| failed("update product", e))?
            .ok_or_else(|| not_found(id))?;

        announce(&self.publishers.updated, &updated, "product updated").await;
        Ok(updated)
    }

    /// Inactivate (soft delete); inactivating twice is harmless.
    pub async fn inactivate(&self, id: ProductId) -> Result<Product, UseCaseError> {
        info!(product_id = %id, "inactivate product started");

        self.get_by_id(id).await?;
        let product = self
            .repository
            .inactivate(id)
            .await
            .map_err(|e| failed("inactivate product", e))?
            .ok_or_else(|| not_found(id))?;

        announce(&self.publishers.inactivated, &product, "product inactivated").await;
        Ok(product)
    }
}

async fn announce(publisher: &ProductPublisher, product: &Product, event: &'static str) {
    if let Err(err) = publisher.publish(product).await {
        error!(event, product_id = %product.id_typed(), error = %err, "publish failed after write");
    }
}
