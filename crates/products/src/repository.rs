use std::sync::Arc;

use cook_core::{PageRequest, PagedCollection, PersistenceError, ProductId};

use crate::product::{Product, ProductDraft};
use crate::value_objects::{Category, ProductStatus};

/// Storage port for the product catalog.
///
/// `Option` results mean "no such product"; errors are storage failures.
#[async_trait::async_trait]
pub trait ProductRepository: Send + Sync {
    /// Store a new product; storage assigns the id.
    async fn create(&self, draft: ProductDraft) -> Result<Product, PersistenceError>;

    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, PersistenceError>;

    async fn find_all(&self) -> Result<Vec<Product>, PersistenceError>;

    /// Persist the current descriptive fields and status of `product`.
    async fn update(&self, product: &Product) -> Result<Option<Product>, PersistenceError>;

    async fn inactivate(&self, id: ProductId) -> Result<Option<Product>, PersistenceError>;

    /// `None` when nothing matches the filter at all, so callers can tell
    /// "no data" apart from a page past the end.
    async fn find_page_by_category(
        &self,
        category: Category,
        status: ProductStatus,
        page: PageRequest,
    ) -> Result<Option<PagedCollection<Product>>, PersistenceError>;
}

#[async_trait::async_trait]
impl<R> ProductRepository for Arc<R>
where
    R: ProductRepository + ?Sized,
{
    async fn create(&self, draft: ProductDraft) -> Result<Product, PersistenceError> {
        (**self).create(draft).await
    }

    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, PersistenceError> {
        (**self).find_by_id(id).await
    }

    async fn find_all(&self) -> Result<Vec<Product>, PersistenceError> {
        (**self).find_all().await
    }

    async fn update(&self, product: &Product) -> Result<Option<Product>, PersistenceError> {
        (**self).update(product).await
    }

    async fn inactivate(&self, id: ProductId) -> Result<Option<Product>, PersistenceError> {
        (**self).inactivate(id).await
    }

    async fn find_page_by_category(
        &self,
        category: Category,
        status: ProductStatus,
        page: PageRequest,
    ) -> Result<Option<PagedCollection<Product>>, PersistenceError> {
        (**self).find_page_by_category(category, status, page).await
    }
}
