use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;

use cook_core::{OrderId, PageRequest, PagedCollection, PersistenceError, ProductId};
use cook_orders::{Order, OrderRepository, OrderStatus};
use cook_products::{Category, Product, ProductDraft, ProductRepository, ProductStatus};

fn poisoned() -> PersistenceError {
    PersistenceError::Connection("in-memory store lock poisoned".to_string())
}

/// In-memory product catalog for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryProductRepository {
    inner: RwLock<HashMap<ProductId, Product>>,
}

impl InMemoryProductRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Products in storage order (creation time, then id).
    fn sorted(&self) -> Result<Vec<Product>, PersistenceError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        let mut products: Vec<Product> = map.values().cloned().collect();
        products.sort_by_key(|p| (p.created_at(), *p.id_typed().as_uuid()));
        Ok(products)
    }
}

#[async_trait::async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn create(&self, draft: ProductDraft) -> Result<Product, PersistenceError> {
        let product = draft.into_product(ProductId::new());
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        map.insert(product.id_typed(), product.clone());
        Ok(product)
    }

    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, PersistenceError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map.get(&id).cloned())
    }

    async fn find_all(&self) -> Result<Vec<Product>, PersistenceError> {
        self.sorted()
    }

    async fn update(&self, product: &Product) -> Result<Option<Product>, PersistenceError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        Ok(map.get_mut(&product.id_typed()).map(|stored| {
            *stored = product.clone();
            product.clone()
        }))
    }

    async fn inactivate(&self, id: ProductId) -> Result<Option<Product>, PersistenceError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        Ok(map.get_mut(&id).map(|stored| {
            stored.inactivate(Utc::now());
            stored.clone()
        }))
    }

    async fn find_page_by_category(
        &self,
        category: Category,
        status: ProductStatus,
        page: PageRequest,
    ) -> Result<Option<PagedCollection<Product>>, PersistenceError> {
        let matching: Vec<Product> = self
            .sorted()?
            .into_iter()
            .filter(|p| p.category() == category && p.status() == status)
            .collect();

        if matching.is_empty() {
            return Ok(None);
        }

        let total = matching.len() as u64;
        let content = matching
            .into_iter()
            .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(page.size()).unwrap_or(usize::MAX))
            .collect();

        Ok(Some(PagedCollection::new(content, total, page.page(), page.size())))
    }
}

/// In-memory order store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryOrderRepository {
    inner: RwLock<HashMap<OrderId, Order>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn create(&self, order: &Order) -> Result<Order, PersistenceError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        if map.contains_key(&order.id_typed()) {
            return Err(PersistenceError::UniqueViolation {
                operation: "order.create".to_string(),
                message: format!("duplicate key value: id={}", order.id_typed()),
            });
        }
        map.insert(order.id_typed(), order.clone());
        Ok(order.clone())
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, PersistenceError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map.get(&id).cloned())
    }

    /// Stores the status as given; transition rules belong to the caller.
    async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Option<Order>, PersistenceError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        let Some(stored) = map.get(&id) else {
            return Ok(None);
        };

        let updated = Order::rehydrate(cook_orders::OrderSnapshot {
            id,
            sequence: stored.sequence().to_string(),
            status: status.as_str().to_string(),
            products: stored.products().to_vec(),
            created_at: stored.created_at(),
            updated_at: Utc::now(),
        })
        .map_err(PersistenceError::from)?;

        map.insert(id, updated.clone());
        Ok(Some(updated))
    }
}
