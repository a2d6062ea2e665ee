//! In-memory repositories.
//!
//! Same observable behavior as the `PostgreSQL` repositories (unique slugs,
//! one order per payment intent, stock decrement on order) without a
//! database. Used by the integration tests and for local demos.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use atelier_core::design_request::{DesignRequest, NewDesignRequest};
use atelier_core::order::{NewOrder, Order};
use atelier_core::product::{Product, ValidatedProduct};
use atelier_core::{DesignRequestId, DesignRequestStatus, OrderId, ProductId};

use crate::{
    DesignRequestRepository, OrderRepository, ProductRepository, ProductScope, RepositoryError,
};

#[derive(Debug, Default)]
struct State {
    products: BTreeMap<ProductId, Product>,
    orders: BTreeMap<OrderId, Order>,
    design_requests: BTreeMap<DesignRequestId, DesignRequest>,
    next_id: i64,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn slug_taken(&self, slug: &str, except: Option<ProductId>) -> bool {
        self.products
            .values()
            .any(|p| p.slug == slug && Some(p.id) != except)
    }
}

/// Process-local store implementing every repository trait.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first<T>(
    items: impl DoubleEndedIterator<Item = T>,
    limit: i64,
    offset: i64,
) -> Vec<T> {
    let offset = usize::try_from(offset.max(0)).unwrap_or(usize::MAX);
    let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
    items.rev().skip(offset).take(limit).collect()
}

fn featured_order(products: &BTreeMap<ProductId, Product>) -> Vec<Product> {
    let mut featured: Vec<Product> = products.values().filter(|p| p.featured).cloned().collect();
    featured.sort_by(|a, b| {
        let placement = match (a.featured_order, b.featured_order) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        };
        placement
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
            .then_with(|| a.id.cmp(&b.id))
    });
    featured
}

#[async_trait]
impl ProductRepository for InMemoryStore {
    async fn list(&self, scope: ProductScope) -> Result<Vec<Product>, RepositoryError> {
        let state = self.state.read().await;
        let mut products: Vec<Product> = state
            .products
            .values()
            .filter(|p| scope == ProductScope::All || p.is_visible())
            .cloned()
            .collect();
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(products)
    }

    async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.state.read().await.products.get(&id).cloned())
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.products.values().find(|p| p.slug == slug).cloned())
    }

    async fn create(&self, product: &ValidatedProduct) -> Result<Product, RepositoryError> {
        let mut state = self.state.write().await;
        if state.slug_taken(&product.slug, None) {
            return Err(RepositoryError::Conflict("slug already exists".to_owned()));
        }
        let now = Utc::now();
        let id = ProductId::new(state.next_id());
        let created = Product {
            id,
            slug: product.slug.clone(),
            name: product.name.clone(),
            description: product.description.clone(),
            category: product.category,
            material: product.material,
            gem_type: product.gem_type.clone(),
            gem_color: product.gem_color.clone(),
            size: product.size.clone(),
            price: product.price,
            stock: product.stock,
            status: product.status,
            featured: product.featured,
            featured_order: product.featured_order,
            images: product.images.clone(),
            created_at: now,
            updated_at: now,
        };
        state.products.insert(id, created.clone());
        Ok(created)
    }

    async fn update(
        &self,
        id: ProductId,
        product: &ValidatedProduct,
    ) -> Result<Product, RepositoryError> {
        let mut state = self.state.write().await;
        if !state.products.contains_key(&id) {
            return Err(RepositoryError::NotFound);
        }
        if state.slug_taken(&product.slug, Some(id)) {
            return Err(RepositoryError::Conflict("slug already exists".to_owned()));
        }
        let existing = state
            .products
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        existing.slug.clone_from(&product.slug);
        existing.name.clone_from(&product.name);
        existing.description.clone_from(&product.description);
        existing.category = product.category;
        existing.material = product.material;
        existing.gem_type.clone_from(&product.gem_type);
        existing.gem_color.clone_from(&product.gem_color);
        existing.size.clone_from(&product.size);
        existing.price = product.price;
        existing.stock = product.stock;
        existing.status = product.status;
        existing.featured = product.featured;
        existing.featured_order = product.featured_order;
        existing.images.clone_from(&product.images);
        existing.updated_at = Utc::now();
        Ok(existing.clone())
    }

    async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        self.state
            .write()
            .await
            .products
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }

    async fn set_featured(
        &self,
        id: ProductId,
        featured: bool,
        order: Option<i32>,
    ) -> Result<Product, RepositoryError> {
        let mut state = self.state.write().await;
        let product = state
            .products
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        product.featured = featured;
        product.featured_order = if featured { order } else { None };
        product.updated_at = Utc::now();
        Ok(product.clone())
    }

    async fn reorder_featured(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let mut state = self.state.write().await;
        for id in ids {
            match state.products.get(id) {
                None => return Err(RepositoryError::NotFound),
                Some(p) if !p.featured => {
                    return Err(RepositoryError::Conflict(format!(
                        "product {id} is not featured"
                    )));
                }
                Some(_) => {}
            }
        }
        let now = Utc::now();
        for (position, id) in ids.iter().enumerate() {
            if let Some(product) = state.products.get_mut(id) {
                product.featured_order = i32::try_from(position).ok();
                product.updated_at = now;
            }
        }
        Ok(featured_order(&state.products))
    }

    async fn list_featured(&self) -> Result<Vec<Product>, RepositoryError> {
        Ok(featured_order(&self.state.read().await.products))
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn create(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        let mut state = self.state.write().await;
        if state
            .orders
            .values()
            .any(|o| o.payment_intent_id == order.payment_intent_id)
        {
            return Err(RepositoryError::Conflict(
                "an order already exists for this payment".to_owned(),
            ));
        }

        for line in &order.lines {
            if let Some(product) = state.products.get_mut(&line.product_id) {
                let quantity = i32::try_from(line.quantity).unwrap_or(i32::MAX);
                product.stock = product.stock.saturating_sub(quantity).max(0);
            }
        }

        let id = OrderId::new(state.next_id());
        let created = Order {
            id,
            order_number: order.order_number.clone(),
            email: order.email.clone(),
            shipping: order.shipping.clone(),
            shipping_method: order.shipping_method,
            lines: order.lines.clone(),
            subtotal: order.totals.subtotal,
            shipping_cost: order.totals.shipping,
            tax: order.totals.tax,
            total: order.totals.total,
            payment_intent_id: order.payment_intent_id.clone(),
            status: order.status,
            created_at: Utc::now(),
        };
        state.orders.insert(id, created.clone());
        Ok(created)
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn get_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .values()
            .find(|o| o.payment_intent_id == payment_intent_id)
            .cloned())
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Order>, RepositoryError> {
        let state = self.state.read().await;
        Ok(newest_first(state.orders.values().cloned(), limit, offset))
    }
}

#[async_trait]
impl DesignRequestRepository for InMemoryStore {
    async fn create(&self, request: &NewDesignRequest) -> Result<DesignRequest, RepositoryError> {
        let mut state = self.state.write().await;
        let id = DesignRequestId::new(state.next_id());
        let created = DesignRequest {
            id,
            name: request.name.clone(),
            email: request.email.clone(),
            phone: request.phone.clone(),
            jewelry_type: request.jewelry_type,
            preferred_material: request.preferred_material,
            gem_preferences: request.gem_preferences.clone(),
            budget_range: request.budget_range.clone(),
            description: request.description.clone(),
            timeline: request.timeline.clone(),
            status: DesignRequestStatus::New,
            created_at: Utc::now(),
        };
        state.design_requests.insert(id, created.clone());
        Ok(created)
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<DesignRequest>, RepositoryError> {
        let state = self.state.read().await;
        Ok(newest_first(
            state.design_requests.values().cloned(),
            limit,
            offset,
        ))
    }

    async fn update_status(
        &self,
        id: DesignRequestId,
        status: DesignRequestStatus,
    ) -> Result<DesignRequest, RepositoryError> {
        let mut state = self.state.write().await;
        let request = state
            .design_requests
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        request.status = status;
        Ok(request.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use atelier_core::product::{Category, Material, ProductInput};
    use atelier_core::{Money, ProductStatus};

    use super::*;

    fn validated(name: &str) -> ValidatedProduct {
        ProductInput {
            slug: None,
            name: name.to_owned(),
            description: "Cast in recycled silver.".to_owned(),
            category: Category::Necklaces,
            material: Material::Silver,
            gem_type: None,
            gem_color: None,
            size: None,
            price: Money::from_cents(6_000),
            stock: 4,
            status: ProductStatus::Active,
            featured: false,
            featured_order: None,
            images: vec![],
        }
        .validate()
        .unwrap()
    }

    #[tokio::test]
    async fn slugs_are_unique() {
        let store = InMemoryStore::new();
        ProductRepository::create(&store, &validated("Fern Pendant"))
            .await
            .unwrap();
        let err = ProductRepository::create(&store, &validated("Fern Pendant"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn active_scope_hides_drafts() {
        let store = InMemoryStore::new();
        let mut draft = validated("Unreleased Chain");
        draft.status = ProductStatus::Draft;
        ProductRepository::create(&store, &draft).await.unwrap();
        ProductRepository::create(&store, &validated("Box Chain"))
            .await
            .unwrap();

        assert_eq!(ProductRepository::list(&store, ProductScope::All).await.unwrap().len(), 2);
        let active = ProductRepository::list(&store, ProductScope::Active).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active.first().unwrap().slug, "box-chain");
    }

    #[tokio::test]
    async fn reorder_requires_featured_products() {
        let store = InMemoryStore::new();
        let a = ProductRepository::create(&store, &validated("A Locket"))
            .await
            .unwrap();
        let b = ProductRepository::create(&store, &validated("B Locket"))
            .await
            .unwrap();

        let err = store.reorder_featured(&[a.id, b.id]).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));

        store.set_featured(a.id, true, None).await.unwrap();
        store.set_featured(b.id, true, None).await.unwrap();
        let ordered = store.reorder_featured(&[b.id, a.id]).await.unwrap();
        let ids: Vec<ProductId> = ordered.iter().map(|p| p.id).collect();
        assert_eq!(ids, [b.id, a.id]);

        let err = store
            .reorder_featured(&[ProductId::new(999)])
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));

        let unflagged = store.set_featured(a.id, false, Some(3)).await.unwrap();
        assert_eq!(unflagged.featured_order, None);
    }

    #[tokio::test]
    async fn update_and_delete_missing_product() {
        let store = InMemoryStore::new();
        let err = store
            .update(ProductId::new(5), &validated("Ghost"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
        assert!(matches!(
            ProductRepository::delete(&store, ProductId::new(5)).await,
            Err(RepositoryError::NotFound)
        ));
    }
}
