//! In-memory order repository with failure injection.

use async_trait::async_trait;
use orderflow_order::{Order, OrderRepository, OrderStatus, RepositoryError};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Order store backed by a map, for tests.
///
/// `fail_next_writes` injects transient storage errors to exercise
/// activity retry paths.
#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: Mutex<HashMap<String, Order>>,
    failing_writes: AtomicUsize,
}

impl InMemoryOrderRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an order directly.
    pub fn insert(&self, order: Order) {
        self.orders
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(order.id.clone(), order);
    }

    /// Make the next `n` write operations fail with a storage error.
    pub fn fail_next_writes(&self, n: usize) {
        self.failing_writes.store(n, Ordering::SeqCst);
    }

    /// Current status of an order, if present.
    #[must_use]
    pub fn status_of(&self, id: &str) -> Option<OrderStatus> {
        self.orders
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(id)
            .map(|o| o.status)
    }

    fn take_injected_failure(&self) -> bool {
        self.failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn get_by_id(&self, id: &str) -> Result<Order, RepositoryError> {
        self.orders
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn update_status(&self, id: &str, status: OrderStatus) -> Result<(), RepositoryError> {
        if self.take_injected_failure() {
            return Err(RepositoryError::Storage("injected write failure".to_string()));
        }
        let mut orders = self
            .orders
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let order = orders
            .get_mut(id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        order.status = status;
        order.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn create(&self, order: &Order) -> Result<(), RepositoryError> {
        if self.take_injected_failure() {
            return Err(RepositoryError::Storage("injected write failure".to_string()));
        }
        self.orders
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(order.id.clone(), order.clone());
        Ok(())
    }
}
