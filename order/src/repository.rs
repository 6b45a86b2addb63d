//! Repository seam for order persistence.
//!
//! The core consumes persistence through this narrow interface; a status
//! overwrite (`UPDATE ... WHERE id = ...`) is naturally idempotent, which
//! is what lets the workflow engine re-execute activities safely.

use crate::order::{Order, OrderStatus};
use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by the repository.
#[derive(Error, Debug, Clone)]
pub enum RepositoryError {
    /// No order with the given id.
    #[error("order not found: {0}")]
    NotFound(String),

    /// Underlying store failure (treated as a retryable activity failure).
    #[error("storage error: {0}")]
    Storage(String),
}

/// Order persistence operations consumed by the core.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Fetch an order by id.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::NotFound`] when no such order exists.
    async fn get_by_id(&self, id: &str) -> Result<Order, RepositoryError>;

    /// Overwrite the status of an order.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::NotFound`] or [`RepositoryError::Storage`].
    async fn update_status(&self, id: &str, status: OrderStatus) -> Result<(), RepositoryError>;

    /// Persist a new order.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::Storage`] on write failure.
    async fn create(&self, order: &Order) -> Result<(), RepositoryError>;
}
