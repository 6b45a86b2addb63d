//! Workflow activities: the side-effecting steps the engine invokes.
//!
//! Activities are single-purpose and idempotent: the engine may re-execute
//! one after a transient failure, and the underlying status overwrite makes
//! that safe. A payment charge returning `false` is not an error; it aborts
//! the owning transition as a business outcome.

use async_trait::async_trait;
use orderflow_order::{DomainError, OrderRepository, OrderStatus, RepositoryError};
use std::sync::Arc;
use thiserror::Error;

/// A transient or permanent activity failure.
///
/// All activity errors are retried by the engine's activity retry policy;
/// exhaustion fails the owning workflow instance.
#[derive(Error, Debug, Clone)]
pub enum ActivityError {
    /// Persistence failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Lifecycle rule violation, such as writing over a terminal status.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// External gateway failure.
    #[error("gateway error: {0}")]
    Gateway(String),
}

/// A customer's stored payment method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentMethod {
    /// Gateway identifier for the method.
    pub id: String,
}

/// External payment gateway, specified only at its interface boundary.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Stored payment methods for a customer.
    ///
    /// # Errors
    ///
    /// Gateway/network failures; retried by the engine.
    async fn payment_methods(&self, customer_id: &str) -> Result<Vec<PaymentMethod>, ActivityError>;

    /// Charge `amount` against a payment method. `Ok(false)` means the
    /// charge was declined.
    ///
    /// # Errors
    ///
    /// Gateway/network failures; retried by the engine.
    async fn pay(&self, amount: f64, payment_method_id: &str) -> Result<bool, ActivityError>;
}

/// The activity set invoked by the workflow engine.
#[async_trait]
pub trait Activities: Send + Sync {
    /// Overwrite the order status. Safe to re-execute: writing the status
    /// the order already has is a no-op.
    ///
    /// # Errors
    ///
    /// Persistence failures (retried by the engine), or a
    /// [`DomainError::InvalidTransition`] when the order is already in a
    /// terminal status.
    async fn update_status(&self, order_id: &str, status: OrderStatus) -> Result<(), ActivityError>;

    /// Charge the order's payment. Returns whether the charge went
    /// through; `false` aborts the owning transition.
    ///
    /// # Errors
    ///
    /// Gateway or persistence failures; retried by the engine.
    async fn charge(&self, order_id: &str) -> Result<bool, ActivityError>;
}

/// Production activities over the repository and payment gateway.
pub struct OrderActivities {
    repository: Arc<dyn OrderRepository>,
    gateway: Arc<dyn PaymentGateway>,
}

impl OrderActivities {
    /// Create the activity set.
    #[must_use]
    pub fn new(repository: Arc<dyn OrderRepository>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self {
            repository,
            gateway,
        }
    }
}

#[async_trait]
impl Activities for OrderActivities {
    async fn update_status(&self, order_id: &str, status: OrderStatus) -> Result<(), ActivityError> {
        let order = self.repository.get_by_id(order_id).await?;
        if order.status == status {
            // Re-execution after a transient failure; the write already took.
            return Ok(());
        }
        if order.status.is_terminal() {
            tracing::warn!(
                order_id,
                from = %order.status,
                to = %status,
                "Refusing status write on a terminal order"
            );
            return Err(DomainError::InvalidTransition {
                from: order.status.as_str().to_string(),
                to: status.as_str().to_string(),
            }
            .into());
        }
        self.repository.update_status(order_id, status).await?;
        tracing::info!(order_id, status = %status, "Order status updated");
        Ok(())
    }

    async fn charge(&self, order_id: &str) -> Result<bool, ActivityError> {
        let order = self.repository.get_by_id(order_id).await?;
        if order.is_terminal() {
            tracing::warn!(
                order_id,
                status = %order.status,
                "Refusing to charge a terminal order"
            );
            return Err(DomainError::InvalidTransition {
                from: order.status.as_str().to_string(),
                to: OrderStatus::Dispatched.as_str().to_string(),
            }
            .into());
        }

        // Prefer the method attached to the order, fall back to the
        // customer's first stored method.
        let method_id = if order.payment.method.is_empty() {
            let methods = self.gateway.payment_methods(&order.customer.id).await?;
            match methods.into_iter().next() {
                Some(method) => method.id,
                None => {
                    tracing::warn!(order_id, "No payment methods found for customer");
                    return Ok(false);
                }
            }
        } else {
            order.payment.method.clone()
        };

        let paid = self.gateway.pay(order.payment.amount, &method_id).await?;
        tracing::info!(order_id, paid, "Payment charge attempted");
        Ok(paid)
    }
}
