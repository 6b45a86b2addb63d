//! Typed domain errors.
//!
//! Business-rule violations are not retried: they terminate the
//! originating request or workflow branch instead of cycling through the
//! reliability pipeline.

use thiserror::Error;

/// A business-rule violation on the order aggregate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Orders need at least one route point.
    #[error("at least one point is required")]
    InvalidPoints,

    /// Orders need a payment method.
    #[error("payment method is required")]
    InvalidPayment,

    /// Orders need a customer.
    #[error("customer is required")]
    InvalidCustomer,

    /// A status change that the lifecycle state machine forbids.
    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: String,
        /// Requested status.
        to: String,
    },
}
