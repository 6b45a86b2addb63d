//! The order aggregate root.
//!
//! Ids are UUIDv7: globally unique, externally visible and
//! lexicographically sortable by creation time. The workflow id is derived
//! deterministically from the order id so any component holding an order
//! can address its workflow instance.

use crate::error::DomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Lifecycle status of an order.
///
/// `Completed` and `Cancelled` are terminal: once reached, no further
/// transition is permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Looking for a driver.
    Finding,
    /// A driver was assigned at creation (driver-created orders).
    Assigned,
    /// A driver accepted and the order is on its way.
    Dispatched,
    /// Delivered; terminal.
    Completed,
    /// Cancelled by signal or dispatch timeout; terminal.
    Cancelled,
}

impl OrderStatus {
    /// Whether this status permits no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Wire representation (`SCREAMING_SNAKE_CASE`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Finding => "FINDING",
            Self::Assigned => "ASSIGNED",
            Self::Dispatched => "DISPATCHED",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who created the order; drives the initial status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreatorRole {
    /// Back-office staff.
    Admin,
    /// The assigned driver (order starts `ASSIGNED`).
    Driver,
    /// The customer (order starts `FINDING`).
    Customer,
}

/// Kind of a route point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointKind {
    /// Where the driver collects.
    Pickup,
    /// Final destination.
    Dropoff,
    /// Intermediate stop.
    Stop,
}

/// One point on the order's route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Pickup, dropoff or stop.
    pub kind: PointKind,
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lng: f64,
    /// Human-readable address.
    pub address: String,
    /// Position in the route.
    pub sequence: u32,
}

/// Customer descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    /// Customer id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Contact phone.
    pub phone: String,
}

/// Driver descriptor; absent until assignment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Driver {
    /// Driver id.
    pub id: String,
    /// Display name.
    pub name: String,
}

/// Service descriptor (opaque to the core).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    /// Service id.
    pub id: i64,
    /// Service name.
    pub name: String,
}

/// Payment descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    /// Payment method identifier; must be non-empty.
    pub method: String,
    /// Amount to charge.
    pub amount: f64,
}

/// The order aggregate root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Globally unique, sortable id.
    pub id: String,
    /// Deterministically derived workflow instance id.
    pub workflow_id: String,
    /// Who created the order.
    pub created_by: String,
    /// Creator role; drives the initial status.
    pub creator_role: CreatorRole,
    /// Current lifecycle status.
    pub status: OrderStatus,
    /// Customer details.
    pub customer: Customer,
    /// Assigned driver, if any.
    pub driver: Option<Driver>,
    /// Requested service.
    pub service: Service,
    /// Payment details.
    pub payment: Payment,
    /// Route points, ordered by sequence; never empty on a valid order.
    pub points: Vec<Point>,
    /// Opaque key-value bag.
    pub metadata: HashMap<String, serde_json::Value>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Create a new order with a fresh id, derived workflow id and the
    /// role-appropriate initial status.
    #[must_use]
    pub fn new(created_by: impl Into<String>, creator_role: CreatorRole) -> Self {
        let id = Uuid::now_v7().to_string();
        let now = Utc::now();
        Self {
            workflow_id: Self::workflow_id_for(&id),
            id,
            created_by: created_by.into(),
            creator_role,
            status: match creator_role {
                CreatorRole::Driver => OrderStatus::Assigned,
                CreatorRole::Admin | CreatorRole::Customer => OrderStatus::Finding,
            },
            customer: Customer::default(),
            driver: None,
            service: Service::default(),
            payment: Payment::default(),
            points: Vec::new(),
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Derive the workflow instance id for an order id.
    #[must_use]
    pub fn workflow_id_for(order_id: &str) -> String {
        format!("order_{order_id}")
    }

    /// Validate aggregate invariants before persistence.
    ///
    /// # Errors
    ///
    /// Returns a [`DomainError`] for missing points, payment method or
    /// customer.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.points.is_empty() {
            return Err(DomainError::InvalidPoints);
        }
        if self.payment.method.is_empty() {
            return Err(DomainError::InvalidPayment);
        }
        if self.customer.id.is_empty() {
            return Err(DomainError::InvalidCustomer);
        }
        Ok(())
    }

    /// Whether the order is in a terminal status.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_order() -> Order {
        let mut order = Order::new("u-1", CreatorRole::Customer);
        order.customer = Customer {
            id: "c-1".to_string(),
            name: "Ada".to_string(),
            phone: "+1000".to_string(),
        };
        order.payment = Payment {
            method: "card-1".to_string(),
            amount: 12.5,
        };
        order.points = vec![
            Point {
                kind: PointKind::Pickup,
                lat: 1.0,
                lng: 2.0,
                address: "A".to_string(),
                sequence: 0,
            },
            Point {
                kind: PointKind::Dropoff,
                lat: 3.0,
                lng: 4.0,
                address: "B".to_string(),
                sequence: 1,
            },
        ];
        order
    }

    #[test]
    fn customer_orders_start_finding() {
        assert_eq!(
            Order::new("u-1", CreatorRole::Customer).status,
            OrderStatus::Finding
        );
    }

    #[test]
    fn driver_orders_start_assigned() {
        assert_eq!(
            Order::new("d-1", CreatorRole::Driver).status,
            OrderStatus::Assigned
        );
    }

    #[test]
    fn workflow_id_is_derived_from_order_id() {
        let order = Order::new("u-1", CreatorRole::Customer);
        assert_eq!(order.workflow_id, format!("order_{}", order.id));
    }

    #[test]
    fn ids_sort_by_creation_time() {
        // UUIDv7 string form is lexicographically ordered by timestamp
        let first = Order::new("u-1", CreatorRole::Customer);
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = Order::new("u-1", CreatorRole::Customer);
        assert!(first.id < second.id);
    }

    #[test]
    fn validation_rejects_empty_points() {
        let mut order = valid_order();
        order.points.clear();
        assert_eq!(order.validate(), Err(DomainError::InvalidPoints));
    }

    #[test]
    fn validation_rejects_missing_payment_method() {
        let mut order = valid_order();
        order.payment.method.clear();
        assert_eq!(order.validate(), Err(DomainError::InvalidPayment));
    }

    #[test]
    fn validation_accepts_complete_order() {
        assert_eq!(valid_order().validate(), Ok(()));
    }

    #[test]
    fn terminal_statuses() {
        assert!(OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(!OrderStatus::Dispatched.is_terminal());
    }

    #[test]
    fn status_wire_format_round_trips() {
        let json = serde_json::to_string(&OrderStatus::Dispatched).unwrap_or_default();
        assert_eq!(json, r#""DISPATCHED""#);
    }
}
