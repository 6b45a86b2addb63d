//! # Orderflow Order Domain
//!
//! The order aggregate and the repository seam the workflow engine's
//! activities persist through. The aggregate is mutated exclusively by the
//! workflow engine once created; everything here is broker-agnostic.

pub mod error;
pub mod order;
pub mod repository;

pub use error::DomainError;
pub use order::{CreatorRole, Order, OrderStatus, Point, PointKind};
pub use repository::{OrderRepository, RepositoryError};
