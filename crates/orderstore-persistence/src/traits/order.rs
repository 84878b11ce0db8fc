//! Order persistence trait
//!
//! Defines the interface for order storage operations. Every call is an
//! independent round trip to the engine; dropping the returned future cancels it.

use async_trait::async_trait;

use crate::error::Result;
use crate::model::Order;

/// Order persistence operations
#[async_trait]
pub trait OrderPersistence: Send + Sync {
    /// Insert a new order and return it as stored.
    ///
    /// Fails with `DuplicateKey` when an order with the same id exists.
    async fn order_add(&self, order: Order) -> Result<Order>;

    /// Get an order by its id, `None` when it does not exist
    async fn order_get_by_id(&self, id: &str) -> Result<Option<Order>>;

    /// Find all orders. Ordering is backend-defined.
    async fn order_find_all(&self) -> Result<Vec<Order>>;

    /// Replace every field of an order
    async fn order_update(&self, order: &Order) -> Result<bool>;

    /// Delete an order by its id, `false` when it does not exist
    async fn order_delete(&self, order: &Order) -> Result<bool>;
}
