//! Sample orders written at startup when `seed.enabled` is set

use orderstore_persistence::{Order, Result};
use rust_decimal_macros::dec;
use tracing::info;

use super::storage::Storage;

/// Orders written to a relational backend
pub fn relational_seed_orders() -> Vec<Order> {
    vec![
        Order::new("School Bag", 1, dec!(10.99)),
        Order::new("Shoes", 2, dec!(35.50)),
    ]
}

/// Order written to a document backend through the generic item writer
pub fn document_seed_order() -> Order {
    Order::new("Product 3", 12, dec!(30.50))
}

/// Write the sample orders for the active backend, returns how many were written
pub async fn seed_orders(storage: &Storage) -> Result<usize> {
    if let Some(writer) = storage.item_writer() {
        let order = document_seed_order();
        writer.add_item(&order).await?;
        info!(order_id = %order.id(), "Seeded document order");
        return Ok(1);
    }

    let service = storage.service();
    let orders = relational_seed_orders();
    let count = orders.len();
    for order in orders {
        let added = service.order_add(order).await?;
        info!(order_id = %added.id(), product = %added.product_name, "Seeded order");
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use orderstore_persistence::{
        ContainerRef, InMemoryDocumentClient, PoolConfig, SqlOrderPersistService, StorageBackend,
    };
    use std::sync::Arc;

    #[tokio::test]
    async fn test_seed_relational() {
        let svc = SqlOrderPersistService::connect(
            "sqlite::memory:",
            &PoolConfig::in_memory(),
            StorageBackend::InMemoryRelational,
        )
        .await
        .unwrap();
        let storage = Storage::relational(svc);

        assert_eq!(seed_orders(&storage).await.unwrap(), 2);

        let mut names: Vec<String> = storage
            .service()
            .order_find_all()
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.product_name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["School Bag", "Shoes"]);
    }

    #[tokio::test]
    async fn test_seed_document() {
        let client = Arc::new(InMemoryDocumentClient::new());
        let storage = Storage::document(client, ContainerRef::new("OrderDb", "Orders"))
            .await
            .unwrap();

        assert_eq!(seed_orders(&storage).await.unwrap(), 1);

        let all = storage.service().order_find_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].product_name, "Product 3");
        assert_eq!(all[0].quantity, 12);
        assert_eq!(all[0].unit_price, dec!(30.50));
    }
}
