//! SQL-based persistence backend (MySQL/PostgreSQL/SQLite via SeaORM)
//!
//! Orders live in the `DbOrder` table and are addressed by primary key. Every
//! mutating call runs in its own transaction and commits before returning.

pub mod schema;

use std::time::Duration;

use async_trait::async_trait;
use sea_orm::{
    ActiveValue::{NotSet, Set},
    ColumnTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, SqlErr, TransactionTrait,
};
use tracing::{debug, error, info};

use crate::entity::db_order;
use crate::error::{Operation, PersistenceError, Result};
use crate::model::{DecimalPrecision, Order, StorageBackend};
use crate::traits::{OrderPersistence, PersistenceService};

/// Connection pool settings for the relational backend
#[derive(Clone, Debug)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub acquire_timeout: Duration,
    pub idle_timeout: Option<Duration>,
    pub max_lifetime: Option<Duration>,
    pub sqlx_logging: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 100,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            acquire_timeout: Duration::from_secs(8),
            idle_timeout: Some(Duration::from_secs(10)),
            max_lifetime: Some(Duration::from_secs(1800)),
            sqlx_logging: false,
        }
    }
}

impl PoolConfig {
    /// Pool for a volatile SQLite database.
    ///
    /// The database lives as long as its single connection. The pool would
    /// otherwise retire connections after its own default lifetime, so both
    /// timeouts are pushed out of reach.
    pub fn in_memory() -> Self {
        let never = Duration::from_secs(u64::from(u32::MAX));
        Self {
            max_connections: 1,
            min_connections: 1,
            idle_timeout: Some(never),
            max_lifetime: Some(never),
            ..Default::default()
        }
    }

    pub fn connect_options(&self, url: String) -> ConnectOptions {
        let mut opt = ConnectOptions::new(url);
        opt.max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .connect_timeout(self.connect_timeout)
            .acquire_timeout(self.acquire_timeout)
            .sqlx_logging(self.sqlx_logging)
            .sqlx_logging_level(tracing::log::LevelFilter::Debug);
        if let Some(idle_timeout) = self.idle_timeout {
            opt.idle_timeout(idle_timeout);
        }
        if let Some(max_lifetime) = self.max_lifetime {
            opt.max_lifetime(max_lifetime);
        }
        opt
    }
}

/// Relational persistence service
///
/// Wraps a SeaORM `DatabaseConnection`. The pool hands each statement its own
/// connection, so concurrent callers never share a session.
pub struct SqlOrderPersistService {
    db: DatabaseConnection,
    backend: StorageBackend,
    precision: DecimalPrecision,
}

impl SqlOrderPersistService {
    /// Provision the database and table, then connect.
    pub async fn connect(url: &str, pool: &PoolConfig, backend: StorageBackend) -> Result<Self> {
        let url = schema::ensure_database(url).await?;

        info!(
            max_connections = pool.max_connections,
            min_connections = pool.min_connections,
            connect_timeout = ?pool.connect_timeout,
            idle_timeout = ?pool.idle_timeout,
            max_lifetime = ?pool.max_lifetime,
            sqlx_logging = pool.sqlx_logging,
            "Database connection pool configured"
        );

        let db = Database::connect(pool.connect_options(url))
            .await
            .map_err(|e| {
                PersistenceError::engine(backend, Operation::Provision, None, e)
            })?;

        Self::from_connection(db, backend).await
    }

    /// Provision the table on an existing connection.
    pub async fn from_connection(db: DatabaseConnection, backend: StorageBackend) -> Result<Self> {
        schema::ensure_order_table(&db).await?;
        let precision = db_order::unit_price_precision(db.get_database_backend());
        Ok(Self {
            db,
            backend,
            precision,
        })
    }

    /// Get a reference to the underlying database connection
    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Close the connection pool
    pub async fn close(self) -> Result<()> {
        let backend = self.backend;
        self.db
            .close()
            .await
            .map_err(|e| PersistenceError::engine(backend, Operation::Provision, None, e))
    }

    fn engine_error(&self, operation: Operation, id: Option<&str>, err: DbErr) -> PersistenceError {
        error!(
            backend = %self.backend,
            operation = %operation,
            order_id = id.unwrap_or_default(),
            error = %err,
            "Relational engine failure"
        );
        PersistenceError::engine(self.backend, operation, None, err)
    }
}

// ============================================================================
// PersistenceService implementation
// ============================================================================

#[async_trait]
impl PersistenceService for SqlOrderPersistService {
    fn storage_backend(&self) -> StorageBackend {
        self.backend
    }

    async fn health_check(&self) -> Result<()> {
        self.db
            .ping()
            .await
            .map_err(|e| self.engine_error(Operation::HealthCheck, None, e))
    }
}

// ============================================================================
// OrderPersistence implementation
// ============================================================================

#[async_trait]
impl OrderPersistence for SqlOrderPersistService {
    async fn order_add(&self, order: Order) -> Result<Order> {
        let model = db_order::Model::from_order(&order, self.precision)?;
        let id = model.id.clone();
        let active = db_order::ActiveModel {
            id: Set(model.id.clone()),
            product_name: Set(model.product_name.clone()),
            quantity: Set(model.quantity),
            unit_price: Set(model.unit_price),
            created_at: Set(model.created_at),
        };

        let op = Operation::Add;
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| self.engine_error(op, Some(&id), e))?;

        if let Err(e) = db_order::Entity::insert(active)
            .exec_without_returning(&txn)
            .await
        {
            if let Some(SqlErr::UniqueConstraintViolation(_)) = e.sql_err() {
                debug!(order_id = %id, "Order already exists");
                return Err(PersistenceError::DuplicateKey { id });
            }
            return Err(self.engine_error(op, Some(&id), e));
        }

        txn.commit()
            .await
            .map_err(|e| self.engine_error(op, Some(&id), e))?;

        debug!(order_id = %id, "Order inserted");
        model.into_order(self.precision)
    }

    async fn order_get_by_id(&self, id: &str) -> Result<Option<Order>> {
        let model = db_order::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await
            .map_err(|e| self.engine_error(Operation::GetById, Some(id), e))?;

        model.map(|m| m.into_order(self.precision)).transpose()
    }

    async fn order_find_all(&self) -> Result<Vec<Order>> {
        let models = db_order::Entity::find()
            .order_by_asc(db_order::Column::CreatedAt)
            .order_by_asc(db_order::Column::Id)
            .all(&self.db)
            .await
            .map_err(|e| self.engine_error(Operation::GetAll, None, e))?;

        models
            .into_iter()
            .map(|m| m.into_order(self.precision))
            .collect()
    }

    async fn order_update(&self, order: &Order) -> Result<bool> {
        let model = db_order::Model::from_order(order, self.precision)?;
        let id = model.id.clone();
        let op = Operation::Update;

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| self.engine_error(op, Some(&id), e))?;

        let existing = db_order::Entity::find_by_id(id.clone())
            .one(&txn)
            .await
            .map_err(|e| self.engine_error(op, Some(&id), e))?;
        if existing.is_none() {
            debug!(order_id = %id, "Order to update does not exist");
            return Err(PersistenceError::NotFound { id });
        }

        db_order::Entity::update_many()
            .set(db_order::ActiveModel {
                id: NotSet,
                product_name: Set(model.product_name),
                quantity: Set(model.quantity),
                unit_price: Set(model.unit_price),
                created_at: Set(model.created_at),
            })
            .filter(db_order::Column::Id.eq(id.as_str()))
            .exec(&txn)
            .await
            .map_err(|e| self.engine_error(op, Some(&id), e))?;

        txn.commit()
            .await
            .map_err(|e| self.engine_error(op, Some(&id), e))?;

        debug!(order_id = %id, "Order updated");
        Ok(true)
    }

    async fn order_delete(&self, order: &Order) -> Result<bool> {
        let id = order.id();
        let op = Operation::Delete;

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| self.engine_error(op, Some(id), e))?;

        let result = db_order::Entity::delete_by_id(id.to_string())
            .exec(&txn)
            .await
            .map_err(|e| self.engine_error(op, Some(id), e))?;

        txn.commit()
            .await
            .map_err(|e| self.engine_error(op, Some(id), e))?;

        debug!(order_id = %id, rows_affected = result.rows_affected, "Order delete executed");
        Ok(result.rows_affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    async fn create_test_service() -> SqlOrderPersistService {
        SqlOrderPersistService::connect(
            "sqlite::memory:",
            &PoolConfig::in_memory(),
            StorageBackend::InMemoryRelational,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_add_and_get() {
        let svc = create_test_service().await;
        let order = Order::new("Shoes", 2, dec!(35.50));

        let added = svc.order_add(order.clone()).await.unwrap();
        assert_eq!(added, order);

        let found = svc.order_get_by_id(order.id()).await.unwrap();
        assert_eq!(found, Some(order));

        let missing = svc.order_get_by_id("nonexistent").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_add_duplicate_keeps_first() {
        let svc = create_test_service().await;
        let first = Order::with_id("dup", "First", 1, dec!(1.00)).unwrap();
        let second = Order::with_id("dup", "Second", 9, dec!(9.00)).unwrap();

        svc.order_add(first.clone()).await.unwrap();
        let err = svc.order_add(second).await.unwrap_err();
        assert!(err.is_duplicate_key());

        let found = svc.order_get_by_id("dup").await.unwrap().unwrap();
        assert_eq!(found.product_name, "First");
        assert_eq!(found.quantity, 1);
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let svc = create_test_service().await;
        let order = Order::new("Ghost", 1, dec!(1.00));

        let err = svc.order_update(&order).await.unwrap_err();
        assert!(matches!(err, PersistenceError::NotFound { ref id } if id == order.id()));
        assert!(svc.order_get_by_id(order.id()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_price_is_rounded_to_two_digits() {
        let svc = create_test_service().await;
        let order = Order::new("Product 3", 12, dec!(30.505));

        let added = svc.order_add(order.clone()).await.unwrap();
        assert_eq!(added.unit_price, dec!(30.51));

        let found = svc.order_get_by_id(order.id()).await.unwrap().unwrap();
        assert_eq!(found.unit_price, dec!(30.51));
        assert_eq!(found.unit_price.scale(), 2);
    }

    #[tokio::test]
    async fn test_sqlite_price_round_trips_or_is_rejected() {
        let svc = create_test_service().await;

        let big = Order::new("Big", 1, dec!(1234567890123456.78));
        let err = svc.order_add(big.clone()).await.unwrap_err();
        assert!(matches!(err, PersistenceError::InvalidRecord { ref id, .. } if id == big.id()));
        assert!(svc.order_get_by_id(big.id()).await.unwrap().is_none());

        let large = Order::new("Large", 1, dec!(9999999999999.99));
        let added = svc.order_add(large.clone()).await.unwrap();
        let found = svc.order_get_by_id(large.id()).await.unwrap().unwrap();
        assert_eq!(added, large);
        assert_eq!(found, large);
    }

    #[tokio::test]
    async fn test_health_check_and_backend() {
        let svc = create_test_service().await;
        svc.health_check().await.unwrap();
        assert_eq!(svc.storage_backend(), StorageBackend::InMemoryRelational);
        svc.close().await.unwrap();
    }
}
