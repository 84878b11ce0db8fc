//! Order entity, mapped to the `DbOrder` table
//!
//! Conversions to and from [`Order`] apply the column's [`DecimalPrecision`]
//! to every decimal value and keep timestamps at microsecond precision, so
//! what `add` returns is exactly what a later read returns.

use chrono::SubsecRound;
use sea_orm::DbBackend;
use sea_orm::entity::prelude::*;

use crate::error::PersistenceError;
use crate::model::{DecimalPrecision, Order};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "DbOrder")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_name = "id")]
    pub id: String,
    #[sea_orm(column_name = "ProductName", column_type = "Text")]
    pub product_name: String,
    #[sea_orm(column_name = "Quantity")]
    pub quantity: i32,
    #[sea_orm(column_name = "UnitPrice", column_type = "Decimal(Some((18, 2)))")]
    pub unit_price: Decimal,
    #[sea_orm(column_name = "CreatedAt")]
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Precision of the `UnitPrice` column on `backend`.
///
/// SQLite keeps the column as REAL, which only holds 15 significant digits
/// exactly.
pub fn unit_price_precision(backend: DbBackend) -> DecimalPrecision {
    match backend {
        DbBackend::Sqlite => DecimalPrecision::SQLITE,
        _ => DecimalPrecision::RELATIONAL,
    }
}

fn normalize(
    id: &str,
    value: Decimal,
    policy: DecimalPrecision,
) -> crate::error::Result<Decimal> {
    policy
        .normalize(value)
        .ok_or_else(|| PersistenceError::InvalidRecord {
            id: id.to_string(),
            reason: format!(
                "value {} does not fit decimal({}, {})",
                value, policy.precision, policy.scale
            ),
        })
}

impl Model {
    /// Build the row for `order` under `policy`.
    pub fn from_order(order: &Order, policy: DecimalPrecision) -> crate::error::Result<Self> {
        Ok(Self {
            id: order.id().to_string(),
            product_name: order.product_name.clone(),
            quantity: order.quantity,
            unit_price: normalize(order.id(), order.unit_price, policy)?,
            created_at: order.created_at.trunc_subsecs(6),
        })
    }

    /// Rebuild the order stored in this row.
    pub fn into_order(self, policy: DecimalPrecision) -> crate::error::Result<Order> {
        let unit_price = normalize(&self.id, self.unit_price, policy)?;
        Ok(Order::from_parts(
            self.id,
            self.product_name,
            self.quantity,
            unit_price,
            self.created_at,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike, Utc};
    use rust_decimal_macros::dec;

    #[test]
    fn test_order_to_model_applies_precision() {
        let order = Order::with_id("order-1", "Shoes", 2, dec!(30.505)).unwrap();
        let model = Model::from_order(&order, DecimalPrecision::RELATIONAL).unwrap();
        assert_eq!(model.id, "order-1");
        assert_eq!(model.unit_price, dec!(30.51));
        assert_eq!(model.created_at, order.created_at);
    }

    #[test]
    fn test_model_to_order_applies_precision() {
        let model = Model {
            id: "order-2".to_string(),
            product_name: "Bag".to_string(),
            quantity: 1,
            // SQLite hands REAL values back with binary noise
            unit_price: dec!(10.9899999999),
            created_at: chrono::Utc::now(),
        };
        let order = model.into_order(DecimalPrecision::SQLITE).unwrap();
        assert_eq!(order.id(), "order-2");
        assert_eq!(order.unit_price, dec!(10.99));
    }

    #[test]
    fn test_overflowing_price_is_rejected() {
        let order = Order::with_id("order-3", "Yacht", 1, dec!(12345678901234567)).unwrap();
        let err = Model::from_order(&order, DecimalPrecision::RELATIONAL).unwrap_err();
        assert!(matches!(err, PersistenceError::InvalidRecord { ref id, .. } if id == "order-3"));
    }

    #[test]
    fn test_sqlite_rejects_prices_beyond_real_precision() {
        let order = Order::with_id("order-4", "Big", 1, dec!(1234567890123456.78)).unwrap();
        assert!(Model::from_order(&order, DecimalPrecision::RELATIONAL).is_ok());

        let policy = unit_price_precision(DbBackend::Sqlite);
        let err = Model::from_order(&order, policy).unwrap_err();
        assert!(matches!(err, PersistenceError::InvalidRecord { ref id, .. } if id == "order-4"));

        let order = Order::with_id("order-5", "Large", 1, dec!(9999999999999.99)).unwrap();
        assert_eq!(
            Model::from_order(&order, policy).unwrap().unit_price,
            dec!(9999999999999.99)
        );
        assert_eq!(
            unit_price_precision(DbBackend::Postgres),
            DecimalPrecision::RELATIONAL
        );
    }

    #[test]
    fn test_created_at_is_truncated_to_microseconds() {
        let created_at = Utc
            .with_ymd_and_hms(2024, 5, 1, 12, 30, 0)
            .unwrap()
            .with_nanosecond(123_456_789)
            .unwrap();
        let mut order = Order::with_id("order-6", "Clock", 1, dec!(1.00)).unwrap();
        order.created_at = created_at;

        let model = Model::from_order(&order, DecimalPrecision::RELATIONAL).unwrap();
        assert_eq!(model.created_at.nanosecond(), 123_456_000);

        let restored = model.into_order(DecimalPrecision::RELATIONAL).unwrap();
        assert_eq!(restored.created_at.nanosecond(), 123_456_000);
    }
}
