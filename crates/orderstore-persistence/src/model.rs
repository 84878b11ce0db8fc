//! Domain model types for the persistence abstraction layer
//!
//! These types are shared by every storage backend and are decoupled from the
//! relational entity and the document layout.

use chrono::{DateTime, SubsecRound, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{PersistenceError, Result};

/// Name of the identity field. The document partition key path is derived from it.
pub const ID_FIELD: &str = "id";

/// An order record, the only entity handled by the persistence layer.
///
/// The id doubles as the relational primary key, the document id and the
/// document partition key value. It is fixed at construction and never empty.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(deserialize_with = "deserialize_id")]
    id: String,
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub quantity: i32,
    #[serde(default, with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
    #[serde(default = "now")]
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Create an order with a freshly generated id and the current time.
    pub fn new(product_name: impl Into<String>, quantity: i32, unit_price: Decimal) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            product_name: product_name.into(),
            quantity,
            unit_price,
            created_at: now(),
        }
    }

    /// Create an order with a caller-supplied id.
    pub fn with_id(
        id: impl Into<String>,
        product_name: impl Into<String>,
        quantity: i32,
        unit_price: Decimal,
    ) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(PersistenceError::InvalidRecord {
                id,
                reason: "order id must not be empty".to_string(),
            });
        }
        Ok(Self {
            id,
            product_name: product_name.into(),
            quantity,
            unit_price,
            created_at: now(),
        })
    }

    /// Rebuild an order from stored values.
    pub(crate) fn from_parts(
        id: String,
        product_name: String,
        quantity: i32,
        unit_price: Decimal,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            product_name,
            quantity,
            unit_price,
            created_at,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Replace the creation timestamp, truncated to microseconds.
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at.trunc_subsecs(6);
        self
    }
}

/// Current UTC time at microsecond precision.
///
/// Every supported relational engine keeps microseconds, so a value produced
/// here survives a storage round trip unchanged.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn deserialize_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let id = String::deserialize(deserializer)?;
    if id.trim().is_empty() {
        return Err(serde::de::Error::custom("order id must not be empty"));
    }
    Ok(id)
}

/// Fixed-point precision policy for decimal columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecimalPrecision {
    /// Total number of significant digits
    pub precision: u32,
    /// Digits after the decimal point
    pub scale: u32,
}

impl DecimalPrecision {
    /// Policy applied to every decimal column of the relational mapping.
    pub const RELATIONAL: Self = Self {
        precision: 18,
        scale: 2,
    };

    /// Same scale, narrowed to the digits an SQLite REAL round-trips exactly.
    pub const SQLITE: Self = Self {
        precision: 15,
        scale: 2,
    };

    /// Round to `scale` digits (midpoint away from zero).
    ///
    /// Returns `None` when the integer part does not fit in
    /// `precision - scale` digits.
    pub fn normalize(&self, value: Decimal) -> Option<Decimal> {
        let mut rounded =
            value.round_dp_with_strategy(self.scale, RoundingStrategy::MidpointAwayFromZero);
        let integer_digits = self.precision.saturating_sub(self.scale);
        let limit = Decimal::from(10u64.checked_pow(integer_digits)?);
        if rounded.abs() >= limit {
            return None;
        }
        rounded.rescale(self.scale);
        Some(rounded)
    }
}

/// Storage backend selected at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageBackend {
    /// External relational database (MySQL/PostgreSQL via SeaORM)
    Relational,
    /// Volatile in-memory SQLite database, relational semantics
    InMemoryRelational,
    /// Document store addressed by partition key (Azure Cosmos DB)
    Document,
}

impl StorageBackend {
    pub fn is_relational(&self) -> bool {
        matches!(
            self,
            StorageBackend::Relational | StorageBackend::InMemoryRelational
        )
    }
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::Relational => write!(f, "relational"),
            StorageBackend::InMemoryRelational => write!(f, "in_memory_relational"),
            StorageBackend::Document => write!(f, "document"),
        }
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "relational" => Ok(StorageBackend::Relational),
            "in_memory_relational" => Ok(StorageBackend::InMemoryRelational),
            "document" => Ok(StorageBackend::Document),
            _ => Err(format!("Invalid storage backend: {}", s)),
        }
    }
}
