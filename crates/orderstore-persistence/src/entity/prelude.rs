pub use super::db_order::Entity as DbOrder;
