//! SeaORM entities for the relational backend

pub mod prelude;

pub mod db_order;
