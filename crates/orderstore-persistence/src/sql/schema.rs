//! Relational provisioning
//!
//! Creates the target database and the `DbOrder` table when they are missing.
//! Every statement is idempotent, so provisioning runs on each process start.

use sea_orm::sea_query::{Alias, ColumnDef, Table, TableCreateStatement};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend, DbErr, Statement,
};
use tracing::info;
use url::Url;

use crate::entity::db_order;
use crate::error::{Operation, PersistenceError, Result};
use crate::model::{DecimalPrecision, StorageBackend};

fn provision_error(err: DbErr) -> PersistenceError {
    PersistenceError::engine(StorageBackend::Relational, Operation::Provision, None, err)
}

/// Database names are interpolated into DDL, so only plain identifiers are accepted.
fn validate_database_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(PersistenceError::configuration(format!(
            "invalid database name '{}' in connection string",
            name
        )))
    }
}

/// Make sure the database named by `url` exists and return the URL to connect with.
///
/// - MySQL: `CREATE DATABASE IF NOT EXISTS` through a server-level connection
/// - PostgreSQL: `pg_database` lookup, then `CREATE DATABASE` through the `postgres` database
/// - SQLite: the file is opened in create mode; in-memory databases need nothing
pub async fn ensure_database(url: &str) -> Result<String> {
    if url.trim().is_empty() {
        return Err(PersistenceError::configuration(
            "No valid connection string found",
        ));
    }

    if url.starts_with("sqlite:") {
        if url.contains(":memory:") || url.contains("mode=") {
            return Ok(url.to_string());
        }
        let separator = if url.contains('?') { '&' } else { '?' };
        return Ok(format!("{}{}mode=rwc", url, separator));
    }

    let parsed = Url::parse(url).map_err(|e| {
        PersistenceError::configuration(format!("malformed connection string: {}", e))
    })?;
    let database = parsed.path().trim_start_matches('/').to_string();
    validate_database_name(&database)?;

    match parsed.scheme() {
        "mysql" => {
            let mut server_url = parsed.clone();
            server_url.set_path("");
            let server = connect_admin(server_url.as_str()).await?;
            server
                .execute_unprepared(&format!("CREATE DATABASE IF NOT EXISTS `{}`", database))
                .await
                .map_err(provision_error)?;
            server.close().await.map_err(provision_error)?;
        }
        "postgres" | "postgresql" => {
            let mut server_url = parsed.clone();
            server_url.set_path("/postgres");
            let server = connect_admin(server_url.as_str()).await?;
            let exists = server
                .query_one(Statement::from_sql_and_values(
                    DbBackend::Postgres,
                    "SELECT 1 FROM pg_database WHERE datname = $1",
                    [database.clone().into()],
                ))
                .await
                .map_err(provision_error)?
                .is_some();
            if !exists {
                server
                    .execute_unprepared(&format!("CREATE DATABASE \"{}\"", database))
                    .await
                    .map_err(provision_error)?;
            }
            server.close().await.map_err(provision_error)?;
        }
        other => {
            return Err(PersistenceError::configuration(format!(
                "unsupported database scheme '{}'",
                other
            )));
        }
    }

    info!(database = %database, "Database provisioned");
    Ok(url.to_string())
}

async fn connect_admin(url: &str) -> Result<DatabaseConnection> {
    let mut opt = ConnectOptions::new(url.to_string());
    opt.max_connections(1).min_connections(1).sqlx_logging(false);
    Database::connect(opt).await.map_err(provision_error)
}

/// `CREATE TABLE IF NOT EXISTS` statement for the `DbOrder` table.
///
/// SQLite has no fixed-point type, so the price is stored as REAL there; the
/// entity conversions still round every value to the relational scale.
pub fn create_order_table(backend: DbBackend) -> TableCreateStatement {
    let precision = DecimalPrecision::RELATIONAL;

    let mut unit_price = ColumnDef::new(db_order::Column::UnitPrice);
    match backend {
        DbBackend::Sqlite => unit_price.double(),
        _ => unit_price.decimal_len(precision.precision, precision.scale),
    };
    unit_price.not_null();

    let mut created_at = ColumnDef::new(db_order::Column::CreatedAt);
    match backend {
        DbBackend::MySql => created_at.custom(Alias::new("DATETIME(6)")),
        _ => created_at.timestamp_with_time_zone(),
    };
    created_at.not_null();

    Table::create()
        .table(db_order::Entity)
        .if_not_exists()
        .col(
            ColumnDef::new(db_order::Column::Id)
                .string_len(64)
                .not_null()
                .primary_key(),
        )
        .col(ColumnDef::new(db_order::Column::ProductName).text().not_null())
        .col(ColumnDef::new(db_order::Column::Quantity).integer().not_null())
        .col(&mut unit_price)
        .col(&mut created_at)
        .to_owned()
}

/// Create the `DbOrder` table if it does not exist
pub async fn ensure_order_table(db: &DatabaseConnection) -> Result<()> {
    let backend = db.get_database_backend();
    let statement = backend.build(&create_order_table(backend));
    db.execute(statement).await.map_err(provision_error)?;
    info!(table = "DbOrder", ?backend, "Order table provisioned");
    Ok(())
}
