//! Database connection and table creation.
//!
//! `SQLite` via `SeaORM`; tables are generated from the entity definitions
//! with `Schema::create_table_from_entity`, so the schema is a single
//! versioned artifact of the Rust structs - there is no runtime probing for
//! optional columns, and no hand-written SQL.

use crate::entities::{
    Account, Allocation, Envelope, IncomeSource, Transaction, TransactionSplit,
};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/budget_engine.sqlite";

/// Gets the database URL from `DATABASE_URL` or falls back to the default
/// local `SQLite` file.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the database named by [`get_database_url`].
///
/// # Errors
/// Returns a database error if the connection cannot be established.
pub async fn create_connection() -> Result<DatabaseConnection> {
    Database::connect(get_database_url())
        .await
        .map_err(Into::into)
}

/// Creates every table the engine uses from its entity definition.
///
/// # Errors
/// Returns a database error if any CREATE TABLE statement fails.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let account_table = schema.create_table_from_entity(Account);
    let envelope_table = schema.create_table_from_entity(Envelope);
    let income_source_table = schema.create_table_from_entity(IncomeSource);
    let allocation_table = schema.create_table_from_entity(Allocation);
    let transaction_table = schema.create_table_from_entity(Transaction);
    let split_table = schema.create_table_from_entity(TransactionSplit);

    db.execute(builder.build(&account_table)).await?;
    db.execute(builder.build(&envelope_table)).await?;
    db.execute(builder.build(&income_source_table)).await?;
    db.execute(builder.build(&allocation_table)).await?;
    db.execute(builder.build(&transaction_table)).await?;
    db.execute(builder.build(&split_table)).await?;

    Ok(())
}
