//! Shared test utilities for the engine.
//!
//! This module provides common helper functions for setting up test
//! databases and inserting test rows with sensible defaults. Accounts,
//! envelopes, and transactions are produced by external collaborators in
//! production, so these helpers insert entity rows directly.

use crate::{
    entities::{account, allocation, envelope, income_source, transaction},
    errors::Result,
};
use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};

/// The user every test row belongs to unless a test scopes otherwise.
pub const TEST_USER: &str = "test_user";

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a checking account with a starting balance in cents.
pub async fn create_test_account(
    db: &DatabaseConnection,
    name: &str,
    balance: i64,
) -> Result<account::Model> {
    create_custom_account(db, TEST_USER, name, "checking", balance).await
}

/// Creates an account with full control over owner, type, and balance.
pub async fn create_custom_account(
    db: &DatabaseConnection,
    user_id: &str,
    name: &str,
    account_type: &str,
    balance: i64,
) -> Result<account::Model> {
    let row = account::ActiveModel {
        user_id: Set(user_id.to_string()),
        name: Set(name.to_string()),
        account_type: Set(account_type.to_string()),
        balance: Set(balance),
        is_deleted: Set(false),
        ..Default::default()
    };
    Ok(row.insert(db).await?)
}

/// Creates an essential-category envelope with the given target, balance,
/// and per-cycle commitment (all cents), and no special flags.
pub async fn create_test_envelope(
    db: &DatabaseConnection,
    name: &str,
    target: i64,
    balance: i64,
    pay_cycle_amount: i64,
) -> Result<envelope::Model> {
    let row = envelope::ActiveModel {
        user_id: Set(TEST_USER.to_string()),
        name: Set(name.to_string()),
        category: Set("essential".to_string()),
        target: Set(target),
        balance: Set(balance),
        pay_cycle_amount: Set(pay_cycle_amount),
        is_surplus: Set(false),
        is_cc_holding: Set(false),
        is_suggested: Set(false),
        is_dismissed: Set(false),
        is_deleted: Set(false),
        ..Default::default()
    };
    Ok(row.insert(db).await?)
}

/// Creates an envelope carrying one of the special reconciliation flags.
pub async fn create_flagged_envelope(
    db: &DatabaseConnection,
    name: &str,
    balance: i64,
    is_surplus: bool,
    is_cc_holding: bool,
) -> Result<envelope::Model> {
    let row = envelope::ActiveModel {
        user_id: Set(TEST_USER.to_string()),
        name: Set(name.to_string()),
        category: Set("essential".to_string()),
        target: Set(0),
        balance: Set(balance),
        pay_cycle_amount: Set(0),
        is_surplus: Set(is_surplus),
        is_cc_holding: Set(is_cc_holding),
        is_suggested: Set(false),
        is_dismissed: Set(false),
        is_deleted: Set(false),
        ..Default::default()
    };
    Ok(row.insert(db).await?)
}

/// Creates an active income source paying `amount` cents per cycle.
pub async fn create_test_income_source(
    db: &DatabaseConnection,
    name: &str,
    amount: i64,
) -> Result<income_source::Model> {
    let row = income_source::ActiveModel {
        user_id: Set(TEST_USER.to_string()),
        name: Set(name.to_string()),
        amount: Set(amount),
        pay_cycle: Set("fortnightly".to_string()),
        is_active: Set(true),
        ..Default::default()
    };
    Ok(row.insert(db).await?)
}

/// Creates an unclassified, unlinked transaction `days_ago` days in the
/// past. Type is inferred from the sign of `amount` (cents).
pub async fn create_test_transaction(
    db: &DatabaseConnection,
    account_id: i64,
    amount: i64,
    days_ago: i64,
) -> Result<transaction::Model> {
    create_custom_transaction(db, account_id, amount, days_ago, "Test transaction").await
}

/// Creates a transaction with a custom description.
pub async fn create_custom_transaction(
    db: &DatabaseConnection,
    account_id: i64,
    amount: i64,
    days_ago: i64,
    description: &str,
) -> Result<transaction::Model> {
    let transaction_type = if amount < 0 { "expense" } else { "income" };
    let row = transaction::ActiveModel {
        user_id: Set(TEST_USER.to_string()),
        account_id: Set(account_id),
        amount: Set(amount),
        description: Set(description.to_string()),
        occurred_at: Set(Utc::now() - Duration::days(days_ago)),
        envelope_id: Set(None),
        transaction_type: Set(transaction_type.to_string()),
        linked_transaction_id: Set(None),
        transfer_pending: Set(false),
        is_reconciled: Set(false),
        ..Default::default()
    };
    Ok(row.insert(db).await?)
}

/// Creates a planned allocation row from an income source to an envelope.
pub async fn create_test_allocation(
    db: &DatabaseConnection,
    income_source_id: i64,
    envelope_id: i64,
    amount: i64,
    priority: i32,
) -> Result<allocation::Model> {
    let row = allocation::ActiveModel {
        user_id: Set(TEST_USER.to_string()),
        income_source_id: Set(income_source_id),
        envelope_id: Set(envelope_id),
        amount: Set(amount),
        priority: Set(priority),
        ..Default::default()
    };
    Ok(row.insert(db).await?)
}

/// Sets up a database with one checking account holding `balance` cents.
/// Returns (db, account) for common test scenarios.
pub async fn setup_with_account() -> Result<(DatabaseConnection, account::Model)> {
    let db = setup_test_db().await?;
    let account = create_test_account(&db, "Everyday Checking", 0).await?;
    Ok((db, account))
}
