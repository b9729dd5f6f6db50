//! Account entity - A real-world bank account owned by a user.
//!
//! Account balances are the physical side of the reconciliation identity:
//! the sum of account balances must equal the sum of envelope balances
//! adjusted for the credit-card holding and surplus.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Account database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    /// Unique identifier for the account
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user; every query is scoped to this
    pub user_id: String,
    /// Human-readable name of the account (e.g., "Everyday Checking")
    pub name: String,
    /// Account kind: `"checking"`, `"savings"`, `"credit"`, or `"cash"`
    pub account_type: String,
    /// Current balance in cents (negative for credit-card debt)
    pub balance: i64,
    /// Soft delete flag - if true, account is hidden but data is preserved
    pub is_deleted: bool,
}

/// Defines relationships between Account and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One account has many transactions
    #[sea_orm(has_many = "super::transaction::Entity")]
    Transactions,
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
