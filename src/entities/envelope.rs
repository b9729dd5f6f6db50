//! Envelope entity - A named budget category with a target and a balance.
//!
//! `balance` is actual money held, `pay_cycle_amount` is the planned
//! per-cycle commitment, and `target` is the level the envelope should
//! reach. The `is_surplus` and `is_cc_holding` flags mark the two special
//! envelopes the reconciliation identity treats differently.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Envelope database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "envelopes")]
pub struct Model {
    /// Unique identifier for the envelope
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user; every query is scoped to this
    pub user_id: String,
    /// Human-readable name of the envelope (e.g., "Groceries", "Rent")
    pub name: String,
    /// Priority band: `"essential"`, `"important"`, or `"discretionary"`
    pub category: String,
    /// Target amount in cents the envelope should hold
    pub target: i64,
    /// Actual money currently held, in cents
    pub balance: i64,
    /// Planned commitment per pay cycle, in cents
    pub pay_cycle_amount: i64,
    /// Marks the envelope that tracks unallocated surplus
    pub is_surplus: bool,
    /// Marks the envelope holding money set aside for credit-card repayment
    pub is_cc_holding: bool,
    /// True for engine-suggested envelopes the user has not confirmed
    pub is_suggested: bool,
    /// True when the user dismissed a suggested envelope
    pub is_dismissed: bool,
    /// Soft delete flag - if true, envelope is hidden but data is preserved
    pub is_deleted: bool,
}

/// Defines relationships between Envelope and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One envelope receives many planned allocations
    #[sea_orm(has_many = "super::allocation::Entity")]
    Allocations,
    /// One envelope has many classified transactions
    #[sea_orm(has_many = "super::transaction::Entity")]
    Transactions,
    /// One envelope receives many pay-event splits
    #[sea_orm(has_many = "super::transaction_split::Entity")]
    Splits,
}

impl Related<super::allocation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Allocations.def()
    }
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl Related<super::transaction_split::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Splits.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
