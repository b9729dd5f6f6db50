//! Transaction entity - Every money movement on an account.
//!
//! Amounts are signed cents (positive = inflow). Classification fields
//! (`envelope_id`, `transaction_type`, `linked_transaction_id`,
//! `transfer_pending`, `is_reconciled`) are the only mutable parts of a
//! transaction; the amount is never re-signed after import.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Transaction database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    /// Unique identifier for the transaction
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user; every query is scoped to this
    pub user_id: String,
    /// The account this transaction moved money on
    pub account_id: i64,
    /// Signed amount in cents (positive = inflow)
    pub amount: i64,
    /// Merchant or memo text from import/manual entry
    pub description: String,
    /// When the money actually moved
    pub occurred_at: DateTimeUtc,
    /// Envelope this spending counts against; None while unclassified,
    /// pending, or linked as a transfer
    pub envelope_id: Option<i64>,
    /// Classification: `"income"`, `"expense"`, or `"transfer"`
    pub transaction_type: String,
    /// The other half of a linked transfer pair; set mutually on both rows
    pub linked_transaction_id: Option<i64>,
    /// One-sided transfer flag set before the counterpart exists
    pub transfer_pending: bool,
    /// Set once a pay-event allocation has been approved for this row
    pub is_reconciled: bool,
}

/// Defines relationships between Transaction and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each transaction belongs to one account
    #[sea_orm(
        belongs_to = "super::account::Entity",
        from = "Column::AccountId",
        to = "super::account::Column::Id"
    )]
    Account,
    /// Each classified transaction may count against one envelope
    #[sea_orm(
        belongs_to = "super::envelope::Entity",
        from = "Column::EnvelopeId",
        to = "super::envelope::Column::Id"
    )]
    Envelope,
    /// One approved pay event fans out into many splits
    #[sea_orm(has_many = "super::transaction_split::Entity")]
    Splits,
}

impl Related<super::account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Account.def()
    }
}

impl Related<super::envelope::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Envelope.def()
    }
}

impl Related<super::transaction_split::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Splits.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
