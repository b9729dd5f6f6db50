//! Transaction split entity - How an approved pay event was divided.
//!
//! One row per envelope funded by the approval plus one row with
//! `envelope_id = NULL` for the surplus share. Splits are the durable
//! record that the approved parts summed to the pay amount.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Transaction split database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transaction_splits")]
pub struct Model {
    /// Unique identifier for the split row
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user; every query is scoped to this
    pub user_id: String,
    /// The approved pay-event transaction this split belongs to
    pub transaction_id: i64,
    /// The envelope funded by this split; None for the surplus share
    pub envelope_id: Option<i64>,
    /// Amount in cents routed to the envelope (or to surplus)
    pub amount: i64,
}

/// Defines relationships between TransactionSplit and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each split belongs to one approved transaction
    #[sea_orm(
        belongs_to = "super::transaction::Entity",
        from = "Column::TransactionId",
        to = "super::transaction::Column::Id"
    )]
    Transaction,
    /// Each non-surplus split funds one envelope
    #[sea_orm(
        belongs_to = "super::envelope::Entity",
        from = "Column::EnvelopeId",
        to = "super::envelope::Column::Id"
    )]
    Envelope,
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transaction.def()
    }
}

impl Related<super::envelope::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Envelope.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
