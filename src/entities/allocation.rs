//! Allocation entity - The plan layer mapping income sources to envelopes.
//!
//! One row per (`income_source_id`, `envelope_id`) pair; the replace and
//! upsert operations in `core::allocation` keep that pairing unique.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Planned allocation database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "envelope_income_allocations")]
pub struct Model {
    /// Unique identifier for the allocation row
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user; every query is scoped to this
    pub user_id: String,
    /// The income source the money comes from
    pub income_source_id: i64,
    /// The envelope the money is committed to
    pub envelope_id: i64,
    /// Committed amount per pay cycle, in cents (always positive)
    pub amount: i64,
    /// Funding order within the envelope; lower is funded first
    pub priority: i32,
}

/// Defines relationships between Allocation and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each allocation draws from one income source
    #[sea_orm(
        belongs_to = "super::income_source::Entity",
        from = "Column::IncomeSourceId",
        to = "super::income_source::Column::Id"
    )]
    IncomeSource,
    /// Each allocation commits to one envelope
    #[sea_orm(
        belongs_to = "super::envelope::Entity",
        from = "Column::EnvelopeId",
        to = "super::envelope::Column::Id"
    )]
    Envelope,
}

impl Related<super::income_source::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::IncomeSource.def()
    }
}

impl Related<super::envelope::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Envelope.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
