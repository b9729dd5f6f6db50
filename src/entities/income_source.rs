//! Income source entity - A recurring inflow such as a salary.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Income source database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "income_sources")]
pub struct Model {
    /// Unique identifier for the income source
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user; every query is scoped to this
    pub user_id: String,
    /// Human-readable name (e.g., "Acme payroll")
    pub name: String,
    /// Expected amount per pay cycle, in cents
    pub amount: i64,
    /// Pay cadence: `"weekly"`, `"fortnightly"`, or `"monthly"`
    pub pay_cycle: String,
    /// Inactive sources are kept for history but excluded from planning
    pub is_active: bool,
}

/// Defines relationships between IncomeSource and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One income source funds many planned allocations
    #[sea_orm(has_many = "super::allocation::Entity")]
    Allocations,
}

impl Related<super::allocation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Allocations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
