//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod account;
pub mod allocation;
pub mod envelope;
pub mod income_source;
pub mod transaction;
pub mod transaction_split;

// Re-export specific types to avoid conflicts
pub use account::{Column as AccountColumn, Entity as Account, Model as AccountModel};
pub use allocation::{Column as AllocationColumn, Entity as Allocation, Model as AllocationModel};
pub use envelope::{Column as EnvelopeColumn, Entity as Envelope, Model as EnvelopeModel};
pub use income_source::{
    Column as IncomeSourceColumn, Entity as IncomeSource, Model as IncomeSourceModel,
};
pub use transaction::{
    Column as TransactionColumn, Entity as Transaction, Model as TransactionModel,
};
pub use transaction_split::{
    Column as TransactionSplitColumn, Entity as TransactionSplit, Model as TransactionSplitModel,
};
