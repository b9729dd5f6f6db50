//! Core business logic - framework-agnostic engine operations.
//!
//! Every function here takes a `DatabaseConnection` and a `user_id` and is
//! the library-level contract behind the HTTP boundary collaborators expose.

/// Income allocation planning: bulk replace, upsert, pay-event approval,
/// and greedy surplus distribution
pub mod allocation;
/// Heuristic matching of incoming transactions to known income sources
pub mod income;
/// Multi-debt payoff simulation (avalanche and snowball)
pub mod payoff;
/// The account/envelope balance identity and its audit report
pub mod reconciliation;
/// Per-income-source committed totals and leftover surplus
pub mod surplus;
/// Internal transfer detection, linking, and pending state
pub mod transfer;
