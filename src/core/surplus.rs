//! Surplus calculation - committed totals and leftover per income source.
//!
//! Committed totals are read straight from the allocation ledger
//! (`envelope_income_allocations` keyed by income source), so per-source
//! surplus is exact. The plan-layer total over envelope `pay_cycle_amount`
//! is reported alongside; when the two disagree the plan has drifted from
//! the ledger and the caller can surface that.

use crate::{
    entities::{
        allocation, envelope, income_source, Allocation, Envelope, IncomeSource,
    },
    errors::Result,
    money::Money,
};
use sea_orm::{DatabaseConnection, QueryOrder, prelude::*};
use serde::Serialize;
use std::collections::HashMap;

/// Committed total and leftover surplus for one income source.
#[derive(Debug, Clone, Serialize)]
pub struct IncomeSourceSurplus {
    /// The income source being summarized
    pub income_source: income_source::Model,
    /// Expected income per pay cycle
    pub income: Money,
    /// Sum of this source's ledger allocations across all envelopes
    pub committed: Money,
    /// `max(0, income - committed)`
    pub surplus: Money,
}

/// Full surplus picture for one user.
#[derive(Debug, Clone, Serialize)]
pub struct SurplusReport {
    /// Per-source rows, ordered by source name
    pub sources: Vec<IncomeSourceSurplus>,
    /// Sum of active income per pay cycle
    pub total_income: Money,
    /// Sum of ledger allocations from active sources
    pub total_committed: Money,
    /// Sum of per-source surpluses
    pub total_surplus: Money,
    /// Plan-layer commitment: `pay_cycle_amount` over non-surplus,
    /// non-dismissed envelopes. Diverges from `total_committed` when the
    /// plan has not been broken down per source yet.
    pub planned_commitment: Money,
    /// Money already earmarked for pending credit-card repayment
    pub cc_holding: Money,
    /// `max(0, total_surplus - cc_holding)`: what may be redistributed
    pub allocatable_surplus: Money,
}

/// Computes the surplus report for a user.
///
/// # Errors
/// Returns a database error if any query fails.
pub async fn compute_surplus(db: &DatabaseConnection, user_id: &str) -> Result<SurplusReport> {
    let sources = IncomeSource::find()
        .filter(income_source::Column::UserId.eq(user_id))
        .filter(income_source::Column::IsActive.eq(true))
        .order_by_asc(income_source::Column::Name)
        .all(db)
        .await?;

    let allocations = Allocation::find()
        .filter(allocation::Column::UserId.eq(user_id))
        .all(db)
        .await?;

    let mut committed_by_source: HashMap<i64, Money> = HashMap::new();
    for row in &allocations {
        *committed_by_source
            .entry(row.income_source_id)
            .or_insert(Money::ZERO) += Money::from_cents(row.amount);
    }

    let mut rows = Vec::with_capacity(sources.len());
    let mut total_income = Money::ZERO;
    let mut total_committed = Money::ZERO;
    let mut total_surplus = Money::ZERO;
    for source in sources {
        let income = Money::from_cents(source.amount);
        let committed = committed_by_source
            .get(&source.id)
            .copied()
            .unwrap_or(Money::ZERO);
        let surplus = (income - committed).max_zero();

        total_income += income;
        total_committed += committed;
        total_surplus += surplus;
        rows.push(IncomeSourceSurplus {
            income_source: source,
            income,
            committed,
            surplus,
        });
    }

    let envelopes = Envelope::find()
        .filter(envelope::Column::UserId.eq(user_id))
        .filter(envelope::Column::IsDeleted.eq(false))
        .all(db)
        .await?;

    let planned_commitment = envelopes
        .iter()
        .filter(|e| !e.is_surplus && !e.is_dismissed)
        .map(|e| Money::from_cents(e.pay_cycle_amount))
        .sum();
    let cc_holding = envelopes
        .iter()
        .filter(|e| e.is_cc_holding)
        .map(|e| Money::from_cents(e.balance))
        .sum::<Money>();

    Ok(SurplusReport {
        sources: rows,
        total_income,
        total_committed,
        total_surplus,
        planned_commitment,
        cc_holding,
        allocatable_surplus: (total_surplus - cc_holding).max_zero(),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_surplus_from_ledger_per_source() -> Result<()> {
        let db = setup_test_db().await?;

        let groceries = create_test_envelope(&db, "Groceries", 60_000, 0, 30_000).await?;
        let rent = create_test_envelope(&db, "Rent", 120_000, 0, 120_000).await?;

        let salary = create_test_income_source(&db, "Salary", 200_000).await?;
        let side_gig = create_test_income_source(&db, "Side gig", 40_000).await?;

        create_test_allocation(&db, salary.id, groceries.id, 30_000, 0).await?;
        create_test_allocation(&db, salary.id, rent.id, 120_000, 1).await?;
        create_test_allocation(&db, side_gig.id, groceries.id, 10_000, 0).await?;

        let report = compute_surplus(&db, TEST_USER).await?;

        assert_eq!(report.sources.len(), 2);
        // Ordered by name: "Salary" then "Side gig"
        let salary_row = &report.sources[0];
        assert_eq!(salary_row.income_source.id, salary.id);
        assert_eq!(salary_row.committed, Money::from_cents(150_000));
        assert_eq!(salary_row.surplus, Money::from_cents(50_000));

        let gig_row = &report.sources[1];
        assert_eq!(gig_row.committed, Money::from_cents(10_000));
        assert_eq!(gig_row.surplus, Money::from_cents(30_000));

        assert_eq!(report.total_income, Money::from_cents(240_000));
        assert_eq!(report.total_committed, Money::from_cents(160_000));
        assert_eq!(report.total_surplus, Money::from_cents(80_000));
        assert_eq!(report.planned_commitment, Money::from_cents(150_000));

        Ok(())
    }

    #[tokio::test]
    async fn test_committed_plus_surplus_reconstructs_income() -> Result<()> {
        let db = setup_test_db().await?;

        let envelope = create_test_envelope(&db, "Bills", 50_000, 0, 50_000).await?;
        let source = create_test_income_source(&db, "Payroll", 175_050).await?;
        create_test_allocation(&db, source.id, envelope.id, 100_000, 0).await?;

        let report = compute_surplus(&db, TEST_USER).await?;
        let row = &report.sources[0];
        assert_eq!(row.committed + row.surplus, row.income);

        Ok(())
    }

    #[tokio::test]
    async fn test_overcommitted_source_has_zero_surplus() -> Result<()> {
        let db = setup_test_db().await?;

        let envelope = create_test_envelope(&db, "Bills", 50_000, 0, 50_000).await?;
        let source = create_test_income_source(&db, "Payroll", 80_000).await?;
        create_test_allocation(&db, source.id, envelope.id, 95_000, 0).await?;

        let report = compute_surplus(&db, TEST_USER).await?;
        assert_eq!(report.sources[0].surplus, Money::ZERO);
        // Surplus is clamped per source, never negative
        assert_eq!(report.total_surplus, Money::ZERO);

        Ok(())
    }

    #[tokio::test]
    async fn test_cc_holding_reduces_allocatable_surplus() -> Result<()> {
        let db = setup_test_db().await?;

        let source = create_test_income_source(&db, "Payroll", 100_000).await?;
        let envelope = create_test_envelope(&db, "Bills", 0, 0, 0).await?;
        create_test_allocation(&db, source.id, envelope.id, 40_000, 0).await?;
        create_flagged_envelope(&db, "CC Holding", 25_000, false, true).await?;

        let report = compute_surplus(&db, TEST_USER).await?;
        assert_eq!(report.total_surplus, Money::from_cents(60_000));
        assert_eq!(report.cc_holding, Money::from_cents(25_000));
        assert_eq!(report.allocatable_surplus, Money::from_cents(35_000));

        Ok(())
    }

    #[tokio::test]
    async fn test_cc_holding_larger_than_surplus_allocates_nothing() -> Result<()> {
        let db = setup_test_db().await?;

        create_test_income_source(&db, "Payroll", 10_000).await?;
        create_flagged_envelope(&db, "CC Holding", 25_000, false, true).await?;

        let report = compute_surplus(&db, TEST_USER).await?;
        assert_eq!(report.allocatable_surplus, Money::ZERO);

        Ok(())
    }

    #[tokio::test]
    async fn test_inactive_sources_and_dismissed_envelopes_excluded() -> Result<()> {
        let db = setup_test_db().await?;
        use sea_orm::{ActiveModelTrait, Set};

        let source = create_test_income_source(&db, "Old job", 100_000).await?;
        let mut inactive: income_source::ActiveModel = source.into();
        inactive.is_active = Set(false);
        inactive.update(&db).await?;

        let envelope = create_test_envelope(&db, "Dismissed idea", 10_000, 0, 10_000).await?;
        let mut dismissed: envelope::ActiveModel = envelope.into();
        dismissed.is_dismissed = Set(true);
        dismissed.update(&db).await?;

        let report = compute_surplus(&db, TEST_USER).await?;
        assert!(report.sources.is_empty());
        assert_eq!(report.total_income, Money::ZERO);
        assert_eq!(report.planned_commitment, Money::ZERO);

        Ok(())
    }
}
