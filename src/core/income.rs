//! Heuristic matching of incoming transactions to known income sources.
//!
//! When an unclassified inflow lands, the engine guesses which income
//! source it belongs to so the caller can offer a pre-filled pay-event
//! approval. Amount proximity dominates; a description naming the source
//! adds a bonus. Matches are suggestions only - nothing here mutates.

use crate::{
    entities::{income_source, transaction, IncomeSource, Transaction},
    errors::{Error, Result},
    money::Money,
};
use sea_orm::{DatabaseConnection, prelude::*};
use serde::Serialize;

/// Score for an exact cent-for-cent amount match.
const EXACT_AMOUNT_SCORE: f64 = 0.6;

/// Score for an amount within the near-match band.
const NEAR_AMOUNT_SCORE: f64 = 0.3;

/// Relative half-width of the near-match band (5% of the expected amount).
const NEAR_AMOUNT_BAND: f64 = 0.05;

/// Bonus when the transaction description names the source.
const NAME_BONUS: f64 = 0.4;

/// Matches scoring below this are discarded as noise.
const MATCH_THRESHOLD: f64 = 0.5;

/// A suggested income source for one incoming transaction.
#[derive(Debug, Clone, Serialize)]
pub struct IncomeMatch {
    /// The suggested source
    pub income_source: income_source::Model,
    /// Bounded confidence score in [0, 1]
    pub confidence: f64,
}

/// Scores one source against one inflow.
fn source_confidence(amount: Money, description: &str, source: &income_source::Model) -> f64 {
    let expected = Money::from_cents(source.amount);
    let mut score = if amount == expected {
        EXACT_AMOUNT_SCORE
    } else {
        #[allow(clippy::cast_precision_loss)]
        let band = (expected.cents() as f64 * NEAR_AMOUNT_BAND).abs();
        #[allow(clippy::cast_precision_loss)]
        let distance = (amount.cents() - expected.cents()).abs() as f64;
        if distance <= band {
            NEAR_AMOUNT_SCORE
        } else {
            0.0
        }
    };

    if description
        .to_lowercase()
        .contains(&source.name.to_lowercase())
    {
        score += NAME_BONUS;
    }
    score.clamp(0.0, 1.0)
}

/// Guesses which active income source an incoming transaction belongs to.
/// Returns the best match at or above the threshold, or `None` when no
/// source is convincing.
///
/// # Errors
/// `TransactionNotFound` outside the caller's scope; `Validation` when the
/// transaction is not an unlinked inflow.
pub async fn detect_income_source(
    db: &DatabaseConnection,
    user_id: &str,
    transaction_id: i64,
) -> Result<Option<IncomeMatch>> {
    let target = Transaction::find()
        .filter(transaction::Column::Id.eq(transaction_id))
        .filter(transaction::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or(Error::TransactionNotFound { id: transaction_id })?;

    if target.amount <= 0 {
        return Err(Error::Validation {
            message: format!("transaction {transaction_id} is not an inflow"),
        });
    }
    if target.linked_transaction_id.is_some() || target.transfer_pending {
        return Err(Error::Validation {
            message: format!("transaction {transaction_id} is classified as a transfer"),
        });
    }

    let sources = IncomeSource::find()
        .filter(income_source::Column::UserId.eq(user_id))
        .filter(income_source::Column::IsActive.eq(true))
        .all(db)
        .await?;

    let amount = Money::from_cents(target.amount);
    let best = sources
        .into_iter()
        .map(|source| {
            let confidence = source_confidence(amount, &target.description, &source);
            IncomeMatch {
                income_source: source,
                confidence,
            }
        })
        .filter(|m| m.confidence >= MATCH_THRESHOLD)
        .max_by(|a, b| {
            a.confidence
                .total_cmp(&b.confidence)
                .then(b.income_source.id.cmp(&a.income_source.id))
        });
    Ok(best)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_exact_amount_with_name_is_best_match() -> Result<()> {
        let (db, account) = setup_with_account().await?;
        let payroll = create_test_income_source(&db, "Acme payroll", 200_000).await?;
        create_test_income_source(&db, "Side gig", 40_000).await?;
        let pay =
            create_custom_transaction(&db, account.id, 200_000, 0, "ACME PAYROLL 00441").await?;

        let matched = detect_income_source(&db, TEST_USER, pay.id).await?.unwrap();
        assert_eq!(matched.income_source.id, payroll.id);
        assert!((matched.confidence - 1.0).abs() < 1e-9);

        Ok(())
    }

    #[tokio::test]
    async fn test_near_amount_within_five_percent_matches() -> Result<()> {
        let (db, account) = setup_with_account().await?;
        let payroll = create_test_income_source(&db, "Payroll", 200_000).await?;
        // 3% over the expected amount, description names the source
        let pay = create_custom_transaction(&db, account.id, 206_000, 0, "payroll deposit").await?;

        let matched = detect_income_source(&db, TEST_USER, pay.id).await?.unwrap();
        assert_eq!(matched.income_source.id, payroll.id);
        assert!(matched.confidence >= MATCH_THRESHOLD);

        Ok(())
    }

    #[tokio::test]
    async fn test_weak_matches_are_discarded() -> Result<()> {
        let (db, account) = setup_with_account().await?;
        create_test_income_source(&db, "Payroll", 200_000).await?;
        // Wrong amount, unrelated description: nothing convincing
        let stray = create_custom_transaction(&db, account.id, 12_345, 0, "Refund").await?;

        let matched = detect_income_source(&db, TEST_USER, stray.id).await?;
        assert!(matched.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_rejects_outflows_and_transfers() -> Result<()> {
        let (db, account) = setup_with_account().await?;
        create_test_income_source(&db, "Payroll", 200_000).await?;

        let outflow = create_test_transaction(&db, account.id, -5_000, 0).await?;
        let result = detect_income_source(&db, TEST_USER, outflow.id).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let inflow = create_test_transaction(&db, account.id, 200_000, 0).await?;
        crate::core::transfer::mark_transfer_pending(&db, TEST_USER, inflow.id, true).await?;
        let result = detect_income_source(&db, TEST_USER, inflow.id).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_transaction_is_not_found() -> Result<()> {
        let db = setup_test_db().await?;
        let result = detect_income_source(&db, TEST_USER, 999).await;
        assert!(matches!(result, Err(Error::TransactionNotFound { id: 999 })));
        Ok(())
    }
}
