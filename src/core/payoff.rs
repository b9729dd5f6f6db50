//! Multi-debt payoff simulation.
//!
//! Month-by-month amortization over a set of revolving debts: every card
//! accrues `apr/12` interest, every open card receives at least its
//! minimum payment, and the remaining budget (extra plus minimums freed by
//! already-zeroed cards) funnels to the highest-priority open card.
//! Avalanche prioritizes by APR descending, snowball by balance ascending.
//! Pure computation over transient snapshots - nothing here touches
//! stored card state.

use crate::{
    entities::{account, Account},
    errors::{Error, Result},
    money::Money,
};
use sea_orm::{DatabaseConnection, prelude::*};
use serde::{Deserialize, Serialize};

/// Simulations refusing to amortize are cut off here rather than looping.
const MAX_MONTHS: u32 = 600;

/// A snapshot of one revolving debt. Not persisted; rebuilt per request
/// from live account balances and caller-supplied terms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardDebt {
    /// The credit account this debt lives on
    pub account_id: i64,
    /// Display name of the card
    pub name: String,
    /// Amount owed (positive)
    pub balance: Money,
    /// Annual percentage rate as a fraction (0.24 = 24% APR)
    pub apr: f64,
    /// Contractual minimum payment per month
    pub minimum_payment: Money,
}

/// Caller-supplied terms for one credit account; accounts do not store
/// APR or minimum payment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CardTerms {
    /// The credit account these terms describe
    pub account_id: i64,
    /// Annual percentage rate as a fraction
    pub apr: f64,
    /// Contractual minimum payment per month
    pub minimum_payment: Money,
}

/// Repayment orderings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayoffStrategy {
    /// Highest APR first - interest-optimal under one-card-at-a-time
    Avalanche,
    /// Lowest balance first - fastest visible wins
    Snowball,
}

/// When one card reaches zero in a simulated schedule.
#[derive(Debug, Clone, Serialize)]
pub struct CardPayoff {
    /// The card's account id
    pub account_id: i64,
    /// The card's name
    pub name: String,
    /// 1-based month in which the balance reached zero
    pub month_paid_off: u32,
    /// Interest this card accrued over the schedule
    pub interest_paid: Money,
}

/// A full simulated repayment schedule for one strategy.
#[derive(Debug, Clone, Serialize)]
pub struct PayoffSchedule {
    /// The ordering that produced this schedule
    pub strategy: PayoffStrategy,
    /// Months until every balance reached zero
    pub months_to_payoff: u32,
    /// Total interest accrued across all cards
    pub total_interest: Money,
    /// Total of all payments made
    pub total_paid: Money,
    /// Per-card payoff details, in priority order
    pub cards: Vec<CardPayoff>,
}

/// Both schedules side by side.
#[derive(Debug, Clone, Serialize)]
pub struct PayoffComparison {
    /// Highest-APR-first schedule
    pub avalanche: PayoffSchedule,
    /// Lowest-balance-first schedule
    pub snowball: PayoffSchedule,
    /// `snowball.total_interest - avalanche.total_interest`; avalanche is
    /// interest-optimal under the greedy one-card-at-a-time assumption
    pub interest_difference: Money,
}

fn validate_debts(debts: &[CardDebt], extra_budget: Money) -> Result<()> {
    if extra_budget.is_negative() {
        return Err(Error::Validation {
            message: format!("extra budget must not be negative, got {extra_budget}"),
        });
    }
    for debt in debts {
        if !debt.apr.is_finite() || debt.apr < 0.0 {
            return Err(Error::InvalidAmount { amount: debt.apr });
        }
        if debt.balance.is_negative() {
            return Err(Error::Validation {
                message: format!("card {:?} has a negative balance", debt.name),
            });
        }
        if debt.minimum_payment.is_negative() {
            return Err(Error::Validation {
                message: format!("card {:?} has a negative minimum payment", debt.name),
            });
        }
    }
    Ok(())
}

/// Priority order as indices into `debts`, best-first for the strategy.
/// Ties keep input order, so the simulation is deterministic.
fn priority_order(debts: &[CardDebt], strategy: PayoffStrategy) -> Vec<usize> {
    let mut order: Vec<usize> = (0..debts.len()).collect();
    match strategy {
        PayoffStrategy::Avalanche => {
            order.sort_by(|&a, &b| debts[b].apr.total_cmp(&debts[a].apr).then(a.cmp(&b)));
        }
        PayoffStrategy::Snowball => {
            order.sort_by(|&a, &b| debts[a].balance.cmp(&debts[b].balance).then(a.cmp(&b)));
        }
    }
    order
}

/// Simulates one repayment schedule.
///
/// # Errors
/// `Validation` when inputs are malformed or the combined payments can
/// never outrun interest (the schedule would not terminate);
/// `InvalidAmount` for a non-finite or negative APR.
pub fn simulate_payoff(
    debts: &[CardDebt],
    extra_budget: Money,
    strategy: PayoffStrategy,
) -> Result<PayoffSchedule> {
    validate_debts(debts, extra_budget)?;

    let order = priority_order(debts, strategy);
    let mut balances: Vec<Money> = debts.iter().map(|d| d.balance).collect();
    let mut interest_paid: Vec<Money> = vec![Money::ZERO; debts.len()];
    let mut paid_off_month: Vec<Option<u32>> = vec![None; debts.len()];
    for (i, balance) in balances.iter().enumerate() {
        if balance.is_zero() {
            paid_off_month[i] = Some(0);
        }
    }

    let total_minimums: Money = debts.iter().map(|d| d.minimum_payment).sum();
    let mut total_interest = Money::ZERO;
    let mut total_paid = Money::ZERO;
    let mut month = 0u32;

    while balances.iter().any(Money::is_positive) {
        month += 1;
        if month > MAX_MONTHS {
            return Err(Error::Validation {
                message: format!("repayment schedule does not amortize within {MAX_MONTHS} months"),
            });
        }
        let owed_at_month_start: Money = balances.iter().copied().sum();

        // Interest accrues on every open balance first
        for (i, debt) in debts.iter().enumerate() {
            if balances[i].is_positive() {
                let interest = balances[i].mul_rate(debt.apr / 12.0)?;
                balances[i] += interest;
                interest_paid[i] += interest;
                total_interest += interest;
            }
        }

        // Minimums freed by zeroed cards stay in the monthly budget
        let mut budget = total_minimums + extra_budget;

        // Every open card gets its minimum (capped at the balance)
        for (i, debt) in debts.iter().enumerate() {
            if balances[i].is_positive() {
                let payment = debt.minimum_payment.min(balances[i]).min(budget);
                balances[i] -= payment;
                budget -= payment;
                total_paid += payment;
                if balances[i].is_zero() && paid_off_month[i].is_none() {
                    paid_off_month[i] = Some(month);
                }
            }
        }

        // The remainder funnels down the priority order
        for &i in &order {
            if budget.is_zero() {
                break;
            }
            if balances[i].is_positive() {
                let payment = balances[i].min(budget);
                balances[i] -= payment;
                budget -= payment;
                total_paid += payment;
                if balances[i].is_zero() {
                    paid_off_month[i] = Some(month);
                }
            }
        }

        // A month that made no net progress never will: interest is at
        // least as large next month and the budget is fixed.
        let owed_at_month_end: Money = balances.iter().copied().sum();
        if owed_at_month_end >= owed_at_month_start {
            return Err(Error::Validation {
                message: "payments never outrun interest; the schedule does not amortize"
                    .to_string(),
            });
        }
    }

    let cards = order
        .iter()
        .map(|&i| CardPayoff {
            account_id: debts[i].account_id,
            name: debts[i].name.clone(),
            month_paid_off: paid_off_month[i].unwrap_or(month),
            interest_paid: interest_paid[i],
        })
        .collect();

    Ok(PayoffSchedule {
        strategy,
        months_to_payoff: month,
        total_interest,
        total_paid,
        cards,
    })
}

/// Simulates both strategies over the same debts and budget.
///
/// # Errors
/// Same failure modes as [`simulate_payoff`].
pub fn compare_strategies(debts: &[CardDebt], extra_budget: Money) -> Result<PayoffComparison> {
    let avalanche = simulate_payoff(debts, extra_budget, PayoffStrategy::Avalanche)?;
    let snowball = simulate_payoff(debts, extra_budget, PayoffStrategy::Snowball)?;
    let interest_difference = snowball.total_interest - avalanche.total_interest;
    Ok(PayoffComparison {
        avalanche,
        snowball,
        interest_difference,
    })
}

/// Builds debt snapshots from the user's live credit accounts.
///
/// Credit-type accounts with a negative balance owe money; each must have
/// matching caller-supplied terms, since accounts do not store APR or
/// minimum payment.
///
/// # Errors
/// `Validation` when a credit account with debt has no terms; database
/// errors from the account query.
pub async fn snapshot_card_debts(
    db: &DatabaseConnection,
    user_id: &str,
    terms: &[CardTerms],
) -> Result<Vec<CardDebt>> {
    let accounts = Account::find()
        .filter(account::Column::UserId.eq(user_id))
        .filter(account::Column::AccountType.eq("credit"))
        .filter(account::Column::IsDeleted.eq(false))
        .filter(account::Column::Balance.lt(0))
        .all(db)
        .await?;

    let mut debts = Vec::with_capacity(accounts.len());
    for acct in accounts {
        let card_terms = terms
            .iter()
            .find(|t| t.account_id == acct.id)
            .ok_or_else(|| Error::Validation {
                message: format!("no card terms supplied for credit account {}", acct.id),
            })?;
        debts.push(CardDebt {
            account_id: acct.id,
            name: acct.name,
            balance: Money::from_cents(-acct.balance),
            apr: card_terms.apr,
            minimum_payment: card_terms.minimum_payment,
        });
    }
    Ok(debts)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    fn card(account_id: i64, name: &str, balance: i64, apr: f64, minimum: i64) -> CardDebt {
        CardDebt {
            account_id,
            name: name.to_string(),
            balance: Money::from_cents(balance),
            apr,
            minimum_payment: Money::from_cents(minimum),
        }
    }

    fn fixture() -> Vec<CardDebt> {
        vec![
            card(1, "Card A", 100_000, 0.24, 3_000),
            card(2, "Card B", 50_000, 0.12, 2_000),
        ]
    }

    #[test]
    fn test_avalanche_never_pays_more_interest_than_snowball() {
        // Card A $1000 @ 24% (min $30), Card B $500 @ 12% (min $20),
        // $100/month extra
        let comparison = compare_strategies(&fixture(), Money::from_cents(10_000)).unwrap();

        assert!(comparison.avalanche.total_interest <= comparison.snowball.total_interest);
        assert_eq!(
            comparison.interest_difference,
            comparison.snowball.total_interest - comparison.avalanche.total_interest
        );
        assert!(!comparison.interest_difference.is_negative());
    }

    #[test]
    fn test_priority_orders() {
        let debts = fixture();
        // Avalanche: higher APR (Card A) first
        assert_eq!(
            priority_order(&debts, PayoffStrategy::Avalanche),
            vec![0, 1]
        );
        // Snowball: smaller balance (Card B) first
        assert_eq!(priority_order(&debts, PayoffStrategy::Snowball), vec![1, 0]);
    }

    #[test]
    fn test_single_card_amortization_arithmetic() {
        // $100 at 12% APR is 1% a month. Month 1: $1 interest, then the
        // $50 minimum plus $51 extra clears the $101 owed.
        let debts = vec![card(1, "Only card", 10_000, 0.12, 5_000)];
        let schedule =
            simulate_payoff(&debts, Money::from_cents(5_100), PayoffStrategy::Avalanche).unwrap();

        assert_eq!(schedule.months_to_payoff, 1);
        assert_eq!(schedule.total_interest, Money::from_cents(100));
        assert_eq!(schedule.total_paid, Money::from_cents(10_100));
        assert_eq!(schedule.cards[0].month_paid_off, 1);
    }

    #[test]
    fn test_freed_minimums_funnel_to_priority_card() {
        // Card B zeroes quickly; its minimum must keep working for Card A
        // rather than shrinking the monthly budget.
        let debts = vec![
            card(1, "Card A", 60_000, 0.0, 1_000),
            card(2, "Card B", 1_000, 0.0, 2_000),
        ];
        let schedule = simulate_payoff(&debts, Money::ZERO, PayoffStrategy::Snowball).unwrap();

        // $3000/month total budget against $61000 of zero-interest debt
        assert_eq!(schedule.months_to_payoff, 21);
        assert_eq!(schedule.total_paid, Money::from_cents(61_000));
        // Card B is first in snowball order and clears in month one
        assert_eq!(schedule.cards[0].name, "Card B");
        assert_eq!(schedule.cards[0].month_paid_off, 1);
    }

    #[test]
    fn test_extra_budget_cascades_when_priority_card_zeroes() {
        let debts = vec![
            card(1, "Small", 2_000, 0.0, 1_000),
            card(2, "Large", 50_000, 0.0, 1_000),
        ];
        // Budget $120/month: Small clears in month 1 and the remainder
        // flows straight into Large the same month.
        let schedule =
            simulate_payoff(&debts, Money::from_cents(10_000), PayoffStrategy::Snowball).unwrap();
        assert_eq!(schedule.cards[0].month_paid_off, 1);
        assert!(schedule.months_to_payoff < 6);
    }

    #[test]
    fn test_zero_debts_and_already_paid_cards() {
        let schedule =
            simulate_payoff(&[], Money::from_cents(10_000), PayoffStrategy::Avalanche).unwrap();
        assert_eq!(schedule.months_to_payoff, 0);
        assert_eq!(schedule.total_interest, Money::ZERO);

        let debts = vec![card(1, "Cleared", 0, 0.24, 3_000)];
        let schedule = simulate_payoff(&debts, Money::ZERO, PayoffStrategy::Avalanche).unwrap();
        assert_eq!(schedule.months_to_payoff, 0);
        assert_eq!(schedule.cards[0].month_paid_off, 0);
    }

    #[test]
    fn test_non_amortizing_schedule_is_an_error() {
        // 120% APR with a $1 minimum: interest always outruns payments
        let debts = vec![card(1, "Runaway", 100_000, 1.20, 100)];
        let result = simulate_payoff(&debts, Money::ZERO, PayoffStrategy::Avalanche);
        assert!(matches!(result, Err(Error::Validation { .. })));
    }

    #[test]
    fn test_rejects_malformed_inputs() {
        let bad_apr = vec![card(1, "NaN card", 10_000, f64::NAN, 1_000)];
        assert!(matches!(
            simulate_payoff(&bad_apr, Money::ZERO, PayoffStrategy::Avalanche),
            Err(Error::InvalidAmount { .. })
        ));

        let negative_extra = simulate_payoff(
            &fixture(),
            Money::from_cents(-1),
            PayoffStrategy::Avalanche,
        );
        assert!(matches!(negative_extra, Err(Error::Validation { .. })));
    }

    #[tokio::test]
    async fn test_snapshot_builds_debts_from_credit_accounts() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_account(&db, "Checking", 50_000).await?;
        let visa = create_custom_account(&db, TEST_USER, "Visa", "credit", -42_000).await?;
        // Credit account in the black: not a debt
        create_custom_account(&db, TEST_USER, "Paid-off card", "credit", 0).await?;

        let debts = snapshot_card_debts(
            &db,
            TEST_USER,
            &[CardTerms {
                account_id: visa.id,
                apr: 0.22,
                minimum_payment: Money::from_cents(2_500),
            }],
        )
        .await?;

        assert_eq!(debts.len(), 1);
        assert_eq!(debts[0].account_id, visa.id);
        assert_eq!(debts[0].balance, Money::from_cents(42_000));

        Ok(())
    }

    #[tokio::test]
    async fn test_snapshot_requires_terms_for_every_indebted_card() -> Result<()> {
        let db = setup_test_db().await?;
        create_custom_account(&db, TEST_USER, "Visa", "credit", -42_000).await?;

        let result = snapshot_card_debts(&db, TEST_USER, &[]).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        Ok(())
    }
}
