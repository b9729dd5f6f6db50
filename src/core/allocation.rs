//! Income allocation planning and pay-event approval.
//!
//! The plan layer maps income sources to envelope amounts; a pay event is
//! approved against an actual transaction with a possibly caller-edited
//! split. Every multi-row mutation here runs inside one database
//! transaction, and envelope balances move only through conditional
//! `UPDATE balance = balance + delta` expressions, so concurrent approvals
//! cannot lose updates and a failed approval leaves nothing behind.

use crate::{
    entities::{
        allocation, envelope, income_source, transaction, transaction_split, Allocation, Envelope,
        IncomeSource, Transaction,
    },
    errors::{Error, Result},
    money::Money,
};
use sea_orm::{
    sea_query::Expr, ConnectionTrait, DatabaseConnection, Set, TransactionTrait, prelude::*,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::info;

/// Allocations within one cent of the pay amount are accepted.
const CENT_TOLERANCE: Money = Money::from_cents(1);

/// Deficits at or below this are not worth funding from surplus.
const MIN_FUNDABLE_DEFICIT: Money = Money::from_cents(50);

/// One income source's share of an envelope's plan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SourceShare {
    /// The income source the money comes from
    pub income_source_id: i64,
    /// Committed amount per pay cycle
    pub amount: Money,
}

/// One envelope's share of an approved pay event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EnvelopeShare {
    /// The envelope being funded
    pub envelope_id: i64,
    /// Amount routed to the envelope
    pub amount: Money,
}

/// A pay-event approval: the actual transaction, the income source it came
/// from, the (possibly edited) split, and whether to save it as the plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// The income transaction being reconciled
    pub transaction_id: i64,
    /// The income source this pay event belongs to
    pub income_source_id: i64,
    /// Per-envelope amounts; may deviate from the saved plan
    pub allocations: Vec<EnvelopeShare>,
    /// The unallocated remainder of the pay amount
    pub surplus: Money,
    /// When true, the approved amounts replace the source's saved plan
    pub save_plan: bool,
}

/// What an approval wrote: the reconciled transaction and its splits.
#[derive(Debug, Clone)]
pub struct ApprovalOutcome {
    /// The source transaction, now reconciled and typed `income`
    pub transaction: transaction::Model,
    /// One split per funded envelope plus the surplus split
    pub splits: Vec<transaction_split::Model>,
}

/// One grant from a surplus distribution.
#[derive(Debug, Clone, Serialize)]
pub struct SurplusGrant {
    /// The envelope receiving money
    pub envelope_id: i64,
    /// Its name, for display
    pub envelope_name: String,
    /// Amount granted
    pub amount: Money,
}

/// The result of a greedy surplus distribution pass.
#[derive(Debug, Clone, Serialize)]
pub struct SurplusDistribution {
    /// Grants in funding order (largest deficit first)
    pub grants: Vec<SurplusGrant>,
    /// Total handed out
    pub granted: Money,
    /// Surplus left after all fundable deficits were filled
    pub remaining: Money,
}

/// Adds `delta` to an envelope's balance as a single conditional UPDATE.
///
/// The increment happens entirely inside the database
/// (`balance = balance + delta`), never as read-then-write, so concurrent
/// callers cannot lose each other's updates.
async fn adjust_envelope_balance<C>(
    conn: &C,
    user_id: &str,
    envelope_id: i64,
    delta: Money,
) -> Result<()>
where
    C: ConnectionTrait,
{
    let updated = Envelope::update_many()
        .col_expr(
            envelope::Column::Balance,
            Expr::col(envelope::Column::Balance).add(delta.cents()),
        )
        .filter(envelope::Column::Id.eq(envelope_id))
        .filter(envelope::Column::UserId.eq(user_id))
        .filter(envelope::Column::IsDeleted.eq(false))
        .exec(conn)
        .await?;

    if updated.rows_affected != 1 {
        return Err(Error::EnvelopeNotFound { id: envelope_id });
    }
    Ok(())
}

/// Replaces an envelope's allocation plan wholesale.
///
/// Existing rows for the envelope are deleted and the non-zero entries are
/// inserted with sequential priority, all in one database transaction.
///
/// # Errors
/// `Validation` on negative amounts or a duplicated income source in the
/// payload; not-found errors when the envelope or an income source is
/// outside the caller's scope. Nothing is written on any failure.
pub async fn replace_envelope_allocations(
    db: &DatabaseConnection,
    user_id: &str,
    envelope_id: i64,
    shares: &[SourceShare],
) -> Result<Vec<allocation::Model>> {
    find_owned_envelope(db, user_id, envelope_id).await?;

    let mut seen = HashSet::new();
    for share in shares {
        if share.amount.is_negative() {
            return Err(Error::Validation {
                message: format!(
                    "allocation amount for income source {} must not be negative",
                    share.income_source_id
                ),
            });
        }
        if !seen.insert(share.income_source_id) {
            return Err(Error::Validation {
                message: format!(
                    "income source {} appears more than once",
                    share.income_source_id
                ),
            });
        }
        find_owned_income_source(db, user_id, share.income_source_id).await?;
    }

    let txn = db.begin().await?;

    Allocation::delete_many()
        .filter(allocation::Column::UserId.eq(user_id))
        .filter(allocation::Column::EnvelopeId.eq(envelope_id))
        .exec(&txn)
        .await?;

    let mut inserted = Vec::new();
    let mut priority = 0i32;
    for share in shares {
        if share.amount.is_zero() {
            continue;
        }
        let row = allocation::ActiveModel {
            user_id: Set(user_id.to_string()),
            income_source_id: Set(share.income_source_id),
            envelope_id: Set(envelope_id),
            amount: Set(share.amount.cents()),
            priority: Set(priority),
            ..Default::default()
        };
        inserted.push(row.insert(&txn).await?);
        priority += 1;
    }

    txn.commit().await?;
    Ok(inserted)
}

/// Upserts a single allocation keyed on (envelope, income source).
///
/// An amount of zero or less deletes the row and returns `None`; a positive
/// amount updates the existing row or inserts a new one at the
/// next-highest priority.
///
/// # Errors
/// Not-found errors when the envelope or income source is outside the
/// caller's scope.
pub async fn upsert_allocation(
    db: &DatabaseConnection,
    user_id: &str,
    envelope_id: i64,
    income_source_id: i64,
    amount: Money,
) -> Result<Option<allocation::Model>> {
    find_owned_envelope(db, user_id, envelope_id).await?;
    find_owned_income_source(db, user_id, income_source_id).await?;

    let existing = Allocation::find()
        .filter(allocation::Column::UserId.eq(user_id))
        .filter(allocation::Column::EnvelopeId.eq(envelope_id))
        .filter(allocation::Column::IncomeSourceId.eq(income_source_id))
        .one(db)
        .await?;

    if !amount.is_positive() {
        if let Some(row) = existing {
            row.delete(db).await?;
        }
        return Ok(None);
    }

    if let Some(row) = existing {
        let mut active: allocation::ActiveModel = row.into();
        active.amount = Set(amount.cents());
        return Ok(Some(active.update(db).await?));
    }

    let next_priority = Allocation::find()
        .filter(allocation::Column::UserId.eq(user_id))
        .filter(allocation::Column::EnvelopeId.eq(envelope_id))
        .all(db)
        .await?
        .len();
    let row = allocation::ActiveModel {
        user_id: Set(user_id.to_string()),
        income_source_id: Set(income_source_id),
        envelope_id: Set(envelope_id),
        amount: Set(amount.cents()),
        priority: Set(i32::try_from(next_priority).unwrap_or(i32::MAX)),
        ..Default::default()
    };
    Ok(Some(row.insert(db).await?))
}

/// Approves a pay event: validates that the edited allocation list plus
/// surplus reconstructs the transaction amount within one cent, then in a
/// single database transaction writes the splits, increments every funded
/// envelope's balance (and the surplus envelope's, when one exists), marks
/// the transaction reconciled, and optionally saves the amounts as the
/// income source's plan.
///
/// # Errors
/// `AllocationMismatch` when the parts do not sum to the pay amount;
/// `AlreadyReconciled` on a re-run; `Validation` on negative or duplicated
/// entries; not-found errors for rows outside the caller's scope. All
/// failures leave the database untouched.
pub async fn approve_pay_allocation(
    db: &DatabaseConnection,
    user_id: &str,
    request: &ApprovalRequest,
) -> Result<ApprovalOutcome> {
    let pay_transaction = Transaction::find()
        .filter(transaction::Column::Id.eq(request.transaction_id))
        .filter(transaction::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or(Error::TransactionNotFound {
            id: request.transaction_id,
        })?;
    find_owned_income_source(db, user_id, request.income_source_id).await?;

    if pay_transaction.is_reconciled {
        return Err(Error::AlreadyReconciled {
            transaction_id: pay_transaction.id,
        });
    }
    if pay_transaction.linked_transaction_id.is_some() || pay_transaction.transfer_pending {
        return Err(Error::Validation {
            message: format!(
                "transaction {} is classified as a transfer and cannot fund envelopes",
                pay_transaction.id
            ),
        });
    }
    if pay_transaction.amount <= 0 {
        return Err(Error::Validation {
            message: format!("transaction {} is not an inflow", pay_transaction.id),
        });
    }
    if request.surplus.is_negative() {
        return Err(Error::Validation {
            message: "surplus must not be negative".to_string(),
        });
    }
    let mut seen = HashSet::new();
    for share in &request.allocations {
        if share.amount.is_negative() {
            return Err(Error::Validation {
                message: format!(
                    "allocation amount for envelope {} must not be negative",
                    share.envelope_id
                ),
            });
        }
        if !seen.insert(share.envelope_id) {
            return Err(Error::Validation {
                message: format!("envelope {} appears more than once", share.envelope_id),
            });
        }
    }

    let expected = Money::from_cents(pay_transaction.amount);
    let allocated: Money = request.allocations.iter().map(|s| s.amount).sum();
    let actual = allocated + request.surplus;
    if (expected - actual).abs() > CENT_TOLERANCE {
        return Err(Error::AllocationMismatch { expected, actual });
    }

    let txn = db.begin().await?;

    // Claim the transaction first with a compare-and-swap on the
    // reconciled flag; a concurrent approval of the same pay event loses
    // the race here instead of double-incrementing envelopes.
    let claimed = Transaction::update_many()
        .col_expr(transaction::Column::IsReconciled, Expr::value(true))
        .col_expr(transaction::Column::TransactionType, Expr::value("income"))
        .filter(transaction::Column::Id.eq(pay_transaction.id))
        .filter(transaction::Column::UserId.eq(user_id))
        .filter(transaction::Column::IsReconciled.eq(false))
        .exec(&txn)
        .await?;
    if claimed.rows_affected != 1 {
        return Err(Error::AlreadyReconciled {
            transaction_id: pay_transaction.id,
        });
    }

    let mut splits = Vec::new();
    for share in &request.allocations {
        if share.amount.is_zero() {
            continue;
        }
        adjust_envelope_balance(&txn, user_id, share.envelope_id, share.amount).await?;
        let split = transaction_split::ActiveModel {
            user_id: Set(user_id.to_string()),
            transaction_id: Set(pay_transaction.id),
            envelope_id: Set(Some(share.envelope_id)),
            amount: Set(share.amount.cents()),
            ..Default::default()
        };
        splits.push(split.insert(&txn).await?);
    }

    if request.surplus.is_positive() {
        let split = transaction_split::ActiveModel {
            user_id: Set(user_id.to_string()),
            transaction_id: Set(pay_transaction.id),
            envelope_id: Set(None),
            amount: Set(request.surplus.cents()),
            ..Default::default()
        };
        splits.push(split.insert(&txn).await?);

        // The surplus share lands in the surplus-tracking envelope when the
        // user has one, keeping the reconciliation identity closed.
        if let Some(surplus_envelope) = find_surplus_envelope(&txn, user_id).await? {
            adjust_envelope_balance(&txn, user_id, surplus_envelope.id, request.surplus).await?;
        }
    }

    let reconciled = Transaction::find_by_id(pay_transaction.id)
        .one(&txn)
        .await?
        .ok_or(Error::TransactionNotFound {
            id: pay_transaction.id,
        })?;

    if request.save_plan {
        Allocation::delete_many()
            .filter(allocation::Column::UserId.eq(user_id))
            .filter(allocation::Column::IncomeSourceId.eq(request.income_source_id))
            .exec(&txn)
            .await?;
        let mut priority = 0i32;
        for share in &request.allocations {
            if share.amount.is_zero() {
                continue;
            }
            let row = allocation::ActiveModel {
                user_id: Set(user_id.to_string()),
                income_source_id: Set(request.income_source_id),
                envelope_id: Set(share.envelope_id),
                amount: Set(share.amount.cents()),
                priority: Set(priority),
                ..Default::default()
            };
            row.insert(&txn).await?;
            priority += 1;
        }
    }

    txn.commit().await?;

    info!(
        transaction_id = reconciled.id,
        amount = %expected,
        surplus = %request.surplus,
        envelopes = request.allocations.len(),
        "pay-event allocation approved"
    );

    Ok(ApprovalOutcome {
        transaction: reconciled,
        splits,
    })
}

/// Plans a greedy surplus distribution over the given envelopes.
///
/// Non-surplus, non-dismissed, non-deleted envelopes are sorted by deficit
/// (`target - balance`) descending with ties broken by ascending id, then
/// funded `min(remaining, deficit)` each in order. Deficits of fifty cents
/// or less are skipped. Single pass, deterministic, pure.
#[must_use]
pub fn plan_surplus_distribution(
    envelopes: &[envelope::Model],
    surplus: Money,
) -> SurplusDistribution {
    let mut candidates: Vec<(&envelope::Model, Money)> = envelopes
        .iter()
        .filter(|e| !e.is_deleted && !e.is_surplus && !e.is_dismissed)
        .map(|e| (e, Money::from_cents(e.target - e.balance)))
        .filter(|(_, deficit)| *deficit > MIN_FUNDABLE_DEFICIT)
        .collect();
    candidates.sort_by(|(a, da), (b, db)| db.cmp(da).then(a.id.cmp(&b.id)));

    let mut grants = Vec::new();
    let mut remaining = surplus;
    for (envelope, deficit) in candidates {
        if remaining.is_zero() {
            break;
        }
        let amount = remaining.min(deficit);
        remaining -= amount;
        grants.push(SurplusGrant {
            envelope_id: envelope.id,
            envelope_name: envelope.name.clone(),
            amount,
        });
    }

    let granted = surplus - remaining;
    SurplusDistribution {
        grants,
        granted,
        remaining,
    }
}

/// Distributes a surplus amount into underfunded envelopes and applies the
/// grants atomically. When a surplus-tracking envelope exists, the granted
/// total is moved out of it, so the distribution is balance-neutral.
///
/// # Errors
/// `Validation` when the surplus is not positive; database errors roll the
/// whole distribution back.
pub async fn distribute_surplus(
    db: &DatabaseConnection,
    user_id: &str,
    surplus: Money,
) -> Result<SurplusDistribution> {
    if !surplus.is_positive() {
        return Err(Error::Validation {
            message: format!("surplus to distribute must be positive, got {surplus}"),
        });
    }

    let envelopes = Envelope::find()
        .filter(envelope::Column::UserId.eq(user_id))
        .filter(envelope::Column::IsDeleted.eq(false))
        .all(db)
        .await?;
    let distribution = plan_surplus_distribution(&envelopes, surplus);

    let txn = db.begin().await?;
    for grant in &distribution.grants {
        adjust_envelope_balance(&txn, user_id, grant.envelope_id, grant.amount).await?;
    }
    if distribution.granted.is_positive() {
        if let Some(surplus_envelope) = find_surplus_envelope(&txn, user_id).await? {
            adjust_envelope_balance(&txn, user_id, surplus_envelope.id, -distribution.granted)
                .await?;
        }
    }
    txn.commit().await?;

    info!(
        granted = %distribution.granted,
        remaining = %distribution.remaining,
        envelopes = distribution.grants.len(),
        "surplus distributed"
    );
    Ok(distribution)
}

async fn find_owned_envelope(
    db: &DatabaseConnection,
    user_id: &str,
    envelope_id: i64,
) -> Result<envelope::Model> {
    Envelope::find()
        .filter(envelope::Column::Id.eq(envelope_id))
        .filter(envelope::Column::UserId.eq(user_id))
        .filter(envelope::Column::IsDeleted.eq(false))
        .one(db)
        .await?
        .ok_or(Error::EnvelopeNotFound { id: envelope_id })
}

async fn find_owned_income_source(
    db: &DatabaseConnection,
    user_id: &str,
    income_source_id: i64,
) -> Result<income_source::Model> {
    IncomeSource::find()
        .filter(income_source::Column::Id.eq(income_source_id))
        .filter(income_source::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or(Error::IncomeSourceNotFound {
            id: income_source_id,
        })
}

async fn find_surplus_envelope<C>(conn: &C, user_id: &str) -> Result<Option<envelope::Model>>
where
    C: ConnectionTrait,
{
    Envelope::find()
        .filter(envelope::Column::UserId.eq(user_id))
        .filter(envelope::Column::IsSurplus.eq(true))
        .filter(envelope::Column::IsDeleted.eq(false))
        .one(conn)
        .await
        .map_err(Into::into)
}
