//! Internal transfer detection and linking.
//!
//! A transfer between two owned accounts shows up as two transactions with
//! inverse amounts. Until the pair is linked (or one side is flagged
//! pending) both rows look like ordinary income/expense and would corrupt
//! envelope spending totals. Per-transaction state machine:
//! `unlinked -> {pending, linked}`; `linked -> unlinked` only via explicit
//! unlink.

use crate::{
    entities::{account, transaction, Account, Transaction},
    errors::{Error, Result},
    money::Money,
};
use chrono::{Duration, Utc};
use sea_orm::{
    sea_query::Expr, DatabaseConnection, PaginatorTrait, Set, TransactionTrait, prelude::*,
};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

/// Partners must lie within this many calendar days of the transaction.
const MATCH_WINDOW_DAYS: i64 = 3;

/// Scans only look back this far, keeping work proportional to recent
/// activity rather than total history.
const SCAN_WINDOW_DAYS: i64 = 30;

/// Inverse amounts may differ by at most this many cents.
const AMOUNT_TOLERANCE_CENTS: i64 = 1;

/// Weight of the date-proximity component of the confidence score.
const DATE_WEIGHT: f64 = 0.6;

/// Bonus for an exactly inverse amount (no cent of slack used).
const EXACT_AMOUNT_BONUS: f64 = 0.3;

/// Bonus when either description names the counter account or says
/// "transfer".
const TEXT_WEIGHT: f64 = 0.4;

/// Scores at or above this are high-confidence proposals.
pub const HIGH_CONFIDENCE: f64 = 0.7;

/// A possible partner for one transaction.
#[derive(Debug, Clone, Serialize)]
pub struct TransferCandidate {
    /// The candidate partner transaction
    pub transaction: transaction::Model,
    /// Bounded confidence score in [0, 1]
    pub confidence: f64,
}

/// A proposed transfer pair found by a scan.
#[derive(Debug, Clone, Serialize)]
pub struct ProposedTransfer {
    /// The side money left (negative amount)
    pub outflow: transaction::Model,
    /// The side money arrived (positive amount)
    pub inflow: transaction::Model,
    /// Bounded confidence score in [0, 1]
    pub confidence: f64,
}

/// Pending and linked tallies for the reconciliation report.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TransferCounts {
    /// One-sided transactions flagged as awaiting their counterpart
    pub pending: u64,
    /// Linked pairs (two rows each)
    pub linked_pairs: u64,
}

fn days_apart(a: &transaction::Model, b: &transaction::Model) -> i64 {
    (a.occurred_at.date_naive() - b.occurred_at.date_naive())
        .num_days()
        .abs()
}

fn amounts_inverse(a: &transaction::Model, b: &transaction::Model) -> bool {
    (a.amount + b.amount).abs() <= AMOUNT_TOLERANCE_CENTS
}

fn mentions_counterparty(
    txn: &transaction::Model,
    other: &transaction::Model,
    account_names: &HashMap<i64, String>,
) -> bool {
    let description = txn.description.to_lowercase();
    if description.contains("transfer") {
        return true;
    }
    account_names
        .get(&other.account_id)
        .is_some_and(|name| description.contains(&name.to_lowercase()))
}

/// Scores how likely two transactions are halves of one transfer.
///
/// Date proximity dominates; an exactly inverse amount and a description
/// naming the counter account (or the word "transfer") add fixed bonuses.
/// Exact-amount same-day pairs score highest. The result is clamped to
/// [0, 1].
#[must_use]
pub fn match_confidence(
    a: &transaction::Model,
    b: &transaction::Model,
    account_names: &HashMap<i64, String>,
) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let date_score =
        DATE_WEIGHT * (1.0 - days_apart(a, b) as f64 / (MATCH_WINDOW_DAYS + 1) as f64);
    let mut score = date_score;
    if a.amount + b.amount == 0 {
        score += EXACT_AMOUNT_BONUS;
    }
    if mentions_counterparty(a, b, account_names) || mentions_counterparty(b, a, account_names) {
        score += TEXT_WEIGHT;
    }
    score.clamp(0.0, 1.0)
}

/// Finds possible partners for one transaction, best first.
///
/// Partners are unlinked, unreconciled transactions on a different account
/// of the same user, with the inverse amount within one cent, inside the
/// symmetric 3-day window.
///
/// # Errors
/// `TransactionNotFound` outside the caller's scope; `Validation` when the
/// transaction is already linked.
pub async fn find_transfer_candidates(
    db: &DatabaseConnection,
    user_id: &str,
    transaction_id: i64,
) -> Result<Vec<TransferCandidate>> {
    let target = find_owned_transaction(db, user_id, transaction_id).await?;
    if target.linked_transaction_id.is_some() {
        return Err(Error::Validation {
            message: format!("transaction {transaction_id} is already linked"),
        });
    }

    // One extra day on the query range so calendar-day comparison never
    // misses an edge; exact filtering happens below.
    let window = Duration::days(MATCH_WINDOW_DAYS + 1);
    let partners = Transaction::find()
        .filter(transaction::Column::UserId.eq(user_id))
        .filter(transaction::Column::Id.ne(target.id))
        .filter(transaction::Column::AccountId.ne(target.account_id))
        .filter(transaction::Column::LinkedTransactionId.is_null())
        .filter(transaction::Column::IsReconciled.eq(false))
        .filter(
            transaction::Column::Amount
                .between(-target.amount - AMOUNT_TOLERANCE_CENTS, -target.amount + AMOUNT_TOLERANCE_CENTS),
        )
        .filter(transaction::Column::OccurredAt.gte(target.occurred_at - window))
        .filter(transaction::Column::OccurredAt.lte(target.occurred_at + window))
        .all(db)
        .await?;

    let account_names = load_account_names(db, user_id).await?;
    let mut candidates: Vec<TransferCandidate> = partners
        .into_iter()
        .filter(|p| days_apart(&target, p) <= MATCH_WINDOW_DAYS)
        .filter(|p| amounts_inverse(&target, p))
        .map(|p| {
            let confidence = match_confidence(&target, &p, &account_names);
            TransferCandidate {
                transaction: p,
                confidence,
            }
        })
        .collect();
    candidates.sort_by(|x, y| {
        y.confidence
            .total_cmp(&x.confidence)
            .then(x.transaction.id.cmp(&y.transaction.id))
    });
    Ok(candidates)
}

/// Scans the last 30 days of unlinked transactions for probable transfer
/// pairs. All candidate pairs are scored, sorted by confidence descending,
/// and accepted greedily while both sides are unclaimed - first accepted
/// wins. Read-only; linking is a separate explicit step.
///
/// # Errors
/// Returns a database error if any query fails.
pub async fn scan_for_transfers(
    db: &DatabaseConnection,
    user_id: &str,
) -> Result<Vec<ProposedTransfer>> {
    let cutoff = Utc::now() - Duration::days(SCAN_WINDOW_DAYS);
    let transactions = Transaction::find()
        .filter(transaction::Column::UserId.eq(user_id))
        .filter(transaction::Column::LinkedTransactionId.is_null())
        .filter(transaction::Column::IsReconciled.eq(false))
        .filter(transaction::Column::OccurredAt.gte(cutoff))
        .all(db)
        .await?;
    let account_names = load_account_names(db, user_id).await?;

    let mut scored: Vec<(f64, usize, usize)> = Vec::new();
    for i in 0..transactions.len() {
        for j in (i + 1)..transactions.len() {
            let (a, b) = (&transactions[i], &transactions[j]);
            if a.account_id == b.account_id
                || !amounts_inverse(a, b)
                || days_apart(a, b) > MATCH_WINDOW_DAYS
            {
                continue;
            }
            scored.push((match_confidence(a, b, &account_names), i, j));
        }
    }
    scored.sort_by(|x, y| y.0.total_cmp(&x.0).then((x.1, x.2).cmp(&(y.1, y.2))));

    let mut claimed: HashSet<i64> = HashSet::new();
    let mut proposals = Vec::new();
    for (confidence, i, j) in scored {
        let (a, b) = (&transactions[i], &transactions[j]);
        if claimed.contains(&a.id) || claimed.contains(&b.id) {
            continue;
        }
        claimed.insert(a.id);
        claimed.insert(b.id);
        let (outflow, inflow) = if a.amount < 0 {
            (a.clone(), b.clone())
        } else {
            (b.clone(), a.clone())
        };
        proposals.push(ProposedTransfer {
            outflow,
            inflow,
            confidence,
        });
    }
    Ok(proposals)
}

/// Flags one side of a transfer as awaiting its counterpart (or clears the
/// flag). Setting pending detaches the transaction from its envelope so it
/// stops counting toward envelope totals while still moving its account's
/// balance.
///
/// # Errors
/// `TransactionNotFound` outside the caller's scope; `Validation` on a
/// linked transaction.
pub async fn mark_transfer_pending(
    db: &DatabaseConnection,
    user_id: &str,
    transaction_id: i64,
    pending: bool,
) -> Result<transaction::Model> {
    let target = find_owned_transaction(db, user_id, transaction_id).await?;
    if target.linked_transaction_id.is_some() {
        return Err(Error::Validation {
            message: format!(
                "transaction {transaction_id} is linked; unlink it instead of flagging pending"
            ),
        });
    }

    let mut active: transaction::ActiveModel = target.into();
    active.transfer_pending = Set(pending);
    if pending {
        active.envelope_id = Set(None);
    }
    Ok(active.update(db).await?)
}

/// Links two transactions as one internal transfer.
///
/// Both rows are updated in one database transaction, each through a
/// compare-and-swap guarded by `linked_transaction_id IS NULL`, so two
/// concurrent match requests cannot double-link a transaction to different
/// partners. Linking clears the pending flag, detaches both rows from
/// envelopes, and types them `transfer`.
///
/// # Errors
/// `AlreadyLinked` when either side is (or becomes) half of another pair;
/// `Validation` on same-account or non-inverse amounts; not-found errors
/// outside the caller's scope.
pub async fn link_transfers(
    db: &DatabaseConnection,
    user_id: &str,
    first_id: i64,
    second_id: i64,
) -> Result<(transaction::Model, transaction::Model)> {
    if first_id == second_id {
        return Err(Error::Validation {
            message: "cannot link a transaction to itself".to_string(),
        });
    }
    let first = find_owned_transaction(db, user_id, first_id).await?;
    let second = find_owned_transaction(db, user_id, second_id).await?;

    if first.account_id == second.account_id {
        return Err(Error::Validation {
            message: "both sides of a transfer are on the same account".to_string(),
        });
    }
    if !amounts_inverse(&first, &second) {
        return Err(Error::Validation {
            message: format!(
                "amounts {} and {} are not inverse within one cent",
                Money::from_cents(first.amount),
                Money::from_cents(second.amount)
            ),
        });
    }

    let txn = db.begin().await?;
    link_one_side(&txn, user_id, first_id, second_id).await?;
    link_one_side(&txn, user_id, second_id, first_id).await?;

    let first = Transaction::find_by_id(first_id)
        .one(&txn)
        .await?
        .ok_or(Error::TransactionNotFound { id: first_id })?;
    let second = Transaction::find_by_id(second_id)
        .one(&txn)
        .await?
        .ok_or(Error::TransactionNotFound { id: second_id })?;
    txn.commit().await?;

    info!(
        first = first.id,
        second = second.id,
        amount = %Money::from_cents(first.amount.abs()),
        "transactions linked as internal transfer"
    );
    Ok((first, second))
}

async fn link_one_side<C>(conn: &C, user_id: &str, id: i64, partner_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    let updated = Transaction::update_many()
        .col_expr(
            transaction::Column::LinkedTransactionId,
            Expr::value(Some(partner_id)),
        )
        .col_expr(transaction::Column::TransactionType, Expr::value("transfer"))
        .col_expr(transaction::Column::TransferPending, Expr::value(false))
        .col_expr(
            transaction::Column::EnvelopeId,
            Expr::value(Option::<i64>::None),
        )
        .filter(transaction::Column::Id.eq(id))
        .filter(transaction::Column::UserId.eq(user_id))
        .filter(transaction::Column::LinkedTransactionId.is_null())
        .exec(conn)
        .await?;
    if updated.rows_affected != 1 {
        return Err(Error::AlreadyLinked { transaction_id: id });
    }
    Ok(())
}

/// Unlinks a transfer pair, restoring each side's `transaction_type` from
/// the sign of its amount (`>= 0` becomes `income`, otherwise `expense`).
/// The original pre-link type is not stored anywhere, so this recovery is
/// heuristic and logged at `warn` on every use.
///
/// # Errors
/// `TransactionNotFound` outside the caller's scope; `Validation` when the
/// transaction is not linked or the pair's links disagree.
pub async fn unlink_transfers(
    db: &DatabaseConnection,
    user_id: &str,
    transaction_id: i64,
) -> Result<(transaction::Model, transaction::Model)> {
    let target = find_owned_transaction(db, user_id, transaction_id).await?;
    let partner_id = target.linked_transaction_id.ok_or(Error::Validation {
        message: format!("transaction {transaction_id} is not linked"),
    })?;
    let partner = find_owned_transaction(db, user_id, partner_id).await?;
    if partner.linked_transaction_id != Some(target.id) {
        return Err(Error::Validation {
            message: format!(
                "transfer links disagree: {} points at {partner_id}, which points elsewhere",
                target.id
            ),
        });
    }

    let txn = db.begin().await?;
    let restored_target = unlink_one_side(&txn, target).await?;
    let restored_partner = unlink_one_side(&txn, partner).await?;
    txn.commit().await?;

    warn!(
        first = restored_target.id,
        first_type = %restored_target.transaction_type,
        second = restored_partner.id,
        second_type = %restored_partner.transaction_type,
        "transfer unlinked; transaction types restored from amount sign, which may not match the original classification"
    );
    Ok((restored_target, restored_partner))
}

async fn unlink_one_side<C>(conn: &C, row: transaction::Model) -> Result<transaction::Model>
where
    C: ConnectionTrait,
{
    let restored_type = if row.amount >= 0 { "income" } else { "expense" };
    let mut active: transaction::ActiveModel = row.into();
    active.linked_transaction_id = Set(None);
    active.transfer_pending = Set(false);
    active.transaction_type = Set(restored_type.to_string());
    Ok(active.update(conn).await?)
}

/// Counts pending one-sided transfers and linked pairs for the
/// reconciliation report. Every real transfer occupies two rows, so the
/// pair count is the linked-row count halved.
///
/// # Errors
/// Returns a database error if a count query fails.
pub async fn transfer_counts(db: &DatabaseConnection, user_id: &str) -> Result<TransferCounts> {
    let pending = Transaction::find()
        .filter(transaction::Column::UserId.eq(user_id))
        .filter(transaction::Column::TransferPending.eq(true))
        .filter(transaction::Column::LinkedTransactionId.is_null())
        .count(db)
        .await?;
    let linked_rows = Transaction::find()
        .filter(transaction::Column::UserId.eq(user_id))
        .filter(transaction::Column::LinkedTransactionId.is_not_null())
        .count(db)
        .await?;
    Ok(TransferCounts {
        pending,
        linked_pairs: linked_rows / 2,
    })
}

async fn find_owned_transaction(
    db: &DatabaseConnection,
    user_id: &str,
    transaction_id: i64,
) -> Result<transaction::Model> {
    Transaction::find()
        .filter(transaction::Column::Id.eq(transaction_id))
        .filter(transaction::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or(Error::TransactionNotFound { id: transaction_id })
}

async fn load_account_names(
    db: &DatabaseConnection,
    user_id: &str,
) -> Result<HashMap<i64, String>> {
    let accounts = Account::find()
        .filter(account::Column::UserId.eq(user_id))
        .all(db)
        .await?;
    Ok(accounts.into_iter().map(|a| (a.id, a.name)).collect())
}
