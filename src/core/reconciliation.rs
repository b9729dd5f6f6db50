//! The balance identity audit.
//!
//! At any point, `Sum(accounts) == Sum(envelopes) - cc_holding + surplus`
//! must hold: every dollar in an account is either committed to an
//! envelope, double-counted by the credit-card holding envelope, or
//! unallocated surplus. The engine never repairs a broken identity; it
//! reports the discrepancy and leaves remediation to a human.

use crate::{
    core::transfer::{transfer_counts, TransferCounts},
    entities::{account, envelope, transaction, Account, Envelope, Transaction},
    errors::Result,
    money::Money,
};
use chrono::{DateTime, Utc};
use sea_orm::{DatabaseConnection, QueryOrder, prelude::*};
use serde::Serialize;

/// Reported discrepancies within one cent are rounding, not leaks.
const IDENTITY_EPSILON: Money = Money::from_cents(1);

/// One account's contribution to the identity.
#[derive(Debug, Clone, Serialize)]
pub struct AccountBalance {
    /// Account id
    pub id: i64,
    /// Account name
    pub name: String,
    /// Current balance
    pub balance: Money,
}

/// One envelope's contribution to the identity.
#[derive(Debug, Clone, Serialize)]
pub struct EnvelopeBalance {
    /// Envelope id
    pub id: i64,
    /// Envelope name
    pub name: String,
    /// Money currently held
    pub balance: Money,
    /// Whether this envelope is earmarked for credit-card repayment
    pub is_cc_holding: bool,
}

/// Full audit of the reconciliation identity for one user.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReport {
    /// Per-account breakdown, ordered by name
    pub accounts: Vec<AccountBalance>,
    /// Per-envelope breakdown (surplus envelope excluded), ordered by name
    pub envelopes: Vec<EnvelopeBalance>,
    /// Sum of account balances
    pub total_accounts: Money,
    /// Sum of envelope balances (surplus envelope excluded)
    pub total_envelopes: Money,
    /// Sum of credit-card holding envelope balances
    pub cc_holding: Money,
    /// `total_accounts - total_envelopes + cc_holding`
    pub surplus: Money,
    /// Balance of the surplus-tracking envelope, when the user has one
    pub recorded_surplus: Option<Money>,
    /// `surplus - recorded_surplus`; None without a surplus envelope
    pub out_of_balance: Option<Money>,
    /// True when the identity holds within one cent (or cannot be checked)
    pub balanced: bool,
    /// Transfer state feeding envelope-total exclusions
    pub transfers: TransferCounts,
    /// When the audit ran
    pub audited_at: DateTime<Utc>,
}

impl ReconciliationReport {
    /// One-line summary for logs.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "accounts {} | envelopes {} | cc holding {} | surplus {} | {} pending, {} linked transfer pairs{}",
            self.total_accounts,
            self.total_envelopes,
            self.cc_holding,
            self.surplus,
            self.transfers.pending,
            self.transfers.linked_pairs,
            match self.out_of_balance {
                Some(diff) if !self.balanced => format!(" | OUT OF BALANCE by {diff}"),
                _ => String::new(),
            }
        )
    }
}

/// Audits the reconciliation identity. Pure read; never mutates state.
///
/// The computed surplus is the identity rearranged:
/// `surplus = Sum(accounts) - Sum(envelopes) + cc_holding`. When a
/// surplus-tracking envelope exists its balance is the recorded surplus,
/// and the difference between computed and recorded is reported as
/// `out_of_balance`.
///
/// # Errors
/// Returns a database error if any query fails.
pub async fn reconcile(db: &DatabaseConnection, user_id: &str) -> Result<ReconciliationReport> {
    let accounts = Account::find()
        .filter(account::Column::UserId.eq(user_id))
        .filter(account::Column::IsDeleted.eq(false))
        .order_by_asc(account::Column::Name)
        .all(db)
        .await?;
    let envelopes = Envelope::find()
        .filter(envelope::Column::UserId.eq(user_id))
        .filter(envelope::Column::IsDeleted.eq(false))
        .order_by_asc(envelope::Column::Name)
        .all(db)
        .await?;

    let account_rows: Vec<AccountBalance> = accounts
        .iter()
        .map(|a| AccountBalance {
            id: a.id,
            name: a.name.clone(),
            balance: Money::from_cents(a.balance),
        })
        .collect();
    let total_accounts: Money = account_rows.iter().map(|a| a.balance).sum();

    let envelope_rows: Vec<EnvelopeBalance> = envelopes
        .iter()
        .filter(|e| !e.is_surplus)
        .map(|e| EnvelopeBalance {
            id: e.id,
            name: e.name.clone(),
            balance: Money::from_cents(e.balance),
            is_cc_holding: e.is_cc_holding,
        })
        .collect();
    let total_envelopes: Money = envelope_rows.iter().map(|e| e.balance).sum();
    let cc_holding: Money = envelope_rows
        .iter()
        .filter(|e| e.is_cc_holding)
        .map(|e| e.balance)
        .sum();

    let surplus = total_accounts - total_envelopes + cc_holding;
    let recorded_surplus = envelopes
        .iter()
        .find(|e| e.is_surplus)
        .map(|e| Money::from_cents(e.balance));
    let out_of_balance = recorded_surplus.map(|recorded| surplus - recorded);
    let balanced = out_of_balance.is_none_or(|diff| diff.abs() <= IDENTITY_EPSILON);

    Ok(ReconciliationReport {
        accounts: account_rows,
        envelopes: envelope_rows,
        total_accounts,
        total_envelopes,
        cc_holding,
        surplus,
        recorded_surplus,
        out_of_balance,
        balanced,
        transfers: transfer_counts(db, user_id).await?,
        audited_at: Utc::now(),
    })
}

/// Sums a single envelope's transaction activity, excluding linked
/// transfers and pending one-sided transfers - the exclusions that keep
/// internal money movement out of spending totals.
///
/// # Errors
/// Returns a database error if the query fails.
pub async fn envelope_activity(
    db: &DatabaseConnection,
    user_id: &str,
    envelope_id: i64,
) -> Result<Money> {
    let rows = Transaction::find()
        .filter(transaction::Column::UserId.eq(user_id))
        .filter(transaction::Column::EnvelopeId.eq(envelope_id))
        .filter(transaction::Column::TransactionType.ne("transfer"))
        .filter(transaction::Column::TransferPending.eq(false))
        .all(db)
        .await?;
    Ok(rows.iter().map(|t| Money::from_cents(t.amount)).sum())
}
