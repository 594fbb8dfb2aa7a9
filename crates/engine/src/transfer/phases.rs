//! Per-phase state changes, separate from the prompting that drives them.

use std::collections::HashMap;
use tally_core::{Transaction, TransactionType};
use uuid::Uuid;

use super::ReconcileError;
use crate::detect::contains_any;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EtransferDecision {
    KeepTransfer,
    Expense { category: String },
}

/// Terminal outcome for a transfer nobody claimed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    KeepTransfer,
    Expense { category: String },
    Income,
    Adjustment,
}

/// Menu choice in unmatched review, before a category has been asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnmatchedChoice {
    KeepTransfer,
    Expense,
    Income,
    Adjustment,
}

impl UnmatchedChoice {
    /// `1`–`4`; anything else keeps the transfer.
    pub fn from_input(input: &str) -> Self {
        match input.trim() {
            "2" => UnmatchedChoice::Expense,
            "3" => UnmatchedChoice::Income,
            "4" => UnmatchedChoice::Adjustment,
            _ => UnmatchedChoice::KeepTransfer,
        }
    }
}

/// Unreconciled transfers whose description carries an e-transfer marker,
/// in slice order.
pub fn etransfer_candidates(transactions: &[Transaction], markers: &[String]) -> Vec<usize> {
    let markers: Vec<String> = markers.iter().map(|m| m.trim().to_lowercase()).collect();
    transactions
        .iter()
        .enumerate()
        .filter(|(_, t)| t.is_unreconciled_transfer() && contains_any(&t.description, &markers))
        .map(|(i, _)| i)
        .collect()
}

/// Returns whether the transaction changed.
pub fn apply_etransfer_decision(tx: &mut Transaction, decision: EtransferDecision) -> bool {
    match decision {
        EtransferDecision::KeepTransfer => false,
        EtransferDecision::Expense { category } => {
            apply_disposition(tx, Disposition::Expense { category })
        }
    }
}

/// Returns whether the transaction changed.
pub fn apply_disposition(tx: &mut Transaction, disposition: Disposition) -> bool {
    let (kind, category) = match disposition {
        Disposition::KeepTransfer => return false,
        Disposition::Expense { category } => (TransactionType::Expense, Some(category)),
        Disposition::Income => (TransactionType::Income, None),
        Disposition::Adjustment => (TransactionType::Adjustment, None),
    };
    let changed = tx.kind != kind || tx.category != category;
    tx.kind = kind;
    tx.category = category;
    changed
}

/// Links two unreconciled transactions under a fresh correlation id.
pub fn link_pair(
    transactions: &mut [Transaction],
    first: usize,
    second: usize,
) -> Result<String, ReconcileError> {
    if first == second {
        return Err(ReconcileError::InvariantViolation(format!(
            "transaction {} cannot be linked to itself",
            transactions[first].id
        )));
    }
    for idx in [first, second] {
        let tx = &transactions[idx];
        if tx.is_reconciled_transfer || tx.linked_transaction_id.is_some() {
            return Err(ReconcileError::InvariantViolation(format!(
                "transaction {} is already linked",
                tx.id
            )));
        }
    }

    let link = Uuid::new_v4().to_string();
    for idx in [first, second] {
        let tx = &mut transactions[idx];
        tx.linked_transaction_id = Some(link.clone());
        tx.is_reconciled_transfer = true;
    }
    Ok(link)
}

/// Clears links left behind by a partial write-back: a link id carried by a
/// single transaction, or a reconciled flag with no link. The released rows
/// are unreconciled again and can be paired anew. Links shared by more
/// than two rows are left for `verify_links` to reject.
pub fn release_orphaned_links(transactions: &mut [Transaction]) -> Vec<usize> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for link in transactions.iter().filter_map(|t| t.linked_transaction_id.as_ref()) {
        *counts.entry(link.clone()).or_default() += 1;
    }

    let mut released = Vec::new();
    for (idx, tx) in transactions.iter_mut().enumerate() {
        let orphaned = match tx.linked_transaction_id.as_ref() {
            Some(link) => counts.get(link) == Some(&1),
            None => tx.is_reconciled_transfer,
        };
        if orphaned {
            tx.linked_transaction_id = None;
            tx.is_reconciled_transfer = false;
            released.push(idx);
        }
    }
    released
}

/// Every reconciled transaction has a link id shared with exactly one
/// other transaction, and no link id is shared by more than two.
pub fn verify_links(transactions: &[Transaction]) -> Result<(), ReconcileError> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for tx in transactions {
        if let Some(link) = tx.linked_transaction_id.as_deref() {
            *counts.entry(link).or_default() += 1;
        }
    }

    if let Some((link, n)) = counts.iter().find(|(_, n)| **n > 2) {
        return Err(ReconcileError::InvariantViolation(format!(
            "link {link} is shared by {n} transactions"
        )));
    }

    for tx in transactions.iter().filter(|t| t.is_reconciled_transfer) {
        match tx.linked_transaction_id.as_deref() {
            None => {
                return Err(ReconcileError::InvariantViolation(format!(
                    "transaction {} is reconciled without a link",
                    tx.id
                )))
            }
            Some(link) if counts.get(link) != Some(&2) => {
                return Err(ReconcileError::InvariantViolation(format!(
                    "transaction {} has no partner for link {link}",
                    tx.id
                )))
            }
            Some(_) => {}
        }
    }
    Ok(())
}
