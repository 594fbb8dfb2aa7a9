use rust_decimal::Decimal;
use std::fmt;
use tally_core::Transaction;

use crate::config::ReconcileConfig;
use crate::detect::contains_any;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchConfidence {
    Low,
    Medium,
    High,
}

impl MatchConfidence {
    pub fn from_score(score: u32) -> Self {
        match score {
            0..=3 => MatchConfidence::Low,
            4 => MatchConfidence::Medium,
            _ => MatchConfidence::High,
        }
    }
}

impl fmt::Display for MatchConfidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchConfidence::Low => write!(f, "Low"),
            MatchConfidence::Medium => write!(f, "Medium"),
            MatchConfidence::High => write!(f, "High"),
        }
    }
}

/// A candidate pairing of two transfers, by position in the working slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferMatch {
    pub first: usize,
    pub second: usize,
    pub score: u32,
    pub confidence: MatchConfidence,
}

pub struct TransferMatcher {
    pub amount_tolerance: Decimal,
    pub min_score: u32,
    pub pairing_keywords: Vec<String>,
}

impl Default for TransferMatcher {
    fn default() -> Self {
        Self::new(&ReconcileConfig::default())
    }
}

impl TransferMatcher {
    pub fn new(config: &ReconcileConfig) -> Self {
        Self {
            amount_tolerance: config.amount_tolerance,
            min_score: config.min_score,
            pairing_keywords: config
                .pairing_keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    /// Additive evidence that `a` and `b` are two sides of one transfer:
    /// mirrored amount 3, same day 2 (or adjacent day 1), different account
    /// type 1, both described as transfers or payments 1.
    pub fn score(&self, a: &Transaction, b: &Transaction) -> u32 {
        let mut score = 0;

        let diff = (a.amount.abs().as_decimal() - b.amount.abs().as_decimal()).abs();
        let opposite = (a.amount.is_positive() && b.amount.is_negative())
            || (a.amount.is_negative() && b.amount.is_positive());
        if diff < self.amount_tolerance && opposite {
            score += 3;
        }

        let days = (a.date - b.date).num_days().abs();
        if days == 0 {
            score += 2;
        } else if days <= 1 {
            score += 1;
        }

        if !a.account_type.trim().eq_ignore_ascii_case(b.account_type.trim()) {
            score += 1;
        }

        if contains_any(&a.description, &self.pairing_keywords)
            && contains_any(&b.description, &self.pairing_keywords)
        {
            score += 1;
        }

        score
    }

    /// Unreconciled transfers that could pair with `transactions[index]`,
    /// best first. Equal scores keep slice order.
    pub fn candidates_for(&self, transactions: &[Transaction], index: usize) -> Vec<TransferMatch> {
        let first = &transactions[index];
        let mut matches: Vec<TransferMatch> = transactions
            .iter()
            .enumerate()
            .filter(|(_, t)| t.id != first.id && t.is_unreconciled_transfer())
            .filter_map(|(j, t)| {
                let score = self.score(first, t);
                (score >= self.min_score).then(|| TransferMatch {
                    first: index,
                    second: j,
                    score,
                    confidence: MatchConfidence::from_score(score),
                })
            })
            .collect();
        matches.sort_by(|a, b| b.score.cmp(&a.score));
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tally_core::{Money, SourceKind, TransactionType};

    fn transfer(id: i64, day: u32, cents: i64, desc: &str, account_type: &str) -> Transaction {
        let mut tx = Transaction::new(
            id,
            SourceKind::BankAccount,
            NaiveDate::from_ymd_opt(2024, 4, day).unwrap(),
            Money::from_cents(cents),
            desc,
            None,
        )
        .with_account(account_type, "0001");
        tx.kind = TransactionType::Transfer;
        tx
    }

    #[test]
    fn full_evidence_scores_seven_and_high() {
        let m = TransferMatcher::default();
        let a = transfer(1, 10, 50_000, "CREDIT CARD PAYMENT", "Chequing");
        let b = transfer(2, 10, -50_000, "PAYMENT THANK YOU", "Visa");
        assert_eq!(m.score(&a, &b), 7);
        assert_eq!(MatchConfidence::from_score(7), MatchConfidence::High);
    }

    #[test]
    fn same_sign_amounts_earn_nothing_for_amount() {
        let m = TransferMatcher::default();
        let a = transfer(1, 10, 50_000, "X", "Chequing");
        let b = transfer(2, 10, 50_000, "Y", "Chequing");
        assert_eq!(m.score(&a, &b), 2);
    }

    #[test]
    fn amount_must_agree_within_a_cent() {
        let m = TransferMatcher::default();
        let a = transfer(1, 10, 50_000, "X", "Chequing");
        let b = transfer(2, 10, -50_001, "Y", "Chequing");
        assert_eq!(m.score(&a, &b), 2);
    }

    #[test]
    fn adjacent_day_scores_one_and_later_days_none() {
        let m = TransferMatcher::default();
        let a = transfer(1, 10, 1_000, "X", "Chequing");
        assert_eq!(m.score(&a, &transfer(2, 11, -1_000, "Y", "Chequing")), 4);
        assert_eq!(m.score(&a, &transfer(3, 9, -1_000, "Y", "Chequing")), 4);
        assert_eq!(m.score(&a, &transfer(4, 12, -1_000, "Y", "Chequing")), 3);
    }

    #[test]
    fn keyword_point_needs_both_descriptions() {
        let m = TransferMatcher::default();
        let a = transfer(1, 1, 100, "ONLINE TRANSFER", "Chequing");
        let b = transfer(2, 20, 999, "GROCER", "Chequing");
        assert_eq!(m.score(&a, &b), 0);
        let c = transfer(3, 20, 999, "Loan Payment", "Chequing");
        assert_eq!(m.score(&a, &c), 1);
    }

    #[test]
    fn labels_by_score() {
        assert_eq!(MatchConfidence::from_score(3), MatchConfidence::Low);
        assert_eq!(MatchConfidence::from_score(4), MatchConfidence::Medium);
        assert_eq!(MatchConfidence::from_score(5), MatchConfidence::High);
        assert_eq!(MatchConfidence::High.to_string(), "High");
    }

    #[test]
    fn candidates_sorted_and_filtered() {
        let m = TransferMatcher::default();
        let mut txs = vec![
            transfer(1, 10, 20_000, "TRANSFER TO SAVINGS", "Chequing"),
            transfer(2, 11, -20_000, "GROCER", "Chequing"),           // 3 + 1 = 4
            transfer(3, 10, -20_000, "TRANSFER FROM CHQ", "Savings"), // 3 + 2 + 1 + 1 = 7
            transfer(4, 28, 5_000, "COFFEE", "Chequing"),             // 0
            transfer(5, 10, -20_000, "TRANSFER FROM CHQ", "Savings"), // 7, already paired
        ];
        txs[4].is_reconciled_transfer = true;
        txs[4].linked_transaction_id = Some("old".into());

        let found = m.candidates_for(&txs, 0);
        let order: Vec<_> = found.iter().map(|c| (c.second, c.score)).collect();
        assert_eq!(order, vec![(2, 7), (1, 4)]);
        assert_eq!(found[1].confidence, MatchConfidence::Medium);
    }

    #[test]
    fn non_transfers_are_not_candidates() {
        let m = TransferMatcher::default();
        let mut txs = vec![
            transfer(1, 10, 20_000, "TRANSFER", "Chequing"),
            transfer(2, 10, -20_000, "TRANSFER", "Savings"),
        ];
        txs[1].kind = TransactionType::Expense;
        assert!(m.candidates_for(&txs, 0).is_empty());
    }
}
