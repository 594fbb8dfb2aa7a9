use serde::Serialize;
use std::collections::BTreeMap;
use tally_core::{BudgetProfile, Money, Transaction, TransactionType};

pub const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryLine {
    pub category: String,
    /// `None` when the profile sets no limit for this category.
    pub budgeted: Option<Money>,
    pub spent: Money,
    pub tracked_only: bool,
}

impl CategoryLine {
    pub fn remaining(&self) -> Option<Money> {
        self.budgeted.map(|b| b - self.spent)
    }

    pub fn is_over(&self) -> bool {
        self.remaining().is_some_and(|r| r.is_negative())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetSummary {
    pub profile: String,
    pub lines: Vec<CategoryLine>,
    pub budgeted: Money,
    pub spent: Money,
    pub remaining: Money,
    /// Monthly income minus counted spend.
    pub net: Money,
}

/// Actual expense spend per category against the profile's limits.
///
/// Only `Expense` transactions count, by absolute amount. Tracked-only
/// categories get a line but stay out of every total.
pub fn summarize<F>(transactions: &[Transaction], profile: &BudgetProfile, tracked_only: F) -> BudgetSummary
where
    F: Fn(&str) -> bool,
{
    let mut spent: BTreeMap<String, Money> = BTreeMap::new();
    for tx in transactions.iter().filter(|t| t.kind == TransactionType::Expense) {
        let category = match tx.category.as_deref().map(str::trim) {
            Some(c) if !c.is_empty() => profile
                .canonical_category(c)
                .map(str::to_string)
                .unwrap_or_else(|| c.to_string()),
            _ => UNCATEGORIZED.to_string(),
        };
        let entry = spent.entry(category).or_default();
        *entry = *entry + tx.amount.abs();
    }

    let mut lines: Vec<CategoryLine> = profile
        .limits()
        .map(|(name, limit)| CategoryLine {
            category: name.to_string(),
            budgeted: Some(limit),
            spent: spent.remove(name).unwrap_or_default(),
            tracked_only: tracked_only(name),
        })
        .collect();
    lines.extend(spent.into_iter().map(|(category, spent)| CategoryLine {
        tracked_only: tracked_only(&category),
        category,
        budgeted: None,
        spent,
    }));

    let counted = || lines.iter().filter(|l| !l.tracked_only);
    let budgeted: Money = counted().filter_map(|l| l.budgeted).sum();
    let total_spent: Money = counted().map(|l| l.spent).sum();

    BudgetSummary {
        profile: profile.name.clone(),
        budgeted,
        spent: total_spent,
        remaining: budgeted - total_spent,
        net: profile.monthly_income - total_spent,
        lines,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tally_core::SourceKind;

    fn tx(id: i64, cents: i64, kind: TransactionType, category: Option<&str>) -> Transaction {
        let mut t = Transaction::new(
            id,
            SourceKind::CreditCard,
            NaiveDate::from_ymd_opt(2024, 9, 1).unwrap(),
            Money::from_cents(cents),
            "X",
            None,
        );
        t.kind = kind;
        t.category = category.map(str::to_string);
        t
    }

    fn profile() -> BudgetProfile {
        let mut p = BudgetProfile::new("Household", "sam", Money::from_cents(500_000)).unwrap();
        p.add_category("Groceries", Money::from_cents(60_000)).unwrap();
        p.add_category("Dining", Money::from_cents(20_000)).unwrap();
        p.add_category("Reimbursable", Money::from_cents(10_000)).unwrap();
        p
    }

    #[test]
    fn only_expenses_count() {
        let txs = vec![
            tx(1, 12_000, TransactionType::Expense, Some("groceries")),
            tx(2, 3_000, TransactionType::Expense, Some("Groceries")),
            tx(3, 50_000, TransactionType::Transfer, Some("Groceries")),
            tx(4, -400_000, TransactionType::Income, None),
            tx(5, 2_500, TransactionType::Adjustment, Some("Dining")),
        ];
        let s = summarize(&txs, &profile(), |_| false);

        let groceries = s.lines.iter().find(|l| l.category == "Groceries").unwrap();
        assert_eq!(groceries.spent, Money::from_cents(15_000));
        assert_eq!(groceries.remaining(), Some(Money::from_cents(45_000)));
        assert_eq!(s.spent, Money::from_cents(15_000));
        assert_eq!(s.budgeted, Money::from_cents(90_000));
        assert_eq!(s.net, Money::from_cents(485_000));
    }

    #[test]
    fn refunds_count_by_absolute_amount() {
        let txs = vec![tx(1, -2_000, TransactionType::Expense, Some("Dining"))];
        let s = summarize(&txs, &profile(), |_| false);
        assert_eq!(s.spent, Money::from_cents(2_000));
    }

    #[test]
    fn tracked_only_is_listed_but_not_totalled() {
        let txs = vec![
            tx(1, 8_000, TransactionType::Expense, Some("Reimbursable")),
            tx(2, 1_000, TransactionType::Expense, Some("Dining")),
        ];
        let s = summarize(&txs, &profile(), |c| c.eq_ignore_ascii_case("reimbursable"));

        let line = s.lines.iter().find(|l| l.category == "Reimbursable").unwrap();
        assert!(line.tracked_only);
        assert_eq!(line.spent, Money::from_cents(8_000));
        assert_eq!(s.spent, Money::from_cents(1_000));
        assert_eq!(s.budgeted, Money::from_cents(80_000));
        assert_eq!(s.remaining, Money::from_cents(79_000));
    }

    #[test]
    fn unknown_and_missing_categories_get_lines() {
        let txs = vec![
            tx(1, 700, TransactionType::Expense, None),
            tx(2, 300, TransactionType::Expense, Some("  ")),
            tx(3, 9_900, TransactionType::Expense, Some("Hobbies")),
        ];
        let s = summarize(&txs, &profile(), |_| false);

        let uncategorized = s.lines.iter().find(|l| l.category == UNCATEGORIZED).unwrap();
        assert_eq!(uncategorized.spent, Money::from_cents(1_000));
        assert_eq!(uncategorized.budgeted, None);
        let hobbies = s.lines.iter().find(|l| l.category == "Hobbies").unwrap();
        assert!(!hobbies.is_over());
        assert_eq!(s.spent, Money::from_cents(10_900));
        assert_eq!(s.remaining, Money::from_cents(79_100));
    }

    #[test]
    fn overspend_is_flagged() {
        let txs = vec![tx(1, 25_000, TransactionType::Expense, Some("Dining"))];
        let s = summarize(&txs, &profile(), |_| false);
        let dining = s.lines.iter().find(|l| l.category == "Dining").unwrap();
        assert!(dining.is_over());
        assert_eq!(dining.remaining(), Some(Money::from_cents(-5_000)));
    }
}
