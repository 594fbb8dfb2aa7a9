use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::money::Money;

/// Semantic type assigned by the detector or by an operator during review.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    #[default]
    Unprocessed,
    Income,
    Expense,
    Transfer,
    Adjustment,
}

impl TransactionType {
    /// Stable numeric code used by storage. `Unprocessed` is 0.
    pub fn code(self) -> i64 {
        match self {
            TransactionType::Unprocessed => 0,
            TransactionType::Income => 1,
            TransactionType::Expense => 2,
            TransactionType::Transfer => 3,
            TransactionType::Adjustment => 4,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(TransactionType::Unprocessed),
            1 => Some(TransactionType::Income),
            2 => Some(TransactionType::Expense),
            3 => Some(TransactionType::Transfer),
            4 => Some(TransactionType::Adjustment),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionType::Unprocessed => write!(f, "unprocessed"),
            TransactionType::Income => write!(f, "income"),
            TransactionType::Expense => write!(f, "expense"),
            TransactionType::Transfer => write!(f, "transfer"),
            TransactionType::Adjustment => write!(f, "adjustment"),
        }
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "unprocessed" => Ok(TransactionType::Unprocessed),
            "income" => Ok(TransactionType::Income),
            "expense" => Ok(TransactionType::Expense),
            "transfer" => Ok(TransactionType::Transfer),
            "adjustment" => Ok(TransactionType::Adjustment),
            other => Err(format!("Unknown transaction type: '{other}'")),
        }
    }
}

/// The repository a transaction was loaded from. Each source persists
/// through its own update sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    BankAccount,
    CreditCard,
}

impl SourceKind {
    pub const ALL: [SourceKind; 2] = [SourceKind::BankAccount, SourceKind::CreditCard];
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::BankAccount => write!(f, "bank_account"),
            SourceKind::CreditCard => write!(f, "credit_card"),
        }
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "bank_account" | "bank" => Ok(SourceKind::BankAccount),
            "credit_card" | "card" => Ok(SourceKind::CreditCard),
            other => Err(format!("Unknown transaction source: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub source: SourceKind,
    pub account_type: String,
    pub account_number: String,
    pub date: NaiveDate,
    pub amount: Money,
    pub description: String,
    pub vendor: Option<String>,
    pub category: Option<String>,
    pub kind: TransactionType,
    /// Correlation id shared by both sides of a reconciled transfer.
    pub linked_transaction_id: Option<String>,
    pub is_reconciled_transfer: bool,
}

impl Transaction {
    /// Builds an unprocessed record. Description fragments are trimmed and
    /// joined with a single space; an empty second fragment is dropped.
    pub fn new(
        id: i64,
        source: SourceKind,
        date: NaiveDate,
        amount: Money,
        description: &str,
        description_extra: Option<&str>,
    ) -> Self {
        Transaction {
            id,
            source,
            account_type: String::new(),
            account_number: String::new(),
            date,
            amount,
            description: join_description(description, description_extra),
            vendor: None,
            category: None,
            kind: TransactionType::Unprocessed,
            linked_transaction_id: None,
            is_reconciled_transfer: false,
        }
    }

    pub fn with_account(mut self, account_type: &str, account_number: &str) -> Self {
        self.account_type = account_type.trim().to_string();
        self.account_number = account_number.trim().to_string();
        self
    }

    pub fn is_classified(&self) -> bool {
        self.kind != TransactionType::Unprocessed && self.vendor.is_some() && self.category.is_some()
    }

    pub fn is_unreconciled_transfer(&self) -> bool {
        self.kind == TransactionType::Transfer && !self.is_reconciled_transfer
    }
}

pub fn join_description(first: &str, second: Option<&str>) -> String {
    let first = first.trim();
    match second.map(str::trim).filter(|s| !s.is_empty()) {
        Some(second) if first.is_empty() => second.to_string(),
        Some(second) => format!("{first} {second}"),
        None => first.to_string(),
    }
}
