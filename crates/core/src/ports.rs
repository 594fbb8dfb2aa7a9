//! Contracts between the engine and whatever stores, renders and prompts
//! for it.

use chrono::NaiveDate;
use std::error::Error as StdError;
use thiserror::Error;

use super::money::Money;
use super::transaction::{SourceKind, Transaction};
use super::vendor::VendorMapping;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage backend error: {0}")]
    Backend(#[source] Box<dyn StdError + Send + Sync>),
    #[error("No update sink registered for source {0}")]
    NoSink(SourceKind),
    #[error("Sink for {expected} was handed a {found} transaction")]
    WrongSource {
        expected: SourceKind,
        found: SourceKind,
    },
}

impl StoreError {
    pub fn backend<E: StdError + Send + Sync + 'static>(e: E) -> Self {
        StoreError::Backend(Box::new(e))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

pub trait VendorStore {
    fn load(&self) -> StoreResult<Vec<VendorMapping>>;
    fn save(&mut self, mappings: &[VendorMapping]) -> StoreResult<()>;
}

/// Vendor-or-pattern keys mapped to category names, in match order.
pub trait CategoryStore {
    fn load(&self) -> StoreResult<Vec<(String, String)>>;
    fn save(&mut self, mappings: &[(String, String)]) -> StoreResult<()>;
    fn is_tracked_only(&self, category: &str) -> bool;
}

/// Writes mutated transactions back to the repository they came from.
/// Implemented once per source.
pub trait TransactionUpdateSink {
    fn source(&self) -> SourceKind;

    /// Upserts by id and returns the number of rows affected. Callers only
    /// pass transactions of `self.source()`.
    fn update(&mut self, transactions: &[Transaction]) -> StoreResult<usize>;
}

impl<T: TransactionUpdateSink + ?Sized> TransactionUpdateSink for &mut T {
    fn source(&self) -> SourceKind {
        (**self).source()
    }

    fn update(&mut self, transactions: &[Transaction]) -> StoreResult<usize> {
        (**self).update(transactions)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Vendor,
    Category,
}

/// What the operator sees when asked to teach a new pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct PairPrompt {
    pub kind: PromptKind,
    /// Description (vendor prompts) or vendor name (category prompts).
    pub subject: String,
    pub date: NaiveDate,
    pub amount: Money,
}

impl PairPrompt {
    pub fn for_transaction(kind: PromptKind, subject: &str, tx: &Transaction) -> Self {
        PairPrompt {
            kind,
            subject: subject.to_string(),
            date: tx.date,
            amount: tx.amount,
        }
    }
}

pub trait InteractionPort {
    fn show_message(&mut self, text: &str);

    /// Next line of operator input, or `None` once input is closed.
    fn get_input(&mut self) -> Option<String>;

    /// Asks for a `(key, value)` pair to learn. `None` means skip.
    fn prompt_for_pair(&mut self, prompt: &PairPrompt) -> Option<(String, String)>;
}

impl<P: InteractionPort + ?Sized> InteractionPort for &mut P {
    fn show_message(&mut self, text: &str) {
        (**self).show_message(text)
    }

    fn get_input(&mut self) -> Option<String> {
        (**self).get_input()
    }

    fn prompt_for_pair(&mut self, prompt: &PairPrompt) -> Option<(String, String)> {
        (**self).prompt_for_pair(prompt)
    }
}
