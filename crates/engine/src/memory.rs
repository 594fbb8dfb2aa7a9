//! In-memory implementations of the storage ports, for tests and dry runs.

use std::collections::BTreeSet;
use tally_core::{
    CategoryStore, SourceKind, StoreError, StoreResult, Transaction, TransactionUpdateSink,
    VendorMapping, VendorStore,
};

#[derive(Debug, Default, Clone)]
pub struct MemoryVendorStore {
    initial: Vec<VendorMapping>,
    saved: Vec<VendorMapping>,
    saves: usize,
}

impl MemoryVendorStore {
    pub fn with(mappings: Vec<VendorMapping>) -> Self {
        Self { initial: mappings, ..Self::default() }
    }

    /// Contents of the most recent save.
    pub fn saved(&self) -> &[VendorMapping] {
        &self.saved
    }

    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl VendorStore for MemoryVendorStore {
    fn load(&self) -> StoreResult<Vec<VendorMapping>> {
        Ok(self.initial.clone())
    }

    fn save(&mut self, mappings: &[VendorMapping]) -> StoreResult<()> {
        self.saved = mappings.to_vec();
        self.saves += 1;
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryCategoryStore {
    initial: Vec<(String, String)>,
    saved: Vec<(String, String)>,
    tracked_only: BTreeSet<String>,
}

impl MemoryCategoryStore {
    pub fn with(pairs: &[(&str, &str)]) -> Self {
        Self {
            initial: pairs.iter().map(|(k, c)| (k.to_string(), c.to_string())).collect(),
            ..Self::default()
        }
    }

    pub fn tracked_only(mut self, category: &str) -> Self {
        self.tracked_only.insert(category.trim().to_lowercase());
        self
    }

    pub fn saved(&self) -> &[(String, String)] {
        &self.saved
    }
}

impl CategoryStore for MemoryCategoryStore {
    fn load(&self) -> StoreResult<Vec<(String, String)>> {
        Ok(self.initial.clone())
    }

    fn save(&mut self, mappings: &[(String, String)]) -> StoreResult<()> {
        self.saved = mappings.to_vec();
        Ok(())
    }

    fn is_tracked_only(&self, category: &str) -> bool {
        self.tracked_only.contains(&category.trim().to_lowercase())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct SinkFailure(pub String);

/// Records every batch it receives. Can be told to fail.
#[derive(Debug)]
pub struct MemorySink {
    source: SourceKind,
    batches: Vec<Vec<Transaction>>,
    fail_with: Option<String>,
}

impl MemorySink {
    pub fn new(source: SourceKind) -> Self {
        Self { source, batches: Vec::new(), fail_with: None }
    }

    pub fn failing(source: SourceKind, message: &str) -> Self {
        Self { fail_with: Some(message.to_string()), ..Self::new(source) }
    }

    pub fn batches(&self) -> &[Vec<Transaction>] {
        &self.batches
    }

    pub fn written(&self) -> impl Iterator<Item = &Transaction> {
        self.batches.iter().flatten()
    }
}

impl TransactionUpdateSink for MemorySink {
    fn source(&self) -> SourceKind {
        self.source
    }

    fn update(&mut self, transactions: &[Transaction]) -> StoreResult<usize> {
        if let Some(message) = &self.fail_with {
            return Err(StoreError::backend(SinkFailure(message.clone())));
        }
        if let Some(stray) = transactions.iter().find(|t| t.source != self.source) {
            return Err(StoreError::WrongSource { expected: self.source, found: stray.source });
        }
        self.batches.push(transactions.to_vec());
        Ok(transactions.len())
    }
}
