//! Blocking adapters that let the synchronous engine use the async database.
//!
//! Each adapter holds a runtime handle and blocks on it, so they must be
//! called from outside the runtime's own tasks.

use tally_core::{
    CategoryStore, SourceKind, StoreError, StoreResult, Transaction, TransactionUpdateSink,
    VendorMapping, VendorStore,
};
use tokio::runtime::Handle;
use tracing::warn;

use crate::db::{self, DbPool};

pub struct SqliteVendorStore {
    pool: DbPool,
    handle: Handle,
}

impl SqliteVendorStore {
    pub fn new(pool: DbPool, handle: Handle) -> Self {
        Self { pool, handle }
    }
}

impl VendorStore for SqliteVendorStore {
    fn load(&self) -> StoreResult<Vec<VendorMapping>> {
        self.handle
            .block_on(db::get_vendor_mappings(&self.pool))
            .map_err(StoreError::backend)
    }

    fn save(&mut self, mappings: &[VendorMapping]) -> StoreResult<()> {
        self.handle
            .block_on(db::replace_vendor_mappings(&self.pool, mappings))
            .map_err(StoreError::backend)
    }
}

pub struct SqliteCategoryStore {
    pool: DbPool,
    handle: Handle,
}

impl SqliteCategoryStore {
    pub fn new(pool: DbPool, handle: Handle) -> Self {
        Self { pool, handle }
    }
}

impl CategoryStore for SqliteCategoryStore {
    fn load(&self) -> StoreResult<Vec<(String, String)>> {
        self.handle
            .block_on(db::get_category_mappings(&self.pool))
            .map_err(StoreError::backend)
    }

    fn save(&mut self, mappings: &[(String, String)]) -> StoreResult<()> {
        self.handle
            .block_on(db::replace_category_mappings(&self.pool, mappings))
            .map_err(StoreError::backend)
    }

    fn is_tracked_only(&self, category: &str) -> bool {
        match self.handle.block_on(db::is_tracked_only(&self.pool, category)) {
            Ok(flag) => flag,
            Err(e) => {
                warn!(error = %e, category, "tracked-only lookup failed; counting category");
                false
            }
        }
    }
}

/// Writes one source's transactions back to the shared table.
pub struct SqliteTransactionSink {
    source: SourceKind,
    pool: DbPool,
    handle: Handle,
}

impl SqliteTransactionSink {
    pub fn new(source: SourceKind, pool: DbPool, handle: Handle) -> Self {
        Self { source, pool, handle }
    }
}

impl TransactionUpdateSink for SqliteTransactionSink {
    fn source(&self) -> SourceKind {
        self.source
    }

    fn update(&mut self, transactions: &[Transaction]) -> StoreResult<usize> {
        if let Some(stray) = transactions.iter().find(|t| t.source != self.source) {
            return Err(StoreError::WrongSource {
                expected: self.source,
                found: stray.source,
            });
        }
        let rows = self
            .handle
            .block_on(db::upsert_transactions(&self.pool, transactions))
            .map_err(StoreError::backend)?;
        Ok(rows as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tally_core::{Category, Money, TransactionType};
    use tokio::runtime::Runtime;

    fn setup() -> (tempfile::TempDir, Runtime, DbPool) {
        let dir = tempfile::tempdir().unwrap();
        let rt = Runtime::new().unwrap();
        let pool = rt.block_on(db::create_db(&dir.path().join("tally.db"))).unwrap();
        (dir, rt, pool)
    }

    #[test]
    fn vendor_store_saves_and_reloads() {
        let (_dir, rt, pool) = setup();
        let mut store = SqliteVendorStore::new(pool, rt.handle().clone());
        assert!(store.load().unwrap().is_empty());

        let mappings = vec![VendorMapping::new("esso", "Esso").with_category("Fuel")];
        store.save(&mappings).unwrap();
        assert_eq!(store.load().unwrap(), mappings);
    }

    #[test]
    fn category_store_reports_tracked_only() {
        let (_dir, rt, pool) = setup();
        rt.block_on(db::save_category(&pool, &Category::tracked_only("Reimbursable")))
            .unwrap();
        let mut store = SqliteCategoryStore::new(pool, rt.handle().clone());

        store.save(&[("esso".into(), "Fuel".into())]).unwrap();
        assert_eq!(store.load().unwrap(), vec![("esso".to_string(), "Fuel".to_string())]);
        assert!(store.is_tracked_only("REIMBURSABLE"));
        assert!(!store.is_tracked_only("Fuel"));
    }

    #[test]
    fn sink_upserts_own_source_only() {
        let (_dir, rt, pool) = setup();
        let raw = Transaction::new(
            0,
            SourceKind::CreditCard,
            NaiveDate::from_ymd_opt(2024, 5, 5).unwrap(),
            Money::from_cents(2_500),
            "GIFT SHOP",
            None,
        );
        let id = rt.block_on(db::insert_transaction(&pool, &raw)).unwrap();
        let mut stored = rt.block_on(db::get_transactions(&pool, None)).unwrap();
        stored[0].kind = TransactionType::Expense;
        stored[0].category = Some("Gifts".into());

        let mut card = SqliteTransactionSink::new(SourceKind::CreditCard, pool.clone(), rt.handle().clone());
        assert_eq!(card.update(&stored).unwrap(), 1);

        let mut bank = SqliteTransactionSink::new(SourceKind::BankAccount, pool.clone(), rt.handle().clone());
        assert!(matches!(
            bank.update(&stored),
            Err(StoreError::WrongSource { expected: SourceKind::BankAccount, .. })
        ));

        let reloaded = rt.block_on(db::get_transactions(&pool, None)).unwrap();
        assert_eq!(reloaded[0].id, id);
        assert_eq!(reloaded[0].category.as_deref(), Some("Gifts"));
        assert_eq!(reloaded[0].kind, TransactionType::Expense);
    }
}
