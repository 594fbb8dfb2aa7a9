pub mod db;
pub mod store;

pub use db::{
    create_db, create_profile, get_categories, get_category_mappings, get_profile,
    get_transactions, get_vendor_mappings, insert_transaction, is_tracked_only, list_profiles,
    replace_category_mappings, replace_vendor_mappings, save_category, update_profile,
    upsert_transactions, DbError, DbPool, DbResult,
};
pub use store::{SqliteCategoryStore, SqliteTransactionSink, SqliteVendorStore};
