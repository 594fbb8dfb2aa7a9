use chrono::NaiveDate;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tally_core::{
    BudgetProfile, Category, Money, ProfileError, SourceKind, Transaction, TransactionType,
    VendorMapping,
};
use thiserror::Error;
use tracing::debug;

pub type DbPool = Pool<Sqlite>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Budget profile '{0}' already exists")]
    DuplicateProfile(String),
    #[error("Invalid budget profile in database: {0}")]
    Profile(#[from] ProfileError),
    #[error("Corrupt row in {table}: {detail}")]
    Corrupt { table: &'static str, detail: String },
}

pub type DbResult<T> = Result<T, DbError>;

pub async fn create_db(path: &Path) -> DbResult<DbPool> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;
    debug!(path = %path.display(), "database ready");

    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source TEXT NOT NULL,
            account_type TEXT NOT NULL DEFAULT '',
            account_number TEXT NOT NULL DEFAULT '',
            date TEXT NOT NULL,
            amount_cents INTEGER NOT NULL,
            description TEXT NOT NULL,
            vendor TEXT,
            category TEXT,
            kind INTEGER NOT NULL DEFAULT 0,
            linked_transaction_id TEXT,
            is_reconciled_transfer INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_transactions_source ON transactions (source, date)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS vendor_mappings (
            position INTEGER NOT NULL,
            pattern TEXT NOT NULL UNIQUE,
            vendor TEXT NOT NULL,
            category TEXT,
            suggested_type INTEGER,
            override_type INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS category_mappings (
            position INTEGER NOT NULL,
            key TEXT NOT NULL UNIQUE COLLATE NOCASE,
            category TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS categories (
            name TEXT PRIMARY KEY COLLATE NOCASE,
            description TEXT,
            is_tracked_only INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS budget_profiles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE COLLATE NOCASE,
            owner TEXT NOT NULL DEFAULT '',
            description TEXT NOT NULL DEFAULT '',
            monthly_income_cents INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS budget_limits (
            profile_id INTEGER NOT NULL,
            category TEXT NOT NULL COLLATE NOCASE,
            limit_cents INTEGER NOT NULL,
            PRIMARY KEY (profile_id, category),
            FOREIGN KEY (profile_id) REFERENCES budget_profiles(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

// ── Transactions ──────────────────────────────────────────────────────────────

type TransactionRow = (
    i64,
    String,
    String,
    String,
    String,
    i64,
    String,
    Option<String>,
    Option<String>,
    i64,
    Option<String>,
    i64,
);

const TRANSACTION_COLUMNS: &str = "id, source, account_type, account_number, date, amount_cents, \
     description, vendor, category, kind, linked_transaction_id, is_reconciled_transfer";

fn transaction_from_row(r: TransactionRow) -> DbResult<Transaction> {
    let corrupt = |detail: String| DbError::Corrupt { table: "transactions", detail };
    let source: SourceKind = r.1.parse().map_err(corrupt)?;
    let date = NaiveDate::parse_from_str(&r.4, "%Y-%m-%d")
        .map_err(|e| corrupt(format!("transaction {}: bad date '{}': {e}", r.0, r.4)))?;
    let kind = TransactionType::from_code(r.9)
        .ok_or_else(|| corrupt(format!("transaction {}: unknown kind {}", r.0, r.9)))?;

    Ok(Transaction {
        id: r.0,
        source,
        account_type: r.2,
        account_number: r.3,
        date,
        amount: Money::from_cents(r.5),
        description: r.6,
        vendor: r.7,
        category: r.8,
        kind,
        linked_transaction_id: r.10,
        is_reconciled_transfer: r.11 != 0,
    })
}

/// Inserts a new row and returns its id. The `id` field of `tx` is ignored.
pub async fn insert_transaction(pool: &DbPool, tx: &Transaction) -> DbResult<i64> {
    let result = sqlx::query(
        "INSERT INTO transactions (source, account_type, account_number, date, amount_cents, \
         description, vendor, category, kind, linked_transaction_id, is_reconciled_transfer) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(tx.source.to_string())
    .bind(&tx.account_type)
    .bind(&tx.account_number)
    .bind(tx.date.format("%Y-%m-%d").to_string())
    .bind(tx.amount.to_cents())
    .bind(&tx.description)
    .bind(&tx.vendor)
    .bind(&tx.category)
    .bind(tx.kind.code())
    .bind(&tx.linked_transaction_id)
    .bind(tx.is_reconciled_transfer as i64)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// All transactions, or those of one source, ordered by date then id.
pub async fn get_transactions(pool: &DbPool, source: Option<SourceKind>) -> DbResult<Vec<Transaction>> {
    let rows = match source {
        Some(source) => {
            sqlx::query_as::<_, TransactionRow>(&format!(
                "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE source = ? ORDER BY date, id"
            ))
            .bind(source.to_string())
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, TransactionRow>(&format!(
                "SELECT {TRANSACTION_COLUMNS} FROM transactions ORDER BY date, id"
            ))
            .fetch_all(pool)
            .await?
        }
    };

    rows.into_iter().map(transaction_from_row).collect()
}

/// Writes every transaction by id, inserting rows that do not exist yet.
/// Running it twice with the same input leaves the table unchanged.
pub async fn upsert_transactions(pool: &DbPool, transactions: &[Transaction]) -> DbResult<u64> {
    let mut db_tx = pool.begin().await?;
    let mut affected = 0;

    for tx in transactions {
        let result = sqlx::query(
            r#"
            INSERT INTO transactions (id, source, account_type, account_number, date, amount_cents,
                description, vendor, category, kind, linked_transaction_id, is_reconciled_transfer)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                source = excluded.source,
                account_type = excluded.account_type,
                account_number = excluded.account_number,
                date = excluded.date,
                amount_cents = excluded.amount_cents,
                description = excluded.description,
                vendor = excluded.vendor,
                category = excluded.category,
                kind = excluded.kind,
                linked_transaction_id = excluded.linked_transaction_id,
                is_reconciled_transfer = excluded.is_reconciled_transfer
            "#,
        )
        .bind(tx.id)
        .bind(tx.source.to_string())
        .bind(&tx.account_type)
        .bind(&tx.account_number)
        .bind(tx.date.format("%Y-%m-%d").to_string())
        .bind(tx.amount.to_cents())
        .bind(&tx.description)
        .bind(&tx.vendor)
        .bind(&tx.category)
        .bind(tx.kind.code())
        .bind(&tx.linked_transaction_id)
        .bind(tx.is_reconciled_transfer as i64)
        .execute(&mut *db_tx)
        .await?;
        affected += result.rows_affected();
    }

    db_tx.commit().await?;
    debug!(rows = affected, "transactions upserted");
    Ok(affected)
}

// ── Learned mappings ──────────────────────────────────────────────────────────

pub async fn get_vendor_mappings(pool: &DbPool) -> DbResult<Vec<VendorMapping>> {
    let rows = sqlx::query_as::<_, (String, String, Option<String>, Option<i64>, i64)>(
        "SELECT pattern, vendor, category, suggested_type, override_type FROM vendor_mappings ORDER BY position",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|r| {
            let suggested_type = match r.3 {
                Some(code) => Some(TransactionType::from_code(code).ok_or_else(|| DbError::Corrupt {
                    table: "vendor_mappings",
                    detail: format!("pattern '{}': unknown type {code}", r.0),
                })?),
                None => None,
            };
            Ok(VendorMapping {
                pattern: r.0,
                vendor: r.1,
                category: r.2,
                suggested_type,
                override_type: r.4 != 0,
            })
        })
        .collect()
}

/// Replaces the stored list, preserving the given order.
pub async fn replace_vendor_mappings(pool: &DbPool, mappings: &[VendorMapping]) -> DbResult<()> {
    let mut db_tx = pool.begin().await?;
    sqlx::query("DELETE FROM vendor_mappings")
        .execute(&mut *db_tx)
        .await?;

    for (position, m) in mappings.iter().enumerate() {
        sqlx::query(
            "INSERT OR REPLACE INTO vendor_mappings (position, pattern, vendor, category, suggested_type, override_type) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(position as i64)
        .bind(&m.pattern)
        .bind(&m.vendor)
        .bind(&m.category)
        .bind(m.suggested_type.map(TransactionType::code))
        .bind(m.override_type as i64)
        .execute(&mut *db_tx)
        .await?;
    }

    db_tx.commit().await?;
    Ok(())
}

pub async fn get_category_mappings(pool: &DbPool) -> DbResult<Vec<(String, String)>> {
    let rows = sqlx::query_as::<_, (String, String)>(
        "SELECT key, category FROM category_mappings ORDER BY position",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn replace_category_mappings(pool: &DbPool, mappings: &[(String, String)]) -> DbResult<()> {
    let mut db_tx = pool.begin().await?;
    sqlx::query("DELETE FROM category_mappings")
        .execute(&mut *db_tx)
        .await?;

    for (position, (key, category)) in mappings.iter().enumerate() {
        sqlx::query("INSERT OR REPLACE INTO category_mappings (position, key, category) VALUES (?, ?, ?)")
            .bind(position as i64)
            .bind(key)
            .bind(category)
            .execute(&mut *db_tx)
            .await?;
    }

    db_tx.commit().await?;
    Ok(())
}

// ── Categories ────────────────────────────────────────────────────────────────

/// Adds a category or updates the one with the same name (any case).
pub async fn save_category(pool: &DbPool, category: &Category) -> DbResult<()> {
    sqlx::query(
        "INSERT INTO categories (name, description, is_tracked_only) VALUES (?, ?, ?) \
         ON CONFLICT(name) DO UPDATE SET description = excluded.description, is_tracked_only = excluded.is_tracked_only",
    )
    .bind(&category.name)
    .bind(&category.description)
    .bind(category.is_tracked_only as i64)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_categories(pool: &DbPool) -> DbResult<Vec<Category>> {
    let rows = sqlx::query_as::<_, (String, Option<String>, i64)>(
        "SELECT name, description, is_tracked_only FROM categories ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| Category {
            name: r.0,
            description: r.1,
            is_tracked_only: r.2 != 0,
        })
        .collect())
}

pub async fn is_tracked_only(pool: &DbPool, name: &str) -> DbResult<bool> {
    let flag = sqlx::query_scalar::<_, i64>("SELECT is_tracked_only FROM categories WHERE name = ?")
        .bind(name.trim())
        .fetch_optional(pool)
        .await?;
    Ok(flag.is_some_and(|f| f != 0))
}

// ── Budget profiles ───────────────────────────────────────────────────────────

/// Inserts a new profile. Names are unique regardless of case.
pub async fn create_profile(pool: &DbPool, profile: &BudgetProfile) -> DbResult<i64> {
    let mut db_tx = pool.begin().await?;
    let result = sqlx::query(
        "INSERT INTO budget_profiles (name, owner, description, monthly_income_cents) VALUES (?, ?, ?, ?)",
    )
    .bind(&profile.name)
    .bind(&profile.owner)
    .bind(&profile.description)
    .bind(profile.monthly_income.to_cents())
    .execute(&mut *db_tx)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref d) if d.is_unique_violation() => {
            DbError::DuplicateProfile(profile.name.clone())
        }
        other => DbError::Sqlx(other),
    })?;
    let id = result.last_insert_rowid();

    write_limits(&mut db_tx, id, profile).await?;
    db_tx.commit().await?;
    Ok(id)
}

/// Overwrites an existing profile's fields and limits, matched by name.
pub async fn update_profile(pool: &DbPool, profile: &BudgetProfile) -> DbResult<bool> {
    let mut db_tx = pool.begin().await?;
    let id = sqlx::query_scalar::<_, i64>("SELECT id FROM budget_profiles WHERE name = ?")
        .bind(&profile.name)
        .fetch_optional(&mut *db_tx)
        .await?;
    let Some(id) = id else {
        return Ok(false);
    };

    sqlx::query("UPDATE budget_profiles SET owner = ?, description = ?, monthly_income_cents = ? WHERE id = ?")
        .bind(&profile.owner)
        .bind(&profile.description)
        .bind(profile.monthly_income.to_cents())
        .bind(id)
        .execute(&mut *db_tx)
        .await?;
    sqlx::query("DELETE FROM budget_limits WHERE profile_id = ?")
        .bind(id)
        .execute(&mut *db_tx)
        .await?;

    write_limits(&mut db_tx, id, profile).await?;
    db_tx.commit().await?;
    Ok(true)
}

async fn write_limits(
    db_tx: &mut sqlx::Transaction<'_, Sqlite>,
    profile_id: i64,
    profile: &BudgetProfile,
) -> Result<(), sqlx::Error> {
    for (category, limit) in profile.limits() {
        sqlx::query("INSERT INTO budget_limits (profile_id, category, limit_cents) VALUES (?, ?, ?)")
            .bind(profile_id)
            .bind(category)
            .bind(limit.to_cents())
            .execute(&mut **db_tx)
            .await?;
    }
    Ok(())
}

/// Looks a profile up by name, ignoring case.
pub async fn get_profile(pool: &DbPool, name: &str) -> DbResult<Option<BudgetProfile>> {
    let row = sqlx::query_as::<_, (i64, String, String, String, i64)>(
        "SELECT id, name, owner, description, monthly_income_cents FROM budget_profiles WHERE name = ?",
    )
    .bind(name.trim())
    .fetch_optional(pool)
    .await?;
    let Some(r) = row else {
        return Ok(None);
    };

    let limits = sqlx::query_as::<_, (String, i64)>(
        "SELECT category, limit_cents FROM budget_limits WHERE profile_id = ? ORDER BY category",
    )
    .bind(r.0)
    .fetch_all(pool)
    .await?;

    let mut profile = BudgetProfile::new(&r.1, &r.2, Money::from_cents(r.4))?;
    profile.description = r.3;
    for (category, cents) in limits {
        profile.set_limit(&category, Money::from_cents(cents))?;
    }
    Ok(Some(profile))
}

pub async fn list_profiles(pool: &DbPool) -> DbResult<Vec<String>> {
    let names = sqlx::query_scalar::<_, String>("SELECT name FROM budget_profiles ORDER BY name")
        .fetch_all(pool)
        .await?;
    Ok(names)
}
