use anyhow::{anyhow, bail, Context as _, Result};
use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, Table};
use std::io::{BufReader, Stdin, Stdout};
use std::path::Path;
use std::str::FromStr;
use tally_core::{BudgetProfile, Category, Money, SourceKind, Transaction};
use tally_engine::{BudgetSummary, Engine, Outcome, ReconcileError, ReconcileSummary};
use tally_storage::{DbPool, SqliteCategoryStore, SqliteTransactionSink, SqliteVendorStore};
use tokio::runtime::Runtime;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::console::ConsolePort;
use crate::ingest;

type CliEngine =
    Engine<'static, SqliteVendorStore, SqliteCategoryStore, ConsolePort<BufReader<Stdin>, Stdout>>;

/// Shared state for one command: the runtime that drives the database and
/// the open pool.
pub struct Context {
    pub rt: Runtime,
    pub pool: DbPool,
    pub config: AppConfig,
}

impl Context {
    pub fn open(config: AppConfig, db_override: Option<&Path>) -> Result<Self> {
        let db_path = match db_override {
            Some(p) => p.to_path_buf(),
            None => config.database_path()?,
        };
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let rt = Runtime::new().context("Failed to start runtime")?;
        let pool = rt
            .block_on(tally_storage::create_db(&db_path))
            .with_context(|| format!("Failed to open database {}", db_path.display()))?;
        info!(path = %db_path.display(), "database opened");
        Ok(Self { rt, pool, config })
    }

    fn engine(&self) -> Result<CliEngine> {
        let handle = self.rt.handle().clone();
        let mut engine = Engine::new(
            SqliteVendorStore::new(self.pool.clone(), handle.clone()),
            SqliteCategoryStore::new(self.pool.clone(), handle.clone()),
            ConsolePort::stdio(),
            &self.config.engine,
        )?;
        for source in SourceKind::ALL {
            engine.register_sink(Box::new(SqliteTransactionSink::new(
                source,
                self.pool.clone(),
                handle.clone(),
            )));
        }
        Ok(engine)
    }

    fn transactions(&self) -> Result<Vec<Transaction>> {
        Ok(self.rt.block_on(tally_storage::get_transactions(&self.pool, None))?)
    }

    fn profile(&self, name: &str) -> Result<BudgetProfile> {
        self.rt
            .block_on(tally_storage::get_profile(&self.pool, name))?
            .ok_or_else(|| anyhow!("No budget profile named '{name}'"))
    }

    /// Writes back every transaction that differs from its loaded copy.
    fn save_changed(&self, before: &[Transaction], after: &[Transaction]) -> Result<u64> {
        let changed: Vec<Transaction> = after
            .iter()
            .zip(before)
            .filter(|(a, b)| a != b)
            .map(|(a, _)| a.clone())
            .collect();
        if changed.is_empty() {
            return Ok(0);
        }
        Ok(self.rt.block_on(tally_storage::upsert_transactions(&self.pool, &changed))?)
    }
}

pub fn cmd_import(ctx: &Context, file: &Path, source: SourceKind) -> Result<()> {
    let data = std::fs::File::open(file).with_context(|| format!("Failed to open {}", file.display()))?;
    let parsed = ingest::read_statement(data, source)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    for tx in &parsed {
        ctx.rt.block_on(tally_storage::insert_transaction(&ctx.pool, tx))?;
    }
    info!(rows = parsed.len(), %source, "statement imported");
    println!("Imported {} {} transaction(s) from {}", parsed.len(), source, file.display());
    Ok(())
}

pub fn cmd_classify(ctx: &Context) -> Result<()> {
    let mut engine = ctx.engine()?;
    let before = ctx.transactions()?;
    let mut txs = before.clone();

    let summary = engine.classify(&mut txs)?;
    let written = ctx.save_changed(&before, &txs)?;

    println!(
        "Classified {} transaction(s): {} vendor(s) matched, {} learned, {} categorised, {} already complete. {} row(s) saved.",
        summary.typed,
        summary.vendors_matched,
        summary.vendors_learned,
        summary.categories_assigned + summary.categories_learned,
        summary.unchanged,
        written
    );
    Ok(())
}

pub fn cmd_reconcile(ctx: &Context, profile_name: &str) -> Result<()> {
    let profile = ctx.profile(profile_name)?;
    let mut engine = ctx.engine()?;
    let mut txs = ctx.transactions()?;

    match engine.reconcile_transfers(&mut txs, &profile) {
        Outcome::Completed(summary) => {
            print_reconcile_summary("Reconciliation complete", &summary);
            Ok(())
        }
        Outcome::Cancelled(summary) => {
            print_reconcile_summary("Reconciliation cancelled", &summary);
            Ok(())
        }
        Outcome::Failed(ReconcileError::Persistence { source, unsaved }) => {
            warn!(error = %source, unsaved = unsaved.len(), "write-back failed, retrying once");
            ctx.rt
                .block_on(tally_storage::upsert_transactions(&ctx.pool, &unsaved))
                .with_context(|| {
                    let ids: Vec<String> = unsaved.iter().map(|t| t.id.to_string()).collect();
                    format!("Failed to save transactions {} after reconciliation", ids.join(", "))
                })?;
            println!("Reconciliation complete; {} transaction(s) saved on retry.", unsaved.len());
            Ok(())
        }
        Outcome::Failed(e) => Err(e.into()),
    }
}

fn print_reconcile_summary(heading: &str, s: &ReconcileSummary) {
    let mut table = Table::new();
    for (label, count) in [
        ("Links released", s.links_released),
        ("E-transfers reviewed", s.etransfers_reviewed),
        ("Pairs linked", s.pairs_linked),
        ("Reclassified", s.reclassified),
        ("Kept as transfer", s.kept_as_transfer),
        ("Rows saved", s.rows_written),
    ] {
        table.add_row(vec![Cell::new(label), right_aligned(count)]);
    }
    println!("{heading}.\n{table}");
}

pub fn cmd_override_category(ctx: &Context, from: &str, to: &str) -> Result<()> {
    let engine = ctx.engine()?;
    let before = ctx.transactions()?;
    let mut txs = before.clone();

    let renamed = engine.override_categories(&mut txs, from, to);
    ctx.save_changed(&before, &txs)?;
    println!("Renamed '{from}' to '{to}' on {renamed} transaction(s)");
    Ok(())
}

pub fn cmd_profile_add(
    ctx: &Context,
    name: &str,
    owner: &str,
    income: &str,
    description: Option<&str>,
) -> Result<()> {
    let income = parse_money(income)?;
    let mut profile = BudgetProfile::new(name, owner, income)?;
    if let Some(d) = description {
        profile.description = d.trim().to_string();
    }
    ctx.rt.block_on(tally_storage::create_profile(&ctx.pool, &profile))?;
    println!("Created profile '{}'", profile.name);
    Ok(())
}

pub fn cmd_profile_show(ctx: &Context, name: &str) -> Result<()> {
    let profile = ctx.profile(name)?;
    print!("{}", render_profile(&profile));
    Ok(())
}

fn render_profile(profile: &BudgetProfile) -> String {
    let owner = if profile.owner.is_empty() { "-" } else { profile.owner.as_str() };
    let mut out = format!("{} (owner: {owner})\n", profile.name);
    if !profile.description.is_empty() {
        out.push_str(&format!("{}\n", profile.description));
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Category", "Limit"]);
    for (category, limit) in profile.limits() {
        table.add_row(vec![Cell::new(category), right_aligned(limit)]);
    }
    table.add_row(vec![Cell::new("Total budgeted"), right_aligned(profile.total_budgeted())]);
    table.add_row(vec![Cell::new("Monthly income"), right_aligned(profile.monthly_income)]);
    out.push_str(&format!("{table}\n"));
    out
}

pub fn cmd_profile_limit(ctx: &Context, name: &str, category: &str, amount: &str) -> Result<()> {
    let mut profile = ctx.profile(name)?;
    profile.set_limit(category, parse_money(amount)?)?;
    ctx.rt.block_on(tally_storage::update_profile(&ctx.pool, &profile))?;
    println!("Set {} limit on '{}' to {}", category.trim(), profile.name, parse_money(amount)?);
    Ok(())
}

pub fn cmd_category_add(ctx: &Context, name: &str, tracked_only: bool, description: Option<&str>) -> Result<()> {
    if name.trim().is_empty() {
        bail!("Category name must not be empty");
    }
    let mut category = if tracked_only { Category::tracked_only(name) } else { Category::new(name) };
    category.description = description.map(|d| d.trim().to_string()).filter(|d| !d.is_empty());
    ctx.rt.block_on(tally_storage::save_category(&ctx.pool, &category))?;
    println!(
        "Saved category '{}'{}",
        category.name,
        if category.is_tracked_only { " (tracked only)" } else { "" }
    );
    Ok(())
}

pub fn cmd_category_list(ctx: &Context) -> Result<()> {
    let categories = ctx.rt.block_on(tally_storage::get_categories(&ctx.pool))?;
    println!("Categories\n{}", render_categories(&categories));
    Ok(())
}

fn render_categories(categories: &[Category]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Name", "Tracked only", "Description"]);
    for c in categories {
        table.add_row(vec![
            Cell::new(&c.name),
            Cell::new(if c.is_tracked_only { "yes" } else { "" }),
            Cell::new(c.description.as_deref().unwrap_or_default()),
        ]);
    }
    table
}

pub fn cmd_report(ctx: &Context, profile_name: &str, json: bool) -> Result<()> {
    let profile = ctx.profile(profile_name)?;
    let engine = ctx.engine()?;
    let txs = ctx.transactions()?;
    let summary = engine.budget_summary(&txs, &profile);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", render_report(&summary));
    }
    Ok(())
}

fn render_report(summary: &BudgetSummary) -> String {
    let dash = || Cell::new("-").set_alignment(CellAlignment::Right);

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Category", "Budgeted", "Spent", "Remaining", ""]);
    for line in &summary.lines {
        let note = if line.tracked_only {
            "tracked only"
        } else if line.is_over() {
            "OVER"
        } else {
            ""
        };
        table.add_row(vec![
            Cell::new(&line.category),
            line.budgeted.map(right_aligned).unwrap_or_else(dash),
            right_aligned(line.spent),
            line.remaining().map(right_aligned).unwrap_or_else(dash),
            Cell::new(note),
        ]);
    }
    table.add_row(vec![
        Cell::new("Total"),
        right_aligned(summary.budgeted),
        right_aligned(summary.spent),
        right_aligned(summary.remaining),
        Cell::new(""),
    ]);

    format!(
        "Budget report: {}\n{table}\nIncome less spend: {}\n",
        summary.profile, summary.net
    )
}

fn right_aligned(value: impl std::fmt::Display) -> Cell {
    Cell::new(value).set_alignment(CellAlignment::Right)
}

fn parse_money(text: &str) -> Result<Money> {
    Money::from_str(text).map_err(|e| anyhow!("Invalid amount '{text}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_engine::summarize;

    fn context(dir: &tempfile::TempDir) -> Context {
        Context::open(AppConfig::default(), Some(&dir.path().join("nested").join("tally.db"))).unwrap()
    }

    #[test]
    fn import_then_override_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir);
        let csv = dir.path().join("july.csv");
        std::fs::write(
            &csv,
            "date,description,description2,amount,account_type,account_number\n\
             2024-07-02,BISTRO 22,,45.10,Visa,9911\n\
             2024-07-03,PIZZA PLACE,,19.99,Visa,9911\n",
        )
        .unwrap();

        cmd_import(&ctx, &csv, SourceKind::CreditCard).unwrap();
        let mut txs = ctx.transactions().unwrap();
        assert_eq!(txs.len(), 2);

        let before = txs.clone();
        txs[0].category = Some("Restaurant".into());
        assert_eq!(ctx.save_changed(&before, &txs).unwrap(), 1);

        cmd_override_category(&ctx, "restaurant", "Entertainment").unwrap();
        let reloaded = ctx.transactions().unwrap();
        assert_eq!(reloaded[0].category.as_deref(), Some("Entertainment"));
        assert!(reloaded[1].category.is_none());
    }

    #[test]
    fn profile_commands_persist_limits() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir);

        cmd_profile_add(&ctx, "Home", "kai", "4,200.00", Some("shared costs")).unwrap();
        assert!(cmd_profile_add(&ctx, "home", "", "0", None).is_err());
        cmd_profile_limit(&ctx, "HOME", "Groceries", "650").unwrap();

        let profile = ctx.profile("home").unwrap();
        assert_eq!(profile.monthly_income, Money::from_cents(420_000));
        assert_eq!(profile.limit_for("groceries"), Some(Money::from_cents(65_000)));
        assert!(ctx.profile("elsewhere").is_err());
    }

    #[test]
    fn report_marks_overspend_and_tracked_only() {
        let mut profile = BudgetProfile::new("Home", "", Money::from_cents(300_000)).unwrap();
        profile.add_category("Dining", Money::from_cents(10_000)).unwrap();
        let mut tx = Transaction::new(
            1,
            SourceKind::CreditCard,
            chrono::NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
            Money::from_cents(12_500),
            "BISTRO",
            None,
        );
        tx.kind = tally_core::TransactionType::Expense;
        tx.category = Some("Dining".into());
        let mut gift = tx.clone();
        gift.id = 2;
        gift.category = Some("Reimbursable".into());

        let text = render_report(&summarize(&[tx, gift], &profile, |c| c == "Reimbursable"));
        let over = text.lines().find(|l| l.contains("Dining")).unwrap();
        assert!(over.contains("$125.00") && over.contains("-$25.00") && over.contains("OVER"));
        let tracked = text.lines().find(|l| l.contains("Reimbursable")).unwrap();
        assert!(tracked.contains("tracked only") && !tracked.contains("OVER"));
        assert!(text.contains("Income less spend: $2875.00"));
    }

    #[test]
    fn profile_and_category_tables_list_every_row() {
        let mut profile = BudgetProfile::new("Home", "", Money::from_cents(300_000)).unwrap();
        profile.add_category("Dining", Money::from_cents(10_000)).unwrap();
        profile.add_category("Groceries", Money::from_cents(55_000)).unwrap();

        let text = render_profile(&profile);
        assert!(text.starts_with("Home (owner: -)"));
        assert!(text.lines().any(|l| l.contains("Groceries") && l.contains("$550.00")));
        assert!(text.lines().any(|l| l.contains("Total budgeted") && l.contains("$650.00")));

        let mut savings = Category::tracked_only("Savings");
        savings.description = Some("moved, not spent".into());
        let table = render_categories(&[Category::new("Dining"), savings]).to_string();
        let row = table.lines().find(|l| l.contains("Savings")).unwrap();
        assert!(row.contains("yes") && row.contains("moved, not spent"));
        assert!(!table.lines().find(|l| l.contains("Dining")).unwrap().contains("yes"));
    }
}
