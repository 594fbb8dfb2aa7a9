//! Tally CLI
//!
//! Usage:
//!   tally import july.csv --source bank     Load a statement
//!   tally classify                          Vendor, category and type for new rows
//!   tally reconcile --profile Home          Review and pair transfers
//!   tally report --profile Home             Spend against budget

mod cli;
mod commands;
mod config;
mod console;
mod ingest;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;
use commands::Context;
use config::AppConfig;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info).
    // Logs go to stderr so prompts on stdout stay readable.
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("tally=debug")
    } else {
        EnvFilter::new("tally=info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false).compact())
        .init();

    let config = AppConfig::load(cli.config.as_deref())?;
    // The engine blocks on this runtime, so main stays synchronous.
    let ctx = Context::open(config, cli.db.as_deref())?;

    match cli.command {
        Commands::Import { file, source } => commands::cmd_import(&ctx, &file, source),
        Commands::Classify => commands::cmd_classify(&ctx),
        Commands::Reconcile { profile } => commands::cmd_reconcile(&ctx, &profile),
        Commands::OverrideCategory { from, to } => commands::cmd_override_category(&ctx, &from, &to),
        Commands::Profile { action } => match action {
            ProfileAction::Add {
                name,
                owner,
                income,
                description,
            } => commands::cmd_profile_add(&ctx, &name, &owner, &income, description.as_deref()),
            ProfileAction::Show { name } => commands::cmd_profile_show(&ctx, &name),
            ProfileAction::Limit {
                name,
                category,
                amount,
            } => commands::cmd_profile_limit(&ctx, &name, &category, &amount),
        },
        Commands::Category { action } => match action {
            CategoryAction::Add {
                name,
                tracked_only,
                description,
            } => commands::cmd_category_add(&ctx, &name, tracked_only, description.as_deref()),
            CategoryAction::List => commands::cmd_category_list(&ctx),
        },
        Commands::Report { profile, json } => commands::cmd_report(&ctx, &profile, json),
    }
}
