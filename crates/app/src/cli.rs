use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tally_core::SourceKind;

/// Tally - classify bank and card transactions, reconcile transfers, and
/// report spend against a budget
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Household transaction classifier and budget tracker", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Database path, overriding the config file
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import a statement CSV
    ///
    /// Expected header: date,description,description2,amount,account_type,account_number
    Import {
        /// CSV file to import
        file: PathBuf,

        /// Which repository the rows belong to: bank or credit-card
        #[arg(short, long, value_parser = parse_source)]
        source: SourceKind,
    },

    /// Assign vendor, category and type to unprocessed transactions
    Classify,

    /// Review e-transfers, pair transfers and settle the rest
    Reconcile {
        /// Budget profile whose categories are offered in prompts
        #[arg(short, long)]
        profile: String,
    },

    /// Rename a category on every transaction that uses it
    OverrideCategory {
        #[arg(long)]
        from: String,

        #[arg(long)]
        to: String,
    },

    /// Manage budget profiles
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },

    /// Manage categories
    Category {
        #[command(subcommand)]
        action: CategoryAction,
    },

    /// Spend per category against a profile's limits
    Report {
        #[arg(short, long)]
        profile: String,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum ProfileAction {
    /// Create a profile
    Add {
        name: String,

        #[arg(long, default_value = "")]
        owner: String,

        /// Monthly income, e.g. 5200.00
        #[arg(long, default_value = "0")]
        income: String,

        #[arg(long)]
        description: Option<String>,
    },

    /// Show a profile and its limits
    Show { name: String },

    /// Set (or add) a category limit on a profile
    Limit {
        name: String,
        category: String,
        amount: String,
    },
}

#[derive(Subcommand)]
pub enum CategoryAction {
    /// Add or update a category
    Add {
        name: String,

        /// Record spend but leave it out of budget totals
        #[arg(long)]
        tracked_only: bool,

        #[arg(long)]
        description: Option<String>,
    },

    /// List categories
    List,
}

fn parse_source(s: &str) -> Result<SourceKind, String> {
    s.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_import_with_source_alias() {
        let cli = Cli::try_parse_from(["tally", "import", "july.csv", "--source", "credit-card"]).unwrap();
        match cli.command {
            Commands::Import { file, source } => {
                assert_eq!(file, PathBuf::from("july.csv"));
                assert_eq!(source, SourceKind::CreditCard);
            }
            _ => panic!("expected import"),
        }
    }

    #[test]
    fn rejects_unknown_source() {
        assert!(Cli::try_parse_from(["tally", "import", "a.csv", "--source", "wallet"]).is_err());
    }

    #[test]
    fn parses_nested_profile_limit() {
        let cli = Cli::try_parse_from(["tally", "--db", "t.db", "profile", "limit", "Home", "Dining", "250"]).unwrap();
        assert_eq!(cli.db, Some(PathBuf::from("t.db")));
        assert!(matches!(
            cli.command,
            Commands::Profile { action: ProfileAction::Limit { ref category, .. } } if category == "Dining"
        ));
    }
}
