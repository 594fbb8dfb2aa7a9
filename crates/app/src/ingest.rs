//! Statement CSV ingestion. Rows land `Unprocessed`, ready for `classify`.

use chrono::NaiveDate;
use serde::Deserialize;
use std::io::Read;
use std::str::FromStr;
use tally_core::{Money, SourceKind, Transaction};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Row {row}: invalid date '{value}'")]
    InvalidDate { row: usize, value: String },
    #[error("Row {row}: invalid amount '{value}'")]
    InvalidAmount { row: usize, value: String },
    #[error("No data rows")]
    NoDataRows,
}

#[derive(Debug, Deserialize)]
struct StatementRow {
    date: String,
    description: String,
    #[serde(default)]
    description2: Option<String>,
    amount: String,
    #[serde(default)]
    account_type: Option<String>,
    #[serde(default)]
    account_number: Option<String>,
}

/// Parses `date,description,description2,amount,account_type,account_number`.
/// Returned transactions carry id 0 until stored.
pub fn read_statement<R: Read>(data: R, source: SourceKind) -> Result<Vec<Transaction>, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(data);

    let mut transactions = Vec::new();
    for (idx, result) in reader.deserialize::<StatementRow>().enumerate() {
        let row = result?;
        // Header is line 1.
        let line = idx + 2;

        let date = parse_date(&row.date).ok_or_else(|| IngestError::InvalidDate {
            row: line,
            value: row.date.clone(),
        })?;
        let amount = Money::from_str(&row.amount).map_err(|_| IngestError::InvalidAmount {
            row: line,
            value: row.amount.clone(),
        })?;

        let tx = Transaction::new(0, source, date, amount, &row.description, row.description2.as_deref())
            .with_account(
                row.account_type.as_deref().unwrap_or_default(),
                row.account_number.as_deref().unwrap_or_default(),
            );
        transactions.push(tx);
    }

    if transactions.is_empty() {
        return Err(IngestError::NoDataRows);
    }
    Ok(transactions)
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s.trim(), fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::TransactionType;

    const HEADER: &str = "date,description,description2,amount,account_type,account_number\n";

    #[test]
    fn reads_full_rows() {
        let data = format!(
            "{HEADER}2024-07-02,E-TRF TO SITTER, ref 8812 ,120.00,Chequing,0042\n\
             07/03/2024,\"LOBLAWS #1021\",,\"$1,084.50\",Chequing,0042\n"
        );
        let txs = read_statement(data.as_bytes(), SourceKind::BankAccount).unwrap();

        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].description, "E-TRF TO SITTER ref 8812");
        assert_eq!(txs[0].amount, Money::from_cents(12_000));
        assert_eq!(txs[0].account_type, "Chequing");
        assert_eq!(txs[0].kind, TransactionType::Unprocessed);
        assert_eq!(txs[1].date, NaiveDate::from_ymd_opt(2024, 7, 3).unwrap());
        assert_eq!(txs[1].description, "LOBLAWS #1021");
        assert_eq!(txs[1].amount, Money::from_cents(108_450));
        assert!(txs.iter().all(|t| t.source == SourceKind::BankAccount));
    }

    #[test]
    fn parenthesised_amounts_are_negative() {
        let data = format!("{HEADER}2024-07-02,PAYROLL,,(2500.00),Chequing,0042\n");
        let txs = read_statement(data.as_bytes(), SourceKind::BankAccount).unwrap();
        assert_eq!(txs[0].amount, Money::from_cents(-250_000));
    }

    #[test]
    fn bad_date_names_the_row() {
        let data = format!("{HEADER}2024-07-02,A,,1.00,,\nnot a date,B,,2.00,,\n");
        let err = read_statement(data.as_bytes(), SourceKind::CreditCard).unwrap_err();
        assert!(matches!(err, IngestError::InvalidDate { row: 3, .. }));
    }

    #[test]
    fn bad_amount_is_rejected() {
        let data = format!("{HEADER}2024-07-02,A,,twelve,,\n");
        let err = read_statement(data.as_bytes(), SourceKind::CreditCard).unwrap_err();
        assert!(matches!(err, IngestError::InvalidAmount { row: 2, .. }));
    }

    #[test]
    fn header_only_is_an_error() {
        assert!(matches!(
            read_statement(HEADER.as_bytes(), SourceKind::CreditCard),
            Err(IngestError::NoDataRows)
        ));
    }
}
