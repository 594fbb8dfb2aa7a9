use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tally_core::{Money, SourceKind, TransactionType};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to render TOML: {0}")]
    Render(#[from] toml::ser::Error),
    #[error("Invalid engine config: {0}")]
    Invalid(String),
}

/// Which transaction text a keyword rule scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordField {
    Description,
    Vendor,
    Category,
}

/// One step of the keyword part of the detection cascade. Rules are tried
/// in list order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordRule {
    pub kind: TransactionType,
    pub fields: Vec<KeywordField>,
    pub keywords: Vec<String>,
}

impl KeywordRule {
    fn new(kind: TransactionType, fields: &[KeywordField], keywords: &[&str]) -> Self {
        KeywordRule {
            kind,
            fields: fields.to_vec(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// How a source signs money coming in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignConvention {
    #[default]
    NegativeIsInflow,
    PositiveIsInflow,
    /// The amount sign says nothing about income.
    Ignore,
}

impl SignConvention {
    pub fn is_inflow(self, amount: Money) -> bool {
        match self {
            SignConvention::NegativeIsInflow => amount.is_negative(),
            SignConvention::PositiveIsInflow => amount.is_positive(),
            SignConvention::Ignore => false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub sign_convention: SignConvention,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Phases {
    pub etransfer_review: bool,
    pub auto_match: bool,
    pub unmatched_review: bool,
}

impl Default for Phases {
    fn default() -> Self {
        Self {
            etransfer_review: true,
            auto_match: true,
            unmatched_review: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Absolute amounts closer than this count as equal.
    pub amount_tolerance: Decimal,
    pub min_score: u32,
    /// Description markers that send a transfer to e-transfer review.
    pub etransfer_markers: Vec<String>,
    /// Words that, present in both descriptions, add a point to a pairing.
    pub pairing_keywords: Vec<String>,
    pub phases: Phases,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            amount_tolerance: Decimal::new(1, 2),
            min_score: 3,
            etransfer_markers: vec!["e-trf".into(), "interac".into()],
            pairing_keywords: vec!["transfer".into(), "payment".into()],
            phases: Phases::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub keywords: Vec<KeywordRule>,
    /// Written as `[sources.bank_account]` or `[sources.credit_card]`.
    pub sources: BTreeMap<SourceKind, SourceConfig>,
    pub reconcile: ReconcileConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        use KeywordField::{Category, Description, Vendor};

        let keywords = vec![
            KeywordRule::new(
                TransactionType::Transfer,
                &[Description, Vendor, Category],
                &[
                    "transfer",
                    "e-transfer",
                    "etransfer",
                    "e-trf",
                    "interac",
                    "withdrawal",
                    "deposit to",
                    "payment to account",
                    "tfsa",
                    "rrsp",
                    "loan payment",
                    "mortgage",
                    "credit payment",
                ],
            ),
            KeywordRule::new(
                TransactionType::Income,
                &[Description, Vendor, Category],
                &[
                    "income",
                    "salary",
                    "ei",
                    "ei canada",
                    "employment insurance",
                    "tax refund",
                    "deposit",
                    "reimbursement",
                    "payroll",
                ],
            ),
            KeywordRule::new(
                TransactionType::Adjustment,
                &[Description, Vendor],
                &[
                    "fee",
                    "interest charge",
                    "overdraft",
                    "cashback",
                    "reward",
                    "refund",
                    "reversal",
                ],
            ),
        ];

        Self {
            keywords,
            sources: BTreeMap::new(),
            reconcile: ReconcileConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml(toml_content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(toml_content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for rule in &self.keywords {
            if rule.kind == TransactionType::Unprocessed {
                return Err(ConfigError::Invalid(
                    "keyword rules cannot assign 'unprocessed'".into(),
                ));
            }
            if rule.fields.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "keyword rule for '{}' scans no fields",
                    rule.kind
                )));
            }
        }
        if self.reconcile.min_score == 0 {
            return Err(ConfigError::Invalid("reconcile.min_score must be at least 1".into()));
        }
        if self.reconcile.amount_tolerance.is_sign_negative() {
            return Err(ConfigError::Invalid(
                "reconcile.amount_tolerance must not be negative".into(),
            ));
        }
        Ok(())
    }

    pub fn sign_convention(&self, source: SourceKind) -> SignConvention {
        self.sources
            .get(&source)
            .map(|s| s.sign_convention)
            .unwrap_or_default()
    }

    pub fn set_sign_convention(&mut self, source: SourceKind, convention: SignConvention) {
        self.sources.insert(
            source,
            SourceConfig {
                sign_convention: convention,
            },
        );
    }
}
