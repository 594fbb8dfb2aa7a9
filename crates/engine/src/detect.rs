use tally_core::{Transaction, TransactionType, VendorMapping};

use crate::config::{EngineConfig, KeywordField, KeywordRule, SignConvention};
use std::collections::BTreeMap;
use tally_core::SourceKind;

/// Which step of the cascade produced a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionRule {
    VendorOverride,
    AmountSign,
    /// Index into the configured keyword rules.
    Keyword(usize),
    VendorSuggestion,
    Default,
}

impl DetectionRule {
    pub fn confidence(self, detected: TransactionType) -> f32 {
        match self {
            DetectionRule::VendorOverride => 1.0,
            DetectionRule::AmountSign if detected == TransactionType::Income => 0.9,
            DetectionRule::Keyword(_) => 0.8,
            DetectionRule::VendorSuggestion => 0.7,
            _ => 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub kind: TransactionType,
    pub rule: DetectionRule,
}

impl Detection {
    pub fn confidence(&self) -> f32 {
        self.rule.confidence(self.kind)
    }
}

/// Stateless rule cascade. Holds only configuration; first matching rule
/// wins.
#[derive(Debug, Clone)]
pub struct TypeDetector {
    keywords: Vec<CompiledKeywordRule>,
    sign_conventions: BTreeMap<SourceKind, SignConvention>,
}

/// Keyword rule with keywords lower-cased once up front.
#[derive(Debug, Clone)]
struct CompiledKeywordRule {
    kind: TransactionType,
    fields: Vec<KeywordField>,
    keywords: Vec<String>,
}

impl From<&KeywordRule> for CompiledKeywordRule {
    fn from(rule: &KeywordRule) -> Self {
        CompiledKeywordRule {
            kind: rule.kind,
            fields: rule.fields.clone(),
            keywords: rule
                .keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }
}

impl Default for TypeDetector {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl TypeDetector {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            keywords: config.keywords.iter().map(CompiledKeywordRule::from).collect(),
            sign_conventions: SourceKind::ALL
                .iter()
                .map(|s| (*s, config.sign_convention(*s)))
                .collect(),
        }
    }

    pub fn detect(
        &self,
        tx: &Transaction,
        mapping: Option<&VendorMapping>,
        category: Option<&str>,
    ) -> TransactionType {
        self.detect_with_rule(tx, mapping, category).kind
    }

    pub fn detect_with_rule(
        &self,
        tx: &Transaction,
        mapping: Option<&VendorMapping>,
        category: Option<&str>,
    ) -> Detection {
        if let Some(kind) = mapping.and_then(VendorMapping::forced_type) {
            return Detection { kind, rule: DetectionRule::VendorOverride };
        }

        if self.is_inflow(tx) {
            return Detection { kind: TransactionType::Income, rule: DetectionRule::AmountSign };
        }

        if let Some((idx, rule)) = self
            .keywords
            .iter()
            .enumerate()
            .find(|(_, rule)| rule_matches(rule, tx, category))
        {
            return Detection { kind: rule.kind, rule: DetectionRule::Keyword(idx) };
        }

        if let Some(kind) = mapping.and_then(|m| m.suggested_type) {
            return Detection { kind, rule: DetectionRule::VendorSuggestion };
        }

        Detection { kind: TransactionType::Expense, rule: DetectionRule::Default }
    }

    /// Diagnostic score in [0, 1] for `detected`, based on the strongest
    /// signal that supports it. Never feeds back into detection.
    pub fn confidence(
        &self,
        tx: &Transaction,
        mapping: Option<&VendorMapping>,
        detected: TransactionType,
    ) -> f32 {
        let rule = if mapping.and_then(VendorMapping::forced_type) == Some(detected) {
            DetectionRule::VendorOverride
        } else if detected == TransactionType::Income && self.is_inflow(tx) {
            DetectionRule::AmountSign
        } else if let Some(idx) = self
            .keywords
            .iter()
            .position(|r| r.kind == detected && rule_matches(r, tx, tx.category.as_deref()))
        {
            DetectionRule::Keyword(idx)
        } else if mapping.and_then(|m| m.suggested_type) == Some(detected) {
            DetectionRule::VendorSuggestion
        } else {
            DetectionRule::Default
        };
        rule.confidence(detected)
    }

    fn is_inflow(&self, tx: &Transaction) -> bool {
        self.sign_conventions
            .get(&tx.source)
            .copied()
            .unwrap_or_default()
            .is_inflow(tx.amount)
    }
}

fn rule_matches(rule: &CompiledKeywordRule, tx: &Transaction, category: Option<&str>) -> bool {
    rule.fields.iter().any(|field| {
        let text = match field {
            KeywordField::Description => Some(tx.description.as_str()),
            KeywordField::Vendor => tx.vendor.as_deref(),
            KeywordField::Category => category,
        };
        text.is_some_and(|t| contains_any(t, &rule.keywords))
    })
}

/// Case-insensitive substring scan. Blank text never matches.
pub fn contains_any(text: &str, keywords: &[String]) -> bool {
    if text.trim().is_empty() {
        return false;
    }
    let haystack = text.to_lowercase();
    keywords.iter().any(|k| haystack.contains(k.as_str()))
}
