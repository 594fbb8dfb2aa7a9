use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::transaction::TransactionType;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("Mapping '{0}' overrides the type but suggests none")]
    OverrideWithoutType(String),
    #[error("Mapping pattern must not be empty")]
    EmptyPattern,
}

/// A learned description pattern and what it implies about a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorMapping {
    /// Lower-cased key matched by substring containment.
    pub pattern: String,
    pub vendor: String,
    pub category: Option<String>,
    pub suggested_type: Option<TransactionType>,
    /// When set, `suggested_type` beats every other detection signal.
    pub override_type: bool,
}

impl VendorMapping {
    pub fn new(pattern: &str, vendor: &str) -> Self {
        VendorMapping {
            pattern: normalize_pattern(pattern),
            vendor: vendor.trim().to_string(),
            category: None,
            suggested_type: None,
            override_type: false,
        }
    }

    /// A mapping whose type is authoritative.
    pub fn forced(pattern: &str, vendor: &str, kind: TransactionType) -> Self {
        VendorMapping {
            suggested_type: Some(kind),
            override_type: true,
            ..VendorMapping::new(pattern, vendor)
        }
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = Some(category.trim().to_string());
        self
    }

    pub fn with_suggested_type(mut self, kind: TransactionType) -> Self {
        self.suggested_type = Some(kind);
        self
    }

    pub fn validate(&self) -> Result<(), MappingError> {
        if self.pattern.is_empty() {
            return Err(MappingError::EmptyPattern);
        }
        if self.override_type && self.suggested_type.is_none() {
            return Err(MappingError::OverrideWithoutType(self.pattern.clone()));
        }
        Ok(())
    }

    /// The suggested type, only when it is authoritative.
    pub fn forced_type(&self) -> Option<TransactionType> {
        self.suggested_type.filter(|_| self.override_type)
    }

    pub fn matches(&self, text: &str) -> bool {
        contains_pattern(text, &self.pattern)
    }
}

/// Case-insensitive containment of a normalised pattern. An empty pattern
/// matches nothing.
pub fn contains_pattern(text: &str, pattern: &str) -> bool {
    !pattern.is_empty() && text.to_lowercase().contains(pattern)
}

pub fn normalize_pattern(pattern: &str) -> String {
    pattern.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_is_lower_cased() {
        let m = VendorMapping::new("  NETFLIX.COM ", "Netflix");
        assert_eq!(m.pattern, "netflix.com");
        assert!(m.matches("NETFLIX.COM 866-579"));
        assert!(!m.matches("HULU"));
    }

    #[test]
    fn override_without_type_is_invalid() {
        let mut m = VendorMapping::new("rent", "landlord");
        m.override_type = true;
        assert_eq!(m.validate(), Err(MappingError::OverrideWithoutType("rent".into())));
        assert_eq!(m.forced_type(), None);
    }

    #[test]
    fn forced_mapping_is_valid() {
        let m = VendorMapping::forced("e-trf bob", "bob", TransactionType::Expense).with_category("Gifts");
        assert!(m.validate().is_ok());
        assert_eq!(m.forced_type(), Some(TransactionType::Expense));
        assert_eq!(m.category.as_deref(), Some("Gifts"));
    }

    #[test]
    fn suggestion_alone_is_not_forced() {
        let m = VendorMapping::new("payroll", "employer").with_suggested_type(TransactionType::Income);
        assert_eq!(m.forced_type(), None);
        assert_eq!(m.suggested_type, Some(TransactionType::Income));
    }

    #[test]
    fn empty_pattern_never_matches() {
        let m = VendorMapping::new("   ", "anything");
        assert!(!m.matches("anything at all"));
        assert_eq!(m.validate(), Err(MappingError::EmptyPattern));
    }
}
