use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use super::money::Money;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub description: Option<String>,
    /// Recorded and displayed, but left out of budget-vs-actual totals.
    pub is_tracked_only: bool,
}

impl Category {
    pub fn new(name: &str) -> Self {
        Category {
            name: name.trim().to_string(),
            description: None,
            is_tracked_only: false,
        }
    }

    pub fn tracked_only(name: &str) -> Self {
        Category {
            is_tracked_only: true,
            ..Category::new(name)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProfileError {
    #[error("Category '{0}' already exists in this profile")]
    DuplicateCategory(String),
    #[error("Category name must not be empty")]
    EmptyCategory,
    #[error("Profile name must not be empty")]
    EmptyName,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetProfile {
    pub name: String,
    pub owner: String,
    pub description: String,
    pub monthly_income: Money,
    limits: BTreeMap<String, Money>,
}

impl BudgetProfile {
    pub fn new(name: &str, owner: &str, monthly_income: Money) -> Result<Self, ProfileError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ProfileError::EmptyName);
        }
        Ok(BudgetProfile {
            name: name.to_string(),
            owner: owner.trim().to_string(),
            description: String::new(),
            monthly_income,
            limits: BTreeMap::new(),
        })
    }

    /// Adds a category limit. Names are unique under case-insensitive
    /// comparison.
    pub fn add_category(&mut self, category: &str, limit: Money) -> Result<(), ProfileError> {
        let category = category.trim();
        if category.is_empty() {
            return Err(ProfileError::EmptyCategory);
        }
        if let Some(existing) = self.canonical_category(category) {
            return Err(ProfileError::DuplicateCategory(existing.to_string()));
        }
        self.limits.insert(category.to_string(), limit);
        Ok(())
    }

    /// Updates the limit of an existing category, or adds it.
    pub fn set_limit(&mut self, category: &str, limit: Money) -> Result<(), ProfileError> {
        match self.canonical_category(category).map(str::to_string) {
            Some(existing) => {
                self.limits.insert(existing, limit);
                Ok(())
            }
            None => self.add_category(category, limit),
        }
    }

    /// The profile's own spelling of `category`, if present.
    pub fn canonical_category(&self, category: &str) -> Option<&str> {
        let wanted = category.trim();
        self.limits
            .keys()
            .find(|k| k.eq_ignore_ascii_case(wanted))
            .map(String::as_str)
    }

    pub fn limit_for(&self, category: &str) -> Option<Money> {
        self.canonical_category(category)
            .and_then(|k| self.limits.get(k).copied())
    }

    /// Category names in a stable (sorted) order, used for numbered prompts.
    pub fn categories(&self) -> Vec<&str> {
        self.limits.keys().map(String::as_str).collect()
    }

    pub fn limits(&self) -> impl Iterator<Item = (&str, Money)> {
        self.limits.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn total_budgeted(&self) -> Money {
        self.limits.values().copied().sum()
    }
}
