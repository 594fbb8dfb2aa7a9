use tally_core::{contains_pattern, normalize_pattern, CategoryStore, StoreResult, Transaction};
use tracing::{debug, info};

/// Vendor → budget category lookup, same matching rules as vendors.
pub struct CategoryResolver<S: CategoryStore> {
    store: S,
    mappings: Vec<(String, String)>,
}

impl<S: CategoryStore> CategoryResolver<S> {
    pub fn load(store: S) -> StoreResult<Self> {
        let mut resolver = Self { store, mappings: Vec::new() };
        for (key, category) in resolver.store.load()? {
            resolver.insert(&key, &category);
        }
        debug!(keys = resolver.mappings.len(), "category mappings loaded");
        Ok(resolver)
    }

    pub fn resolve(&self, vendor: &str) -> Option<String> {
        self.mappings
            .iter()
            .find(|(key, _)| contains_pattern(vendor, key))
            .map(|(_, category)| category.clone())
    }

    pub fn learn(&mut self, key: &str, category: &str) -> StoreResult<()> {
        debug!(key, category, "learning category mapping");
        self.insert(key, category);
        self.store.save(&self.mappings)
    }

    pub fn is_tracked_only(&self, category: &str) -> bool {
        self.store.is_tracked_only(category)
    }

    pub fn mappings(&self) -> &[(String, String)] {
        &self.mappings
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn insert(&mut self, key: &str, category: &str) {
        let key = normalize_pattern(key);
        let category = category.trim().to_string();
        match self.mappings.iter_mut().find(|(k, _)| *k == key) {
            Some(existing) => existing.1 = category,
            None => self.mappings.push((key, category)),
        }
    }
}

/// Renames `from` to `to` on every transaction whose category matches
/// `from` case-insensitively. Returns how many changed.
pub fn override_categories(transactions: &mut [Transaction], from: &str, to: &str) -> usize {
    let mut changed = 0;
    for tx in transactions.iter_mut() {
        if tx.category.as_deref().is_some_and(|c| c.to_lowercase() == from.to_lowercase()) {
            tx.category = Some(to.to_string());
            changed += 1;
        }
    }
    info!(from, to, changed, "categories overridden");
    changed
}
