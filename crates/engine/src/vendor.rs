use tally_core::{normalize_pattern, StoreResult, VendorMapping, VendorStore};
use tracing::debug;

/// Description → vendor lookup over the learned pattern list.
pub struct VendorResolver<S: VendorStore> {
    store: S,
    mappings: Vec<VendorMapping>,
}

impl<S: VendorStore> VendorResolver<S> {
    pub fn load(store: S) -> StoreResult<Self> {
        let mut resolver = Self { store, mappings: Vec::new() };
        for mapping in resolver.store.load()? {
            resolver.insert(mapping);
        }
        debug!(patterns = resolver.mappings.len(), "vendor patterns loaded");
        Ok(resolver)
    }

    /// First mapping whose pattern occurs in `text`, in insertion order.
    pub fn lookup(&self, text: &str) -> Option<&VendorMapping> {
        self.mappings.iter().find(|m| m.matches(text))
    }

    /// Lower-cased vendor name for `text`.
    pub fn resolve(&self, text: &str) -> Option<String> {
        self.lookup(text).map(|m| m.vendor.to_lowercase())
    }

    /// Adds or replaces a mapping and persists the full list.
    pub fn learn(&mut self, mapping: VendorMapping) -> StoreResult<()> {
        debug!(pattern = %mapping.pattern, vendor = %mapping.vendor, "learning vendor pattern");
        self.insert(mapping);
        self.store.save(&self.mappings)
    }

    pub fn mappings(&self) -> &[VendorMapping] {
        &self.mappings
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn insert(&mut self, mut mapping: VendorMapping) {
        mapping.pattern = normalize_pattern(&mapping.pattern);
        match self.mappings.iter_mut().find(|m| m.pattern == mapping.pattern) {
            Some(existing) => *existing = mapping,
            None => self.mappings.push(mapping),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryVendorStore;
    use tally_core::TransactionType;

    fn resolver(pairs: &[(&str, &str)]) -> VendorResolver<MemoryVendorStore> {
        let store = MemoryVendorStore::with(pairs.iter().map(|(p, v)| VendorMapping::new(p, v)).collect());
        VendorResolver::load(store).unwrap()
    }

    #[test]
    fn resolves_by_case_insensitive_substring() {
        let r = resolver(&[("tim hortons", "Tim Hortons")]);
        assert_eq!(r.resolve("TIM HORTONS #1234 TORONTO").as_deref(), Some("tim hortons"));
        assert_eq!(r.resolve("STARBUCKS"), None);
    }

    #[test]
    fn first_pattern_wins() {
        let r = resolver(&[("amazon", "Amazon"), ("amazon prime", "Prime Video")]);
        assert_eq!(r.resolve("AMAZON PRIME*2K4").as_deref(), Some("amazon"));
    }

    #[test]
    fn learn_overwrites_duplicate_pattern_and_persists() {
        let mut r = resolver(&[("shell", "Shell")]);
        r.learn(VendorMapping::new("SHELL ", "Shell Canada")).unwrap();
        assert_eq!(r.mappings().len(), 1);
        assert_eq!(r.resolve("SHELL C01234").as_deref(), Some("shell canada"));
        assert_eq!(r.store().saved().len(), 1);
        assert_eq!(r.store().saved()[0].vendor, "Shell Canada");
    }

    #[test]
    fn lookup_exposes_mapping_hints() {
        let mut r = resolver(&[]);
        r.learn(VendorMapping::forced("e-trf jane", "jane", TransactionType::Expense).with_category("Childcare"))
            .unwrap();
        let m = r.lookup("E-TRF JANE DOE").unwrap();
        assert_eq!(m.forced_type(), Some(TransactionType::Expense));
        assert_eq!(m.category.as_deref(), Some("Childcare"));
    }
}
