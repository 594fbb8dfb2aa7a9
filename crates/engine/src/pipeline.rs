use tally_core::{
    CategoryStore, InteractionPort, PairPrompt, PromptKind, StoreError, StoreResult, Transaction,
    TransactionType, VendorMapping, VendorStore,
};
use thiserror::Error;
use tracing::{debug, info};

use crate::category::CategoryResolver;
use crate::config::EngineConfig;
use crate::detect::TypeDetector;
use crate::transfer::MappingLearner;
use crate::vendor::VendorResolver;

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("Failed to persist learned mapping: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ClassifySummary {
    pub vendors_matched: usize,
    pub vendors_learned: usize,
    pub vendors_skipped: usize,
    pub categories_assigned: usize,
    pub categories_learned: usize,
    pub typed: usize,
    pub unchanged: usize,
}

/// Vendor → category → type, applied to each transaction in turn.
pub struct ClassificationPipeline<V: VendorStore, C: CategoryStore> {
    vendors: VendorResolver<V>,
    categories: CategoryResolver<C>,
    detector: TypeDetector,
}

impl<V: VendorStore, C: CategoryStore> ClassificationPipeline<V, C> {
    pub fn new(vendors: VendorResolver<V>, categories: CategoryResolver<C>, detector: TypeDetector) -> Self {
        Self { vendors, categories, detector }
    }

    pub fn load(vendor_store: V, category_store: C, config: &EngineConfig) -> StoreResult<Self> {
        Ok(Self::new(
            VendorResolver::load(vendor_store)?,
            CategoryResolver::load(category_store)?,
            TypeDetector::new(config),
        ))
    }

    pub fn vendors(&self) -> &VendorResolver<V> {
        &self.vendors
    }

    pub fn categories(&self) -> &CategoryResolver<C> {
        &self.categories
    }

    /// Fills in whatever is missing. Fields that are already set are never
    /// touched, so classifying twice is a no-op.
    pub fn classify<P: InteractionPort + ?Sized>(
        &mut self,
        transactions: &mut [Transaction],
        port: &mut P,
    ) -> Result<ClassifySummary, ClassifyError> {
        let mut summary = ClassifySummary::default();

        for tx in transactions.iter_mut() {
            if tx.is_classified() {
                summary.unchanged += 1;
                continue;
            }

            let mut mapping = self.vendors.lookup(&tx.description).cloned();

            if tx.vendor.is_none() {
                if let Some(m) = &mapping {
                    tx.vendor = Some(m.vendor.to_lowercase());
                    summary.vendors_matched += 1;
                } else if let Some(learned) = self.learn_vendor(tx, port)? {
                    tx.vendor = Some(learned.vendor.to_lowercase());
                    mapping = Some(learned);
                    summary.vendors_learned += 1;
                } else {
                    summary.vendors_skipped += 1;
                }
            }

            if tx.category.is_none() {
                let known = mapping
                    .as_ref()
                    .and_then(|m| m.category.clone())
                    .or_else(|| tx.vendor.as_deref().and_then(|v| self.categories.resolve(v)));
                if let Some(category) = known {
                    tx.category = Some(category);
                    summary.categories_assigned += 1;
                } else if let Some(category) = self.learn_category(tx, port)? {
                    tx.category = Some(category);
                    summary.categories_learned += 1;
                }
            }

            if tx.kind == TransactionType::Unprocessed {
                let detection = self
                    .detector
                    .detect_with_rule(tx, mapping.as_ref(), tx.category.as_deref());
                tx.kind = detection.kind;
                summary.typed += 1;
                debug!(
                    id = tx.id,
                    kind = %detection.kind,
                    rule = ?detection.rule,
                    confidence = detection.confidence(),
                    "transaction typed"
                );
            }
        }

        info!(
            total = transactions.len(),
            typed = summary.typed,
            vendors_learned = summary.vendors_learned,
            categories_learned = summary.categories_learned,
            "classification finished"
        );
        Ok(summary)
    }

    fn learn_vendor<P: InteractionPort + ?Sized>(
        &mut self,
        tx: &Transaction,
        port: &mut P,
    ) -> Result<Option<VendorMapping>, ClassifyError> {
        if tx.description.trim().is_empty() {
            return Ok(None);
        }
        let prompt = PairPrompt::for_transaction(PromptKind::Vendor, &tx.description, tx);
        let Some((pattern, vendor)) = port.prompt_for_pair(&prompt) else {
            return Ok(None);
        };
        let mapping = VendorMapping::new(&pattern, &vendor);
        if mapping.vendor.is_empty() || mapping.validate().is_err() {
            port.show_message("Pattern and vendor are both required; leaving vendor unset.");
            return Ok(None);
        }
        self.vendors.learn(mapping.clone())?;
        Ok(Some(mapping))
    }

    fn learn_category<P: InteractionPort + ?Sized>(
        &mut self,
        tx: &Transaction,
        port: &mut P,
    ) -> Result<Option<String>, ClassifyError> {
        let Some(vendor) = tx.vendor.as_deref().filter(|v| !v.trim().is_empty()) else {
            return Ok(None);
        };
        let prompt = PairPrompt::for_transaction(PromptKind::Category, vendor, tx);
        let Some((key, category)) = port.prompt_for_pair(&prompt) else {
            return Ok(None);
        };
        let key = if key.trim().is_empty() { vendor.to_string() } else { key };
        let category = category.trim();
        if category.is_empty() {
            port.show_message("Category is required; leaving category unset.");
            return Ok(None);
        }
        self.categories.learn(&key, category)?;
        Ok(Some(category.to_string()))
    }
}

impl<V: VendorStore, C: CategoryStore> MappingLearner for ClassificationPipeline<V, C> {
    fn remember_expense(&mut self, key: &str, vendor: &str, category: &str) -> StoreResult<()> {
        self.vendors.learn(
            VendorMapping::forced(key, vendor, TransactionType::Expense).with_category(category),
        )?;
        self.categories.learn(vendor, category)
    }
}
