use tally_core::{
    BudgetProfile, CategoryStore, InteractionPort, StoreResult, Transaction,
    TransactionUpdateSink, VendorStore,
};

use crate::budget::{self, BudgetSummary};
use crate::category::override_categories;
use crate::config::EngineConfig;
use crate::pipeline::{ClassificationPipeline, ClassifyError, ClassifySummary};
use crate::transfer::{Outcome, SinkRegistry, TransferReconciler};

/// Everything a front end needs: classification, transfer reconciliation,
/// bulk category renames and budget reporting over one set of stores.
pub struct Engine<'s, V: VendorStore, C: CategoryStore, P: InteractionPort> {
    pipeline: ClassificationPipeline<V, C>,
    reconciler: TransferReconciler,
    port: P,
    sinks: SinkRegistry<'s>,
}

impl<'s, V: VendorStore, C: CategoryStore, P: InteractionPort> Engine<'s, V, C, P> {
    pub fn new(vendor_store: V, category_store: C, port: P, config: &EngineConfig) -> StoreResult<Self> {
        Ok(Self {
            pipeline: ClassificationPipeline::load(vendor_store, category_store, config)?,
            reconciler: TransferReconciler::new(&config.reconcile),
            port,
            sinks: SinkRegistry::new(),
        })
    }

    pub fn with_sink(mut self, sink: Box<dyn TransactionUpdateSink + 's>) -> Self {
        self.sinks.register(sink);
        self
    }

    pub fn register_sink(&mut self, sink: Box<dyn TransactionUpdateSink + 's>) {
        self.sinks.register(sink);
    }

    pub fn classify(&mut self, transactions: &mut [Transaction]) -> Result<ClassifySummary, ClassifyError> {
        self.pipeline.classify(transactions, &mut self.port)
    }

    pub fn reconcile_transfers(&mut self, transactions: &mut [Transaction], profile: &BudgetProfile) -> Outcome {
        self.reconciler.run(
            transactions,
            profile,
            &mut self.port,
            &mut self.pipeline,
            &mut self.sinks,
        )
    }

    pub fn override_categories(&self, transactions: &mut [Transaction], from: &str, to: &str) -> usize {
        override_categories(transactions, from, to)
    }

    pub fn budget_summary(&self, transactions: &[Transaction], profile: &BudgetProfile) -> BudgetSummary {
        let categories = self.pipeline.categories();
        budget::summarize(transactions, profile, |c| categories.is_tracked_only(c))
    }
}
