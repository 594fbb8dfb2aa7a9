pub mod budget;
pub mod category;
pub mod config;
pub mod detect;
pub mod engine;
pub mod interaction;
pub mod memory;
pub mod pipeline;
pub mod transfer;
pub mod vendor;

pub use budget::{summarize, BudgetSummary, CategoryLine, UNCATEGORIZED};
pub use category::{override_categories, CategoryResolver};
pub use config::{
    ConfigError, EngineConfig, KeywordField, KeywordRule, Phases, ReconcileConfig, SignConvention,
    SourceConfig,
};
pub use detect::{Detection, DetectionRule, TypeDetector};
pub use engine::Engine;
pub use interaction::ScriptedPort;
pub use memory::{MemoryCategoryStore, MemorySink, MemoryVendorStore};
pub use pipeline::{ClassificationPipeline, ClassifyError, ClassifySummary};
pub use transfer::{
    MappingLearner, MatchConfidence, Outcome, ReconcileError, ReconcileSummary, SinkRegistry,
    TransferMatch, TransferMatcher, TransferReconciler,
};
pub use vendor::VendorResolver;
