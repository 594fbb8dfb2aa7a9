pub mod category;
pub mod money;
pub mod ports;
pub mod transaction;
pub mod vendor;

pub use category::{BudgetProfile, Category, ProfileError};
pub use money::Money;
pub use ports::{
    CategoryStore, InteractionPort, PairPrompt, PromptKind, StoreError, StoreResult,
    TransactionUpdateSink, VendorStore,
};
pub use transaction::{join_description, SourceKind, Transaction, TransactionType};
pub use vendor::{contains_pattern, normalize_pattern, MappingError, VendorMapping};
