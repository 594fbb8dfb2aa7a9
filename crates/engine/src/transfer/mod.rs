pub mod matcher;
pub mod phases;
pub mod reconciler;

pub use matcher::{MatchConfidence, TransferMatch, TransferMatcher};
pub use phases::{
    apply_disposition, apply_etransfer_decision, etransfer_candidates, link_pair,
    release_orphaned_links, verify_links, Disposition, EtransferDecision, UnmatchedChoice,
};
pub use reconciler::{
    MappingLearner, Outcome, ReconcileError, ReconcileSummary, SinkRegistry, TransferReconciler,
};
