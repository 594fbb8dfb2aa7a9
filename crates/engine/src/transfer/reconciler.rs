use std::collections::{BTreeMap, BTreeSet};
use tally_core::{
    BudgetProfile, InteractionPort, PairPrompt, PromptKind, SourceKind, StoreError, StoreResult,
    Transaction, TransactionUpdateSink,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::matcher::TransferMatcher;
use super::phases::{
    apply_disposition, apply_etransfer_decision, etransfer_candidates, link_pair,
    release_orphaned_links, verify_links, Disposition, EtransferDecision, UnmatchedChoice,
};
use crate::config::ReconcileConfig;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Failed to persist {} transaction(s): {source}", .unsaved.len())]
    Persistence {
        #[source]
        source: StoreError,
        /// Mutated transactions that were not written, for a retry.
        unsaved: Vec<Transaction>,
    },
    #[error("Transfer link invariant violated: {0}")]
    InvariantViolation(String),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Half-saved links from an earlier run that were cleared for re-pairing.
    pub links_released: usize,
    pub etransfers_reviewed: usize,
    pub reclassified: usize,
    pub pairs_linked: usize,
    /// Transactions whose final disposition this run was "keep as transfer".
    pub kept_as_transfer: usize,
    pub rows_written: usize,
}

#[derive(Debug)]
pub enum Outcome {
    Completed(ReconcileSummary),
    /// The operator aborted during e-transfer review. Changes made before
    /// the abort were still persisted.
    Cancelled(ReconcileSummary),
    Failed(ReconcileError),
}

impl Outcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled(_))
    }

    pub fn summary(&self) -> Option<&ReconcileSummary> {
        match self {
            Outcome::Completed(s) | Outcome::Cancelled(s) => Some(s),
            Outcome::Failed(_) => None,
        }
    }

    /// Cancellation counts as success here.
    pub fn into_result(self) -> Result<ReconcileSummary, ReconcileError> {
        match self {
            Outcome::Completed(s) | Outcome::Cancelled(s) => Ok(s),
            Outcome::Failed(e) => Err(e),
        }
    }
}

/// Persists forced vendor mappings chosen during review.
pub trait MappingLearner {
    fn remember_expense(&mut self, key: &str, vendor: &str, category: &str) -> StoreResult<()>;
}

/// One update sink per transaction source.
#[derive(Default)]
pub struct SinkRegistry<'a> {
    sinks: Vec<Box<dyn TransactionUpdateSink + 'a>>,
}

impl<'a> SinkRegistry<'a> {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    /// Replaces any sink already registered for the same source.
    pub fn register(&mut self, sink: Box<dyn TransactionUpdateSink + 'a>) {
        let source = sink.source();
        self.sinks.retain(|s| s.source() != source);
        self.sinks.push(sink);
    }

    pub fn with(mut self, sink: Box<dyn TransactionUpdateSink + 'a>) -> Self {
        self.register(sink);
        self
    }

    fn sink_for(&mut self, source: SourceKind) -> Option<&mut (dyn TransactionUpdateSink + 'a)> {
        self.sinks
            .iter_mut()
            .find(|s| s.source() == source)
            .map(|s| s.as_mut())
    }

    /// Writes the transactions whose ids are in `dirty`, one batch per
    /// source. On failure every batch not yet written is handed back.
    pub fn persist(
        &mut self,
        transactions: &[Transaction],
        dirty: &BTreeSet<i64>,
    ) -> Result<usize, ReconcileError> {
        let mut groups: BTreeMap<SourceKind, Vec<Transaction>> = BTreeMap::new();
        for tx in transactions.iter().filter(|t| dirty.contains(&t.id)) {
            groups.entry(tx.source).or_default().push(tx.clone());
        }

        let mut written = 0;
        let mut pending: Vec<(SourceKind, Vec<Transaction>)> = groups.into_iter().collect();
        while !pending.is_empty() {
            let (source, batch) = pending.remove(0);
            let result = match self.sink_for(source) {
                Some(sink) => sink.update(&batch),
                None => Err(StoreError::NoSink(source)),
            };
            match result {
                Ok(rows) => {
                    debug!(%source, rows, "transfer batch written");
                    written += rows;
                }
                Err(source_err) => {
                    let unsaved = batch
                        .into_iter()
                        .chain(pending.into_iter().flat_map(|(_, b)| b))
                        .collect();
                    return Err(ReconcileError::Persistence { source: source_err, unsaved });
                }
            }
        }
        Ok(written)
    }
}

enum PhaseFlow {
    Continue,
    Cancelled,
}

#[derive(Default)]
struct RunState {
    dirty: BTreeSet<i64>,
    kept: BTreeSet<i64>,
    summary: ReconcileSummary,
}

/// Drives e-transfer review, pairwise matching and unmatched review over
/// the transfers of one run, then writes back what changed.
pub struct TransferReconciler {
    config: ReconcileConfig,
    matcher: TransferMatcher,
}

impl Default for TransferReconciler {
    fn default() -> Self {
        Self::new(&ReconcileConfig::default())
    }
}

impl TransferReconciler {
    pub fn new(config: &ReconcileConfig) -> Self {
        Self {
            config: config.clone(),
            matcher: TransferMatcher::new(config),
        }
    }

    pub fn run<P, L>(
        &self,
        transactions: &mut [Transaction],
        profile: &BudgetProfile,
        port: &mut P,
        learner: &mut L,
        sinks: &mut SinkRegistry<'_>,
    ) -> Outcome
    where
        P: InteractionPort + ?Sized,
        L: MappingLearner + ?Sized,
    {
        let mut state = RunState::default();
        let phases = self.config.phases;

        for idx in release_orphaned_links(transactions) {
            let tx = &transactions[idx];
            warn!(id = tx.id, "released a transfer link whose partner was never saved");
            port.show_message(&format!(
                "Transfer #{} was linked to a partner that was never saved; it is unlinked and can be paired again.",
                tx.id
            ));
            state.dirty.insert(tx.id);
            state.summary.links_released += 1;
        }

        let mut flow = PhaseFlow::Continue;
        if phases.etransfer_review {
            flow = self.review_etransfers(transactions, profile, port, learner, &mut state);
        }

        let cancelled = matches!(flow, PhaseFlow::Cancelled);
        if cancelled {
            info!("reconciliation cancelled during e-transfer review");
        } else {
            if phases.auto_match {
                if let Err(e) = self.match_pairs(transactions, port, &mut state) {
                    return Outcome::Failed(e);
                }
            }
            if phases.unmatched_review {
                self.review_unmatched(transactions, profile, port, &mut state);
            }
        }

        state.summary.kept_as_transfer = state.kept.len();

        if let Err(e) = verify_links(transactions) {
            return Outcome::Failed(e);
        }

        match sinks.persist(transactions, &state.dirty) {
            Ok(rows) => state.summary.rows_written = rows,
            Err(e) => return Outcome::Failed(e),
        }

        info!(
            released = state.summary.links_released,
            reclassified = state.summary.reclassified,
            pairs = state.summary.pairs_linked,
            kept = state.summary.kept_as_transfer,
            rows = state.summary.rows_written,
            cancelled,
            "reconciliation finished"
        );

        if cancelled {
            Outcome::Cancelled(state.summary)
        } else {
            Outcome::Completed(state.summary)
        }
    }

    fn review_etransfers<P, L>(
        &self,
        transactions: &mut [Transaction],
        profile: &BudgetProfile,
        port: &mut P,
        learner: &mut L,
        state: &mut RunState,
    ) -> PhaseFlow
    where
        P: InteractionPort + ?Sized,
        L: MappingLearner + ?Sized,
    {
        let candidates = etransfer_candidates(transactions, &self.config.etransfer_markers);
        if candidates.is_empty() {
            return PhaseFlow::Continue;
        }
        port.show_message(&format!("{} e-transfer(s) to review", candidates.len()));

        for idx in candidates {
            port.show_message(&describe(&transactions[idx]));
            let category = loop {
                port.show_message("[Enter/k] keep as transfer  [e] expense  [a] abort");
                let Some(input) = port.get_input() else {
                    return PhaseFlow::Cancelled;
                };
                match input.trim().to_lowercase().as_str() {
                    "" | "k" | "keep" => break None,
                    "e" | "expense" => match ask_category(port, profile) {
                        Some(category) => break Some(category),
                        None => return PhaseFlow::Cancelled,
                    },
                    "a" | "abort" | "q" | "quit" => return PhaseFlow::Cancelled,
                    _ => port.show_message("Please answer k, e or a."),
                }
            };
            state.summary.etransfers_reviewed += 1;

            let Some(category) = category else {
                state.kept.insert(transactions[idx].id);
                continue;
            };

            port.show_message("Remember this for future runs? [y/N]");
            let remember = port.get_input().is_some_and(|a| is_yes(&a));

            let tx = &mut transactions[idx];
            if apply_etransfer_decision(tx, EtransferDecision::Expense { category: category.clone() }) {
                state.dirty.insert(tx.id);
                state.summary.reclassified += 1;
            }

            if remember {
                let pair = match tx.vendor.clone() {
                    Some(vendor) => Some((vendor.clone(), vendor)),
                    None => ask_pattern(port, tx),
                };
                let Some((key, vendor)) = pair else {
                    port.show_message("No pattern given; nothing remembered.");
                    continue;
                };
                if let Err(e) = learner.remember_expense(&key, &vendor, &category) {
                    warn!(error = %e, id = tx.id, "failed to remember e-transfer mapping");
                    port.show_message("Could not save the mapping; continuing.");
                }
            }
        }
        PhaseFlow::Continue
    }

    fn match_pairs<P>(
        &self,
        transactions: &mut [Transaction],
        port: &mut P,
        state: &mut RunState,
    ) -> Result<(), ReconcileError>
    where
        P: InteractionPort + ?Sized,
    {
        let order: Vec<usize> = (0..transactions.len())
            .filter(|i| transactions[*i].is_unreconciled_transfer())
            .collect();

        for first in order {
            // May have been taken as someone else's candidate already.
            if !transactions[first].is_unreconciled_transfer() {
                continue;
            }
            for candidate in self.matcher.candidates_for(transactions, first) {
                port.show_message(&format!(
                    "Possible transfer pair (score {}, {} confidence):\n  {}\n  {}",
                    candidate.score,
                    candidate.confidence,
                    describe(&transactions[candidate.first]),
                    describe(&transactions[candidate.second]),
                ));
                port.show_message("Link these two? [y/N]");
                if !port.get_input().is_some_and(|a| is_yes(&a)) {
                    continue;
                }

                let link = link_pair(transactions, candidate.first, candidate.second)?;
                for idx in [candidate.first, candidate.second] {
                    let id = transactions[idx].id;
                    state.dirty.insert(id);
                    state.kept.remove(&id);
                }
                state.summary.pairs_linked += 1;
                debug!(
                    first = transactions[candidate.first].id,
                    second = transactions[candidate.second].id,
                    score = candidate.score,
                    %link,
                    "transfer pair linked"
                );
                break;
            }
        }
        Ok(())
    }

    fn review_unmatched<P>(
        &self,
        transactions: &mut [Transaction],
        profile: &BudgetProfile,
        port: &mut P,
        state: &mut RunState,
    ) where
        P: InteractionPort + ?Sized,
    {
        for idx in 0..transactions.len() {
            if !transactions[idx].is_unreconciled_transfer() {
                continue;
            }
            port.show_message(&format!("Unmatched transfer: {}", describe(&transactions[idx])));
            port.show_message("[1] keep as transfer  [2] expense  [3] income  [4] adjustment");

            let choice = port
                .get_input()
                .map(|input| UnmatchedChoice::from_input(&input))
                .unwrap_or(UnmatchedChoice::KeepTransfer);
            let disposition = match choice {
                UnmatchedChoice::KeepTransfer => Disposition::KeepTransfer,
                UnmatchedChoice::Expense => match ask_category(port, profile) {
                    Some(category) => Disposition::Expense { category },
                    None => Disposition::KeepTransfer,
                },
                UnmatchedChoice::Income => Disposition::Income,
                UnmatchedChoice::Adjustment => Disposition::Adjustment,
            };

            let tx = &mut transactions[idx];
            if apply_disposition(tx, disposition) {
                state.dirty.insert(tx.id);
                state.kept.remove(&tx.id);
                state.summary.reclassified += 1;
            } else {
                state.kept.insert(tx.id);
            }
        }
    }
}

/// Prompts until a category is given. Accepts a 1-based index into the
/// profile's categories or a name; names known to the profile take its
/// spelling. `None` when input closes.
fn ask_category<P: InteractionPort + ?Sized>(port: &mut P, profile: &BudgetProfile) -> Option<String> {
    let categories = profile.categories();
    if !categories.is_empty() {
        let listing: Vec<String> = categories
            .iter()
            .enumerate()
            .map(|(i, c)| format!("  [{}] {c}", i + 1))
            .collect();
        port.show_message(&format!("Categories in {}:\n{}", profile.name, listing.join("\n")));
    }

    loop {
        port.show_message("Category (number or name):");
        let input = port.get_input()?;
        let input = input.trim();
        if input.is_empty() {
            port.show_message("A category is required.");
            continue;
        }
        if let Ok(n) = input.parse::<usize>() {
            match categories.get(n.wrapping_sub(1)) {
                Some(name) => return Some(name.to_string()),
                None => {
                    port.show_message(&format!("No category numbered {n}."));
                    continue;
                }
            }
        }
        return Some(
            profile
                .canonical_category(input)
                .map(str::to_string)
                .unwrap_or_else(|| input.to_string()),
        );
    }
}

/// Pattern and vendor name for an e-transfer that has no vendor. Its
/// description usually carries a per-payment reference, so the operator
/// picks the text to match.
fn ask_pattern<P: InteractionPort + ?Sized>(port: &mut P, tx: &Transaction) -> Option<(String, String)> {
    let prompt = PairPrompt::for_transaction(PromptKind::Vendor, &tx.description, tx);
    let (pattern, vendor) = port.prompt_for_pair(&prompt)?;
    let (pattern, vendor) = (pattern.trim(), vendor.trim());
    if pattern.is_empty() || vendor.is_empty() {
        return None;
    }
    Some((pattern.to_string(), vendor.to_string()))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

fn describe(tx: &Transaction) -> String {
    let account = if tx.account_type.is_empty() {
        tx.source.to_string()
    } else {
        tx.account_type.clone()
    };
    format!(
        "#{} {} {:>12} {} [{}]",
        tx.id,
        tx.date,
        tx.amount.to_string(),
        tx.description,
        account
    )
}
