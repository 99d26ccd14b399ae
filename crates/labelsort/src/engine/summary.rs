use std::fmt;

use serde::Serialize;

use super::model::CandidateState;

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub categories: usize,
    pub examples: usize,
    /// Candidates that passed the scan.
    pub scanned: usize,
    /// Candidates with an affirmative verdict.
    pub matched: usize,
    pub moved: usize,
    /// Matched candidates whose move request failed.
    pub failed: usize,
    /// Matched candidates that already carried the category label.
    pub unchanged: usize,
    /// Listed messages dropped before classification.
    pub skipped: usize,
    pub classification_errors: usize,
    pub corpus_errors: usize,
    pub interrupted: bool,
}

impl RunSummary {
    /// Folds one candidate's terminal state into the counters.
    pub fn record(&mut self, state: &CandidateState) {
        match state {
            CandidateState::Moved { .. } => {
                self.matched += 1;
                self.moved += 1;
            }
            CandidateState::AlreadyFiled { .. } => {
                self.matched += 1;
                self.unchanged += 1;
            }
            CandidateState::MoveFailed { .. } => {
                self.matched += 1;
                self.failed += 1;
            }
            CandidateState::Interrupted => self.interrupted = true,
            CandidateState::NoMatch
            | CandidateState::Fetched
            | CandidateState::UnderEvaluation
            | CandidateState::Matched { .. }
            | CandidateState::MutationAttempted { .. } => {}
        }
    }

    pub fn unmatched(&self) -> usize {
        self.scanned.saturating_sub(self.matched)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Run {}",
            if self.interrupted { "interrupted" } else { "complete" }
        )?;
        writeln!(
            f,
            "  categories: {} ({} examples, {} corpus errors)",
            self.categories, self.examples, self.corpus_errors
        )?;
        writeln!(
            f,
            "  scanned: {}  skipped: {}  classification errors: {}",
            self.scanned, self.skipped, self.classification_errors
        )?;
        write!(
            f,
            "  matched: {}  moved: {}  unchanged: {}  failed: {}",
            self.matched, self.moved, self.unchanged, self.failed
        )
    }
}
