//! Batch state machine and run reports.
//!
//! [`BatchState`] tracks where a [`BatchOrchestrator`](super::BatchOrchestrator)
//! run is.  [`BatchCounters`] are the only mutable state shared between
//! per-file tasks; [`BatchReport`] is the snapshot a finished run exposes.

use std::sync::atomic::{AtomicUsize, Ordering};

// ---------------------------------------------------------------------------
// BatchState
// ---------------------------------------------------------------------------

/// States of one batch run.
///
/// ```text
/// Scanning ──walk done──▶ Processing ⇄ Counting ──last file──▶ Done
/// ```
///
/// With several workers, `Processing` and `Counting` interleave across
/// files; the state reported is that of the run as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchState {
    /// Not started yet.
    #[default]
    Idle,
    /// Enumerating input files.
    Scanning,
    /// Running the per-file pipeline.
    Processing,
    /// Folding a finished file into the counters.
    Counting,
    /// Every file has been counted; the report is final.
    Done,
}

impl BatchState {
    /// Returns `true` while a run is in progress.
    ///
    /// ```
    /// use speech_etl::pipeline::BatchState;
    ///
    /// assert!(!BatchState::Idle.is_running());
    /// assert!(BatchState::Scanning.is_running());
    /// assert!(BatchState::Processing.is_running());
    /// assert!(BatchState::Counting.is_running());
    /// assert!(!BatchState::Done.is_running());
    /// ```
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            BatchState::Scanning | BatchState::Processing | BatchState::Counting
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            BatchState::Idle => "idle",
            BatchState::Scanning => "scanning",
            BatchState::Processing => "processing",
            BatchState::Counting => "counting",
            BatchState::Done => "done",
        }
    }
}

// ---------------------------------------------------------------------------
// BatchReport
// ---------------------------------------------------------------------------

/// Accept/reject totals for one cleaning run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchReport {
    pub accepted_count: usize,
    pub rejected_count: usize,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.accepted_count + self.rejected_count
    }
}

/// Atomic accumulator behind a [`BatchReport`].
#[derive(Debug, Default)]
pub struct BatchCounters {
    accepted: AtomicUsize,
    rejected: AtomicUsize,
}

impl BatchCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, accepted: bool) {
        if accepted {
            self.accepted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.rejected.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn reset(&self) {
        self.accepted.store(0, Ordering::Relaxed);
        self.rejected.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> BatchReport {
        BatchReport {
            accepted_count: self.accepted.load(Ordering::Relaxed),
            rejected_count: self.rejected.load(Ordering::Relaxed),
        }
    }
}

// ---------------------------------------------------------------------------
// FeatureReport
// ---------------------------------------------------------------------------

/// Totals for one feature-generation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeatureReport {
    /// Waveforms whose tensor was written.
    pub generated_count: usize,
    /// Waveforms with no tensor (unreadable input or tensor write failure).
    pub failed_count: usize,
    /// Generated waveforms whose preview image failed.
    pub preview_failures: usize,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
