//! Quality gate: accept or reject a waveform before any cleaning work.
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. duration `>= min_duration_secs` (inclusive), else `too_short`
//! 2. SNR `>= min_snr_db`, else `low_snr`
//!
//! SNR is only computed when the duration check passes.
//!
//! # Example
//!
//! ```rust
//! use speech_etl::audio::{GateDecision, QualityGate, SpectralScorer, Waveform};
//! use speech_etl::config::GateConfig;
//!
//! let config = GateConfig::default();
//! let gate = QualityGate::from_config(&config);
//! let scorer = SpectralScorer::new(16_000, &config);
//!
//! let short = Waveform::new(vec![0.1; 16_000], 16_000); // 1.0 s
//! match gate.evaluate(&scorer, &short) {
//!     GateDecision::Rejected(rejection) => assert_eq!(rejection.reason(), "too_short"),
//!     GateDecision::Accepted(_) => unreachable!(),
//! }
//! ```

use thiserror::Error;

use crate::config::GateConfig;

use super::quality::{QualityMetrics, QualityScorer};
use super::Waveform;

// ---------------------------------------------------------------------------
// QualityRejection
// ---------------------------------------------------------------------------

/// Why the gate rejected a waveform.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum QualityRejection {
    #[error("too_short: {duration_secs:.2}s (minimum {min_secs:.2}s)")]
    TooShort { duration_secs: f32, min_secs: f32 },

    #[error("low_snr: {snr_db:.2} dB (minimum {min_db:.2} dB)")]
    LowSnr { snr_db: f32, min_db: f32 },
}

impl QualityRejection {
    /// Stable machine-readable reason: `"too_short"` or `"low_snr"`.
    pub fn reason(&self) -> &'static str {
        match self {
            QualityRejection::TooShort { .. } => "too_short",
            QualityRejection::LowSnr { .. } => "low_snr",
        }
    }

    /// The measured value that failed.
    pub fn measured(&self) -> f32 {
        match self {
            QualityRejection::TooShort { duration_secs, .. } => *duration_secs,
            QualityRejection::LowSnr { snr_db, .. } => *snr_db,
        }
    }

    /// The threshold it was compared against.
    pub fn threshold(&self) -> f32 {
        match self {
            QualityRejection::TooShort { min_secs, .. } => *min_secs,
            QualityRejection::LowSnr { min_db, .. } => *min_db,
        }
    }
}

// ---------------------------------------------------------------------------
// GateDecision
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    Accepted(QualityMetrics),
    Rejected(QualityRejection),
}

impl GateDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, GateDecision::Accepted(_))
    }
}

// ---------------------------------------------------------------------------
// QualityGate
// ---------------------------------------------------------------------------

/// Threshold pair; the measuring is delegated to a [`QualityScorer`].
#[derive(Debug, Clone, Copy)]
pub struct QualityGate {
    /// Minimum duration in seconds (default: `1.5`).
    pub min_duration_secs: f32,
    /// Minimum SNR in dB (default: `10.0`).
    pub min_snr_db: f32,
}

impl Default for QualityGate {
    fn default() -> Self {
        Self::from_config(&GateConfig::default())
    }
}

impl QualityGate {
    pub fn from_config(config: &GateConfig) -> Self {
        Self {
            min_duration_secs: config.min_duration_secs,
            min_snr_db: config.min_snr_db,
        }
    }

    pub fn evaluate(&self, scorer: &dyn QualityScorer, waveform: &Waveform) -> GateDecision {
        let duration_secs = scorer.duration_secs(waveform);
        if duration_secs < self.min_duration_secs {
            return GateDecision::Rejected(QualityRejection::TooShort {
                duration_secs,
                min_secs: self.min_duration_secs,
            });
        }

        let snr_db = scorer.snr_db(waveform);
        if snr_db.is_nan() || snr_db < self.min_snr_db {
            return GateDecision::Rejected(QualityRejection::LowSnr {
                snr_db,
                min_db: self.min_snr_db,
            });
        }

        GateDecision::Accepted(QualityMetrics {
            duration_secs,
            snr_db,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::audio::SpectralScorer;
    use crate::test_support::{clean_take, noise, RATE};

    /// Returns fixed measurements and counts how often SNR is asked for.
    struct CountingScorer {
        duration: f32,
        snr: f32,
        snr_calls: AtomicUsize,
    }

    impl CountingScorer {
        fn new(duration: f32, snr: f32) -> Self {
            Self {
                duration,
                snr,
                snr_calls: AtomicUsize::new(0),
            }
        }
    }

    impl QualityScorer for CountingScorer {
        fn duration_secs(&self, _: &Waveform) -> f32 {
            self.duration
        }

        fn snr_db(&self, _: &Waveform) -> f32 {
            self.snr_calls.fetch_add(1, Ordering::SeqCst);
            self.snr
        }
    }

    fn empty() -> Waveform {
        Waveform::new(Vec::new(), RATE)
    }

    #[test]
    fn too_short_skips_snr() {
        let scorer = CountingScorer::new(1.0, 40.0);
        let decision = QualityGate::default().evaluate(&scorer, &empty());
        assert_eq!(
            decision,
            GateDecision::Rejected(QualityRejection::TooShort {
                duration_secs: 1.0,
                min_secs: 1.5
            })
        );
        assert_eq!(scorer.snr_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn exact_minimum_duration_passes() {
        let scorer = CountingScorer::new(1.5, 12.0);
        let decision = QualityGate::default().evaluate(&scorer, &empty());
        assert!(decision.is_accepted());
        assert_eq!(scorer.snr_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn low_snr_reports_measured_and_threshold() {
        let scorer = CountingScorer::new(3.0, 4.5);
        match QualityGate::default().evaluate(&scorer, &empty()) {
            GateDecision::Rejected(r) => {
                assert_eq!(r.reason(), "low_snr");
                assert_eq!(r.measured(), 4.5);
                assert_eq!(r.threshold(), 10.0);
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn exact_minimum_snr_passes() {
        let scorer = CountingScorer::new(2.0, 10.0);
        assert!(QualityGate::default().evaluate(&scorer, &empty()).is_accepted());
    }

    #[test]
    fn nan_and_negative_infinity_snr_reject() {
        for snr in [f32::NAN, f32::NEG_INFINITY] {
            let scorer = CountingScorer::new(2.0, snr);
            let decision = QualityGate::default().evaluate(&scorer, &empty());
            assert!(!decision.is_accepted(), "{snr} accepted");
        }
    }

    #[test]
    fn real_scorer_accepts_clean_take_and_rejects_noise() {
        let config = GateConfig::default();
        let gate = QualityGate::from_config(&config);
        let scorer = SpectralScorer::new(RATE, &config);

        let clean = Waveform::new(clean_take(2.0, RATE), RATE);
        assert!(gate.evaluate(&scorer, &clean).is_accepted());

        let noisy = Waveform::new(noise(3.0, RATE, 0.3, 5), RATE);
        match gate.evaluate(&scorer, &noisy) {
            GateDecision::Rejected(r) => assert_eq!(r.reason(), "low_snr"),
            other => panic!("expected low_snr, got {other:?}"),
        }
    }

    #[test]
    fn rejection_messages_start_with_reason() {
        let r = QualityRejection::TooShort {
            duration_secs: 1.0,
            min_secs: 1.5,
        };
        assert!(r.to_string().starts_with("too_short"));
    }
}
