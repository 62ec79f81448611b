//! Face matcher
//!
//! Compares a probe embedding against every stored candidate by Euclidean
//! distance and classifies the closest one into three bands:
//!
//! | best distance                        | verdict     |
//! |--------------------------------------|-------------|
//! | `d <= confidence`                    | `Match`     |
//! | `confidence < d <= reject`           | `Ambiguous` |
//! | `d > reject`, or no usable candidate | `Unknown`   |
//!
//! Only `Match` is ever attributed to an identity. Candidates whose stored
//! embedding cannot be decoded or compared are skipped, never fatal.

use rayon::prelude::*;
use shivir_common::db::Candidate;
use shivir_common::{Embedding, Error, Result};
use std::cmp::Ordering;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Distance cutoffs for the match bands
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchThresholds {
    reject: f64,
    confidence: f64,
}

impl Default for MatchThresholds {
    fn default() -> Self {
        Self {
            reject: 0.6,
            confidence: 0.55,
        }
    }
}

impl MatchThresholds {
    /// Requires `0 <= confidence <= reject`, both finite
    pub fn new(reject: f64, confidence: f64) -> Result<Self> {
        if !reject.is_finite() || !confidence.is_finite() {
            return Err(Error::Config("Match thresholds must be finite".to_string()));
        }
        if confidence < 0.0 || confidence > reject {
            return Err(Error::Config(format!(
                "Match thresholds require 0 <= confidence ({}) <= reject ({})",
                confidence, reject
            )));
        }
        Ok(Self { reject, confidence })
    }

    pub fn reject(&self) -> f64 {
        self.reject
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }
}

/// Result of one match pass
#[derive(Debug, Clone, PartialEq)]
pub enum MatchVerdict {
    /// Confident match, safe to attribute
    Match { person_id: Uuid, distance: f64 },
    /// Closest candidate is inside the reject cutoff but not confident
    Ambiguous { person_id: Uuid, distance: f64 },
    /// Nobody close enough, or nothing to compare against
    Unknown { best_distance: Option<f64> },
}

impl MatchVerdict {
    /// Identity to credit; `None` for ambiguous and unknown verdicts
    pub fn accepted(&self) -> Option<Uuid> {
        match self {
            MatchVerdict::Match { person_id, .. } => Some(*person_id),
            _ => None,
        }
    }

    pub fn best_distance(&self) -> Option<f64> {
        match self {
            MatchVerdict::Match { distance, .. } | MatchVerdict::Ambiguous { distance, .. } => {
                Some(*distance)
            }
            MatchVerdict::Unknown { best_distance } => *best_distance,
        }
    }
}

/// Distance of one candidate, `None` when its embedding is unusable
fn candidate_distance(probe: &Embedding, candidate: &Candidate) -> Option<(f64, Uuid)> {
    let stored = match Embedding::from_le_bytes(&candidate.embedding_blob) {
        Ok(stored) => stored,
        Err(e) => {
            warn!(person_id = %candidate.person_id, name = %candidate.name, "Skipping candidate with unreadable embedding: {}", e);
            return None;
        }
    };

    match probe.euclidean_distance(&stored) {
        Some(distance) => {
            debug!(person_id = %candidate.person_id, name = %candidate.name, distance, "Candidate distance");
            Some((distance, candidate.person_id))
        }
        None => {
            warn!(
                person_id = %candidate.person_id,
                name = %candidate.name,
                stored_len = stored.len(),
                probe_len = probe.len(),
                "Skipping candidate with mismatched embedding dimension"
            );
            None
        }
    }
}

/// Lower distance wins; ties resolve to the smaller id so results are stable
fn closer(a: &(f64, Uuid), b: &(f64, Uuid)) -> Ordering {
    a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1))
}

/// Find the closest candidate and classify it
///
/// Candidates are evaluated in parallel; the minimum reduction is
/// deterministic regardless of scheduling.
pub fn match_probe(
    probe: &Embedding,
    candidates: &[Candidate],
    thresholds: &MatchThresholds,
) -> MatchVerdict {
    if probe.is_empty() || probe.as_slice().iter().any(|v| !v.is_finite()) {
        warn!(probe_len = probe.len(), "Rejecting malformed probe embedding");
        return MatchVerdict::Unknown { best_distance: None };
    }

    if candidates.is_empty() {
        info!("No stored embeddings to compare against");
        return MatchVerdict::Unknown { best_distance: None };
    }

    let best = candidates
        .par_iter()
        .filter_map(|candidate| candidate_distance(probe, candidate))
        .min_by(closer);

    let Some((distance, person_id)) = best else {
        warn!(candidates = candidates.len(), "No candidate embedding was usable");
        return MatchVerdict::Unknown { best_distance: None };
    };

    let verdict = if distance <= thresholds.confidence {
        MatchVerdict::Match { person_id, distance }
    } else if distance <= thresholds.reject {
        MatchVerdict::Ambiguous { person_id, distance }
    } else {
        MatchVerdict::Unknown {
            best_distance: Some(distance),
        }
    };

    info!(
        candidates = candidates.len(),
        distance,
        confidence = thresholds.confidence,
        reject = thresholds.reject,
        "Match verdict: {:?}",
        verdict
    );

    verdict
}
