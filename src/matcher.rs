//! Matcher: time-offset histogramming and confidence scoring over the
//! index.
//!
//! `identify_candidates` only reads postings (pure with respect to the
//! index) and is insensitive to posting-list order. Cancellation is
//! checked between hashes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::hasher::Pair;
use crate::index::{IndexStore, TrackId};

/// Coarse-grained cooperative cancellation flag, checked between the
/// extraction and matching phases and between successive hashes inside
/// the matcher.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// `(track_id, delta, score)`, one ranked candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchCandidate {
    pub track_id: TrackId,
    pub delta: i64,
    pub score: usize,
}

/// Aggregate query pairs against the index and return the top `top_k`
/// candidates, ranked by score descending, plus whether the scan hit
/// `deadline` before processing every pair.
///
/// Returns `Err(Error::Cancelled)` if `cancel` fires mid-scan (an abort, not
/// partial evidence, so nothing is ranked or returned). A `deadline`
/// expiring instead ranks whatever histogram evidence has accumulated so
/// far and returns it with `partial = true`.
pub fn identify_candidates(
    pairs: &[Pair],
    index: &dyn IndexStore,
    config: &Config,
    top_k: usize,
    cancel: &CancellationToken,
    deadline: Option<Instant>,
) -> Result<(Vec<MatchCandidate>, bool)> {
    let mut histograms: HashMap<TrackId, HashMap<i64, usize>> = HashMap::new();
    let mut partial = false;

    for pair in pairs {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if let Some(dl) = deadline {
            if Instant::now() >= dl {
                partial = true;
                break;
            }
        }

        let postings = index.get(pair.hash)?;
        for posting in postings {
            let delta = posting.t_anchor as i64 - pair.t_anchor as i64;
            *histograms
                .entry(posting.track_id)
                .or_default()
                .entry(delta)
                .or_insert(0) += 1;
        }
    }

    let mut candidates: Vec<MatchCandidate> = histograms
        .into_iter()
        .map(|(track_id, hist)| {
            let (delta, score) = best_offset(&hist, config.epsilon);
            MatchCandidate { track_id, delta, score }
        })
        .collect();

    candidates.sort_by(|a, b| b.score.cmp(&a.score).then(a.track_id.cmp(&b.track_id)));
    candidates.truncate(top_k);
    Ok((candidates, partial))
}

/// `argmax_delta sum_{delta' in [delta-eps, delta+eps]} hist[delta']`.
fn best_offset(hist: &HashMap<i64, usize>, epsilon: i32) -> (i64, usize) {
    let mut best_delta = 0i64;
    let mut best_score = 0usize;

    let mut deltas: Vec<i64> = hist.keys().copied().collect();
    deltas.sort_unstable();

    for delta in deltas {
        let mut sum = 0usize;
        for e in -epsilon..=epsilon {
            if let Some(&count) = hist.get(&(delta + e as i64)) {
                sum += count;
            }
        }
        if sum > best_score {
            best_score = sum;
            best_delta = delta;
        }
    }

    (best_delta, best_score)
}

/// Is the top candidate a confident match: the raw score must clear
/// `min_match_count`, and must beat the runner-up by at least a factor of
/// `alpha`.
pub fn is_confident(candidates: &[MatchCandidate], config: &Config) -> bool {
    let Some(best) = candidates.first() else {
        return false;
    };
    if best.score < config.min_match_count {
        return false;
    }
    let second_best = candidates.get(1).map(|c| c.score).unwrap_or(0);
    (best.score as f32) >= config.alpha * second_best as f32
}
