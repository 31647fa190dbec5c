//! Orchestrator: wires the extractor, index store, and matcher into the
//! two operations a caller actually wants: `enroll` a track into an
//! index, and `identify` a query clip against one.
//!
//! Everything here is glue, no fingerprinting logic lives in this module.
//! It exists so callers (the CLI, a future service surface) don't have to
//! know the extractor pipeline's internal stage order.

use std::collections::HashSet;
use std::path::Path;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::hasher::{pairs, FpHash};
use crate::index::file_store::FileIndexStore;
use crate::index::{IndexStore, OpenMode, TrackId};
use crate::matcher::{identify_candidates, is_confident, CancellationToken, MatchCandidate};
use crate::peaks::peaks;
use crate::spectrogram::spectrogram;

/// Default wall-clock budget for `identify`.
pub const DEFAULT_IDENTIFY_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrollOutcome {
    pub num_hashes: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IdentifyOutcome {
    pub candidates: Vec<MatchCandidate>,
    /// `true` if the wall-clock budget expired before every query hash was
    /// checked against the index. The ranking is still the best evidence
    /// gathered so far, just not exhaustive.
    pub partial: bool,
    /// Whether the top candidate clears the `min_match_count`/`alpha` gate.
    pub confident: bool,
}

/// Open (or create) the reference file-backed index at `path`.
pub fn open_index<P: AsRef<Path>>(path: P, mode: OpenMode, config: &Config) -> Result<FileIndexStore> {
    FileIndexStore::open(path, mode, config)
}

/// Extract and commit a track's fingerprints into `index`.
///
/// On any failure partway through hashing, pending postings for
/// `track_id` are discarded via `abort_track` so a retry never leaves
/// half a track committed.
pub fn enroll(
    track_id: TrackId,
    pcm: &[f32],
    index: &mut dyn IndexStore,
    config: &Config,
) -> Result<EnrollOutcome> {
    if pcm.len() < config.fft_window {
        return Err(Error::ShortSignal {
            samples: pcm.len(),
            required: config.fft_window,
        });
    }

    let result = (|| -> Result<EnrollOutcome> {
        let spec = spectrogram(pcm, config);
        let found = peaks(&spec, config);
        let emitted = pairs(&found, config);

        // dedup (hash, t_anchor) within this batch only, cross-batch
        // duplicates still count as evidence
        let mut seen = HashSet::new();
        let entries: Vec<(FpHash, u32)> = emitted
            .iter()
            .filter(|pair| seen.insert((pair.hash, pair.t_anchor)))
            .map(|pair| (pair.hash, pair.t_anchor))
            .collect();

        index.put_bulk(track_id, &entries)?;
        index.flush()?;

        Ok(EnrollOutcome { num_hashes: entries.len() })
    })();

    if result.is_err() {
        // discard whatever is still pending for this track
        let _ = index.abort_track(track_id);
    }

    result
}

/// Extract a query clip's fingerprints and rank candidate tracks from
/// `index`, degrading to a partial ranking if `timeout` elapses before
/// the scan completes.
///
/// `cancel` additionally allows a caller to hard-abort the scan; that path
/// returns `Err(Error::Cancelled)` with no results at all, distinct from
/// the timeout's graceful `partial = true` degradation.
pub fn identify(
    pcm: &[f32],
    index: &dyn IndexStore,
    top_k: usize,
    timeout: Duration,
    cancel: &CancellationToken,
    config: &Config,
) -> Result<IdentifyOutcome> {
    if pcm.len() < config.fft_window {
        return Err(Error::ShortSignal {
            samples: pcm.len(),
            required: config.fft_window,
        });
    }

    let spec = spectrogram(pcm, config);
    let found = peaks(&spec, config);
    let emitted = pairs(&found, config);

    let deadline = Instant::now() + timeout;
    let (candidates, partial) =
        identify_candidates(&emitted, index, config, top_k, cancel, Some(deadline))?;

    let confident = is_confident(&candidates, config);
    Ok(IdentifyOutcome { candidates, partial, confident })
}
