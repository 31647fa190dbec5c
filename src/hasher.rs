//! Pair hasher: combinatorial landmark pairing and hash encoding.
//!
//! Each anchor peak is paired with up to `fan_out` nearby-in-time targets
//! inside a frequency band, and each pair is packed into a 32-bit `Hash`
//! as `f_anchor (10 bits) | f_target (10 bits) | delta (12 bits)`.

use crate::config::Config;
use crate::peaks::Peak;

/// A packed `(f_anchor, f_target, delta)` triple. 32 bits is exactly the
/// suggested 10+10+12 layout with no slack, so there is no headroom
/// version to pick between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FpHash(pub u32);

impl FpHash {
    const FREQ_MASK: u32 = (1 << Config::HASH_FREQ_BITS) - 1;
    const DELTA_MASK: u32 = (1 << Config::HASH_DELTA_BITS) - 1;

    pub fn encode(f_anchor: u32, f_target: u32, delta: u32) -> Self {
        let a = f_anchor & Self::FREQ_MASK;
        let t = f_target & Self::FREQ_MASK;
        let d = delta & Self::DELTA_MASK;
        FpHash((a << 22) | (t << 12) | d)
    }

    /// Decode back into `(f_anchor, f_target, delta)`.
    pub fn decode(self) -> (u32, u32, u32) {
        let a = (self.0 >> 22) & Self::FREQ_MASK;
        let t = (self.0 >> 12) & Self::FREQ_MASK;
        let d = self.0 & Self::DELTA_MASK;
        (a, t, d)
    }
}

/// A hash paired with the frame offset of its anchor peak.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pair {
    pub hash: FpHash,
    pub t_anchor: u32,
}

/// Emit pairs for every anchor in time order. Peaks near the end of the
/// stream simply yield fewer pairs, not an error.
pub fn pairs(peaks: &[Peak], config: &Config) -> Vec<Pair> {
    let mut sorted: Vec<&Peak> = peaks.iter().collect();
    sorted.sort_by_key(|p| (p.frame, p.bin));

    let mut out = Vec::new();

    for (i, anchor) in sorted.iter().enumerate() {
        let mut emitted = 0usize;

        for target in sorted[i + 1..].iter() {
            if emitted >= config.fan_out {
                break;
            }

            let delta = target.frame.saturating_sub(anchor.frame) as u32;
            if delta < config.hash_time_delta_min {
                continue;
            }
            if delta > config.hash_time_delta_max {
                // sorted by frame, so no further target can be in range either
                break;
            }

            let freq_delta = (anchor.bin as i64 - target.bin as i64).unsigned_abs() as u32;
            if freq_delta > config.freq_delta_max {
                continue;
            }

            if anchor.bin == target.bin && delta == 0 {
                continue;
            }

            let hash = FpHash::encode(anchor.bin as u32, target.bin as u32, delta);
            out.push(Pair {
                hash,
                t_anchor: anchor.frame as u32,
            });
            emitted += 1;
        }
    }

    out
}
