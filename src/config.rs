//! Build-time fingerprinting parameters.
//!
//! A single immutable [`Config`] value is threaded through the extractor,
//! the index store, and the matcher. There is no global/static
//! configuration singleton: every component that needs a parameter takes
//! `&Config` explicitly. The subset of fields that affect hash
//! reproducibility is folded into a SHA-256 digest (`Config::digest`) that
//! is embedded in the index file header, and an index built with different
//! parameters refuses to open against a mismatched runtime `Config`.

use sha2::{Digest, Sha256};

/// How the peak picker derives its absolute magnitude floor. A build-time
/// parameter, digested so enroll and identify can never silently
/// disagree on it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AmpFloor {
    /// A fixed magnitude threshold in the same units as the spectrogram
    /// (log units when `log_compress` is set).
    Absolute(f32),
    /// A percentile (0.0..=100.0) of the non-silent cells' magnitudes,
    /// recomputed per spectrogram.
    Percentile(f32),
}

impl Default for AmpFloor {
    fn default() -> Self {
        AmpFloor::Absolute(10.0)
    }
}

/// Immutable fingerprinting configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Sample rate the frontend expects PCM to already be resampled to.
    pub sample_rate: u32,
    /// STFT window size in samples. Must be a power of two.
    pub fft_window: usize,
    /// STFT hop size in samples.
    pub hop: usize,
    /// Peak neighborhood half-width in frames.
    pub dt: usize,
    /// Peak neighborhood half-width in frequency bins.
    pub df: usize,
    /// Magnitude floor below which a local maximum is not a peak.
    pub amp_min: AmpFloor,
    /// Apply `log(1 + |X|)` compression before peak picking.
    pub log_compress: bool,
    /// Maximum peak density per second before overflow windows get thinned.
    pub peaks_per_sec_max: usize,
    /// Target pairings emitted per anchor peak.
    pub fan_out: usize,
    /// Minimum anchor-to-target frame delta accepted by the pair hasher.
    pub hash_time_delta_min: u32,
    /// Maximum anchor-to-target frame delta accepted by the pair hasher.
    pub hash_time_delta_max: u32,
    /// Maximum anchor-to-target frequency-bin distance.
    pub freq_delta_max: u32,
    /// Minimum raw score for a candidate to be reported as confident.
    pub min_match_count: usize,
    /// Confidence ratio: best score must be at least `alpha` times the
    /// runner-up's score. Not part of the digest, only affects
    /// matching-time ranking, not hash reproducibility.
    pub alpha: f32,
    /// Delta-bin tolerance used when summing histogram votes around the
    /// best offset. Not part of the digest, for the same reason as `alpha`.
    pub epsilon: i32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            sample_rate: 22_050,
            fft_window: 2048,
            hop: 1024,
            dt: 10,
            df: 10,
            amp_min: AmpFloor::default(),
            log_compress: true,
            peaks_per_sec_max: 30,
            fan_out: 15,
            hash_time_delta_min: 1,
            hash_time_delta_max: 200,
            freq_delta_max: 200,
            min_match_count: 5,
            alpha: 2.0,
            epsilon: 0,
        }
    }
}

impl Config {
    /// Number of frequency bins in the spectrogram (`N/2 + 1`).
    pub fn freq_bins(&self) -> usize {
        self.fft_window / 2 + 1
    }

    /// Number of bits dedicated to each field of the packed hash. These are
    /// fixed at 10/10/12 and are not configurable, since changing them
    /// would change the `Hash` type's wire contract, not just a tunable
    /// knob.
    pub const HASH_FREQ_BITS: u32 = 10;
    pub const HASH_DELTA_BITS: u32 = 12;

    /// SHA-256 digest over the subset of fields that affect what hashes get
    /// emitted during fingerprinting. Two `Config`s that produce the same
    /// digest are guaranteed to produce byte-identical hashes for the same
    /// PCM input; two that differ in digest may not be compared at all
    /// (the index store refuses to open across a mismatch).
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.sample_rate.to_le_bytes());
        hasher.update((self.fft_window as u64).to_le_bytes());
        hasher.update((self.hop as u64).to_le_bytes());
        hasher.update((self.dt as u64).to_le_bytes());
        hasher.update((self.df as u64).to_le_bytes());
        match self.amp_min {
            AmpFloor::Absolute(v) => {
                hasher.update([0u8]);
                hasher.update(v.to_le_bytes());
            }
            AmpFloor::Percentile(v) => {
                hasher.update([1u8]);
                hasher.update(v.to_le_bytes());
            }
        }
        hasher.update([self.log_compress as u8]);
        hasher.update((self.peaks_per_sec_max as u64).to_le_bytes());
        hasher.update((self.fan_out as u64).to_le_bytes());
        hasher.update(self.hash_time_delta_min.to_le_bytes());
        hasher.update(self.hash_time_delta_max.to_le_bytes());
        hasher.update(self.freq_delta_max.to_le_bytes());
        hasher.update((self.min_match_count as u64).to_le_bytes());
        hasher.finalize().into()
    }
}
