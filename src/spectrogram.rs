//! Signal frontend: PCM → magnitude spectrogram.
//!
//! Resampling to `Config::sample_rate` is the caller's responsibility
//! (this module does not resample); it removes DC offset, peak-normalizes
//! to `max|x| = 1`, then runs a Hann-windowed STFT with the configured
//! window/hop. Magnitudes are optionally `log1p`-compressed, a `Config`
//! field digested so enroll and identify can never disagree on it.

use crate::config::Config;
use crate::fft::forward_real;
use rayon::prelude::*;

/// A row-major `T x F` grid of non-negative magnitudes.
#[derive(Debug, Clone)]
pub struct Spectrogram {
    pub t_len: usize,
    pub f_len: usize,
    data: Vec<f32>,
}

impl Spectrogram {
    fn new(t_len: usize, f_len: usize) -> Self {
        Spectrogram {
            t_len,
            f_len,
            data: vec![0.0; t_len * f_len],
        }
    }

    #[inline]
    pub fn get(&self, t: usize, f: usize) -> f32 {
        self.data[t * self.f_len + f]
    }

    #[inline]
    fn set(&mut self, t: usize, f: usize, value: f32) {
        self.data[t * self.f_len + f] = value;
    }

    pub fn is_empty(&self) -> bool {
        self.t_len == 0
    }
}

fn hann_window(n: usize) -> Vec<f32> {
    if n <= 1 {
        return vec![1.0; n];
    }
    (0..n)
        .map(|i| {
            let num = 2.0 * std::f32::consts::PI * i as f32;
            let denom = (n - 1) as f32;
            0.5 * (1.0 - (num / denom).cos())
        })
        .collect()
}

/// DC-remove and peak-normalize to `max|x| = 1`. A silent or empty buffer
/// is returned unchanged (nothing to normalize against).
fn condition_signal(pcm: &[f32]) -> Vec<f32> {
    if pcm.is_empty() {
        return Vec::new();
    }
    let mean: f64 = pcm.iter().map(|&s| s as f64).sum::<f64>() / pcm.len() as f64;
    let mut out: Vec<f32> = pcm.iter().map(|&s| s - mean as f32).collect();

    let peak = out.iter().fold(0.0f32, |acc, &s| acc.max(s.abs()));
    if peak > 0.0 {
        for s in out.iter_mut() {
            *s /= peak;
        }
    }
    out
}

/// Number of STFT frames produced for a signal of length `len` under
/// `config`.
pub fn frame_count(len: usize, config: &Config) -> usize {
    if len < config.fft_window {
        0
    } else {
        1 + (len - config.fft_window) / config.hop
    }
}

/// Build the magnitude spectrogram for an already-resampled, mono PCM
/// buffer. Returns an empty (`t_len == 0`) spectrogram for signals shorter
/// than one window, not an error condition.
pub fn spectrogram(pcm: &[f32], config: &Config) -> Spectrogram {
    let conditioned = condition_signal(pcm);
    let t_len = frame_count(conditioned.len(), config);
    let f_len = config.freq_bins();

    if t_len == 0 {
        return Spectrogram::new(0, f_len);
    }

    let window = hann_window(config.fft_window);
    let mut spec = Spectrogram::new(t_len, f_len);

    // frames are independent, parallelize per-frame FFT with rayon
    let rows: Vec<Vec<f32>> = (0..t_len)
        .into_par_iter()
        .map(|t| {
            let start = t * config.hop;
            let end = start + config.fft_window;

            let mut windowed = vec![0.0f32; config.fft_window];
            let available = end.min(conditioned.len()) - start;
            for i in 0..available {
                windowed[i] = conditioned[start + i] * window[i];
            }

            let spectrum = forward_real(&windowed);
            (0..f_len)
                .map(|f| {
                    let magnitude = spectrum[f].norm_sqr().sqrt();
                    if config.log_compress {
                        (1.0 + magnitude).ln()
                    } else {
                        magnitude
                    }
                })
                .collect()
        })
        .collect();

    for (t, row) in rows.into_iter().enumerate() {
        for (f, value) in row.into_iter().enumerate() {
            spec.set(t, f, value);
        }
    }

    spec
}
