//! Constellation peak picker.
//!
//! A cell is a peak iff it is the maximum of a `(2*Dt+1) x (2*Df+1)`
//! rectangular neighborhood centered on it and its magnitude clears
//! `AMP_MIN`. Ties within a neighborhood are broken by keeping the
//! lexicographically smallest `(frame, bin)`, which also keeps picking
//! deterministic. A rolling per-second density cap thins overflowing
//! windows by dropping the lowest-magnitude peaks first.

use crate::config::{AmpFloor, Config};
use crate::spectrogram::Spectrogram;
use ordered_float::OrderedFloat;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    pub frame: usize,
    pub bin: usize,
    pub magnitude: f32,
}

fn amp_floor(spec: &Spectrogram, config: &Config) -> f32 {
    match config.amp_min {
        AmpFloor::Absolute(v) => v,
        AmpFloor::Percentile(p) => {
            let mut magnitudes: Vec<f32> = Vec::with_capacity(spec.t_len * spec.f_len);
            for t in 0..spec.t_len {
                for f in 0..spec.f_len {
                    let m = spec.get(t, f);
                    if m > 0.0 {
                        magnitudes.push(m);
                    }
                }
            }
            if magnitudes.is_empty() {
                return f32::INFINITY;
            }
            magnitudes.sort_by_key(|&m| OrderedFloat(m));
            let rank = ((p.clamp(0.0, 100.0) / 100.0) * (magnitudes.len() - 1) as f32).round() as usize;
            magnitudes[rank]
        }
    }
}

/// Find every local-maximum cell, then thin overflowing per-second windows.
pub fn peaks(spec: &Spectrogram, config: &Config) -> Vec<Peak> {
    if spec.is_empty() {
        return Vec::new();
    }

    let floor = amp_floor(spec, config);
    let mut raw = local_maxima(spec, config, floor);
    thin_by_density(&mut raw, config);
    raw
}

fn local_maxima(spec: &Spectrogram, config: &Config, floor: f32) -> Vec<Peak> {
    let mut found = Vec::new();

    for t in 0..spec.t_len {
        let t_lo = t.saturating_sub(config.dt);
        let t_hi = (t + config.dt).min(spec.t_len - 1);

        for f in 0..spec.f_len {
            let value = spec.get(t, f);
            if value < floor {
                continue;
            }

            let f_lo = f.saturating_sub(config.df);
            let f_hi = (f + config.df).min(spec.f_len - 1);

            let mut is_max = true;
            let mut tie_beats_us = false;

            'scan: for nt in t_lo..=t_hi {
                for nf in f_lo..=f_hi {
                    if nt == t && nf == f {
                        continue;
                    }
                    let other = spec.get(nt, nf);
                    if other > value {
                        is_max = false;
                        break 'scan;
                    }
                    if other == value && (nt, nf) < (t, f) {
                        tie_beats_us = true;
                    }
                }
            }

            if is_max && !tie_beats_us {
                found.push(Peak {
                    frame: t,
                    bin: f,
                    magnitude: value,
                });
            }
        }
    }

    found
}

fn thin_by_density(peaks: &mut Vec<Peak>, config: &Config) {
    if config.peaks_per_sec_max == 0 {
        return;
    }
    let frames_per_sec = config.sample_rate as f32 / config.hop as f32;
    if frames_per_sec <= 0.0 {
        return;
    }

    use std::collections::HashMap;
    let mut by_window: HashMap<usize, Vec<usize>> = HashMap::new();
    for (idx, p) in peaks.iter().enumerate() {
        let window = (p.frame as f32 / frames_per_sec).floor() as usize;
        by_window.entry(window).or_default().push(idx);
    }

    let mut keep = vec![true; peaks.len()];
    for indices in by_window.values() {
        if indices.len() <= config.peaks_per_sec_max {
            continue;
        }
        let mut sorted = indices.clone();
        sorted.sort_by_key(|&i| std::cmp::Reverse(OrderedFloat(peaks[i].magnitude)));
        for &i in &sorted[config.peaks_per_sec_max..] {
            keep[i] = false;
        }
    }

    let mut idx = 0;
    peaks.retain(|_| {
        let k = keep[idx];
        idx += 1;
        k
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectrogram::spectrogram;

    #[test]
    fn no_two_peaks_share_a_cell() {
        let config = Config::default();
        let len = config.fft_window * 8;
        let pcm: Vec<f32> = (0..len)
            .map(|i| {
                (2.0 * std::f32::consts::PI * 300.0 * i as f32 / config.sample_rate as f32).sin()
                    + 0.5 * (2.0 * std::f32::consts::PI * 1200.0 * i as f32 / config.sample_rate as f32).sin()
            })
            .collect();
        let spec = spectrogram(&pcm, &config);
        let found = peaks(&spec, &config);

        let mut seen = std::collections::HashSet::new();
        for p in &found {
            assert!(seen.insert((p.frame, p.bin)), "duplicate peak cell");
        }
    }

    #[test]
    fn every_peak_dominates_its_neighborhood() {
        let config = Config::default();
        let len = config.fft_window * 8;
        let pcm: Vec<f32> = (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * 600.0 * i as f32 / config.sample_rate as f32).sin())
            .collect();
        let spec = spectrogram(&pcm, &config);
        let found = peaks(&spec, &config);
        assert!(!found.is_empty());

        for p in &found {
            let t_lo = p.frame.saturating_sub(config.dt);
            let t_hi = (p.frame + config.dt).min(spec.t_len - 1);
            let f_lo = p.bin.saturating_sub(config.df);
            let f_hi = (p.bin + config.df).min(spec.f_len - 1);
            for nt in t_lo..=t_hi {
                for nf in f_lo..=f_hi {
                    assert!(spec.get(nt, nf) <= p.magnitude);
                }
            }
        }
    }

    #[test]
    fn empty_spectrogram_has_no_peaks() {
        let config = Config::default();
        let spec = spectrogram(&[], &config);
        assert!(peaks(&spec, &config).is_empty());
    }

    #[test]
    fn density_cap_bounds_peaks_per_second() {
        let mut config = Config::default();
        config.peaks_per_sec_max = 2;
        config.amp_min = AmpFloor::Absolute(0.0);
        let len = config.fft_window * 20;
        let pcm: Vec<f32> = (0..len)
            .map(|i| {
                let t = i as f32 / config.sample_rate as f32;
                (2.0 * std::f32::consts::PI * 220.0 * t).sin()
                    + (2.0 * std::f32::consts::PI * 880.0 * t).sin()
                    + (2.0 * std::f32::consts::PI * 1760.0 * t).sin()
            })
            .collect();
        let spec = spectrogram(&pcm, &config);
        let found = peaks(&spec, &config);

        let frames_per_sec = config.sample_rate as f32 / config.hop as f32;
        let mut per_window = std::collections::HashMap::new();
        for p in &found {
            let window = (p.frame as f32 / frames_per_sec).floor() as usize;
            *per_window.entry(window).or_insert(0) += 1;
        }
        for count in per_window.values() {
            assert!(*count <= config.peaks_per_sec_max);
        }
    }
}
