//! Recursive radix-2 Cooley-Tukey FFT.
//!
//! A correct, small, dependency-free engine; `fft_window` is always a
//! power of two, which is exactly this algorithm's precondition. Peak
//! picking and windowing live one layer up in `spectrogram`/`peaks`,
//! this module only transforms.

use crate::fft::complex::Complex;

/// In-place recursive FFT. `buf.len()` must be a power of two.
pub fn fft_in_place(buf: &mut [Complex]) {
    let n = buf.len();
    if n <= 1 {
        return;
    }
    debug_assert!(n.is_power_of_two(), "FFT size must be a power of two");

    let mut even: Vec<Complex> = Vec::with_capacity(n / 2);
    let mut odd: Vec<Complex> = Vec::with_capacity(n / 2);
    for (i, &sample) in buf.iter().enumerate() {
        if i % 2 == 0 {
            even.push(sample);
        } else {
            odd.push(sample);
        }
    }

    fft_in_place(&mut even);
    fft_in_place(&mut odd);

    // P(ω)  = Pₑ(ω²) + ωPₒ(ω²)
    // P(-ω) = Pₑ(ω²) - ωPₒ(ω²)
    // where ω = e^{-i 2π k / n}, and -ω^j = ω^{j + n/2}.
    for j in 0..n / 2 {
        let theta = (2.0 * std::f32::consts::PI * j as f32) / n as f32;
        let omega = Complex::from_polar(1.0, -theta);
        buf[j] = even[j] + (omega * odd[j]);
        buf[j + n / 2] = even[j] - (omega * odd[j]);
    }
}

/// Run the forward transform over a real-valued, already-windowed buffer.
/// `samples.len()` must be a power of two.
pub fn forward_real(samples: &[f32]) -> Vec<Complex> {
    let mut buf: Vec<Complex> = samples.iter().map(|&s| Complex::new(s, 0.0)).collect();
    fft_in_place(&mut buf);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dc_signal_has_energy_only_in_bin_zero() {
        let samples = vec![1.0f32; 64];
        let spectrum = forward_real(&samples);
        assert!(spectrum[0].norm_sqr().sqrt() > 60.0);
        for bin in &spectrum[1..] {
            assert!(bin.norm_sqr().sqrt() < 1e-3);
        }
    }

    #[test]
    fn single_tone_peaks_at_expected_bin() {
        let n = 1024;
        let bin = 32;
        let samples: Vec<f32> = (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * bin as f32 * i as f32 / n as f32).sin())
            .collect();
        let spectrum = forward_real(&samples);
        let half = n / 2;
        let magnitudes: Vec<f32> = spectrum[..half].iter().map(|c| c.norm_sqr().sqrt()).collect();
        let (peak_bin, _) = magnitudes
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap();
        assert_eq!(peak_bin, bin);
    }
}
