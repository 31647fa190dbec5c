pub mod complex;
pub mod cooley_tukey;

pub use complex::Complex;
pub use cooley_tukey::{fft_in_place, forward_real};
