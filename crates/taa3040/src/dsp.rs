//! Programmable biquad and first-order IIR filters.
//!
//! The signal chain has 12 biquads, distributed over the enabled channels by
//! the part (three per channel with four channels). Each biquad is five
//! signed 1.31 fixed-point coefficients stored big-endian on page 2
//! (biquads 0–5) or page 3 (biquads 6–11):
//!
//! ```text
//! H(z) = (N0 + 2·N1·z⁻¹ + N2·z⁻²) / (2³¹ − 2·D1·z⁻¹ − D2·z⁻²)
//! ```
//!
//! The first-order IIR (the custom high-pass stage) has three coefficients
//! on page 4:
//!
//! ```text
//! H(z) = (N0 + N1·z⁻¹) / (2³¹ − D1·z⁻¹)
//! ```
//!
//! Coefficients only take effect while the ADC is powered down, so the
//! device refuses [`set_biquad`](crate::Taa3040::set_biquad) and
//! [`set_iir`](crate::Taa3040::set_iir) while streaming.

use crate::registers::{BIQUAD_SIZE, IIR_SIZE};

/// Coefficients of one biquad section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BiquadCoefficients {
    /// Feed-forward coefficient 0.
    pub n0: i32,
    /// Feed-forward coefficient 1 (halved).
    pub n1: i32,
    /// Feed-forward coefficient 2.
    pub n2: i32,
    /// Feedback coefficient 1 (halved).
    pub d1: i32,
    /// Feedback coefficient 2.
    pub d2: i32,
}

impl BiquadCoefficients {
    /// All-pass unity filter; the reset value of every biquad.
    pub const PASS_THROUGH: Self = Self {
        n0: i32::MAX,
        n1: 0,
        n2: 0,
        d1: 0,
        d2: 0,
    };

    /// Register bytes in address order: N0, N1, N2, D1, D2, each MSB first.
    pub fn to_bytes(&self) -> [u8; BIQUAD_SIZE as usize] {
        let mut out = [0u8; BIQUAD_SIZE as usize];
        for (chunk, coeff) in out
            .chunks_exact_mut(4)
            .zip([self.n0, self.n1, self.n2, self.d1, self.d2])
        {
            chunk.copy_from_slice(&coeff.to_be_bytes());
        }
        out
    }

    /// Inverse of [`to_bytes`][Self::to_bytes].
    pub fn from_bytes(bytes: &[u8; BIQUAD_SIZE as usize]) -> Self {
        let mut coeffs = [0i32; 5];
        for (coeff, chunk) in coeffs.iter_mut().zip(bytes.chunks_exact(4)) {
            let mut word = [0u8; 4];
            word.copy_from_slice(chunk);
            *coeff = i32::from_be_bytes(word);
        }
        let [n0, n1, n2, d1, d2] = coeffs;
        Self { n0, n1, n2, d1, d2 }
    }
}

impl Default for BiquadCoefficients {
    fn default() -> Self {
        Self::PASS_THROUGH
    }
}

/// Coefficients of the first-order IIR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IirCoefficients {
    /// Feed-forward coefficient 0.
    pub n0: i32,
    /// Feed-forward coefficient 1.
    pub n1: i32,
    /// Feedback coefficient 1.
    pub d1: i32,
}

impl IirCoefficients {
    /// Unity pass-through; the reset value.
    pub const PASS_THROUGH: Self = Self {
        n0: i32::MAX,
        n1: 0,
        d1: 0,
    };

    /// Register bytes in address order: N0, N1, D1, each MSB first.
    pub fn to_bytes(&self) -> [u8; IIR_SIZE as usize] {
        let mut out = [0u8; IIR_SIZE as usize];
        for (chunk, coeff) in out.chunks_exact_mut(4).zip([self.n0, self.n1, self.d1]) {
            chunk.copy_from_slice(&coeff.to_be_bytes());
        }
        out
    }
}

impl Default for IirCoefficients {
    fn default() -> Self {
        Self::PASS_THROUGH
    }
}
