//! Line transforms applied per axis of a 3D volume
//!
//! Each axis of a batch item is processed as a set of 1D lines gathered at
//! the axis stride. Power-of-two lines run an iterative radix-2 transform;
//! other lengths fall back to a direct DFT. Twiddle factors are evaluated
//! in f64 and rounded into the working precision, which keeps the two code
//! paths in agreement across element widths.
//!
//! No normalization is applied in either direction: forward uses the
//! e^(-2*pi*i*k*t/n) kernel, inverse e^(+2*pi*i*k*t/n), and any 1/N scaling
//! is the caller's responsibility.

use std::f64::consts::TAU;

use crate::plan::Extents;

/// Scalar element a transform computes in. Sealed to the two precisions the
/// binding surface exposes.
pub trait FftScalar: Copy + Send + Sync + std::fmt::Debug + 'static {
    const ELEMENT_SIZE: usize;

    fn from_f64(value: f64) -> Self;
    fn to_f64(self) -> f64;
    fn zero() -> Self;
    fn add(self, rhs: Self) -> Self;
    fn sub(self, rhs: Self) -> Self;
    fn mul(self, rhs: Self) -> Self;

    /// Read element `index` from native-endian packed bytes.
    fn read_from(bytes: &[u8], index: usize) -> Self;
    /// Write this element at `index` into native-endian packed bytes.
    fn write_to(self, bytes: &mut [u8], index: usize);
}

impl FftScalar for f32 {
    const ELEMENT_SIZE: usize = 4;

    fn from_f64(value: f64) -> Self {
        value as f32
    }

    fn to_f64(self) -> f64 {
        self as f64
    }

    fn zero() -> Self {
        0.0
    }

    fn add(self, rhs: Self) -> Self {
        self + rhs
    }

    fn sub(self, rhs: Self) -> Self {
        self - rhs
    }

    fn mul(self, rhs: Self) -> Self {
        self * rhs
    }

    fn read_from(bytes: &[u8], index: usize) -> Self {
        let offset = index * Self::ELEMENT_SIZE;
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&bytes[offset..offset + 4]);
        f32::from_ne_bytes(raw)
    }

    fn write_to(self, bytes: &mut [u8], index: usize) {
        let offset = index * Self::ELEMENT_SIZE;
        bytes[offset..offset + 4].copy_from_slice(&self.to_ne_bytes());
    }
}

impl FftScalar for f64 {
    const ELEMENT_SIZE: usize = 8;

    fn from_f64(value: f64) -> Self {
        value
    }

    fn to_f64(self) -> f64 {
        self
    }

    fn zero() -> Self {
        0.0
    }

    fn add(self, rhs: Self) -> Self {
        self + rhs
    }

    fn sub(self, rhs: Self) -> Self {
        self - rhs
    }

    fn mul(self, rhs: Self) -> Self {
        self * rhs
    }

    fn read_from(bytes: &[u8], index: usize) -> Self {
        let offset = index * Self::ELEMENT_SIZE;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&bytes[offset..offset + 8]);
        f64::from_ne_bytes(raw)
    }

    fn write_to(self, bytes: &mut [u8], index: usize) {
        let offset = index * Self::ELEMENT_SIZE;
        bytes[offset..offset + 8].copy_from_slice(&self.to_ne_bytes());
    }
}

/// Complex value in the working precision.
pub type Complex<T> = (T, T);

#[inline]
pub fn c_zero<T: FftScalar>() -> Complex<T> {
    (T::zero(), T::zero())
}

#[inline]
pub fn c_add<T: FftScalar>(lhs: Complex<T>, rhs: Complex<T>) -> Complex<T> {
    (lhs.0.add(rhs.0), lhs.1.add(rhs.1))
}

#[inline]
pub fn c_sub<T: FftScalar>(lhs: Complex<T>, rhs: Complex<T>) -> Complex<T> {
    (lhs.0.sub(rhs.0), lhs.1.sub(rhs.1))
}

#[inline]
pub fn c_mul<T: FftScalar>(lhs: Complex<T>, rhs: Complex<T>) -> Complex<T> {
    (
        lhs.0.mul(rhs.0).sub(lhs.1.mul(rhs.1)),
        lhs.0.mul(rhs.1).add(lhs.1.mul(rhs.0)),
    )
}

fn twiddle<T: FftScalar>(angle: f64) -> Complex<T> {
    let (sin, cos) = angle.sin_cos();
    (T::from_f64(cos), T::from_f64(sin))
}

/// Transform one batch item in place, axis by axis (x, then y, then z).
pub fn transform_volume<T: FftScalar>(item: &mut [Complex<T>], extents: &Extents, inverse: bool) {
    let dims = [extents.nx, extents.ny, extents.nz];
    let mut stride = 1usize;
    for len in dims {
        if len > 1 {
            transform_axis(item, len, stride, inverse);
        }
        stride *= len;
    }
}

/// Transform every line of length `len` at the given element stride.
fn transform_axis<T: FftScalar>(data: &mut [Complex<T>], len: usize, stride: usize, inverse: bool) {
    let block = len * stride;
    let mut line = vec![c_zero::<T>(); len];
    let mut spectrum = vec![c_zero::<T>(); len];

    for base in (0..data.len()).step_by(block) {
        for offset in 0..stride {
            let start = base + offset;
            for (k, slot) in line.iter_mut().enumerate() {
                *slot = data[start + k * stride];
            }

            if len.is_power_of_two() {
                radix2_line(&mut line, inverse);
                for (k, value) in line.iter().enumerate() {
                    data[start + k * stride] = *value;
                }
            } else {
                dft_line(&line, &mut spectrum, inverse);
                for (k, value) in spectrum.iter().enumerate() {
                    data[start + k * stride] = *value;
                }
            }
        }
    }
}

/// Iterative radix-2 transform for power-of-two line lengths.
fn radix2_line<T: FftScalar>(line: &mut [Complex<T>], inverse: bool) {
    let n = line.len();
    if n < 2 {
        return;
    }
    debug_assert!(n.is_power_of_two());

    // Bit-reversal permutation.
    let mut j = 0usize;
    for i in 1..n {
        let mut bit = n >> 1;
        while j & bit != 0 {
            j ^= bit;
            bit >>= 1;
        }
        j |= bit;
        if i < j {
            line.swap(i, j);
        }
    }

    let sign = if inverse { 1.0 } else { -1.0 };
    let mut len = 2usize;
    while len <= n {
        let half = len / 2;
        let step = sign * TAU / len as f64;
        for base in (0..n).step_by(len) {
            for k in 0..half {
                let w = twiddle::<T>(step * k as f64);
                let u = line[base + k];
                let v = c_mul(line[base + k + half], w);
                line[base + k] = c_add(u, v);
                line[base + k + half] = c_sub(u, v);
            }
        }
        len <<= 1;
    }
}

/// Direct DFT fallback for line lengths with odd factors.
fn dft_line<T: FftScalar>(input: &[Complex<T>], output: &mut [Complex<T>], inverse: bool) {
    let n = input.len();
    let sign = if inverse { 1.0 } else { -1.0 };
    for (k, out) in output.iter_mut().enumerate() {
        let mut acc = c_zero::<T>();
        for (t, &value) in input.iter().enumerate() {
            // Reduce k*t mod n before the angle so large products keep full
            // trigonometric accuracy.
            let phase = (k * t) % n;
            let angle = sign * TAU * phase as f64 / n as f64;
            acc = c_add(acc, c_mul(value, twiddle::<T>(angle)));
        }
        *out = acc;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: (f64, f64), expected: (f64, f64), tol: f64) {
        assert!(
            (actual.0 - expected.0).abs() <= tol && (actual.1 - expected.1).abs() <= tol,
            "{actual:?} !~= {expected:?}"
        );
    }

    #[test]
    fn four_point_line_matches_known_spectrum() {
        // DFT([1,2,3,4]) = [10, -2+2i, -2, -2-2i]
        let extents = Extents {
            nx: 4,
            ny: 1,
            nz: 1,
            batch: 1,
        };
        let mut data: Vec<(f64, f64)> =
            vec![(1.0, 0.0), (2.0, 0.0), (3.0, 0.0), (4.0, 0.0)];
        transform_volume(&mut data, &extents, false);

        assert_close(data[0], (10.0, 0.0), 1e-12);
        assert_close(data[1], (-2.0, 2.0), 1e-12);
        assert_close(data[2], (-2.0, 0.0), 1e-12);
        assert_close(data[3], (-2.0, -2.0), 1e-12);
    }

    #[test]
    fn radix2_and_direct_dft_agree() {
        let input: Vec<(f64, f64)> = (0..8)
            .map(|i| ((i as f64 * 0.7).sin(), (i as f64 * 1.3).cos()))
            .collect();

        let mut fast = input.clone();
        radix2_line(&mut fast, false);

        let mut direct = vec![c_zero::<f64>(); 8];
        dft_line(&input, &mut direct, false);

        for (a, b) in fast.iter().zip(&direct) {
            assert_close(*a, *b, 1e-10);
        }
    }

    #[test]
    fn forward_then_inverse_is_identity_times_n() {
        let extents = Extents {
            nx: 2,
            ny: 3,
            nz: 4,
            batch: 1,
        };
        let original: Vec<(f64, f64)> = (0..24)
            .map(|i| (i as f64 - 11.5, (i % 5) as f64 * 0.25))
            .collect();

        let mut data = original.clone();
        transform_volume(&mut data, &extents, false);
        transform_volume(&mut data, &extents, true);

        let n = 24.0;
        for (value, expected) in data.iter().zip(&original) {
            assert_close(
                (value.0 / n, value.1 / n),
                *expected,
                1e-12,
            );
        }
    }

    #[test]
    fn impulse_spreads_to_unit_magnitude_bins() {
        let extents = Extents {
            nx: 8,
            ny: 8,
            nz: 8,
            batch: 1,
        };
        let mut data = vec![c_zero::<f64>(); 512];
        data[0] = (1.0, 0.0);
        transform_volume(&mut data, &extents, false);

        for (index, &(re, im)) in data.iter().enumerate() {
            let magnitude = (re * re + im * im).sqrt();
            assert!(
                (magnitude - 1.0).abs() <= 1e-12,
                "bin {index} magnitude {magnitude} != 1"
            );
        }
    }

    #[test]
    fn single_precision_io_round_trips_through_bytes() {
        let mut bytes = vec![0u8; 8];
        (1.5f32).write_to(&mut bytes, 0);
        (-0.25f32).write_to(&mut bytes, 1);
        assert_eq!(f32::read_from(&bytes, 0), 1.5);
        assert_eq!(f32::read_from(&bytes, 1), -0.25);
    }
}
