//! Special functions for multipole weighting.
//!
//! Two providers: reduced spherical harmonics evaluated at a direction
//! vector, and spherical Bessel functions of the first kind evaluated at a
//! scalar argument. Both are pure functions; [`SphericalBessel`] merely
//! pins the order so hot loops don't re-dispatch on it.
//!
//! "Reduced" means the harmonic is rescaled by `sqrt(4π/(2ℓ+1))`, so the
//! monopole is exactly 1 and `Y_ℓ0` reduces to the Legendre polynomial of
//! the polar cosine.

use num_complex::Complex64;
use std::f64::consts::PI;

/// Associated Legendre polynomial `P_ℓ^m(x)` for `m >= 0`, with the
/// Condon-Shortley phase folded into the seed `P_m^m`.
fn associated_legendre(ell: u32, m: u32, x: f64) -> f64 {
    debug_assert!(m <= ell && (-1.0..=1.0).contains(&x));

    // seed: P_m^m(x) = (-1)^m (2m-1)!! (1-x²)^{m/2}
    let somx2 = ((1. - x) * (1. + x)).sqrt();
    let mut pmm = 1.0;
    for i in 1..=m {
        pmm *= -((2 * i - 1) as f64) * somx2;
    }
    if ell == m {
        return pmm;
    }

    // P_{m+1}^m from the seed
    let mut pmm1 = x * (2 * m + 1) as f64 * pmm;
    if ell == m + 1 {
        return pmm1;
    }

    // upward recurrence in degree
    let mut pll = 0.0;
    for ll in (m + 2)..=ell {
        pll = ((2 * ll - 1) as f64 * x * pmm1 - (ll + m - 1) as f64 * pmm) / (ll - m) as f64;
        pmm = pmm1;
        pmm1 = pll;
    }
    pll
}

/// Reduced spherical harmonic `sqrt(4π/(2ℓ+1)) Y_ℓm` at a direction vector.
///
/// The vector need not be normalized. By convention the monopole is 1 for
/// any direction, and a zero-magnitude vector (the grid origin, where no
/// direction exists) evaluates to 0 for `ell > 0`. Negative orders follow
/// `Y_{ℓ,-m} = (-1)^m conj(Y_{ℓm})`.
///
/// # Panics
/// Panics if `|m| > ell`.
pub fn reduced_spherical_harmonic(ell: u32, m: i32, v: [f64; 3]) -> Complex64 {
    assert!(
        m.unsigned_abs() <= ell,
        "harmonic order |m| must not exceed degree ell"
    );

    if ell == 0 {
        return Complex64::new(1., 0.);
    }

    let mag_sq = v[0] * v[0] + v[1] * v[1] + v[2] * v[2];
    if mag_sq == 0. {
        return Complex64::new(0., 0.);
    }

    let abs_m = m.unsigned_abs();
    let cos_theta = v[2] / mag_sq.sqrt();
    let phi = v[1].atan2(v[0]);

    // sqrt((ℓ-|m|)!/(ℓ+|m|)!), built as a running ratio to dodge factorial
    // overflow
    let mut ratio = 1.0;
    for i in (ell - abs_m + 1)..=(ell + abs_m) {
        ratio /= i as f64;
    }
    let norm = ratio.sqrt();

    let p_lm = associated_legendre(ell, abs_m, cos_theta);
    let ylm = norm * p_lm * Complex64::new(0., abs_m as f64 * phi).exp();

    if m >= 0 {
        ylm
    } else {
        let phase = if abs_m % 2 == 0 { 1. } else { -1. };
        phase * ylm.conj()
    }
}

/// Spherical Bessel function of the first kind at a fixed order.
#[derive(Clone, Copy, Debug)]
pub struct SphericalBessel {
    ell: u32,
}

impl SphericalBessel {
    pub fn new(ell: u32) -> Self {
        SphericalBessel { ell }
    }

    /// Evaluate `j_ℓ(x)` for `x >= 0`.
    pub fn eval(&self, x: f64) -> f64 {
        let ell = self.ell;

        if x.abs() < 1e-10 {
            return if ell == 0 { 1. } else { 0. };
        }

        let j0 = x.sin() / x;
        if ell == 0 {
            return j0;
        }
        let j1 = (x.sin() - x * x.cos()) / (x * x);
        if ell == 1 {
            return j1;
        }

        if x >= ell as f64 {
            // upward recurrence is stable above the turning point
            let mut j_prev = j0;
            let mut j_curr = j1;
            for i in 1..ell {
                let j_next = (2 * i + 1) as f64 / x * j_curr - j_prev;
                j_prev = j_curr;
                j_curr = j_next;
            }
            j_curr
        } else {
            // below the turning point the upward recurrence amplifies the
            // divergent partner solution; recurse downward from well above
            // the order and normalize against j_0
            let start = ell + 16 + (x as u32);
            let mut jp = 0.0_f64;
            let mut jc = 1e-30_f64;
            let mut result = 0.0;
            for i in (1..=start).rev() {
                let jm = (2 * i + 1) as f64 / x * jc - jp;
                jp = jc;
                jc = jm;
                if i - 1 == ell {
                    result = jc;
                }
                // rescale to keep the iterates in range
                if jc.abs() > 1e250 {
                    jp /= 1e250;
                    jc /= 1e250;
                    result /= 1e250;
                }
            }
            result * j0 / jc
        }
    }
}
