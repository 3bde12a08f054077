//! In-place 3-D complex DFT on a flattened row-major buffer.
//!
//! Thin wrapper over `rustfft`: a 1-D transform along the contiguous fast
//! axis (where the buffer is already laid out in runs), then gathered
//! strided passes along the two slower axes. Transforms are unnormalized in
//! both directions, matching the FFTW convention the physical normalization
//! factors in [`crate::mesh`] are written against.

use num_complex::Complex64;
use rustfft::FftPlanner;

/// forward (negative-exponent) transform
pub(crate) fn forward(data: &mut [Complex64], ngrid: [usize; 3]) {
    transform(data, ngrid, true);
}

/// backward (positive-exponent) transform, unnormalized
pub(crate) fn inverse(data: &mut [Complex64], ngrid: [usize; 3]) {
    transform(data, ngrid, false);
}

fn transform(data: &mut [Complex64], ngrid: [usize; 3], forward: bool) {
    let [nx, ny, nz] = ngrid;
    debug_assert_eq!(data.len(), nx * ny * nz);

    let mut planner = FftPlanner::<f64>::new();
    let plan = |planner: &mut FftPlanner<f64>, len: usize| {
        if forward {
            planner.plan_fft_forward(len)
        } else {
            planner.plan_fft_inverse(len)
        }
    };

    // axis 2: contiguous runs of length nz, handled in one call
    let fft_z = plan(&mut planner, nz);
    fft_z.process(data);

    // axis 1: gather each (i, k) column of stride nz
    let fft_y = plan(&mut planner, ny);
    let mut col = vec![Complex64::new(0., 0.); ny];
    for i in 0..nx {
        for k in 0..nz {
            for j in 0..ny {
                col[j] = data[(i * ny + j) * nz + k];
            }
            fft_y.process(&mut col);
            for j in 0..ny {
                data[(i * ny + j) * nz + k] = col[j];
            }
        }
    }

    // axis 0: gather each (j, k) column of stride ny * nz
    let fft_x = plan(&mut planner, nx);
    let mut col = vec![Complex64::new(0., 0.); nx];
    for j in 0..ny {
        for k in 0..nz {
            for i in 0..nx {
                col[i] = data[(i * ny + j) * nz + k];
            }
            fft_x.process(&mut col);
            for i in 0..nx {
                data[(i * ny + j) * nz + k] = col[i];
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn impulse_has_flat_spectrum() {
        let ngrid = [4, 4, 4];
        let mut data = vec![Complex64::new(0., 0.); 64];
        data[0] = Complex64::new(1., 0.);
        forward(&mut data, ngrid);
        for v in &data {
            assert!((v - Complex64::new(1., 0.)).norm() < 1e-12);
        }
    }

    #[test]
    fn forward_then_inverse_scales_by_nmesh() {
        let ngrid = [2, 3, 4];
        let nmesh = 24;
        let original: Vec<Complex64> = (0..nmesh)
            .map(|i| Complex64::new(i as f64 * 0.3 - 1., (i % 5) as f64))
            .collect();
        let mut data = original.clone();
        forward(&mut data, ngrid);
        inverse(&mut data, ngrid);
        for (v, orig) in data.iter().zip(&original) {
            assert!((v - orig * nmesh as f64).norm() < 1e-10);
        }
    }

    #[test]
    fn single_mode_lands_on_its_index() {
        // fill with exp(2πi * 2k/nz): all power in the (0, 0, 2) mode
        let ngrid = [2, 2, 8];
        let mut data = vec![Complex64::new(0., 0.); 32];
        for i in 0..2 {
            for j in 0..2 {
                for k in 0..8 {
                    data[(i * 2 + j) * 8 + k] =
                        Complex64::new(0., 2. * PI * 2. * k as f64 / 8.).exp();
                }
            }
        }
        forward(&mut data, ngrid);
        for i in 0..2 {
            for j in 0..2 {
                for k in 0..8 {
                    let v = data[(i * 2 + j) * 8 + k];
                    let expected = if (i, j, k) == (0, 0, 2) { 32. } else { 0. };
                    assert!((v - Complex64::new(expected, 0.)).norm() < 1e-10);
                }
            }
        }
    }
}
