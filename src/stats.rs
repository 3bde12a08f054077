//! Binned two-point statistics of pairs of mesh fields.
//!
//! A [`FieldStats`] consumes two Fourier-space [`MeshField`]s sharing one
//! grid geometry and produces bin-averaged spectra or correlation
//! functions. Mode powers are corrected for the sampling effects of the
//! assignment kernel before binning; which correction applies depends on
//! whether the fields were interlaced and on the configured
//! [`PowerCorrection`] policy.
//!
//! Binning happens in two stages: modes (or cells) are first accumulated
//! into a fine regular sampling of the coordinate, then the fine samples
//! are gathered into the requested bins by their nominal coordinate. This
//! makes bin membership independent of the bin layout, so refining the
//! requested binning never moves a mode across an unrelated edge.

use crate::binning::Binning;
use crate::error::Error;
use crate::fft;
use crate::geometry::{GridGeometry, vec3_magnitude};
use crate::mesh::{AssignmentScheme, MeshConfig, MeshField};
use crate::specfunc::{SphericalBessel, reduced_spherical_harmonic};
use num_complex::Complex64;
use std::f64::consts::PI;

/// fine-sampling resolution shared by both coordinate spaces
const N_SAMPLE: usize = 100_000;
/// fine sampling interval in wavenumber
const DK_SAMPLE: f64 = 1e-4;
/// fine sampling interval in separation
const DR_SAMPLE: f64 = 0.5;

/// Sampling correction applied to mode powers of non-interlaced fields.
///
/// Interlaced fields always divide by the product of the two assignment
/// windows; this policy only selects the non-interlaced behaviour. Shot
/// noise is divided by the aliasing sum either way.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PowerCorrection {
    /// divide mode powers by the shot-noise aliasing sum of the kernel
    #[default]
    ShotNoiseAliasing,
    /// divide mode powers by the product of the two assignment windows
    AssignmentWindow,
}

/// Sum over aliased images of the squared assignment window at one grid
/// wavevector, in closed form per kernel.
///
/// With `c² = sin²(π idx_axis / n_axis)` (taken as 0 on the zero index),
/// the per-axis factors are 1 (NGP), `1 - 2c²/3` (CIC),
/// `1 - c² + 2c⁴/15` (TSC) and `1 - 4c²/3 + 2c⁴/5 - 4c⁶/315` (PCS).
/// `sin²` is symmetric under the wrap-around reflection, so raw grid
/// indices and signed wrapped indices give the same value.
pub fn shotnoise_aliasing(scheme: AssignmentScheme, geom: &GridGeometry, idx: [usize; 3]) -> f64 {
    if scheme == AssignmentScheme::Ngp {
        return 1.;
    }

    let mut alias = 1.;
    for iaxis in 0..3 {
        let c2 = if idx[iaxis] != 0 {
            let u = PI * idx[iaxis] as f64 / geom.ngrid()[iaxis] as f64;
            u.sin() * u.sin()
        } else {
            0.
        };
        alias *= match scheme {
            AssignmentScheme::Ngp => 1.,
            AssignmentScheme::Cic => 1. - 2. / 3. * c2,
            AssignmentScheme::Tsc => 1. - c2 + 2. / 15. * c2 * c2,
            AssignmentScheme::Pcs => {
                1. - 4. / 3. * c2 + 2. / 5. * c2 * c2 - 4. / 315. * c2 * c2 * c2
            }
        };
    }
    alias
}

/// Binned two-point statistics over one grid geometry.
///
/// The result vectors are plain public fields, refilled by each `compute_*`
/// call; which of them are meaningful depends on the coordinate space of
/// the statistic computed last.
pub struct FieldStats {
    config: MeshConfig,
    geom: GridGeometry,
    correction: PowerCorrection,

    /// number of wavevector modes per bin
    pub nmodes: Vec<u64>,
    /// number of grid cells (separation "pairs") per bin
    pub npairs: Vec<u64>,
    /// mean wavenumber per bin
    pub k: Vec<f64>,
    /// mean separation per bin
    pub r: Vec<f64>,
    /// bin-averaged shot noise
    pub sn: Vec<Complex64>,
    /// bin-averaged mode power
    pub pk: Vec<Complex64>,
    /// bin-averaged correlation
    pub xi: Vec<Complex64>,
}

impl FieldStats {
    pub fn new(config: MeshConfig, correction: PowerCorrection) -> Result<FieldStats, Error> {
        let geom = GridGeometry::new(config.boxsize, config.ngrid)?;
        Ok(FieldStats {
            config,
            geom,
            correction,
            nmodes: Vec::new(),
            npairs: Vec::new(),
            k: Vec::new(),
            r: Vec::new(),
            sn: Vec::new(),
            pk: Vec::new(),
            xi: Vec::new(),
        })
    }

    pub fn config(&self) -> &MeshConfig {
        &self.config
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geom
    }

    /// Size and zero every result vector.
    fn resize_stats(&mut self, num_bins: usize) {
        self.nmodes.clear();
        self.nmodes.resize(num_bins, 0);
        self.npairs.clear();
        self.npairs.resize(num_bins, 0);
        self.k.clear();
        self.k.resize(num_bins, 0.);
        self.r.clear();
        self.r.resize(num_bins, 0.);
        self.sn.clear();
        self.sn.resize(num_bins, Complex64::new(0., 0.));
        self.pk.clear();
        self.pk.resize(num_bins, Complex64::new(0., 0.));
        self.xi.clear();
        self.xi.resize(num_bins, Complex64::new(0., 0.));
    }

    /// Both fields must share this statistics object's geometry; mode
    /// powers across mismatched grids are meaningless.
    fn check_compatible(&self, field_a: &MeshField, field_b: &MeshField) -> Result<(), Error> {
        if !self.geom.matches(field_a.geometry()) || !self.geom.matches(field_b.geometry()) {
            return Err(Error::incompatible_meshes());
        }
        Ok(())
    }

    fn check_cell_table(&self, table: &[Complex64], name: &str) -> Result<(), Error> {
        if table.len() != self.geom.nmesh() {
            return Err(Error::invalid_data(format!(
                "per-cell {} table has {} entries for {} grid cells",
                name,
                table.len(),
                self.geom.nmesh()
            )));
        }
        Ok(())
    }

    /// divisors applied to the mode power and the shot noise at one mode
    fn mode_corrections(
        &self,
        field_a: &MeshField,
        field_b: &MeshField,
        idx: [usize; 3],
    ) -> (f64, f64) {
        if self.config.interlace {
            let win = field_a.window(idx) * field_b.window(idx);
            (win, win)
        } else {
            let alias = shotnoise_aliasing(self.config.assignment, &self.geom, idx);
            match self.correction {
                PowerCorrection::ShotNoiseAliasing => (alias, alias),
                PowerCorrection::AssignmentWindow => {
                    (field_a.window(idx) * field_b.window(idx), alias)
                }
            }
        }
    }

    /// Bin-average the mode power and shot noise of two Fourier-space
    /// fields over wavenumber shells, weighted by the reduced spherical
    /// harmonic of each wavevector.
    ///
    /// Fills `nmodes`, `k`, `pk` and `sn`; shot noise is reported, not
    /// subtracted. A bin that captures no modes reports its nominal centre
    /// and a zero statistic.
    pub fn compute_ylm_wgtd_2pt_stats_in_fourier(
        &mut self,
        field_a: &MeshField,
        field_b: &MeshField,
        shotnoise_amp: Complex64,
        ell: u32,
        m: i32,
        kbinning: &Binning,
    ) -> Result<(), Error> {
        self.check_compatible(field_a, field_b)?;
        self.resize_stats(kbinning.num_bins());

        let mut nmodes_sample = vec![0_u64; N_SAMPLE];
        let mut k_sample = vec![0.0_f64; N_SAMPLE];
        let mut pk_sample = vec![Complex64::new(0., 0.); N_SAMPLE];
        let mut sn_sample = vec![Complex64::new(0., 0.); N_SAMPLE];

        let [nx, ny, nz] = *self.geom.ngrid();
        for i in 0..nx {
            for j in 0..ny {
                for k in 0..nz {
                    let kv = self.geom.wavevector(i, j, k);
                    let k_ = vec3_magnitude(kv);

                    let idx_k = (k_ / DK_SAMPLE + 0.5) as usize;
                    if idx_k >= N_SAMPLE {
                        continue;
                    }

                    let idx_grid = self.geom.grid_index(i, j, k);
                    let fa = field_a.values()[idx_grid];
                    let fb = field_b.values()[idx_grid];

                    let mut pk_mode = fa * fb.conj();
                    let mut sn_mode = shotnoise_amp
                        * shotnoise_aliasing(self.config.assignment, &self.geom, [i, j, k]);

                    let (win_pk, win_sn) = self.mode_corrections(field_a, field_b, [i, j, k]);
                    pk_mode /= win_pk;
                    sn_mode /= win_sn;

                    let ylm = reduced_spherical_harmonic(ell, m, kv);
                    pk_mode *= ylm;
                    sn_mode *= ylm;

                    nmodes_sample[idx_k] += 1;
                    k_sample[idx_k] += k_;
                    pk_sample[idx_k] += pk_mode;
                    sn_sample[idx_k] += sn_mode;
                }
            }
        }

        for ibin in 0..kbinning.num_bins() {
            let k_lower = kbinning.edges()[ibin];
            let k_upper = kbinning.edges()[ibin + 1];
            for i in 0..N_SAMPLE {
                let k_ = i as f64 * DK_SAMPLE;
                if k_lower < k_ && k_ <= k_upper {
                    self.nmodes[ibin] += nmodes_sample[i];
                    self.k[ibin] += k_sample[i];
                    self.pk[ibin] += pk_sample[i];
                    self.sn[ibin] += sn_sample[i];
                }
            }

            if self.nmodes[ibin] != 0 {
                let nmodes = self.nmodes[ibin] as f64;
                self.k[ibin] /= nmodes;
                self.pk[ibin] /= nmodes;
                self.sn[ibin] /= nmodes;
            } else {
                self.k[ibin] = kbinning.centres()[ibin];
                self.pk[ibin] = Complex64::new(0., 0.);
                self.sn[ibin] = Complex64::new(0., 0.);
            }
        }
        Ok(())
    }

    /// Bin-average the transformed, shot-noise-subtracted correlation of
    /// two Fourier-space fields over separation shells, weighted by the
    /// reduced spherical harmonic of each separation vector.
    ///
    /// Fills `npairs`, `r` and `xi`. An empty bin reports its nominal
    /// centre and a zero statistic.
    pub fn compute_ylm_wgtd_2pt_stats_in_config(
        &mut self,
        field_a: &MeshField,
        field_b: &MeshField,
        shotnoise_amp: Complex64,
        ell: u32,
        m: i32,
        rbinning: &Binning,
    ) -> Result<(), Error> {
        self.check_compatible(field_a, field_b)?;
        self.resize_stats(rbinning.num_bins());

        let twopt_3d = self.corr_mesh(field_a, field_b, shotnoise_amp);

        let mut npairs_sample = vec![0_u64; N_SAMPLE];
        let mut r_sample = vec![0.0_f64; N_SAMPLE];
        let mut xi_sample = vec![Complex64::new(0., 0.); N_SAMPLE];

        let [nx, ny, nz] = *self.geom.ngrid();
        for i in 0..nx {
            for j in 0..ny {
                for k in 0..nz {
                    let rv = self.geom.pos_vector(i, j, k);
                    let r_ = vec3_magnitude(rv);

                    let idx_r = (r_ / DR_SAMPLE + 0.5) as usize;
                    if idx_r >= N_SAMPLE {
                        continue;
                    }

                    let idx_grid = self.geom.grid_index(i, j, k);
                    let xi_pair = twopt_3d[idx_grid] * reduced_spherical_harmonic(ell, m, rv);

                    npairs_sample[idx_r] += 1;
                    r_sample[idx_r] += r_;
                    xi_sample[idx_r] += xi_pair;
                }
            }
        }

        self.gather_separation_bins(rbinning, &npairs_sample, &r_sample, &xi_sample);
        Ok(())
    }

    /// Bin-average the shot-noise mesh of the three-point correlation
    /// estimator over separation shells, weighted per cell by the product
    /// of two precomputed harmonic tables, and normalize each bin by its
    /// cell count and the cell volume with the parity `(-1)^(ℓ1+ℓ2)` of
    /// the multipole pair.
    #[allow(clippy::too_many_arguments)]
    pub fn compute_uncoupled_shotnoise_for_3pcf(
        &mut self,
        field_a: &MeshField,
        field_b: &MeshField,
        ylm_a: &[Complex64],
        ylm_b: &[Complex64],
        shotnoise_amp: Complex64,
        rbinning: &Binning,
        ell1: u32,
        ell2: u32,
    ) -> Result<(), Error> {
        self.check_compatible(field_a, field_b)?;
        self.check_cell_table(ylm_a, "ylm_a")?;
        self.check_cell_table(ylm_b, "ylm_b")?;
        self.resize_stats(rbinning.num_bins());

        let twopt_3d = self.corr_mesh(field_a, field_b, shotnoise_amp);

        let mut npairs_sample = vec![0_u64; N_SAMPLE];
        let mut r_sample = vec![0.0_f64; N_SAMPLE];
        let mut xi_sample = vec![Complex64::new(0., 0.); N_SAMPLE];

        let [nx, ny, nz] = *self.geom.ngrid();
        for i in 0..nx {
            for j in 0..ny {
                for k in 0..nz {
                    let rv = self.geom.pos_vector(i, j, k);
                    let r_ = vec3_magnitude(rv);

                    let idx_r = (r_ / DR_SAMPLE + 0.5) as usize;
                    if idx_r >= N_SAMPLE {
                        continue;
                    }

                    let idx_grid = self.geom.grid_index(i, j, k);
                    let xi_pair = twopt_3d[idx_grid] * ylm_a[idx_grid] * ylm_b[idx_grid];

                    npairs_sample[idx_r] += 1;
                    r_sample[idx_r] += r_;
                    xi_sample[idx_r] += xi_pair;
                }
            }
        }

        self.gather_separation_bins(rbinning, &npairs_sample, &r_sample, &xi_sample);

        let parity = if (ell1 + ell2) % 2 == 0 { 1. } else { -1. };
        let norm_factor = parity / self.geom.vol_cell();
        for ibin in 0..rbinning.num_bins() {
            if self.npairs[ibin] != 0 {
                self.xi[ibin] *= norm_factor / self.npairs[ibin] as f64;
            }
        }
        Ok(())
    }

    /// Collapse the shot-noise mesh of the bispectrum estimator to a
    /// single complex amplitude for one wavenumber pair: every cell is
    /// weighted by two spherical Bessel factors (at `k_a r` and `k_b r`)
    /// and two harmonic tables, then summed with the cell volume measure.
    #[allow(clippy::too_many_arguments)]
    pub fn compute_uncoupled_shotnoise_for_bispec_per_bin(
        &self,
        field_a: &MeshField,
        field_b: &MeshField,
        ylm_a: &[Complex64],
        ylm_b: &[Complex64],
        sj_a: &SphericalBessel,
        sj_b: &SphericalBessel,
        shotnoise_amp: Complex64,
        k_a: f64,
        k_b: f64,
    ) -> Result<Complex64, Error> {
        self.check_compatible(field_a, field_b)?;
        self.check_cell_table(ylm_a, "ylm_a")?;
        self.check_cell_table(ylm_b, "ylm_b")?;

        let twopt_3d = self.corr_mesh(field_a, field_b, shotnoise_amp);

        let mut sn_pair_sum = Complex64::new(0., 0.);
        let [nx, ny, nz] = *self.geom.ngrid();
        for i in 0..nx {
            for j in 0..ny {
                for k in 0..nz {
                    let rv = self.geom.pos_vector(i, j, k);
                    let r_ = vec3_magnitude(rv);

                    let ja = sj_a.eval(k_a * r_);
                    let jb = sj_b.eval(k_b * r_);

                    let idx_grid = self.geom.grid_index(i, j, k);
                    sn_pair_sum +=
                        twopt_3d[idx_grid] * ylm_a[idx_grid] * ylm_b[idx_grid] * (ja * jb);
                }
            }
        }

        Ok(sn_pair_sum * self.geom.vol_cell())
    }

    /// The real-space correlation mesh: corrected, shot-noise-subtracted
    /// mode powers divided by the box volume, inverse transformed.
    fn corr_mesh(
        &self,
        field_a: &MeshField,
        field_b: &MeshField,
        shotnoise_amp: Complex64,
    ) -> Vec<Complex64> {
        let mut twopt_3d = vec![Complex64::new(0., 0.); self.geom.nmesh()];

        let vol = self.geom.vol();
        let [nx, ny, nz] = *self.geom.ngrid();
        for i in 0..nx {
            for j in 0..ny {
                for k in 0..nz {
                    let idx_grid = self.geom.grid_index(i, j, k);
                    let fa = field_a.values()[idx_grid];
                    let fb = field_b.values()[idx_grid];

                    let mut pk_mode = fa * fb.conj();
                    let mut sn_mode = shotnoise_amp
                        * shotnoise_aliasing(self.config.assignment, &self.geom, [i, j, k]);

                    let (win_pk, win_sn) = self.mode_corrections(field_a, field_b, [i, j, k]);
                    pk_mode /= win_pk;
                    sn_mode /= win_sn;

                    twopt_3d[idx_grid] = (pk_mode - sn_mode) / vol;
                }
            }
        }

        fft::inverse(&mut twopt_3d, *self.geom.ngrid());
        twopt_3d
    }

    /// fine-to-coarse gathering shared by the separation-space statistics
    fn gather_separation_bins(
        &mut self,
        rbinning: &Binning,
        npairs_sample: &[u64],
        r_sample: &[f64],
        xi_sample: &[Complex64],
    ) {
        for ibin in 0..rbinning.num_bins() {
            let r_lower = rbinning.edges()[ibin];
            let r_upper = rbinning.edges()[ibin + 1];
            for i in 0..N_SAMPLE {
                let r_ = i as f64 * DR_SAMPLE;
                if r_lower < r_ && r_ <= r_upper {
                    self.npairs[ibin] += npairs_sample[i];
                    self.r[ibin] += r_sample[i];
                    self.xi[ibin] += xi_sample[i];
                }
            }

            if self.npairs[ibin] != 0 {
                let npairs = self.npairs[ibin] as f64;
                self.r[ibin] /= npairs;
                self.xi[ibin] /= npairs;
            } else {
                self.r[ibin] = rbinning.centres()[ibin];
                self.xi[ibin] = Complex64::new(0., 0.);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geom8() -> GridGeometry {
        GridGeometry::new([100.; 3], [8, 8, 8]).unwrap()
    }

    #[test]
    fn aliasing_is_unity_at_the_zero_mode() {
        let geom = geom8();
        for scheme in [
            AssignmentScheme::Ngp,
            AssignmentScheme::Cic,
            AssignmentScheme::Tsc,
            AssignmentScheme::Pcs,
        ] {
            assert_eq!(shotnoise_aliasing(scheme, &geom, [0, 0, 0]), 1.);
        }
    }

    #[test]
    fn ngp_aliasing_is_flat() {
        let geom = geom8();
        assert_eq!(shotnoise_aliasing(AssignmentScheme::Ngp, &geom, [3, 5, 7]), 1.);
    }

    #[test]
    fn cic_aliasing_at_nyquist() {
        // sin²(π/2) = 1 per axis, factor 1 - 2/3 = 1/3 each
        let geom = geom8();
        let alias = shotnoise_aliasing(AssignmentScheme::Cic, &geom, [4, 4, 4]);
        assert!((alias - 1. / 27.).abs() < 1e-15);
    }

    #[test]
    fn aliasing_is_symmetric_under_wrap_around() {
        // sin² at index i equals sin² at index n - i
        let geom = geom8();
        for scheme in [AssignmentScheme::Cic, AssignmentScheme::Tsc, AssignmentScheme::Pcs] {
            let lo = shotnoise_aliasing(scheme, &geom, [1, 2, 3]);
            let hi = shotnoise_aliasing(scheme, &geom, [7, 6, 5]);
            assert!((lo - hi).abs() < 1e-15);
        }
    }

    #[test]
    fn aliasing_decreases_with_kernel_order() {
        // smoother kernels suppress more small-scale power
        let geom = geom8();
        let idx = [3, 0, 0];
        let cic = shotnoise_aliasing(AssignmentScheme::Cic, &geom, idx);
        let tsc = shotnoise_aliasing(AssignmentScheme::Tsc, &geom, idx);
        let pcs = shotnoise_aliasing(AssignmentScheme::Pcs, &geom, idx);
        assert!(1. > cic && cic > tsc && tsc > pcs && pcs > 0.);
    }
}
