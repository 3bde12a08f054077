//! The mesh field: a discretized complex-valued density/fluctuation field.
//!
//! A [`MeshField`] owns one flattened buffer of complex samples over the
//! grid (plus a half-cell-shifted "shadow" buffer when interlacing is on).
//! Particle sets are painted onto it through one of four interpolation
//! kernels, it transforms between configuration and Fourier space with
//! explicit physical normalization, and it can undo the smoothing the
//! assignment kernel imprinted in Fourier space.
//!
//! # Conventions
//!
//! The painted field is `Σᵢ wᵢ δᴰ(x - xᵢ)` with `δᴰ ↔ δᴷ / dV`, so samples
//! carry units of weighted number density. The forward transform multiplies
//! by the cell volume (`∫d³x ↔ dV Σ`) and the inverse divides by the box
//! volume (`∫d³k/(2π)³ ↔ (1/V) Σ`); together with the unnormalized DFT pair
//! this makes forward-then-inverse an exact round trip.

use crate::catalogue::{ParticleCatalogue, PointSource, check_los_table, los_vector};
use crate::context::MemoryTracker;
use crate::error::Error;
use crate::fft;
use crate::geometry::{GridGeometry, vec3_magnitude};
use crate::specfunc::{SphericalBessel, reduced_spherical_harmonic};
use ndarray::ArrayView2;
use num_complex::Complex64;
use std::f64::consts::PI;

/// cells closer to the origin than this are exempt from power-law weighting
const EPS_POWLAW_ORIGIN: f64 = 1e-5;

/// The particle-to-mesh interpolation kernel, by assignment order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignmentScheme {
    /// nearest grid point (order 1)
    Ngp,
    /// cloud in cell (order 2)
    Cic,
    /// triangular shaped cloud (order 3)
    Tsc,
    /// piecewise cubic spline (order 4)
    Pcs,
}

impl AssignmentScheme {
    pub const NAMES: &'static [&'static str] = &["ngp", "cic", "tsc", "pcs"];

    /// number of cells per axis a particle is spread over
    pub fn order(self) -> usize {
        match self {
            AssignmentScheme::Ngp => 1,
            AssignmentScheme::Cic => 2,
            AssignmentScheme::Tsc => 3,
            AssignmentScheme::Pcs => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AssignmentScheme::Ngp => "ngp",
            AssignmentScheme::Cic => "cic",
            AssignmentScheme::Tsc => "tsc",
            AssignmentScheme::Pcs => "pcs",
        }
    }

    /// Parse a scheme name as it appears in parameter files.
    ///
    /// Unknown names are a fatal configuration error listing the choices.
    pub fn from_name(name: &str) -> Result<AssignmentScheme, Error> {
        match name {
            "ngp" => Ok(AssignmentScheme::Ngp),
            "cic" => Ok(AssignmentScheme::Cic),
            "tsc" => Ok(AssignmentScheme::Tsc),
            "pcs" => Ok(AssignmentScheme::Pcs),
            _ => Err(Error::assignment_name(name.to_string(), Self::NAMES)),
        }
    }
}

/// The scalar configuration bundle shared by mesh fields and statistics.
#[derive(Clone, Copy, Debug)]
pub struct MeshConfig {
    /// box size per axis
    pub boxsize: [f64; 3],
    /// grid resolution per axis
    pub ngrid: [usize; 3],
    /// particle-to-mesh interpolation kernel
    pub assignment: AssignmentScheme,
    /// paint a second half-cell-shifted grid and combine after transform
    pub interlace: bool,
}

/// Fourier response of the assignment kernel at one grid wavevector.
///
/// `W(k) = Π_axis sinc(π m_axis / n_axis)^order` with `m_axis` the signed
/// wrap-around index; exactly 1 at the zero wavevector. Dividing a
/// transformed field by this undoes the kernel smoothing.
pub fn assignment_window(
    scheme: AssignmentScheme,
    geom: &GridGeometry,
    idx: [usize; 3],
) -> f64 {
    let mut wk = 1.0;
    for iaxis in 0..3 {
        let m = geom.wrapped_index(idx[iaxis], iaxis);
        if m != 0 {
            let u = PI * m as f64 / geom.ngrid()[iaxis] as f64;
            wk *= u.sin() / u;
        }
    }
    wk.powi(scheme.order() as i32)
}

/// per-axis kernel support: covered cells and their sampling weights
fn axis_kernel(scheme: AssignmentScheme, loc_grid: f64, cells: &mut [i64; 4], win: &mut [f64; 4]) {
    match scheme {
        AssignmentScheme::Ngp => {
            cells[0] = (loc_grid + 0.5) as i64;
            win[0] = 1.;
        }
        AssignmentScheme::Cic => {
            let base = loc_grid as i64;
            let s = loc_grid - base as f64;
            cells[0] = base;
            cells[1] = base + 1;
            win[0] = 1. - s;
            win[1] = s;
        }
        AssignmentScheme::Tsc => {
            let nearest = (loc_grid + 0.5) as i64;
            let s = loc_grid - nearest as f64;
            cells[0] = nearest - 1;
            cells[1] = nearest;
            cells[2] = nearest + 1;
            win[0] = 0.5 * (0.5 - s) * (0.5 - s);
            win[1] = 0.75 - s * s;
            win[2] = 0.5 * (0.5 + s) * (0.5 + s);
        }
        AssignmentScheme::Pcs => {
            let base = loc_grid as i64;
            let s = loc_grid - base as f64;
            let t = 1. - s;
            cells[0] = base - 1;
            cells[1] = base;
            cells[2] = base + 1;
            cells[3] = base + 2;
            win[0] = t * t * t / 6.;
            win[1] = (4. - 6. * s * s + 3. * s * s * s) / 6.;
            win[2] = (4. - 6. * t * t + 3. * t * t * t) / 6.;
            win[3] = s * s * s / 6.;
        }
    }
}

/// An owned, complex-valued field sampled on the mesh.
pub struct MeshField {
    config: MeshConfig,
    geom: GridGeometry,
    field: Vec<Complex64>,
    /// half-cell-shifted copy, present only when interlacing
    shadow: Option<Vec<Complex64>>,
    tracker: MemoryTracker,
    tracked_bytes: usize,
}

impl MeshField {
    /// Allocate a zero-filled field (and shadow, if interlacing) for the
    /// given configuration, charging the allocation to `tracker`.
    pub fn new(config: MeshConfig, tracker: &MemoryTracker) -> Result<MeshField, Error> {
        let geom = GridGeometry::new(config.boxsize, config.ngrid)?;
        let nmesh = geom.nmesh();

        let field = vec![Complex64::new(0., 0.); nmesh];
        let shadow = if config.interlace {
            Some(vec![Complex64::new(0., 0.); nmesh])
        } else {
            None
        };

        let n_buffers = 1 + shadow.is_some() as usize;
        let tracked_bytes = n_buffers * nmesh * std::mem::size_of::<Complex64>();
        tracker.acquire(tracked_bytes);

        Ok(MeshField {
            config,
            geom,
            field,
            shadow,
            tracker: tracker.clone(),
            tracked_bytes,
        })
    }

    pub fn config(&self) -> &MeshConfig {
        &self.config
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geom
    }

    /// the field samples, flattened row-major
    pub fn values(&self) -> &[Complex64] {
        &self.field
    }

    pub fn values_mut(&mut self) -> &mut [Complex64] {
        &mut self.field
    }

    /// the shadow samples, when interlacing is enabled
    pub fn shadow_values(&self) -> Option<&[Complex64]> {
        self.shadow.as_deref()
    }

    /// Zero-fill the buffer(s) without reallocating. Idempotent.
    pub fn reset(&mut self) {
        self.field.fill(Complex64::new(0., 0.));
        if let Some(shadow) = self.shadow.as_mut() {
            shadow.fill(Complex64::new(0., 0.));
        }
    }

    /// Fourier response of this field's assignment kernel at a grid index.
    pub fn window(&self, idx: [usize; 3]) -> f64 {
        assignment_window(self.config.assignment, &self.geom, idx)
    }

    // ------------------------------------------------------------------
    // Mesh assignment
    // ------------------------------------------------------------------

    /// Distribute per-point complex weights onto the grid.
    ///
    /// The previous contents are discarded. Each point contributes the
    /// product of per-axis kernel weights times its weight, scaled by the
    /// inverse cell volume; contributions landing outside the buffer are
    /// silently dropped. When interlacing is enabled a second pass paints
    /// the half-cell-shifted copy into the shadow buffer.
    pub fn assign_weighted_points(
        &mut self,
        points: &impl PointSource,
        weights: &[Complex64],
    ) -> Result<(), Error> {
        if weights.len() != points.n_points() {
            return Err(Error::invalid_data(format!(
                "got {} weights for {} points",
                weights.len(),
                points.n_points()
            )));
        }

        if let Some((pos_min, pos_max)) = points.bounds() {
            for iaxis in 0..3 {
                let extent = pos_max[iaxis] - pos_min[iaxis];
                if self.config.boxsize[iaxis] < extent {
                    log::warn!(
                        "box size in dimension {} is smaller than catalogue extents: {:.3} < {:.3}",
                        iaxis,
                        self.config.boxsize[iaxis],
                        extent
                    );
                }
            }
        }

        self.reset();

        let scheme = self.config.assignment;
        assign_pass(&self.geom, scheme, points, weights, false, &mut self.field);
        if let Some(shadow) = self.shadow.as_mut() {
            assign_pass(&self.geom, scheme, points, weights, true, shadow);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Field computations
    // ------------------------------------------------------------------

    /// Build the unweighted (unit-weight) count field of one catalogue.
    pub fn compute_unweighted_field(&mut self, particles: &ParticleCatalogue) -> Result<(), Error> {
        let unit_weight = vec![Complex64::new(1., 0.); particles.ntotal()];
        self.assign_weighted_points(particles, &unit_weight)
    }

    /// Build the unweighted field, then subtract the uniform mean density
    /// `N/V` in place to obtain number-density fluctuations.
    pub fn compute_unweighted_fluctuations_insitu(
        &mut self,
        particles: &ParticleCatalogue,
    ) -> Result<(), Error> {
        self.compute_unweighted_field(particles)?;

        let nbar = particles.ntotal() as f64 / self.geom.vol();
        for value in &mut self.field {
            value.re -= nbar;
        }
        Ok(())
    }

    /// per-particle weight `Y*_LM-style kernel`: harmonic at the particle's
    /// line of sight times its combined weight (optionally conjugated and
    /// squared, for the quadratic shot-noise kernels)
    fn ylm_weights(
        particles: &ParticleCatalogue,
        los: &ArrayView2<f64>,
        ell: u32,
        m: i32,
        quadratic: bool,
    ) -> Vec<Complex64> {
        (0..particles.ntotal())
            .map(|pid| {
                let ylm = reduced_spherical_harmonic(ell, m, los_vector(los, pid));
                let w = particles.particle(pid).w();
                if quadratic {
                    ylm.conj() * (w * w)
                } else {
                    ylm * w
                }
            })
            .collect()
    }

    /// Build the multipole-weighted fluctuation field `δn_LM` from a data
    /// catalogue and a random catalogue: assign both with harmonic × weight
    /// kernels, then combine as `data − alpha × random` (shadow included).
    #[allow(clippy::too_many_arguments)]
    pub fn compute_ylm_wgtd_fluctuations(
        &mut self,
        particles_data: &ParticleCatalogue,
        particles_rand: &ParticleCatalogue,
        los_data: ArrayView2<f64>,
        los_rand: ArrayView2<f64>,
        alpha: f64,
        ell: u32,
        m: i32,
    ) -> Result<(), Error> {
        check_los_table(&los_data, particles_data)?;
        check_los_table(&los_rand, particles_rand)?;

        let weights = Self::ylm_weights(particles_data, &los_data, ell, m, false);
        self.assign_weighted_points(particles_data, &weights)?;

        let mut field_rand = MeshField::new(self.config, &self.tracker)?;
        let weights = Self::ylm_weights(particles_rand, &los_rand, ell, m, false);
        field_rand.assign_weighted_points(particles_rand, &weights)?;

        self.combine_with(&field_rand, -alpha);
        Ok(())
    }

    /// Build the multipole-weighted density of a single catalogue, scaled
    /// by the alpha contrast (used for random-only/window estimators).
    pub fn compute_ylm_wgtd_density(
        &mut self,
        particles: &ParticleCatalogue,
        los: ArrayView2<f64>,
        alpha: f64,
        ell: u32,
        m: i32,
    ) -> Result<(), Error> {
        check_los_table(&los, particles)?;

        let weights = Self::ylm_weights(particles, &los, ell, m, false);
        self.assign_weighted_points(particles, &weights)?;
        self.scale(alpha);
        Ok(())
    }

    /// Build the quadratic shot-noise kernel field `N_LM` from a data and a
    /// random catalogue: conjugated harmonic, squared weights, combined as
    /// `data + alpha² × random`.
    #[allow(clippy::too_many_arguments)]
    pub fn compute_ylm_wgtd_quad_fluctuations(
        &mut self,
        particles_data: &ParticleCatalogue,
        particles_rand: &ParticleCatalogue,
        los_data: ArrayView2<f64>,
        los_rand: ArrayView2<f64>,
        alpha: f64,
        ell: u32,
        m: i32,
    ) -> Result<(), Error> {
        check_los_table(&los_data, particles_data)?;
        check_los_table(&los_rand, particles_rand)?;

        let weights = Self::ylm_weights(particles_data, &los_data, ell, m, true);
        self.assign_weighted_points(particles_data, &weights)?;

        let mut field_rand = MeshField::new(self.config, &self.tracker)?;
        let weights = Self::ylm_weights(particles_rand, &los_rand, ell, m, true);
        field_rand.assign_weighted_points(particles_rand, &weights)?;

        self.combine_with(&field_rand, alpha * alpha);
        Ok(())
    }

    /// Single-catalogue variant of the quadratic kernel, scaled by alpha².
    pub fn compute_ylm_wgtd_quad_density(
        &mut self,
        particles: &ParticleCatalogue,
        los: ArrayView2<f64>,
        alpha: f64,
        ell: u32,
        m: i32,
    ) -> Result<(), Error> {
        check_los_table(&los, particles)?;

        let weights = Self::ylm_weights(particles, &los, ell, m, true);
        self.assign_weighted_points(particles, &weights)?;
        self.scale(alpha * alpha);
        Ok(())
    }

    /// `self += coeff * other`, applied to shadow buffers too
    fn combine_with(&mut self, other: &MeshField, coeff: f64) {
        for (value, rhs) in self.field.iter_mut().zip(&other.field) {
            *value += *rhs * coeff;
        }
        if let (Some(shadow), Some(other_shadow)) = (self.shadow.as_mut(), other.shadow.as_ref()) {
            for (value, rhs) in shadow.iter_mut().zip(other_shadow) {
                *value += *rhs * coeff;
            }
        }
    }

    fn scale(&mut self, coeff: f64) {
        for value in &mut self.field {
            *value *= coeff;
        }
        if let Some(shadow) = self.shadow.as_mut() {
            for value in shadow.iter_mut() {
                *value *= coeff;
            }
        }
    }

    // ------------------------------------------------------------------
    // Field transforms
    // ------------------------------------------------------------------

    /// Transform the field to Fourier space.
    ///
    /// Applies the volume normalization `∫d³x ↔ dV Σᵢ` before the DFT. When
    /// interlacing, the shadow buffer is transformed the same way, phase
    /// corrected for its half-cell shift by `exp(+iπ(mx+my+mz))`, and
    /// averaged 50/50 into the primary buffer.
    pub fn fourier_transform(&mut self) {
        log::debug!(
            "transforming mesh field to Fourier space (interlace: {})",
            self.config.interlace
        );

        let vol_cell = self.geom.vol_cell();
        for value in &mut self.field {
            *value *= vol_cell;
        }
        fft::forward(&mut self.field, *self.geom.ngrid());

        if let Some(shadow) = self.shadow.as_mut() {
            for value in shadow.iter_mut() {
                *value *= vol_cell;
            }
            fft::forward(shadow, *self.geom.ngrid());

            let [nx, ny, nz] = *self.geom.ngrid();
            for i in 0..nx {
                for j in 0..ny {
                    for k in 0..nz {
                        let idx_grid = self.geom.grid_index(i, j, k);

                        // index fraction of the wavevector, wrapped to the
                        // negative branch past the Nyquist index
                        let mx = self.geom.wrapped_index(i, 0) as f64 / nx as f64;
                        let my = self.geom.wrapped_index(j, 1) as f64 / ny as f64;
                        let mz = self.geom.wrapped_index(k, 2) as f64 / nz as f64;

                        let arg = PI * (mx + my + mz);
                        let phase = Complex64::new(0., arg).exp();

                        self.field[idx_grid] =
                            (self.field[idx_grid] + phase * shadow[idx_grid]) / 2.;
                    }
                }
            }
        }
    }

    /// Transform the field back to configuration space.
    ///
    /// Applies the volume normalization `∫d³k/(2π)³ ↔ (1/V) Σᵢ` before the
    /// unnormalized backward DFT.
    pub fn inv_fourier_transform(&mut self) {
        log::debug!("transforming mesh field to configuration space");

        let vol = self.geom.vol();
        for value in &mut self.field {
            *value /= vol;
        }
        fft::inverse(&mut self.field, *self.geom.ngrid());
    }

    // ------------------------------------------------------------------
    // Field operations
    // ------------------------------------------------------------------

    /// Divide every sample by the assignment kernel's Fourier response,
    /// undoing the smoothing imprinted at paint time.
    pub fn apply_assignment_compensation(&mut self) {
        let [nx, ny, nz] = *self.geom.ngrid();
        for i in 0..nx {
            for j in 0..ny {
                for k in 0..nz {
                    let idx_grid = self.geom.grid_index(i, j, k);
                    let win = self.window([i, j, k]);
                    self.field[idx_grid] /= win;
                }
            }
        }
    }

    /// Weight every real-space cell by `|r|^(-exponent)`, leaving cells
    /// within an epsilon of the singular origin unmodified (wide-angle
    /// correction terms).
    pub fn apply_power_law_weighting(&mut self, exponent: f64) {
        let [nx, ny, nz] = *self.geom.ngrid();
        for i in 0..nx {
            for j in 0..ny {
                for k in 0..nz {
                    let r = vec3_magnitude(self.geom.pos_vector(i, j, k));
                    if r < EPS_POWLAW_ORIGIN {
                        continue;
                    }
                    let idx_grid = self.geom.grid_index(i, j, k);
                    self.field[idx_grid] *= r.powf(-exponent);
                }
            }
        }
    }

    /// Reconstruct the real-space field restricted to a wavenumber band.
    ///
    /// Modes with `k_lower < |k| <= k_upper` are window-compensated,
    /// weighted by the per-cell `ylm` table, inverse transformed, and
    /// averaged over the number of contributing modes. Returns the mean
    /// wavenumber of the band and the mode count; an empty band leaves the
    /// field zeroed and reports zero modes.
    pub fn inv_fourier_transform_band_limited(
        &mut self,
        field_fourier: &MeshField,
        ylm: &[Complex64],
        k_lower: f64,
        k_upper: f64,
    ) -> Result<(f64, usize), Error> {
        self.check_cell_table(ylm, "ylm")?;

        self.reset();

        let mut k_eff = 0.;
        let mut nmodes = 0_usize;

        let [nx, ny, nz] = *self.geom.ngrid();
        for i in 0..nx {
            for j in 0..ny {
                for k in 0..nz {
                    let kv = self.geom.wavevector(i, j, k);
                    let k_mag = vec3_magnitude(kv);
                    if k_lower < k_mag && k_mag <= k_upper {
                        let idx_grid = self.geom.grid_index(i, j, k);
                        let fk = field_fourier.field[idx_grid]
                            / field_fourier.window([i, j, k]);
                        self.field[idx_grid] = ylm[idx_grid] * fk;

                        k_eff += k_mag;
                        nmodes += 1;
                    }
                }
            }
        }

        fft::inverse(&mut self.field, *self.geom.ngrid());

        if nmodes == 0 {
            return Ok((0., 0));
        }

        for value in &mut self.field {
            *value /= nmodes as f64;
        }
        Ok((k_eff / nmodes as f64, nmodes))
    }

    /// Reconstruct the real-space field weighted by a spherical Bessel
    /// function (evaluated at `|k| * r`) times the per-cell `ylm` table,
    /// with the inverse-transform volume normalization folded in. Used by
    /// the correlation-function multipole pipeline.
    pub fn inv_fourier_transform_bessel_ylm_wgtd(
        &mut self,
        field_fourier: &MeshField,
        ylm: &[Complex64],
        sjl: &SphericalBessel,
        r: f64,
    ) -> Result<(), Error> {
        self.check_cell_table(ylm, "ylm")?;

        self.reset();

        let vol = self.geom.vol();
        let [nx, ny, nz] = *self.geom.ngrid();
        for i in 0..nx {
            for j in 0..ny {
                for k in 0..nz {
                    let kv = self.geom.wavevector(i, j, k);
                    let k_mag = vec3_magnitude(kv);

                    let idx_grid = self.geom.grid_index(i, j, k);
                    let fk =
                        field_fourier.field[idx_grid] / field_fourier.window([i, j, k]);

                    self.field[idx_grid] = ylm[idx_grid] * fk * (sjl.eval(k_mag * r) / vol);
                }
            }
        }

        fft::inverse(&mut self.field, *self.geom.ngrid());
        Ok(())
    }

    // ------------------------------------------------------------------
    // Misc
    // ------------------------------------------------------------------

    /// Grid-based normalization factor: paint the combined weights, sum
    /// `field.re^order × dV` over the grid, and return the reciprocal.
    ///
    /// Fails with a data error when the volume integral is exactly zero.
    pub fn grid_based_powlaw_norm(
        &mut self,
        particles: &ParticleCatalogue,
        order: i32,
    ) -> Result<f64, Error> {
        let weights: Vec<Complex64> = (0..particles.ntotal())
            .map(|pid| Complex64::new(particles.particle(pid).w(), 0.))
            .collect();
        self.assign_weighted_points(particles, &weights)?;

        let mut vol_int = 0.;
        for value in &self.field {
            vol_int += value.re.powi(order);
        }
        vol_int *= self.geom.vol_cell();

        if vol_int == 0. {
            return Err(Error::invalid_data(
                "normalization volume integral is exactly zero".to_string(),
            ));
        }
        Ok(1. / vol_int)
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
}

impl Drop for MeshField {
    fn drop(&mut self) {
        self.tracker.release(self.tracked_bytes);
    }
}

/// Paint one pass of points into `buf`, optionally with the interlacing
/// half-cell shift (periodically wrapped).
fn assign_pass(
    geom: &GridGeometry,
    scheme: AssignmentScheme,
    points: &impl PointSource,
    weights: &[Complex64],
    half_shift: bool,
    buf: &mut [Complex64],
) {
    let inv_vol_cell = 1. / geom.vol_cell();
    let order = scheme.order();
    let nmesh = geom.nmesh() as i64;
    let ny = geom.ngrid()[1] as i64;
    let nz = geom.ngrid()[2] as i64;

    let mut cells = [[0_i64; 4]; 3];
    let mut win = [[0.0_f64; 4]; 3];

    for pid in 0..points.n_points() {
        let pos = points.position(pid);
        for iaxis in 0..3 {
            let n_axis = geom.ngrid()[iaxis] as f64;
            let mut loc_grid = pos[iaxis] / geom.boxsize()[iaxis] * n_axis;
            if half_shift {
                loc_grid += 0.5;
                if loc_grid > n_axis {
                    loc_grid -= n_axis;
                }
            }
            axis_kernel(scheme, loc_grid, &mut cells[iaxis], &mut win[iaxis]);
        }

        for iloc in 0..order {
            for jloc in 0..order {
                for kloc in 0..order {
                    let idx_grid = (cells[0][iloc] * ny + cells[1][jloc]) * nz + cells[2][kloc];
                    if (0..nmesh).contains(&idx_grid) {
                        let w = win[0][iloc] * win[1][jloc] * win[2][kloc];
                        buf[idx_grid as usize] += weights[pid] * (inv_vol_cell * w);
                    }
                }
            }
        }
    }
}
