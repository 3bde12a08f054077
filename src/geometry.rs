//! Derived properties of a regular 3-D mesh over a rectangular box.
//!
//! [`GridGeometry`] bundles the quantities every mesh operation needs: cell
//! sizes, fundamental wavenumbers, volumes, and the mapping between a 3-D
//! grid coordinate and both its flattened buffer index and its physical
//! position/wavevector. The index conventions here must match the frequency
//! ordering of the spectral transform exactly, so they live in one place.

use crate::error::Error;

/// Immutable grid geometry derived from box size and grid resolution.
///
/// Indices at or above half the axis resolution represent the negative
/// frequency/coordinate branch (the standard DFT wrap-around convention).
/// For a resolution of `n`, index `0` is the zero mode, indices `1..n/2`
/// the positive branch and indices `n/2..n` map to `idx - n`.
#[derive(Clone, Debug)]
pub struct GridGeometry {
    boxsize: [f64; 3],
    ngrid: [usize; 3],
    nmesh: usize,
    dr: [f64; 3],
    dk: [f64; 3],
    vol: f64,
    vol_cell: f64,
}

impl GridGeometry {
    /// Derive the geometry for the given box size and grid resolution.
    ///
    /// Fails with a configuration error if any box size is non-positive or
    /// any grid resolution is zero.
    pub fn new(boxsize: [f64; 3], ngrid: [usize; 3]) -> Result<GridGeometry, Error> {
        for iaxis in 0..3 {
            if !(boxsize[iaxis] > 0.) || !boxsize[iaxis].is_finite() {
                return Err(Error::invalid_config(format!(
                    "box size in dimension {} must be positive and finite, got {}",
                    iaxis, boxsize[iaxis]
                )));
            }
            if ngrid[iaxis] == 0 {
                return Err(Error::invalid_config(format!(
                    "grid resolution in dimension {iaxis} must be positive"
                )));
            }
        }

        let nmesh = ngrid[0] * ngrid[1] * ngrid[2];
        let vol = boxsize[0] * boxsize[1] * boxsize[2];

        Ok(GridGeometry {
            boxsize,
            ngrid,
            nmesh,
            dr: [
                boxsize[0] / ngrid[0] as f64,
                boxsize[1] / ngrid[1] as f64,
                boxsize[2] / ngrid[2] as f64,
            ],
            dk: [
                2. * std::f64::consts::PI / boxsize[0],
                2. * std::f64::consts::PI / boxsize[1],
                2. * std::f64::consts::PI / boxsize[2],
            ],
            vol,
            vol_cell: vol / nmesh as f64,
        })
    }

    pub fn boxsize(&self) -> &[f64; 3] {
        &self.boxsize
    }

    pub fn ngrid(&self) -> &[usize; 3] {
        &self.ngrid
    }

    /// total number of grid cells
    pub fn nmesh(&self) -> usize {
        self.nmesh
    }

    /// grid cell size per axis
    pub fn dr(&self) -> &[f64; 3] {
        &self.dr
    }

    /// fundamental wavenumber per axis
    pub fn dk(&self) -> &[f64; 3] {
        &self.dk
    }

    /// total box volume
    pub fn vol(&self) -> f64 {
        self.vol
    }

    /// volume of a single grid cell
    pub fn vol_cell(&self) -> f64 {
        self.vol_cell
    }

    /// map a 3-D grid coordinate to its flattened (row-major) buffer index
    pub fn grid_index(&self, i: usize, j: usize, k: usize) -> usize {
        (i * self.ngrid[1] + j) * self.ngrid[2] + k
    }

    /// signed index on the wrap-around branch for one axis
    pub fn wrapped_index(&self, idx: usize, iaxis: usize) -> i64 {
        let n = self.ngrid[iaxis];
        if idx < n / 2 {
            idx as i64
        } else {
            idx as i64 - n as i64
        }
    }

    /// real-space position vector of a grid cell (wrap-around convention)
    pub fn pos_vector(&self, i: usize, j: usize, k: usize) -> [f64; 3] {
        [
            self.wrapped_index(i, 0) as f64 * self.dr[0],
            self.wrapped_index(j, 1) as f64 * self.dr[1],
            self.wrapped_index(k, 2) as f64 * self.dr[2],
        ]
    }

    /// wavevector of a grid cell (wrap-around convention)
    pub fn wavevector(&self, i: usize, j: usize, k: usize) -> [f64; 3] {
        [
            self.wrapped_index(i, 0) as f64 * self.dk[0],
            self.wrapped_index(j, 1) as f64 * self.dk[1],
            self.wrapped_index(k, 2) as f64 * self.dk[2],
        ]
    }

    /// true when `other` describes the same box and resolution
    pub fn matches(&self, other: &GridGeometry) -> bool {
        self.boxsize == other.boxsize && self.ngrid == other.ngrid && self.nmesh == other.nmesh
    }
}

/// magnitude of a 3-vector
pub(crate) fn vec3_magnitude(v: [f64; 3]) -> f64 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}
