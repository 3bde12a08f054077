//! Read-only views of particle data consumed by the mesh builders.
//!
//! The mesh core never owns, mutates, or persists particle data: a
//! [`ParticleCatalogue`] borrows a slice of records prepared by the driver
//! (catalogue reading, centering, and periodic wrapping all happen
//! upstream). Line-of-sight directions are supplied as a separate `(3, n)`
//! array aligned by index with the catalogue, and only matter for
//! anisotropic (multipole-weighted) field construction.

use crate::error::Error;
use ndarray::ArrayView2;

/// A single particle record.
///
/// The mesh core reads only `pos` and the combined weight `ws * wc`; the
/// remaining fields ride along for driver-level normalization amplitudes.
#[derive(Clone, Copy, Debug)]
pub struct Particle {
    /// comoving position
    pub pos: [f64; 3],
    /// expected redshift-dependent number density at the particle
    pub nz: f64,
    /// systematic weight
    pub ws: f64,
    /// clustering weight
    pub wc: f64,
}

impl Particle {
    /// combined (systematic × clustering) weight
    pub fn w(&self) -> f64 {
        self.ws * self.wc
    }
}

/// Anything that can be painted onto a mesh: a count and positions by index.
///
/// [`MeshField::assign_weighted_points`](crate::MeshField::assign_weighted_points)
/// is generic over this so tests and alternative containers don't need a
/// full catalogue.
pub trait PointSource {
    fn n_points(&self) -> usize;

    fn position(&self, idx: usize) -> [f64; 3];

    /// axis-aligned bounds of the contained positions, when known
    fn bounds(&self) -> Option<([f64; 3], [f64; 3])> {
        None
    }
}

/// A borrowed, validated particle collection.
#[derive(Clone)]
pub struct ParticleCatalogue<'a> {
    pdata: &'a [Particle],
    wtotal: f64,
    pos_min: [f64; 3],
    pos_max: [f64; 3],
}

impl<'a> ParticleCatalogue<'a> {
    /// Wrap a slice of particle records.
    ///
    /// Fails with a data error for an empty slice: every downstream
    /// operation would silently produce an all-zero field otherwise.
    pub fn new(pdata: &'a [Particle]) -> Result<ParticleCatalogue<'a>, Error> {
        if pdata.is_empty() {
            return Err(Error::invalid_data(
                "particle catalogue holds no particles".to_string(),
            ));
        }

        let mut wtotal = 0.;
        let mut pos_min = pdata[0].pos;
        let mut pos_max = pdata[0].pos;
        for p in pdata {
            wtotal += p.ws;
            for iaxis in 0..3 {
                pos_min[iaxis] = pos_min[iaxis].min(p.pos[iaxis]);
                pos_max[iaxis] = pos_max[iaxis].max(p.pos[iaxis]);
            }
        }

        Ok(ParticleCatalogue {
            pdata,
            wtotal,
            pos_min,
            pos_max,
        })
    }

    /// total number of particles
    pub fn ntotal(&self) -> usize {
        self.pdata.len()
    }

    /// total systematic weight
    pub fn wtotal(&self) -> f64 {
        self.wtotal
    }

    pub fn particle(&self, idx: usize) -> &Particle {
        &self.pdata[idx]
    }
}

impl PointSource for ParticleCatalogue<'_> {
    fn n_points(&self) -> usize {
        self.pdata.len()
    }

    fn position(&self, idx: usize) -> [f64; 3] {
        self.pdata[idx].pos
    }

    fn bounds(&self) -> Option<([f64; 3], [f64; 3])> {
        Some((self.pos_min, self.pos_max))
    }
}

/// Check that a `(3, n)` line-of-sight table is aligned with a catalogue.
pub(crate) fn check_los_table(
    los: &ArrayView2<f64>,
    catalogue: &ParticleCatalogue,
) -> Result<(), Error> {
    if los.shape() != [3, catalogue.ntotal()] {
        return Err(Error::invalid_data(format!(
            "line-of-sight table has shape {:?}, expected [3, {}]",
            los.shape(),
            catalogue.ntotal()
        )));
    }
    Ok(())
}

/// line-of-sight direction of one particle from a `(3, n)` table
pub(crate) fn los_vector(los: &ArrayView2<f64>, pid: usize) -> [f64; 3] {
    [los[[0, pid]], los[[1, pid]], los[[2, pid]]]
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn empty_catalogue_is_a_data_error() {
        assert!(ParticleCatalogue::new(&[]).is_err());
    }

    #[test]
    fn totals_and_bounds() {
        let particles = [
            Particle {
                pos: [1., 2., 3.],
                nz: 1e-4,
                ws: 2.0,
                wc: 0.5,
            },
            Particle {
                pos: [-1., 5., 0.],
                nz: 1e-4,
                ws: 1.0,
                wc: 1.0,
            },
        ];
        let catalogue = ParticleCatalogue::new(&particles).unwrap();
        assert_eq!(catalogue.ntotal(), 2);
        assert_eq!(catalogue.wtotal(), 3.0);
        assert_eq!(catalogue.particle(0).w(), 1.0);
        let (lo, hi) = catalogue.bounds().unwrap();
        assert_eq!(lo, [-1., 2., 0.]);
        assert_eq!(hi, [1., 5., 3.]);
    }

    #[test]
    fn misaligned_los_table_is_rejected() {
        let particles = [Particle {
            pos: [0.; 3],
            nz: 0.,
            ws: 1.,
            wc: 1.,
        }];
        let catalogue = ParticleCatalogue::new(&particles).unwrap();
        let los = Array2::<f64>::zeros((3, 2));
        assert!(check_los_table(&los.view(), &catalogue).is_err());
        let los = Array2::<f64>::zeros((3, 1));
        assert!(check_los_table(&los.view(), &catalogue).is_ok());
    }
}
