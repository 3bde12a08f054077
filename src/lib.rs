/*!
Provides mesh-based routines for computing binned two-point clustering
statistics of particle distributions in a rectangular box (e.g. power
spectrum and correlation function multipoles).

# High-Level: Mesh-Based 2-Point Statistics

Clustering statistics in
[cosmology](https://en.wikipedia.org/wiki/Correlation_function_(astronomy))
are usually estimated by interpolating a weighted particle catalogue onto a
regular grid, transforming the gridded field to Fourier space, and
averaging products of field modes over wavenumber or separation shells.

The pipeline provided here has three stages:

1. paint particles onto a [`MeshField`] through an [`AssignmentScheme`]
   kernel, optionally with a second half-cell-shifted (interlaced) pass
   that cancels the leading aliased images after transforming;
2. transform with [`MeshField::fourier_transform`], which carries the
   physical volume normalization so field modes have the continuum
   convention;
3. hand a pair of transformed fields to [`FieldStats`], which corrects
   each mode for the sampling effects of the assignment kernel and
   bin-averages the resulting spectra or correlation functions over a
   [`Binning`].

Anisotropic (multipole-weighted) variants weight particles or grid cells
by reduced spherical harmonics of per-particle line-of-sight directions,
supplied alongside the catalogue as a `(3, n)` array.

Mesh buffers are the dominant memory cost; every [`MeshField`] charges its
allocations to a caller-supplied [`MemoryTracker`] so drivers can report
peak usage.
*/

#![deny(rustdoc::broken_intra_doc_links)]

// inform build-system of the crates in this package
mod binning;
mod catalogue;
mod context;
mod error;
mod fft;
mod geometry;
mod mesh;
mod specfunc;
mod stats;

// pull in symbols that are visible outside of the package
pub use binning::Binning;
pub use catalogue::{Particle, ParticleCatalogue, PointSource};
pub use context::MemoryTracker;
pub use error::Error;
pub use geometry::GridGeometry;
pub use mesh::{AssignmentScheme, MeshConfig, MeshField, assignment_window};
pub use specfunc::{SphericalBessel, reduced_spherical_harmonic};
pub use stats::{FieldStats, PowerCorrection, shotnoise_aliasing};
