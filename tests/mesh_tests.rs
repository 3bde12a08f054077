use meshpt::{
    AssignmentScheme, MemoryTracker, MeshConfig, MeshField, Particle, ParticleCatalogue,
    SphericalBessel, assignment_window,
};
use ndarray::Array2;
use num_complex::Complex64;
use rand::Rng;
use rand_xoshiro::Xoshiro256PlusPlus;
use rand_xoshiro::rand_core::SeedableRng;

#[cfg(test)]
mod tests {
    use super::*;

    // based on numpy!
    // https://numpy.org/doc/stable/reference/generated/numpy.isclose.html
    fn _isclose(actual: f64, ref_val: f64, rtol: f64, atol: f64) -> bool {
        let actual_nan = actual.is_nan();
        let ref_nan = ref_val.is_nan();
        if actual_nan || ref_nan {
            actual_nan && ref_nan
        } else {
            (actual - ref_val).abs() <= (atol + rtol * ref_val.abs())
        }
    }

    // positions are drawn away from the box faces so no kernel support
    // (including the interlaced half-cell shift) spills out of the buffer
    fn random_particles(n: usize, seed: u64) -> Vec<Particle> {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        (0..n)
            .map(|_| Particle {
                pos: [
                    rng.random_range(15.0..75.0),
                    rng.random_range(15.0..75.0),
                    rng.random_range(15.0..75.0),
                ],
                nz: 1e-4,
                ws: 1.,
                wc: 1.,
            })
            .collect()
    }

    fn config(scheme: AssignmentScheme, interlace: bool) -> MeshConfig {
        MeshConfig {
            boxsize: [100.; 3],
            ngrid: [8; 3],
            assignment: scheme,
            interlace,
        }
    }

    #[test]
    fn point_source_on_a_unit_box_has_a_flat_spectrum() {
        // one unit-weight particle at the centre of a 4^3 unit box paints
        // 1/dV = 64 into a single cell, and a single point source carries
        // the same magnitude at every Fourier mode
        let particles = [Particle {
            pos: [0.5; 3],
            nz: 0.,
            ws: 1.,
            wc: 1.,
        }];
        let catalogue = ParticleCatalogue::new(&particles).unwrap();

        let tracker = MemoryTracker::new();
        let mut mesh = MeshField::new(
            MeshConfig {
                boxsize: [1.; 3],
                ngrid: [4; 3],
                assignment: AssignmentScheme::Ngp,
                interlace: false,
            },
            &tracker,
        )
        .unwrap();
        mesh.compute_unweighted_field(&catalogue).unwrap();

        let nonzero: Vec<&Complex64> = mesh.values().iter().filter(|v| v.norm() > 0.).collect();
        assert_eq!(nonzero.len(), 1);
        assert!(_isclose(nonzero[0].re, 64., 1e-12, 0.));

        mesh.fourier_transform();
        for value in mesh.values() {
            assert!(_isclose(value.norm(), 1., 1e-12, 0.));
        }
    }

    #[test]
    fn transformed_zero_mode_is_the_total_weight() {
        // the zero mode of the transformed count field is the volume
        // integral of the painted density, i.e. the particle count; the
        // interlaced combine must leave it untouched (the phase is 1)
        let particles = random_particles(50, 91);
        let catalogue = ParticleCatalogue::new(&particles).unwrap();

        for interlace in [false, true] {
            let tracker = MemoryTracker::new();
            let mut mesh =
                MeshField::new(config(AssignmentScheme::Tsc, interlace), &tracker).unwrap();
            mesh.compute_unweighted_field(&catalogue).unwrap();
            mesh.fourier_transform();

            let dc = mesh.values()[0];
            assert!(
                _isclose(dc.re, 50., 1e-12, 1e-9),
                "interlace={interlace}: zero mode = {dc}"
            );
            assert!(dc.im.abs() < 1e-9);
        }
    }

    #[test]
    fn forward_then_inverse_recovers_the_painted_field() {
        let particles = random_particles(20, 7);
        let catalogue = ParticleCatalogue::new(&particles).unwrap();

        let tracker = MemoryTracker::new();
        let mut mesh = MeshField::new(config(AssignmentScheme::Cic, false), &tracker).unwrap();
        mesh.compute_unweighted_field(&catalogue).unwrap();
        let painted = mesh.values().to_vec();

        mesh.fourier_transform();
        mesh.inv_fourier_transform();

        for (after, before) in mesh.values().iter().zip(&painted) {
            assert!((after - before).norm() < 1e-9);
        }
    }

    #[test]
    fn fluctuations_of_identical_catalogues_cancel() {
        // with alpha = 1 and the same catalogue on both sides, the
        // data-minus-random combination must vanish identically
        let particles = random_particles(30, 3);
        let catalogue = ParticleCatalogue::new(&particles).unwrap();
        let los = Array2::<f64>::zeros((3, 30));

        let tracker = MemoryTracker::new();
        let mut mesh = MeshField::new(config(AssignmentScheme::Tsc, true), &tracker).unwrap();
        mesh.compute_ylm_wgtd_fluctuations(
            &catalogue,
            &catalogue,
            los.view(),
            los.view(),
            1.,
            0,
            0,
        )
        .unwrap();

        for value in mesh.values() {
            assert!(value.norm() < 1e-9);
        }
        for value in mesh.shadow_values().unwrap() {
            assert!(value.norm() < 1e-9);
        }
        // the random-catalogue scratch mesh must have been released
        assert_eq!(tracker.bytes_in_use(), 2 * 512 * 16);
    }

    #[test]
    fn monopole_density_is_the_scaled_count_field() {
        // for ell = 0 and unit weights the harmonic kernel is 1, so the
        // density builder reduces to alpha times the plain count field
        let particles = random_particles(25, 11);
        let catalogue = ParticleCatalogue::new(&particles).unwrap();
        let los = Array2::<f64>::zeros((3, 25));
        let alpha = 0.25;

        let tracker = MemoryTracker::new();
        let mut plain = MeshField::new(config(AssignmentScheme::Pcs, false), &tracker).unwrap();
        plain.compute_unweighted_field(&catalogue).unwrap();

        let mut weighted = MeshField::new(config(AssignmentScheme::Pcs, false), &tracker).unwrap();
        weighted
            .compute_ylm_wgtd_density(&catalogue, los.view(), alpha, 0, 0)
            .unwrap();

        for (w, p) in weighted.values().iter().zip(plain.values()) {
            assert!((*w - *p * alpha).norm() < 1e-12);
        }
    }

    #[test]
    fn misaligned_los_table_is_rejected() {
        let particles = random_particles(10, 5);
        let catalogue = ParticleCatalogue::new(&particles).unwrap();
        let los = Array2::<f64>::zeros((3, 9));

        let tracker = MemoryTracker::new();
        let mut mesh = MeshField::new(config(AssignmentScheme::Ngp, false), &tracker).unwrap();
        let result = mesh.compute_ylm_wgtd_density(&catalogue, los.view(), 1., 0, 0);
        assert!(result.is_err());
    }

    #[test]
    fn full_band_reconstruction_counts_every_mode() {
        let particles = random_particles(15, 23);
        let catalogue = ParticleCatalogue::new(&particles).unwrap();

        let tracker = MemoryTracker::new();
        let mut mesh = MeshField::new(config(AssignmentScheme::Ngp, false), &tracker).unwrap();
        mesh.compute_unweighted_field(&catalogue).unwrap();
        mesh.fourier_transform();

        let ylm = vec![Complex64::new(1., 0.); 512];
        let mut band = MeshField::new(config(AssignmentScheme::Ngp, false), &tracker).unwrap();

        // a slightly negative lower edge admits the zero mode; the upper
        // edge sits beyond the largest grid wavenumber (sqrt(3) k_Nyq)
        let (k_eff, nmodes) = band
            .inv_fourier_transform_band_limited(&mesh, &ylm, -1e-3, 10.)
            .unwrap();
        assert_eq!(nmodes, 512);
        assert!(k_eff > 0.);

        // an out-of-range band leaves the field zeroed
        let (k_eff, nmodes) = band
            .inv_fourier_transform_band_limited(&mesh, &ylm, 100., 200.)
            .unwrap();
        assert_eq!(nmodes, 0);
        assert_eq!(k_eff, 0.);
        assert!(band.values().iter().all(|v| v.norm() == 0.));

        // a mismatched harmonic table is a data error
        let short_ylm = vec![Complex64::new(1., 0.); 511];
        assert!(
            band.inv_fourier_transform_band_limited(&mesh, &short_ylm, -1e-3, 10.)
                .is_err()
        );
    }

    #[test]
    fn compensation_divides_out_the_window() {
        let tracker = MemoryTracker::new();
        let cfg = config(AssignmentScheme::Pcs, false);
        let mut mesh = MeshField::new(cfg, &tracker).unwrap();

        let geom = mesh.geometry().clone();
        for i in 0..8 {
            for j in 0..8 {
                for k in 0..8 {
                    let win = assignment_window(cfg.assignment, &geom, [i, j, k]);
                    mesh.values_mut()[geom.grid_index(i, j, k)] = Complex64::new(win, 0.);
                }
            }
        }

        mesh.apply_assignment_compensation();
        for value in mesh.values() {
            assert!(_isclose(value.re, 1., 1e-12, 0.));
            assert_eq!(value.im, 0.);
        }
    }

    #[test]
    fn bessel_weighted_reconstruction_of_window_modes() {
        // seed the Fourier buffer with the assignment window itself, so the
        // window-compensated modes are all exactly 1; with j_0(0) = 1 and a
        // unit harmonic table the reconstruction is then the inverse
        // transform of the constant 1/V, a zero-lag spike of height 1/dV
        let tracker = MemoryTracker::new();
        let cfg = config(AssignmentScheme::Tsc, false);
        let mut fourier = MeshField::new(cfg, &tracker).unwrap();

        let geom = fourier.geometry().clone();
        for i in 0..8 {
            for j in 0..8 {
                for k in 0..8 {
                    let win = assignment_window(cfg.assignment, &geom, [i, j, k]);
                    fourier.values_mut()[geom.grid_index(i, j, k)] = Complex64::new(win, 0.);
                }
            }
        }

        let ylm = vec![Complex64::new(1., 0.); 512];
        let sj = SphericalBessel::new(0);
        let mut recon = MeshField::new(cfg, &tracker).unwrap();
        recon
            .inv_fourier_transform_bessel_ylm_wgtd(&fourier, &ylm, &sj, 0.)
            .unwrap();

        let inv_vol_cell = 512. / 1e6;
        assert!(_isclose(recon.values()[0].re, inv_vol_cell, 1e-9, 0.));
        for value in &recon.values()[1..] {
            assert!(value.norm() < 1e-12);
        }
    }

    #[test]
    fn mismatched_weight_count_is_rejected() {
        let particles = random_particles(10, 17);
        let catalogue = ParticleCatalogue::new(&particles).unwrap();

        let tracker = MemoryTracker::new();
        let mut mesh = MeshField::new(config(AssignmentScheme::Cic, false), &tracker).unwrap();
        let weights = vec![Complex64::new(1., 0.); 9];
        assert!(mesh.assign_weighted_points(&catalogue, &weights).is_err());
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        let tracker = MemoryTracker::new();
        let bad = MeshConfig {
            boxsize: [100., 0., 100.],
            ngrid: [8; 3],
            assignment: AssignmentScheme::Ngp,
            interlace: false,
        };
        assert!(MeshField::new(bad, &tracker).is_err());
        assert_eq!(tracker.bytes_in_use(), 0);
    }
}
