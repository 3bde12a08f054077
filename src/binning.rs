//! The binning specification consumed by the binned estimators.
//!
//! Bin edges and centres are built by the driver (linear, logarithmic,
//! padded, ...); this module only validates and carries them. Note that the
//! estimators bin by `lower < coord <= upper`, i.e. intervals exclude the
//! left edge, so a mode sitting exactly on `edges[0]` (the zero mode when
//! `edges[0] == 0`) falls outside every bin.

use crate::error::Error;

/// An ordered sequence of bin edges with their nominal bin centres.
#[derive(Clone, Debug)]
pub struct Binning {
    bin_edges: Vec<f64>,
    bin_centres: Vec<f64>,
}

impl Binning {
    /// Validate and take ownership of a binning specification.
    ///
    /// Requires at least two finite, strictly increasing edges and exactly
    /// one centre per bin.
    pub fn new(bin_edges: Vec<f64>, bin_centres: Vec<f64>) -> Result<Binning, Error> {
        if bin_edges.len() < 2 {
            return Err(Error::invalid_data(
                "a minimum of two bin edges are required".to_string(),
            ));
        }
        if bin_edges.iter().any(|&x| !x.is_finite()) {
            return Err(Error::invalid_data("bin edges must be finite".to_string()));
        }
        for i in 1..bin_edges.len() {
            if bin_edges[i] <= bin_edges[i - 1] {
                return Err(Error::invalid_data(
                    "bin edges must be in strictly increasing order".to_string(),
                ));
            }
        }
        if bin_centres.len() != bin_edges.len() - 1 {
            return Err(Error::invalid_data(format!(
                "expected {} bin centres for {} edges, got {}",
                bin_edges.len() - 1,
                bin_edges.len(),
                bin_centres.len()
            )));
        }

        Ok(Binning {
            bin_edges,
            bin_centres,
        })
    }

    pub fn num_bins(&self) -> usize {
        self.bin_centres.len()
    }

    pub fn edges(&self) -> &[f64] {
        &self.bin_edges
    }

    pub fn centres(&self) -> &[f64] {
        &self.bin_centres
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear(min: f64, max: f64, n_bins: usize) -> Binning {
        let width = (max - min) / n_bins as f64;
        let edges: Vec<f64> = (0..=n_bins).map(|i| min + i as f64 * width).collect();
        let centres: Vec<f64> = (0..n_bins).map(|i| min + (i as f64 + 0.5) * width).collect();
        Binning::new(edges, centres).unwrap()
    }

    #[test]
    fn invalid_creation() {
        // not enough edges
        assert!(Binning::new(vec![0.0], vec![]).is_err());
        // unsorted edges
        assert!(Binning::new(vec![2.0, 1.0], vec![1.5]).is_err());
        assert!(Binning::new(vec![0.0, 3.0, 2.0], vec![1.5, 2.5]).is_err());
        // non-finite edges
        assert!(Binning::new(vec![f64::NAN, 1.0], vec![0.5]).is_err());
        assert!(Binning::new(vec![0.0, f64::INFINITY], vec![0.5]).is_err());
        // centre count mismatch
        assert!(Binning::new(vec![0.0, 1.0, 2.0], vec![0.5]).is_err());
    }

    #[test]
    fn valid_creation() {
        let binning = linear(0.0, 10.0, 5);
        assert_eq!(binning.num_bins(), 5);
        assert_eq!(binning.edges().len(), 6);
        assert_eq!(binning.centres()[0], 1.0);
        assert_eq!(binning.centres()[4], 9.0);
    }
}
