//! Fermi level search over a fixed eigenvalue spectrum.
//!
//! Given the deduplicated eigenvalues of a band grid, the electron count at
//! a trial Fermi energy is
//!
//! `N(e) = prefactor * sum_i occupation(eig_i - e)`
//!
//! which is non-decreasing in `e` for every smearing variant, so the target
//! count is found by plain bisection on a bracket around the spectrum.

use log::debug;

use crate::{
    error::Wan2SkeafError,
    smearing::Smearing,
};

/// Default tolerance on `|N(e) - target|`, in electrons.
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

/// Bracket expansion attempts before the target is declared unreachable.
const MAX_EXPANSIONS: usize = 64;

/// Bisection iteration budget.
const MAX_BISECTIONS: usize = 200;

/// One Fermi-level search: the reduced eigenvalue set plus the occupation
/// model and the electron-count target.
#[derive(Debug, Clone)]
pub struct FermiSolveRequest<'a> {
    /// Eigenvalues with the periodic duplicates already removed, any order.
    pub eigenvalues: &'a [f64],
    /// Target electron count.
    pub num_electrons: f64,
    pub smearing: Smearing,
    /// Spin degeneracy: 2 without spin-orbit coupling, 1 with.
    pub prefactor: u32,
    /// Acceptable `|N(e) - target|`.
    pub tolerance: f64,
}

/// Solved Fermi level with convergence diagnostics.
#[derive(Debug, Clone)]
pub struct FermiLevel {
    /// Solved Fermi energy, in the unit of the input eigenvalues.
    pub fermi_energy: f64,
    /// Electron count actually achieved at `fermi_energy`.
    pub num_electrons: f64,
    /// Bisection steps taken.
    pub iterations: usize,
    /// Closest eigenvalue strictly below the Fermi energy.
    pub below: Option<f64>,
    /// Closest eigenvalue strictly above the Fermi energy.
    pub above: Option<f64>,
}

impl FermiSolveRequest<'_> {
    /// Electron count at a trial Fermi energy.
    pub fn electron_count(&self, fermi: f64) -> f64 {
        self.prefactor as f64
            * self.eigenvalues
                .iter()
                .map(|&e| self.smearing.occupation(e - fermi))
                .sum::<f64>()
    }

    /// Bisects `N(e) = num_electrons` for the Fermi energy `e`.
    ///
    /// The bracket starts at the spectrum extremes and is widened with
    /// doubling pads while the target lies outside `[N(lower), N(upper)]`.
    /// With a step-like occupation the count can jump across the target
    /// without ever landing inside the tolerance; once the bracket has
    /// collapsed to floating-point resolution on such a jump the midpoint is
    /// accepted as converged and the residual is left in
    /// [`FermiLevel::num_electrons`] for the caller to report.
    pub fn solve(&self) -> Result<FermiLevel, Wan2SkeafError> {
        if self.eigenvalues.is_empty() {
            return Err(Wan2SkeafError::DegenerateInput);
        }

        let target = self.num_electrons;
        let (emin, emax) = self
            .eigenvalues
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &e| {
                (lo.min(e), hi.max(e))
            });

        let mut lower = emin;
        let mut upper = emax;
        let mut n_lower = self.electron_count(lower);
        let mut n_upper = self.electron_count(upper);

        let pad0 = ((emax - emin) * 0.5)
            .max(4.0 * self.smearing.width())
            .max(0.01);

        let mut pad = pad0;
        for _ in 0 .. MAX_EXPANSIONS {
            if n_upper >= target {
                break;
            }
            upper += pad;
            pad *= 2.0;
            n_upper = self.electron_count(upper);
        }

        let mut pad = pad0;
        for _ in 0 .. MAX_EXPANSIONS {
            if n_lower <= target {
                break;
            }
            lower -= pad;
            pad *= 2.0;
            n_lower = self.electron_count(lower);
        }

        if n_upper < target || n_lower > target {
            let achieved = if n_upper < target { n_upper } else { n_lower };
            return Err(Wan2SkeafError::Convergence {
                lower,
                upper,
                achieved,
                target,
                residual: (achieved - target).abs(),
            });
        }

        let mut iterations = 0;
        let (fermi, achieved) = loop {
            iterations += 1;
            let fermi = 0.5 * (lower + upper);
            let achieved = self.electron_count(fermi);

            if (achieved - target).abs() <= self.tolerance {
                break (fermi, achieved);
            }

            // Bracket at floating-point resolution: the occupation jumps
            // across the target here.
            if upper - lower <= 4.0 * f64::EPSILON * fermi.abs().max(1.0) {
                debug!("Bisection landed on an occupation jump at {} after {} steps, \
                        residual = {:e}",
                       fermi, iterations, (achieved - target).abs());
                break (fermi, achieved);
            }

            if iterations == MAX_BISECTIONS {
                return Err(Wan2SkeafError::Convergence {
                    lower,
                    upper,
                    achieved,
                    target,
                    residual: (achieved - target).abs(),
                });
            }

            if achieved < target {
                lower = fermi;
            } else {
                upper = fermi;
            }
        };

        let (below, above) = closest_neighbours(self.eigenvalues, fermi);
        Ok(FermiLevel {
            fermi_energy: fermi,
            num_electrons: achieved,
            iterations,
            below,
            above,
        })
    }
}

/// Closest eigenvalues strictly below and strictly above `fermi`.
fn closest_neighbours(eigenvalues: &[f64], fermi: f64) -> (Option<f64>, Option<f64>) {
    let mut below = None;
    let mut above = None;
    for &e in eigenvalues {
        if e < fermi && below.map_or(true, |b| e > b) {
            below = Some(e);
        }
        if e > fermi && above.map_or(true, |a| e < a) {
            above = Some(e);
        }
    }
    (below, above)
}
