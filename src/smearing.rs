//! Occupation (smearing) functions for counting electrons on a finite grid.
//!
//! A sharp Fermi step on a coarse eigenvalue grid makes the electron count a
//! staircase in the trial Fermi energy; smearing replaces the step with a
//! smooth monotone curve so the bisection in [`crate::fermi`] has something
//! to grip.

use std::f64::consts::{
    FRAC_1_SQRT_2,
    PI,
};

use log::warn;

use crate::error::Wan2SkeafError;

/// Floor applied to the width of the smooth kinds so that `width = 0`
/// degrades to a numerical step function instead of dividing by zero.
const WIDTH_FLOOR: f64 = 1e-30;

/// Occupation model for a single state at energy offset `x = e - e_fermi`.
///
/// The variant is fixed when the run is configured; the solve loop only ever
/// sees a concrete branch, no string dispatch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Smearing {
    /// Sharp step: fully occupied below the Fermi level, empty above.
    None,
    /// Fermi-Dirac distribution with width sigma, in the eigenvalue unit.
    FermiDirac(f64),
    /// Marzari-Vanderbilt cold smearing with width sigma.
    ///
    /// The textbook curve overshoots 1 slightly on the occupied side
    /// (around `x = -sqrt(2)*sigma`); the occupation is clamped to `[0, 1]`,
    /// which removes the overshoot and keeps the curve monotone as the
    /// bisection requires.
    Cold(f64),
}

impl Smearing {
    /// Parses a smearing selection as it appears on the command line.
    pub fn new(kind: &str, width: f64) -> Result<Self, Wan2SkeafError> {
        if width < 0.0 {
            return Err(Wan2SkeafError::NegativeSmearingWidth(width));
        }

        match kind.to_lowercase().as_str() {
            "none" => {
                if width > 0.0 {
                    warn!("Smearing width {} is ignored for 'none' smearing.", width);
                }
                Ok(Smearing::None)
            },
            "fd" | "fermi-dirac" | "fermi_dirac" => Ok(Smearing::FermiDirac(width)),
            "cold" | "mv" | "marzari-vanderbilt" | "marzari_vanderbilt" => Ok(Smearing::Cold(width)),
            _ => Err(Wan2SkeafError::UnsupportedSmearing(kind.to_string())),
        }
    }

    /// Fraction of a state occupied at offset `x`, in `[0, 1]`.
    ///
    /// Monotone non-increasing in `x` for every variant; `None` jumps at 0.
    pub fn occupation(&self, x: f64) -> f64 {
        match *self {
            Smearing::None => {
                if x < 0.0 { 1.0 } else { 0.0 }
            },
            Smearing::FermiDirac(sigma) => {
                let t = x / sigma.max(WIDTH_FLOOR);
                1.0 / (1.0 + t.exp())
            },
            Smearing::Cold(sigma) => {
                let y = x / sigma.max(WIDTH_FLOOR) + FRAC_1_SQRT_2;
                let occ = 0.5 * libm::erfc(y) + (-y * y).exp() / (2.0 * PI).sqrt();
                occ.clamp(0.0, 1.0)
            },
        }
    }

    /// Width parameter as configured, zero for `None`.
    pub fn width(&self) -> f64 {
        match *self {
            Smearing::None => 0.0,
            Smearing::FermiDirac(w) | Smearing::Cold(w) => w,
        }
    }

    /// Canonical name used in reports.
    pub fn label(&self) -> &'static str {
        match self {
            Smearing::None => "none",
            Smearing::FermiDirac(_) => "fermi-dirac",
            Smearing::Cold(_) => "cold",
        }
    }
}
