use std::path::PathBuf;

use thiserror::Error;

/// Failure modes of the BXSF preparation pipeline.
///
/// Everything is fatal: the pipeline never retries on its own, a
/// non-converging solve is a configuration problem (smearing width, electron
/// count), not a transient fault.
#[derive(Error, Debug)]
pub enum Wan2SkeafError {
    /// Malformed or incomplete grid file.
    #[error("invalid bxsf: {0}")]
    Format(String),

    #[error("unknown smearing type '{0}', supported: none, fd, fermi-dirac, cold, mv, marzari-vanderbilt")]
    UnsupportedSmearing(String),

    #[error("smearing width must be non-negative, got {0}")]
    NegativeSmearingWidth(f64),

    /// Nothing left to count after dropping the periodic boundary planes.
    #[error("no eigenvalues left after removing the duplicated boundary planes")]
    DegenerateInput,

    /// The bisection could not bracket or reach the electron-count target.
    #[error("Failed to find Fermi energy within tolerance, Δn_elec = {residual:e} \
             (bracket [{lower}, {upper}], N = {achieved}, target = {target})")]
    Convergence {
        lower: f64,
        upper: f64,
        achieved: f64,
        target: f64,
        residual: f64,
    },

    #[error("band {requested} not found in bxsf, available bands: {available:?}")]
    BandNotFound {
        requested: i32,
        available: Vec<i32>,
    },

    /// Mapped to process exit code 2 in `main` for the calling workflow.
    #[error("input file {0:?} does not exist")]
    InputNotFound(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
