//! Per-band decomposition, unit conversion and parallel file output.
//!
//! SKEAF wants one band per file, energies in Ry and reciprocal vectors in
//! 2*pi/bohr, with the Fermi energy replaced by the value solved from the
//! requested electron count. The bands are independent, so the files are
//! written concurrently.

use std::{
    path::{
        Path,
        PathBuf,
    },
    str::FromStr,
};

use rayon::prelude::*;

use crate::{
    bxsf::{
        self,
        BandGrid,
    },
    constants::{
        EV_TO_RY,
        TPIBOHR_IN_INV_ANG,
    },
    error::Wan2SkeafError,
    traits::Result,
};

/// Target unit system of an exported band file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitSystem {
    /// Grid native units: eV energies, Angstrom^-1 reciprocal vectors.
    Native,
    /// SKEAF units: Ry energies, 2*pi/bohr reciprocal vectors.
    Skeaf,
}

impl UnitSystem {
    /// Factor applied to energies (eigenvalues and the Fermi level).
    pub fn energy_factor(&self) -> f64 {
        match self {
            UnitSystem::Native => 1.0,
            UnitSystem::Skeaf => EV_TO_RY,
        }
    }

    /// Factor applied to the reciprocal lattice vectors and the origin.
    pub fn recip_factor(&self) -> f64 {
        match self {
            UnitSystem::Native => 1.0,
            UnitSystem::Skeaf => 1.0 / TPIBOHR_IN_INV_ANG,
        }
    }
}

/// One pending band file: which band, which Fermi reference, which units.
/// Built once per band after the solve, consumed by the writer.
#[derive(Clone, Debug)]
pub struct BandOutputSpec {
    /// `BAND:` label in the source file, reused in the output name.
    pub label: i32,
    /// Solved Fermi energy in the grid's native unit (eV).
    pub fermi_energy: f64,
    pub units: UnitSystem,
}

/// Band selection as given on the command line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BandSelection {
    All,
    One(i32),
}

impl FromStr for BandSelection {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") || s == "-1" {
            return Ok(BandSelection::All);
        }
        s.parse::<i32>()
            .map(BandSelection::One)
            .map_err(|_| format!("band index must be an integer or 'all', got '{}'", s))
    }
}

impl BandSelection {
    /// Labels to export, in file order for `All`. A label absent from the
    /// file fails here, before anything is written.
    pub fn resolve(&self, grid: &BandGrid) -> Result<Vec<i32>> {
        match self {
            BandSelection::All => Ok(grid.band_labels.clone()),
            BandSelection::One(label) => {
                if grid.band_labels.contains(label) {
                    Ok(vec![*label])
                } else {
                    Err(Wan2SkeafError::BandNotFound {
                        requested: *label,
                        available: grid.band_labels.clone(),
                    }
                    .into())
                }
            },
        }
    }
}

/// `<prefix>_band_<label>.bxsf`. A trailing `.bxsf` on the prefix is
/// stripped so `-o skeaf.bxsf` and `-o skeaf` name the same files.
pub fn band_file_name(prefix: &str, label: i32) -> PathBuf {
    let stem = prefix.strip_suffix(".bxsf").unwrap_or(prefix);
    PathBuf::from(format!("{}_band_{}.bxsf", stem, label))
}

/// Writes one file per spec, fanned out over the rayon pool. The workers
/// share nothing but the immutable grid; the filenames are disjoint.
pub fn write_band_files(
    grid: &BandGrid,
    specs: Vec<BandOutputSpec>,
    prefix: &str,
) -> Result<Vec<PathBuf>> {
    specs
        .into_par_iter()
        .map(|spec| {
            let path = band_file_name(prefix, spec.label);
            write_one_band(grid, &spec, &path)?;
            Ok(path)
        })
        .collect::<Result<Vec<PathBuf>>>()
}

fn write_one_band(grid: &BandGrid, spec: &BandOutputSpec, path: &Path) -> Result<()> {
    let view = grid.band(spec.label)?;
    let energy_factor = spec.units.energy_factor();
    let recip_factor = spec.units.recip_factor();

    let values = view.mapv(|v| v * energy_factor);

    let mut origin = grid.origin;
    for v in origin.iter_mut() {
        *v *= recip_factor;
    }
    let mut cell = grid.cell;
    for row in cell.iter_mut() {
        for v in row.iter_mut() {
            *v *= recip_factor;
        }
    }

    bxsf::write_band_file(
        path,
        spec.label,
        values.view(),
        &origin,
        &cell,
        spec.fermi_energy * energy_factor,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_selection_parsing() {
        assert_eq!("all".parse::<BandSelection>().unwrap(), BandSelection::All);
        assert_eq!("ALL".parse::<BandSelection>().unwrap(), BandSelection::All);
        assert_eq!("-1".parse::<BandSelection>().unwrap(), BandSelection::All);
        assert_eq!("7".parse::<BandSelection>().unwrap(), BandSelection::One(7));
        assert!("seven".parse::<BandSelection>().is_err());
    }

    #[test]
    fn test_band_file_naming() {
        assert_eq!(band_file_name("skeaf", 3), PathBuf::from("skeaf_band_3.bxsf"));
        assert_eq!(band_file_name("skeaf.bxsf", 3), PathBuf::from("skeaf_band_3.bxsf"));
        assert_eq!(band_file_name("out/run", 12), PathBuf::from("out/run_band_12.bxsf"));
    }

    #[test]
    fn test_skeaf_unit_factors() {
        use crate::constants::{BOHR_TO_ANG, RY_TO_EV};

        let units = UnitSystem::Skeaf;
        assert!((units.energy_factor() - 1.0 / RY_TO_EV).abs() < 1e-15);
        let expected = BOHR_TO_ANG / (2.0 * std::f64::consts::PI);
        assert!((units.recip_factor() - expected).abs() < 1e-15);

        assert_eq!(UnitSystem::Native.energy_factor(), 1.0);
        assert_eq!(UnitSystem::Native.recip_factor(), 1.0);
    }
}
