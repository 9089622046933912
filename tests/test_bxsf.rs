use std::fs;
use std::io::Write;

use approx::assert_abs_diff_eq;
use flate2::write::GzEncoder;
use flate2::Compression;
use tempdir::TempDir;

use wan2skeaf::{
    bxsf::BandGrid,
    constants::{
        EV_TO_RY,
        TPIBOHR_IN_INV_ANG,
    },
    export::{
        self,
        BandOutputSpec,
        BandSelection,
        UnitSystem,
    },
    fermi::{
        FermiSolveRequest,
        DEFAULT_TOLERANCE,
    },
    smearing::Smearing,
    traits::Result,
};

// Three bands on a 3x3x2 general grid. The last plane along every axis
// duplicates the first, so the unique mesh is 2x2x1 and each band
// contributes four eigenvalues. Band gaps sit at [-0.5, 0.5] and [2.0, 3.0].
const WANNIER90_SAMPLE: &str = r#" BEGIN_INFO
   #
   # Case: three band toy metal
   #
   Fermi Energy:     0.1230
 END_INFO

 BEGIN_BLOCK_BANDGRID_3D
 band_energies
   BEGIN_BANDGRID_3D_fermi
     3
     3 3 2
     0.0 0.0 0.0
     1.0 0.0 0.0
     0.0 1.0 0.0
     0.0 0.0 1.0
   BAND:   1
     -2.0 -2.0 -1.5 -1.5 -2.0 -2.0
     -1.0 -1.0 -0.5 -0.5 -1.0 -1.0
     -2.0 -2.0 -1.5 -1.5 -2.0 -2.0
   BAND:   2
      0.5  0.5  1.0  1.0  0.5  0.5
      1.5  1.5  2.0  2.0  1.5  1.5
      0.5  0.5  1.0  1.0  0.5  0.5
   BAND:   3
      3.0  3.0  3.5  3.5  3.0  3.0
      4.0  4.0  4.5  4.5  4.0  4.0
      3.0  3.0  3.5  3.5  3.0  3.0
   END_BANDGRID_3D
 END_BLOCK_BANDGRID_3D
"#;


#[test]
fn test_read_wannier90_file() -> Result<()> {
    let tmpdir = TempDir::new("wan2skeaf_test")?;
    let path = tmpdir.path().join("grid.bxsf");
    fs::write(&path, WANNIER90_SAMPLE)?;

    let grid = BandGrid::from_file(&path)?;
    assert_eq!(grid.efermi, 0.123);
    assert_eq!(grid.band_labels, vec![1, 2, 3]);
    assert_eq!(grid.ngrid, [3, 3, 2]);
    assert_eq!(grid.origin, [0.0, 0.0, 0.0]);
    assert_eq!(grid.cell, [[1.0, 0.0, 0.0],
                           [0.0, 1.0, 0.0],
                           [0.0, 0.0, 1.0]]);
    assert_eq!(grid.bands[[0, 0, 0, 0]], -2.0);
    assert_eq!(grid.bands[[1, 1, 1, 1]], 2.0);
    assert_eq!(grid.bands[[2, 2, 2, 1]], 3.0);

    assert_eq!(grid.reduced_ngrid(), [2, 2, 1]);
    let mut eigenvalues = grid.reduced_eigenvalues();
    eigenvalues.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert_eq!(eigenvalues, vec![-2.0, -1.5, -1.0, -0.5,
                                  0.5,  1.0,  1.5,  2.0,
                                  3.0,  3.5,  4.0,  4.5]);
    Ok(())
}


#[test]
fn test_gzipped_input_parses_the_same() -> Result<()> {
    let tmpdir = TempDir::new("wan2skeaf_test")?;
    let gz_path = tmpdir.path().join("grid.bxsf.gz");

    let mut encoder = GzEncoder::new(fs::File::create(&gz_path)?, Compression::default());
    encoder.write_all(WANNIER90_SAMPLE.as_bytes())?;
    encoder.finish()?;

    let from_gz = BandGrid::from_file(&gz_path)?;
    let from_txt = BandGrid::from_str(WANNIER90_SAMPLE)?;
    assert_eq!(from_gz.efermi, from_txt.efermi);
    assert_eq!(from_gz.band_labels, from_txt.band_labels);
    assert_eq!(from_gz.bands, from_txt.bands);
    Ok(())
}


// A 2x2x2 grid where every far plane duplicates plane 0 holds a single
// unique state; one electron with prefactor 1 puts the level just above it.
#[test]
fn test_fully_duplicated_grid_reduces_to_single_state() -> Result<()> {
    let txt = r#"BEGIN_INFO
  Fermi Energy: 0.0
END_INFO
BEGIN_BLOCK_BANDGRID_3D
band_energies
BEGIN_BANDGRID_3D_fermi
1
2 2 2
0.0 0.0 0.0
1.0 0.0 0.0
0.0 1.0 0.0
0.0 0.0 1.0
BAND: 1
-1.0 -1.0 -1.0 -1.0
-1.0 -1.0 -1.0 -1.0
END_BANDGRID_3D
END_BLOCK_BANDGRID_3D
"#;
    let grid = BandGrid::from_str(txt)?;
    assert_eq!(grid.ngrid, [2, 2, 2]);
    assert_eq!(grid.reduced_ngrid(), [1, 1, 1]);
    let eigenvalues = grid.reduced_eigenvalues();
    assert_eq!(eigenvalues, vec![-1.0]);

    let level = FermiSolveRequest {
        eigenvalues: &eigenvalues,
        num_electrons: 1.0,
        smearing: Smearing::new("none", 0.0)?,
        prefactor: 1,
        tolerance: DEFAULT_TOLERANCE,
    }.solve()?;

    assert!(level.fermi_energy > -1.0 && level.fermi_energy < -0.98);
    assert_eq!(level.num_electrons, 1.0);
    assert_eq!(level.below, Some(-1.0));
    assert_eq!(level.above, None);
    Ok(())
}


// Eight electrons with prefactor 2 fill the four states of band 1, so the
// bisection lands inside the first gap.
#[test]
fn test_single_band_export_for_skeaf() -> Result<()> {
    let grid = BandGrid::from_str(WANNIER90_SAMPLE)?;
    let eigenvalues = grid.reduced_eigenvalues();

    let level = FermiSolveRequest {
        eigenvalues: &eigenvalues,
        num_electrons: 8.0,
        smearing: Smearing::new("none", 0.0)?,
        prefactor: 2,
        tolerance: DEFAULT_TOLERANCE,
    }.solve()?;

    assert_abs_diff_eq!(level.fermi_energy, -0.375, epsilon = 1e-12);
    assert_eq!(level.num_electrons, 8.0);
    assert_eq!(level.below, Some(-0.5));
    assert_eq!(level.above, Some(0.5));

    let tmpdir = TempDir::new("wan2skeaf_test")?;
    let prefix = tmpdir.path().join("run");
    let labels = BandSelection::One(1).resolve(&grid)?;
    let specs = labels.iter()
        .map(|&label| BandOutputSpec {
            label,
            fermi_energy: level.fermi_energy,
            units: UnitSystem::Skeaf,
        })
        .collect::<Vec<_>>();
    let written = export::write_band_files(&grid, specs, prefix.to_str().unwrap())?;

    assert_eq!(written.len(), 1);
    assert!(written[0].ends_with("run_band_1.bxsf"));
    assert!(tmpdir.path().join("run_band_1.bxsf").is_file());
    assert!(!tmpdir.path().join("run_band_2.bxsf").exists());
    assert!(!tmpdir.path().join("run_band_3.bxsf").exists());

    let reread = BandGrid::from_file(&written[0])?;
    assert_eq!(reread.band_labels, vec![1]);
    assert_eq!(reread.ngrid, [3, 3, 2]);
    assert_abs_diff_eq!(reread.efermi, -0.375 * EV_TO_RY, epsilon = 1e-9);
    assert_abs_diff_eq!(reread.bands[[0, 0, 0, 0]], -2.0 * EV_TO_RY, epsilon = 1e-12);
    assert_abs_diff_eq!(reread.bands[[0, 1, 1, 1]], -0.5 * EV_TO_RY, epsilon = 1e-12);
    assert_abs_diff_eq!(reread.cell[0][0], 1.0 / TPIBOHR_IN_INV_ANG, epsilon = 1e-9);
    assert_abs_diff_eq!(reread.cell[1][1], 1.0 / TPIBOHR_IN_INV_ANG, epsilon = 1e-9);
    assert_eq!(reread.origin, [0.0, 0.0, 0.0]);
    Ok(())
}


// The Fortran reader in SKEAF chokes on indented value lines, make sure the
// band block is written flush left.
#[test]
fn test_band_block_lines_are_flush_left() -> Result<()> {
    let grid = BandGrid::from_str(WANNIER90_SAMPLE)?;
    let tmpdir = TempDir::new("wan2skeaf_test")?;
    let prefix = tmpdir.path().join("skeaf");

    let specs = vec![BandOutputSpec {
        label: 2,
        fermi_energy: 0.0,
        units: UnitSystem::Skeaf,
    }];
    let written = export::write_band_files(&grid, specs, prefix.to_str().unwrap())?;
    let content = fs::read_to_string(&written[0])?;

    let mut in_band_block = false;
    for line in content.lines() {
        if line.trim_start().starts_with("BAND:") || in_band_block {
            in_band_block = true;
            if line.trim_start().starts_with("END_BANDGRID_3D") {
                break;
            }
            assert!(!line.starts_with(' ') && !line.starts_with('\t'),
                    "indented line in band block: {:?}", line);
        }
    }
    assert!(in_band_block);
    Ok(())
}


#[test]
fn test_export_overwrites_stale_file() -> Result<()> {
    let grid = BandGrid::from_str(WANNIER90_SAMPLE)?;
    let tmpdir = TempDir::new("wan2skeaf_test")?;
    let prefix = tmpdir.path().join("skeaf");

    let spec = BandOutputSpec {
        label: 3,
        fermi_energy: 1.0,
        units: UnitSystem::Native,
    };
    let first = export::write_band_files(&grid, vec![spec.clone()], prefix.to_str().unwrap())?;
    let stale = fs::read_to_string(&first[0])?;

    let spec = BandOutputSpec { fermi_energy: 2.0, ..spec };
    let second = export::write_band_files(&grid, vec![spec], prefix.to_str().unwrap())?;
    assert_eq!(first, second);

    let fresh = fs::read_to_string(&second[0])?;
    assert_ne!(stale, fresh);
    let reread = BandGrid::from_file(&second[0])?;
    assert_eq!(reread.efermi, 2.0);

    // no partial temp file left behind
    let leftovers = fs::read_dir(tmpdir.path())?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().map(|x| x == "part").unwrap_or(false))
        .count();
    assert_eq!(leftovers, 0);
    Ok(())
}
