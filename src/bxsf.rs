//! Reader and writer for XCrySDen band-grid (BXSF) files.
//!
//! This is the format Wannier90's `fermi_surface_plot` emits and SKEAF
//! consumes: an `INFO` section with the Fermi energy, a `BANDGRID_3D` block
//! with the grid dimensions, origin and the three reciprocal lattice
//! vectors, then one flat eigenvalue block per band in row-major
//! `(band, x, y, z)` order with `z` running fastest.
//!
//! Grids are "general grids": the last plane along each axis repeats plane 0
//! so that visualisation tools can close the periodic surface. Any
//! statistics (electron counts, extrema) must drop those planes first, which
//! is what [`BandGrid::reduced_eigenvalues`] does; the full grid is kept for
//! re-emission.

use std::{
    fs,
    io::Read,
    path::Path,
};

use anyhow::Context;
use flate2::read::GzDecoder;
use itertools::iproduct;
use log::{
    info,
    warn,
};
use ndarray::{
    ArrayView3,
    Axis,
};
use regex::Regex;

use crate::{
    error::Wan2SkeafError,
    traits::Result,
    types::{
        Grid4,
        Mat33,
        V3,
    },
};

/// Eigenvalue tokens per output line.
const VALUES_PER_LINE: usize = 6;

/// One parsed band grid, still in the file's native units (eV, Angstrom^-1)
/// and still carrying the duplicated periodic boundary planes.
#[derive(Clone, Debug)]
pub struct BandGrid {
    /// `BAND:` labels in file order, kept verbatim for selection and output
    /// naming.
    pub band_labels: Vec<i32>,
    /// Full grid dimensions, boundary planes included.
    pub ngrid: [usize; 3],
    pub origin: V3<f64>,
    /// Reciprocal lattice vectors, one per row.
    pub cell: Mat33<f64>,
    /// Fermi energy stated in the file header, informational only.
    pub efermi: f64,
    /// Eigenvalues indexed `[band, x, y, z]`.
    pub bands: Grid4<f64>,
}

impl BandGrid {
    /// Reads a bxsf file; a `.gz` path is decompressed on the fly.
    pub fn from_file(path: &(impl AsRef<Path> + ?Sized)) -> Result<Self> {
        let path = path.as_ref();
        let txt = if path.extension().map(|e| e == "gz").unwrap_or(false) {
            let mut s = String::new();
            GzDecoder::new(fs::File::open(path)?).read_to_string(&mut s)?;
            s
        } else {
            fs::read_to_string(path)?
        };
        Self::from_str(&txt)
            .with_context(|| format!("Failed to parse bxsf file {:?}", path))
    }

    /// Parses the full text of a bxsf file.
    ///
    /// The band-grid section is read as a stream of whitespace-separated
    /// tokens, so any line layout of the eigenvalue blocks is accepted.
    pub fn from_str(txt: &str) -> Result<Self> {
        let fermi_regex = Regex::new(r"Fermi Energy:\s*(\S+)").unwrap();
        let efermi = match fermi_regex.captures(txt) {
            Some(cap) => cap[1].parse::<f64>().map_err(|_| {
                Wan2SkeafError::Format(format!("cannot parse Fermi energy from '{}'", &cap[1]))
            })?,
            None => {
                return Err(Wan2SkeafError::Format(
                    "no 'Fermi Energy:' field in the INFO section".to_string(),
                ).into())
            },
        };

        let grid_start = txt.find("BEGIN_BANDGRID_3D").ok_or_else(|| {
            Wan2SkeafError::Format("no BEGIN_BANDGRID_3D section".to_string())
        })?;
        let mut tokens = txt[grid_start ..].split_whitespace();
        tokens.next(); // the BEGIN_BANDGRID_3D_* marker itself

        let nbands = next_usize(&mut tokens, "number of bands")?;
        let nx = next_usize(&mut tokens, "grid dimension nx")?;
        let ny = next_usize(&mut tokens, "grid dimension ny")?;
        let nz = next_usize(&mut tokens, "grid dimension nz")?;
        if nbands == 0 || nx == 0 || ny == 0 || nz == 0 {
            return Err(Wan2SkeafError::Format(format!(
                "degenerate grid declaration: {} bands, {}x{}x{} points", nbands, nx, ny, nz
            )).into());
        }

        let mut origin = [0.0f64; 3];
        for v in origin.iter_mut() {
            *v = next_f64(&mut tokens, "origin")?;
        }
        let mut cell = [[0.0f64; 3]; 3];
        for row in cell.iter_mut() {
            for v in row.iter_mut() {
                *v = next_f64(&mut tokens, "reciprocal lattice vector")?;
            }
        }

        let npoints = nx * ny * nz;
        let mut band_labels = Vec::with_capacity(nbands);
        let mut values = Vec::with_capacity(nbands * npoints);

        for iband in 0 .. nbands {
            let tok = next_token(&mut tokens, "BAND: header")?;
            let label = if tok == "BAND:" {
                next_token(&mut tokens, "band label")?
            } else if let Some(rest) = tok.strip_prefix("BAND:") {
                rest
            } else if tok == "END_BANDGRID_3D" {
                return Err(Wan2SkeafError::Format(format!(
                    "file declares {} bands but only {} BAND blocks found", nbands, iband
                )).into());
            } else {
                return Err(Wan2SkeafError::Format(format!(
                    "expected a BAND: header, found '{}'", tok
                )).into());
            };
            let label = label.parse::<i32>().map_err(|_| {
                Wan2SkeafError::Format(format!("cannot parse band label from '{}'", label))
            })?;
            band_labels.push(label);

            for _ in 0 .. npoints {
                values.push(next_f64(&mut tokens, "eigenvalue")?);
            }
        }

        match tokens.next() {
            Some("END_BANDGRID_3D") => {},
            Some(tok) => {
                return Err(Wan2SkeafError::Format(format!(
                    "expected END_BANDGRID_3D after {} bands of {} values, found '{}'",
                    nbands, npoints, tok
                )).into())
            },
            None => {
                return Err(Wan2SkeafError::Format(
                    "missing END_BANDGRID_3D".to_string(),
                ).into())
            },
        }

        let bands = Grid4::from_shape_vec((nbands, nx, ny, nz), values).map_err(|e| {
            Wan2SkeafError::Format(format!("eigenvalue block does not match grid shape: {}", e))
        })?;

        Ok(Self {
            band_labels,
            ngrid: [nx, ny, nz],
            origin,
            cell,
            efermi,
            bands,
        })
    }

    /// Grid shape with the duplicated boundary plane dropped from every axis
    /// that carries one.
    pub fn reduced_ngrid(&self) -> [usize; 3] {
        let mut reduced = self.ngrid;
        for axis in 0 .. 3 {
            if self.axis_has_duplicate_boundary(axis) {
                reduced[axis] -= 1;
            }
        }
        reduced
    }

    /// Whether the last plane along `axis` repeats plane 0 (general-grid
    /// convention). Single-plane axes count as already reduced, which makes
    /// the reduction idempotent.
    fn axis_has_duplicate_boundary(&self, axis: usize) -> bool {
        let n = self.ngrid[axis];
        if n < 2 {
            return false;
        }
        let first = self.bands.index_axis(Axis(axis + 1), 0);
        let last = self.bands.index_axis(Axis(axis + 1), n - 1);
        first == last
    }

    /// Eigenvalue multiset over the reduced index ranges, all bands.
    ///
    /// This is the set every statistic must run on; the duplicated boundary
    /// planes would double-count the zone-edge states.
    pub fn reduced_eigenvalues(&self) -> Vec<f64> {
        let [rx, ry, rz] = self.reduced_ngrid();
        let nbands = self.band_labels.len();
        let mut out = Vec::with_capacity(nbands * rx * ry * rz);
        for (ib, ix, iy, iz) in iproduct!(0 .. nbands, 0 .. rx, 0 .. ry, 0 .. rz) {
            out.push(self.bands[[ib, ix, iy, iz]]);
        }
        out
    }

    /// View of one band's full (non-reduced) grid, selected by its `BAND:`
    /// label.
    pub fn band(&self, label: i32) -> Result<ArrayView3<'_, f64>> {
        let pos = self
            .band_labels
            .iter()
            .position(|&b| b == label)
            .ok_or_else(|| Wan2SkeafError::BandNotFound {
                requested: label,
                available: self.band_labels.clone(),
            })?;
        Ok(self.bands.index_axis(Axis(0), pos))
    }

    /// Min and max eigenvalue of one band. The duplicated boundary planes
    /// only repeat interior values, so the full grid gives the same answer
    /// as the reduced one.
    pub fn band_min_max(&self, label: i32) -> Result<(f64, f64)> {
        let view = self.band(label)?;
        let (mut min, mut max) = (f64::INFINITY, f64::NEG_INFINITY);
        for &v in view.iter() {
            min = min.min(v);
            max = max.max(v);
        }
        Ok((min, max))
    }
}

fn next_token<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
    what: &str,
) -> std::result::Result<&'a str, Wan2SkeafError> {
    tokens.next().ok_or_else(|| {
        Wan2SkeafError::Format(format!("unexpected end of file, expected {}", what))
    })
}

fn next_usize<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
    what: &str,
) -> std::result::Result<usize, Wan2SkeafError> {
    let tok = next_token(tokens, what)?;
    tok.parse::<usize>().map_err(|_| {
        Wan2SkeafError::Format(format!("cannot parse {} from '{}'", what, tok))
    })
}

fn next_f64<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
    what: &str,
) -> std::result::Result<f64, Wan2SkeafError> {
    let tok = next_token(tokens, what)?;
    let val = tok.parse::<f64>().map_err(|_| {
        Wan2SkeafError::Format(format!("cannot parse {} from '{}'", what, tok))
    })?;
    if !val.is_finite() {
        return Err(Wan2SkeafError::Format(format!("non-finite {} '{}'", what, tok)));
    }
    Ok(val)
}

/// Serialises a single band to bxsf text.
///
/// The caller passes everything already in the unit system wanted on disk.
/// Eigenvalue and `BAND:` lines carry no leading whitespace: the downstream
/// Fortran reader chokes on indented value lines.
pub fn format_band(
    label: i32,
    values: ArrayView3<'_, f64>,
    origin: &V3<f64>,
    cell: &Mat33<f64>,
    efermi: f64,
) -> String {
    let (nx, ny, nz) = values.dim();
    let mut out = String::with_capacity(values.len() * 20 + 512);

    out.push_str("BEGIN_INFO\n");
    out.push_str("  #\n");
    out.push_str("  # Band grid prepared for extremal-orbit analysis.\n");
    out.push_str("  #\n");
    out.push_str(&format!("  Fermi Energy: {:18.10}\n", efermi));
    out.push_str("END_INFO\n\n");

    out.push_str("BEGIN_BLOCK_BANDGRID_3D\n");
    out.push_str("band_energies\n");
    out.push_str("BEGIN_BANDGRID_3D_fermi\n");
    out.push_str("1\n");
    out.push_str(&format!("{} {} {}\n", nx, ny, nz));
    out.push_str(&format!("{:18.10} {:18.10} {:18.10}\n", origin[0], origin[1], origin[2]));
    for row in cell.iter() {
        out.push_str(&format!("{:18.10} {:18.10} {:18.10}\n", row[0], row[1], row[2]));
    }

    out.push_str(&format!("BAND: {:4}\n", label));
    let mut col = 0;
    for &v in values.iter() {
        if col > 0 {
            out.push(' ');
        }
        out.push_str(&format!("{:.12E}", v));
        col += 1;
        if col == VALUES_PER_LINE {
            out.push('\n');
            col = 0;
        }
    }
    if col > 0 {
        out.push('\n');
    }

    out.push_str("END_BANDGRID_3D\n");
    out.push_str("END_BLOCK_BANDGRID_3D\n");
    out
}

/// Writes one band atomically: the text is built fully in memory, written to
/// a sibling `.part` path and renamed over the target, so a failed write
/// never leaves a truncated bxsf behind.
pub fn write_band_file(
    path: &(impl AsRef<Path> + ?Sized),
    label: i32,
    values: ArrayView3<'_, f64>,
    origin: &V3<f64>,
    cell: &Mat33<f64>,
    efermi: f64,
) -> Result<()> {
    let path = path.as_ref();
    if path.is_file() {
        warn!("File {:?} exists, overwriting ...", path);
    } else {
        info!("Writing band {} to {:?} ...", label, path);
    }

    let txt = format_band(label, values, origin, cell, efermi);
    let tmp = path.with_extension("bxsf.part");
    fs::write(&tmp, txt.as_bytes())
        .and_then(|_| fs::rename(&tmp, path))
        .map_err(|e| {
            let _ = fs::remove_file(&tmp);
            e
        })
        .with_context(|| format!("Failed to write band file {:?}", path))?;
    Ok(())
}
