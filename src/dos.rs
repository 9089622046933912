//! Histogram of the eigenvalue spectrum near the Fermi level.
//!
//! A quick sanity check before handing the grids to the orbit finder: if the
//! solved level sits in a region with very few states, a too-small smearing
//! width or a wrong electron count shows up immediately.

use std::{
    fs,
    io::Write,
    path::Path,
};

use log::info;
use ndarray::Array1;
use plotly;

use crate::{
    traits::Result,
    types::Vector,
};

/// Half width of the histogram window around the solved level, in eV.
const WINDOW: f64 = 1.5;

/// Histogram bin width in eV.
const BIN_WIDTH: f64 = 0.01;

/// State counts per energy bin over `[solved_fermi - WINDOW, solved_fermi + WINDOW]`.
pub struct SpectrumHistogram {
    /// Bin centers in eV.
    pub energies: Vector<f64>,
    /// Reduced-grid states per bin.
    pub counts: Vector<f64>,
    /// Fermi energy stated in the source file.
    pub file_fermi: f64,
    /// Fermi energy solved from the occupation count.
    pub solved_fermi: f64,
}

impl SpectrumHistogram {
    pub fn new(eigenvalues: &[f64], file_fermi: f64, solved_fermi: f64) -> Self {
        let lo = solved_fermi - WINDOW;
        let nbins = (2.0 * WINDOW / BIN_WIDTH).round() as usize;

        let mut counts = vec![0.0f64; nbins];
        for &e in eigenvalues {
            let idx = ((e - lo) / BIN_WIDTH).floor();
            if idx >= 0.0 && (idx as usize) < nbins {
                counts[idx as usize] += 1.0;
            }
        }

        let energies = Array1::from_iter(
            (0 .. nbins).map(|i| lo + (i as f64 + 0.5) * BIN_WIDTH));

        Self {
            energies,
            counts: Array1::from(counts),
            file_fermi,
            solved_fermi,
        }
    }

    /// Two-column text table for replotting with more advanced tools.
    pub fn to_txt(&self, path: &(impl AsRef<Path> + ?Sized)) -> Result<()> {
        let path = path.as_ref();
        info!("Writing spectrum histogram data to {:?} ...", path);

        let mut f = fs::OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(path)?;
        writeln!(f, "# E(eV)  states_per_bin")?;
        for (e, c) in self.energies.iter().zip(self.counts.iter()) {
            writeln!(f, "  {:15.6}  {:15.1}", e, c)?;
        }
        Ok(())
    }

    /// Interactive plot with markers at both Fermi energies.
    pub fn to_html(&self, path: &(impl AsRef<Path> + ?Sized)) -> Result<()> {
        let path = path.as_ref();
        info!("Writing spectrum histogram plot to {:?} ...", path);

        let ymax = self.counts.iter().copied().fold(1.0f64, f64::max);

        let mut plot = plotly::Plot::new();
        plot.use_local_plotly();

        let spectrum = plotly::Scatter::from_array(self.energies.clone(), self.counts.clone())
            .mode(plotly::common::Mode::Lines)
            .name("states per bin");
        plot.add_trace(spectrum);

        let file_marker = plotly::Scatter::new(
                vec![self.file_fermi, self.file_fermi], vec![0.0, ymax])
            .mode(plotly::common::Mode::Lines)
            .name("Fermi energy from file");
        plot.add_trace(file_marker);

        let solved_marker = plotly::Scatter::new(
                vec![self.solved_fermi, self.solved_fermi], vec![0.0, ymax])
            .mode(plotly::common::Mode::Lines)
            .name("computed Fermi energy");
        plot.add_trace(solved_marker);

        let layout = plotly::Layout::new()
            .title(plotly::common::Title::with_text("Eigenvalue spectrum near the Fermi level"))
            .x_axis(plotly::layout::Axis::new()
                    .title(plotly::common::Title::with_text("E (eV)"))
                    .zero_line(true))
            .y_axis(plotly::layout::Axis::new()
                    .title(plotly::common::Title::with_text("States per bin"))
                    .zero_line(true));
        plot.set_layout(layout);

        plot.write_html(path);
        Ok(())
    }
}
