use std::{
    path::PathBuf,
    sync::OnceLock,
};

use clap::{
    Parser,
    builder::styling::{
        AnsiColor,
        Effects,
        Styles,
    },
};
use colored::Colorize;
use itertools::Itertools;
use log::{
    info,
    warn,
};

use crate::{
    bxsf::BandGrid,
    constants::EV_TO_RY,
    dos::SpectrumHistogram,
    error::Wan2SkeafError,
    export::{
        self,
        BandOutputSpec,
        BandSelection,
        UnitSystem,
    },
    fermi::FermiSolveRequest,
    settings::Settings,
    smearing::Smearing,
    traits::{
        OptProcess,
        Result,
    },
};


pub fn get_style() -> Styles {
    static INSTANCE: OnceLock<Styles> = OnceLock::new();
    INSTANCE.get_or_init(|| {
        Styles::styled()
            .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
            .usage(AnsiColor::Green.on_default()   | Effects::BOLD)
            .literal(AnsiColor::Green.on_default() | Effects::BOLD)
            .placeholder(AnsiColor::BrightBlue.on_default())
            .error(AnsiColor::BrightRed.on_default())
            .valid(AnsiColor::BrightYellow.on_default())
    }).to_owned()
}


#[derive(Debug, Parser)]
#[command(name = "wan2skeaf",
            about = r"Prepare a Wannier90 BXSF band grid for the SKEAF extremal-orbit finder.
The Fermi level is recomputed from the electron count, then each selected band
is written to its own BXSF file with energies in Ry and reciprocal vectors in
units of 2pi/bohr.",
            version,
            author = "aiida-skeaf developers",
            styles = get_style()
            )]
pub struct Opt {
    #[arg(value_name = "BXSF")]
    /// BXSF file written by Wannier90's fermi_surface_plot, '.gz' compressed
    /// input is decompressed on the fly.
    bxsf: PathBuf,

    #[arg(long, short = 'n')]
    /// Number of electrons the occupied states must integrate to.
    num_electrons: f64,

    #[arg(long, short = 'b', default_value="all")]
    /// Band to extract, by its BAND label in the file; 'all' (or -1) selects
    /// every band.
    band: BandSelection,

    #[arg(long, short = 'o')]
    /// Output prefix, band files are named '<prefix>_band_<label>.bxsf'.
    out_prefix: Option<String>,

    #[arg(long, short = 's')]
    /// Occupation function: none, fd/fermi-dirac or cold/marzari-vanderbilt.
    smearing: Option<String>,

    #[arg(long, short = 'w')]
    /// Smearing width in eV, ignored when the smearing is 'none'.
    smearing_width: Option<f64>,

    #[arg(long, short = 'p', value_parser = clap::value_parser!(u32).range(1..=2))]
    /// Spin degeneracy prefactor: 2 without spin-orbit coupling, 1 with.
    prefactor: Option<u32>,

    #[arg(long, short = 't')]
    /// Convergence tolerance on the electron count.
    tolerance: Option<f64>,

    #[arg(long)]
    /// Solve and report the Fermi level only, write no band files.
    fermi_only: bool,

    #[arg(long, value_name = "PATH")]
    /// Write an interactive histogram of the spectrum near the Fermi level.
    dos_html: Option<PathBuf>,

    #[arg(long, value_name = "PATH")]
    /// Write the same histogram as a two column text table.
    dos_txt: Option<PathBuf>,
}


impl OptProcess for Opt {
    fn process(&self) -> Result<()> {
        let settings = Settings::load()?;
        let out_prefix     = self.out_prefix.clone().unwrap_or(settings.out_prefix);
        let smearing_kind  = self.smearing.clone().unwrap_or(settings.smearing_type);
        let smearing_width = self.smearing_width.unwrap_or(settings.smearing_width);
        let prefactor      = self.prefactor.unwrap_or(settings.occupation_prefactor);
        let tolerance      = self.tolerance.unwrap_or(settings.tolerance);

        if !self.bxsf.is_file() {
            return Err(Wan2SkeafError::InputNotFound(self.bxsf.clone()).into());
        }

        // Reject a bad smearing selection before touching the input file.
        let smearing = Smearing::new(&smearing_kind, smearing_width)?;

        info!("Reading band grid from {:?} ...", self.bxsf);
        let grid = BandGrid::from_file(&self.bxsf)?;
        let [nx, ny, nz] = grid.ngrid;

        info!("Number of electrons: {}", self.num_electrons);
        info!("Fermi Energy from file: {}", grid.efermi);
        info!("Smearing type: {}", smearing.label());
        info!("Smearing width: {}", smearing.width());
        info!("Occupation prefactor: {}", prefactor);
        info!("Tolerance for number of electrons: {:e}", tolerance);
        info!("Number of bands: {}", grid.band_labels.len());
        info!("Grid shape: {}x{}x{}", nx, ny, nz);
        info!("Bands in bxsf: {}", grid.band_labels.iter().join(" "));

        let labels = self.band.resolve(&grid)?;

        let [rx, ry, rz] = grid.reduced_ngrid();
        if [rx, ry, rz] == grid.ngrid {
            warn!("No duplicated boundary plane found, treating the grid as already reduced.");
        } else {
            info!("Dropped periodic boundary planes: {}x{}x{} -> {}x{}x{}",
                  nx, ny, nz, rx, ry, rz);
        }
        let eigenvalues = grid.reduced_eigenvalues();

        let request = FermiSolveRequest {
            eigenvalues: &eigenvalues,
            num_electrons: self.num_electrons,
            smearing,
            prefactor,
            tolerance,
        };
        let level = request.solve()?;

        info!("Computed Fermi energy: {}", level.fermi_energy);
        info!("Computed Fermi energy in Ry: {}", level.fermi_energy * EV_TO_RY);
        info!("Fermi energy unit: eV");
        match level.below {
            Some(e) => info!("Closest eigenvalue below Fermi energy: {}", e),
            None    => warn!("No eigenvalue below the Fermi energy."),
        }
        match level.above {
            Some(e) => info!("Closest eigenvalue above Fermi energy: {}", e),
            None    => warn!("No eigenvalue above the Fermi energy."),
        }

        let residual = (level.num_electrons - self.num_electrons).abs();
        if residual > tolerance {
            warn!("Electron count jumps across the target at the Fermi level, Δn_elec = {:e}; \
                   a small smearing width would smooth the step.", residual);
        }

        let mut output = String::with_capacity(400);
        output.push_str(&"-".repeat(80));
        output.push('\n');
        output.push_str(&format!(" Fermi level for {} electrons:  {} eV  =  {} Ry\n",
                format!("{}", self.num_electrons).bright_yellow(),
                format!("{:.10}", level.fermi_energy).bright_cyan(),
                format!("{:.10}", level.fermi_energy * EV_TO_RY).bright_cyan()));
        output.push_str(&format!("   bisection steps {:4},  electron count reached {}\n",
                level.iterations,
                format!("{:.8}", level.num_electrons).bright_blue()));
        output.push_str(&format!("   closest eigenvalue below / above:  {} / {} eV\n",
                level.below.map(|e| format!("{:.8}", e)).unwrap_or_else(|| "none".to_string()),
                level.above.map(|e| format!("{:.8}", e)).unwrap_or_else(|| "none".to_string())));
        output.push_str(&"-".repeat(80));
        println!("{}", output);

        for &label in labels.iter() {
            let (bmin, bmax) = grid.band_min_max(label)?;
            info!("Min and max of band {} : {} {}", label, bmin, bmax);
        }

        if self.dos_html.is_some() || self.dos_txt.is_some() {
            let hist = SpectrumHistogram::new(&eigenvalues, grid.efermi, level.fermi_energy);
            if let Some(path) = self.dos_txt.as_ref() {
                hist.to_txt(path)?;
            }
            if let Some(path) = self.dos_html.as_ref() {
                hist.to_html(path)?;
            }
        }

        if self.fermi_only {
            info!("--fermi-only set, no band files written.");
            return Ok(());
        }

        let specs = labels.iter()
            .map(|&label| BandOutputSpec {
                label,
                fermi_energy: level.fermi_energy,
                units: UnitSystem::Skeaf,
            })
            .collect::<Vec<_>>();
        let written = export::write_band_files(&grid, specs, &out_prefix)?;
        info!("Wrote {} band file(s): {}",
              written.len(),
              written.iter().map(|p| p.display()).join(" "));

        Ok(())
    }
}


pub fn run() -> Result<()> {
    Opt::parse().process()
}
