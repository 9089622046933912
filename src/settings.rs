//! Site-wide defaults merged under the command line.
//!
//! An optional `settings.toml` in the platform config directory (and
//! `WAN2SKEAF_*` environment variables) can pin defaults like the output
//! prefix or the smearing; explicit flags always win. A missing file is not
//! an error.

use std::path::PathBuf;

use directories::ProjectDirs;
use figment::{
    providers::{
        Env,
        Format,
        Serialized,
        Toml,
    },
    Figment,
};
use serde::{
    Deserialize,
    Serialize,
};

use crate::{
    fermi::DEFAULT_TOLERANCE,
    traits::Result,
};

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Band files are named `<out_prefix>_band_<label>.bxsf`.
    pub out_prefix: String,
    /// Smearing kind applied when the command line does not pick one.
    pub smearing_type: String,
    /// Smearing width in eV.
    pub smearing_width: f64,
    /// Spin degeneracy prefactor.
    pub occupation_prefactor: u32,
    /// Electron-count tolerance of the Fermi search.
    pub tolerance: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            out_prefix: "skeaf".to_string(),
            smearing_type: "none".to_string(),
            smearing_width: 0.0,
            occupation_prefactor: 2,
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl Settings {
    /// Platform config path, `None` when no home directory is resolvable.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "wan2skeaf")
            .map(|dirs| dirs.config_dir().join("settings.toml"))
    }

    /// Built-in defaults, overlaid by the settings file (if any), overlaid
    /// by `WAN2SKEAF_*` environment variables.
    pub fn load() -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()));
        if let Some(path) = Self::default_path() {
            figment = figment.merge(Toml::file(path));
        }
        let settings = figment
            .merge(Env::prefixed("WAN2SKEAF_").ignore(&["log"]))
            .extract::<Settings>()?;
        Ok(settings)
    }
}
