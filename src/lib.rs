pub mod bxsf;
pub mod smearing;
pub mod fermi;
pub mod export;
pub mod dos;
pub mod cli;
pub mod constants;
pub mod error;
pub mod traits;
pub mod types;
pub mod settings;

pub use traits::{
    OptProcess,
    Result,
};

pub use error::Wan2SkeafError;

pub use bxsf::BandGrid;

pub use smearing::Smearing;

pub use fermi::{
    FermiLevel,
    FermiSolveRequest,
};

pub use export::{
    BandOutputSpec,
    BandSelection,
    UnitSystem,
};

pub use settings::Settings;
