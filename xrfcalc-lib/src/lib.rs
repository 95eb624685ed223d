pub mod beam;
pub mod cache;
pub mod cascade;
pub mod chemparser;
pub mod config;
pub mod constants;
pub mod cross_section;
pub mod detector;
pub mod element;
pub mod elements;
pub mod error;
pub mod interp;
pub mod material;
pub mod result;
pub mod shell;
pub mod special;
pub mod target;
pub mod transmission;
pub mod xrf;

pub use beam::{Beam, Ray};
pub use cascade::{EmissionLine, EmissionLines, ShellCascadeModel, ShellModel};
pub use config::{FluorescenceOptions, XrfConfig};
pub use cross_section::{CrossSectionKind, CrossSectionTable, MassAttenuation};
pub use detector::{Detector, EscapeParameters};
pub use element::{Element, ExcitationFactor, ExcitationFactors};
pub use elements::{Elements, PeakFamily};
pub use error::{Result, XrfError};
pub use material::{Composition, Layer, Material};
pub use result::{FluorescenceResult, LayerLines, LineKind, LineResult};
pub use shell::{BindingEnergies, PartialShell, Shell, ShellMap, VacancyDistribution};
pub use target::{LineFamily, Target};
pub use transmission::TransmissionTable;
pub use xrf::Xrf;
pub use xrfcalc_data;
