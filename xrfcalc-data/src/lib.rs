#![no_std]

extern crate alloc;

use alloc::string::String;
use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

/// A complete element library, as stored in a postcard snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LibrarySnapshot {
    pub elements: Vec<ElementRecord>,
    pub materials: Vec<MaterialRecord>,
}

/// Everything the engine needs to know about one element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementRecord {
    pub symbol: String,
    pub atomic_number: u16,
    pub atomic_mass: f64,
    /// Density of the pure element in g/cm³.
    pub density: f64,
    /// Binding energies in keV keyed by IUPAC level label (K, L1, ..., N5, O1, ...).
    pub binding_energies: Vec<LabelledValue>,
    pub cross_sections: CrossSectionRecord,
    pub partial_photoelectric: Vec<PartialPhotoelectricRecord>,
    pub shells: Vec<ShellRecord>,
}

/// Total mass attenuation columns in cm²/g on a common energy grid (keV).
///
/// The grid may repeat an energy at an absorption edge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrossSectionRecord {
    pub energy: Vec<f64>,
    pub photoelectric: Vec<f64>,
    pub coherent: Vec<f64>,
    pub compton: Vec<f64>,
    pub pair: Vec<f64>,
}

/// Partial photoelectric table of one shell (`K` ... `M5`, or `all other`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialPhotoelectricRecord {
    pub shell: String,
    pub energy: Vec<f64>,
    pub values: Vec<f64>,
}

/// Yields and transition probabilities of one shell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShellRecord {
    pub shell: String,
    /// `omega`, `f12`, `f13`, ...
    pub constants: Vec<LabelledValue>,
    /// Radiative transitions such as `KL3`.
    pub radiative: Vec<LabelledValue>,
    /// Auger and Coster-Kronig transitions such as `L1-L2M4`.
    pub nonradiative: Vec<LabelledValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaterialRecord {
    pub name: String,
    pub density: f64,
    pub thickness: f64,
    pub comment: String,
    /// Component name (element, formula or material) and its mass fraction.
    pub composition: Vec<LabelledValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelledValue {
    pub label: String,
    pub value: f64,
}

impl LabelledValue {
    pub fn new(label: impl Into<String>, value: f64) -> Self {
        LabelledValue {
            label: label.into(),
            value,
        }
    }
}
