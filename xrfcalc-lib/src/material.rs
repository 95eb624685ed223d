use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use xrfcalc_data::{LabelledValue, MaterialRecord};

use crate::cross_section::MassAttenuation;
use crate::elements::{Elements, PeakFamily};
use crate::error::{Result, XrfError};

/// Mass fraction per element (or per component name before resolution).
pub type Composition = BTreeMap<String, f64>;

/// A named mixture of elements, formulas or other materials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    name: String,
    density: f64,
    thickness: f64,
    comment: String,
    composition: Composition,
}

impl Material {
    /// # Arguments
    /// * `density` - default density in g/cm³
    /// * `thickness` - default thickness in cm
    ///
    /// # Errors
    /// `InvalidArgument` for an empty name or a non-positive density or
    /// thickness.
    pub fn new(name: &str, density: f64, thickness: f64, comment: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(XrfError::invalid("material name should have at least one letter"));
        }
        if !(density > 0.0) {
            return Err(XrfError::invalid(format!("material {name}: density must be positive")));
        }
        if !(thickness > 0.0) {
            return Err(XrfError::invalid(format!("material {name}: thickness must be positive")));
        }
        Ok(Material {
            name: name.to_string(),
            density,
            thickness,
            comment: comment.to_string(),
            composition: Composition::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn density(&self) -> f64 {
        self.density
    }

    pub fn thickness(&self) -> f64 {
        self.thickness
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Components and their mass fractions, normalized to unit sum.
    pub fn composition(&self) -> &Composition {
        &self.composition
    }

    /// Replace the composition. Amounts are normalized to unit sum.
    ///
    /// # Errors
    /// `InvalidArgument` if any amount is not positive.
    pub fn set_composition<S: AsRef<str>>(&mut self, components: impl IntoIterator<Item = (S, f64)>) -> Result<()> {
        let mut composition = Composition::new();
        for (name, amount) in components {
            if !(amount > 0.0) || !amount.is_finite() {
                return Err(XrfError::invalid(format!(
                    "material {}: amount of {} must be positive",
                    self.name,
                    name.as_ref()
                )));
            }
            *composition.entry(name.as_ref().to_string()).or_insert(0.0) += amount;
        }
        let total: f64 = composition.values().sum();
        for amount in composition.values_mut() {
            *amount /= total;
        }
        self.composition = composition;
        Ok(())
    }

    pub fn to_record(&self) -> MaterialRecord {
        MaterialRecord {
            name: self.name.clone(),
            density: self.density,
            thickness: self.thickness,
            comment: self.comment.clone(),
            composition: self
                .composition
                .iter()
                .map(|(name, &fraction)| LabelledValue::new(name.clone(), fraction))
                .collect(),
        }
    }
}

impl TryFrom<&MaterialRecord> for Material {
    type Error = XrfError;

    fn try_from(record: &MaterialRecord) -> Result<Self> {
        let mut material = Material::new(&record.name, record.density, record.thickness, &record.comment)?;
        material.set_composition(record.composition.iter().map(|c| (c.label.as_str(), c.value)))?;
        Ok(material)
    }
}

/// What a layer is made of.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LayerMaterial {
    /// Element, formula or material known to the [`Elements`] library.
    Named(String),
    Inline(Material),
}

/// A slab of material: sample layer, beam filter, attenuator or detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    name: String,
    material: LayerMaterial,
    density: f64,
    thickness: f64,
    funny_factor: f64,
}

fn check_layer(name: &str, density: f64, thickness: f64, funny_factor: f64) -> Result<()> {
    if !(density >= 0.0) || !density.is_finite() {
        return Err(XrfError::invalid(format!("layer {name}: density must not be negative")));
    }
    if !(thickness >= 0.0) || !thickness.is_finite() {
        return Err(XrfError::invalid(format!("layer {name}: thickness must not be negative")));
    }
    if !(0.0..=1.0).contains(&funny_factor) {
        return Err(XrfError::invalid(format!(
            "layer {name}: funny factor {funny_factor} outside [0, 1]"
        )));
    }
    Ok(())
}

impl Layer {
    /// Layer of a named element, formula or material.
    ///
    /// # Arguments
    /// * `density` - g/cm³
    /// * `thickness` - cm
    /// * `funny_factor` - fraction of the beam crossing the layer, 1 for a
    ///   homogeneous layer
    pub fn new(material: &str, density: f64, thickness: f64, funny_factor: f64) -> Result<Self> {
        check_layer(material, density, thickness, funny_factor)?;
        Ok(Layer {
            name: material.to_string(),
            material: LayerMaterial::Named(material.to_string()),
            density,
            thickness,
            funny_factor,
        })
    }

    /// Layer of an inline material; density and thickness default to the
    /// material's.
    pub fn from_material(
        material: Material,
        density: Option<f64>,
        thickness: Option<f64>,
        funny_factor: f64,
    ) -> Result<Self> {
        let density = density.unwrap_or(material.density);
        let thickness = thickness.unwrap_or(material.thickness);
        check_layer(&material.name, density, thickness, funny_factor)?;
        Ok(Layer {
            name: material.name.clone(),
            material: LayerMaterial::Inline(material),
            density,
            thickness,
            funny_factor,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn material(&self) -> &LayerMaterial {
        &self.material
    }

    pub fn density(&self) -> f64 {
        self.density
    }

    pub fn thickness(&self) -> f64 {
        self.thickness
    }

    pub fn funny_factor(&self) -> f64 {
        self.funny_factor
    }

    /// Density × thickness in g/cm².
    pub fn mass_thickness(&self) -> f64 {
        self.density * self.thickness
    }

    /// Elemental mass fractions.
    pub fn composition(&self, elements: &Elements) -> Result<Composition> {
        match &self.material {
            LayerMaterial::Named(name) => elements.composition(name),
            LayerMaterial::Inline(material) => elements.composition_of(&material.composition),
        }
    }

    pub fn mass_attenuation(&self, energy: f64, elements: &Elements) -> Result<MassAttenuation> {
        elements.mass_attenuation_of(&self.composition(elements)?, energy)
    }

    /// Fraction of photons of `energy` crossing the layer at `angle`
    /// degrees from its surface:
    /// `(1 − f) + f·exp(−μ·ρt / sin(angle))`, f the funny factor.
    ///
    /// # Errors
    /// `Runtime` for a layer without mass thickness.
    pub fn transmission(&self, energy: f64, elements: &Elements, angle: f64) -> Result<f64> {
        Ok(self.transmission_grid(&[energy], elements, angle)?[0])
    }

    pub fn transmission_grid(&self, energies: &[f64], elements: &Elements, angle: f64) -> Result<Vec<f64>> {
        let path = self.path_mass_thickness(angle)?;
        let composition = self.composition(elements)?;
        energies
            .iter()
            .map(|&energy| {
                let mu = elements.mass_attenuation_of(&composition, energy)?.total;
                Ok((1.0 - self.funny_factor) + self.funny_factor * (-path * mu).exp())
            })
            .collect()
    }

    fn path_mass_thickness(&self, angle: f64) -> Result<f64> {
        let mut path = self.mass_thickness();
        if angle != 90.0 {
            path /= angle.abs().to_radians().sin();
        }
        if !(path > 0.0) {
            return Err(XrfError::runtime(format!(
                "layer {} mass thickness is {path} g/cm2",
                self.name
            )));
        }
        Ok(path)
    }

    /// Shells of the layer's elements excited at `energy`.
    pub fn peak_families(&self, energy: f64, elements: &Elements) -> Result<Vec<PeakFamily>> {
        let composition = self.composition(elements)?;
        elements.peak_families(composition.keys().map(String::as_str), energy)
    }
}
