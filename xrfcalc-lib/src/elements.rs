use std::collections::BTreeMap;
use std::fmt;

use xrfcalc_data::LibrarySnapshot;

use crate::cascade::{EmissionLine, EmissionLines};
use crate::chemparser::parse_formula;
use crate::cross_section::MassAttenuation;
use crate::detector::EscapeParameters;
use crate::element::{Element, ExcitationFactors};
use crate::error::{Result, XrfError};
use crate::material::{Composition, Material};
use crate::shell::{BindingEnergies, Shell};

/// Escape peaks keyed by `<element>_<line>esc`.
pub type EscapeLines = EmissionLines;

const MAX_MATERIAL_DEPTH: usize = 16;

/// A shell of an element that the beam can ionize.
#[derive(Debug, Clone, PartialEq)]
pub struct PeakFamily {
    pub element: String,
    pub shell: Shell,
    pub binding_energy: f64,
}

impl fmt::Display for PeakFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.element, self.shell)
    }
}

/// Library of elements and materials.
///
/// Resolves element symbols, chemical formulas and material names into
/// elemental mass fractions and answers cross-section and excitation
/// queries for them.
#[derive(Debug, Clone, Default)]
pub struct Elements {
    elements: Vec<Element>,
    index: BTreeMap<String, usize>,
    materials: Vec<Material>,
}

impl Elements {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `element`, replacing any element with the same symbol.
    pub fn add_element(&mut self, element: Element) {
        match self.index.get(element.symbol()) {
            Some(&i) => self.elements[i] = element,
            None => {
                self.index.insert(element.symbol().to_string(), self.elements.len());
                self.elements.push(element);
            }
        }
    }

    pub fn contains_element(&self, symbol: &str) -> bool {
        self.index.contains_key(symbol)
    }

    /// # Errors
    /// `InvalidArgument` for an unknown symbol.
    pub fn element(&self, symbol: &str) -> Result<&Element> {
        self.index
            .get(symbol)
            .map(|&i| &self.elements[i])
            .ok_or_else(|| XrfError::invalid(format!("invalid element: {symbol}")))
    }

    pub fn element_mut(&mut self, symbol: &str) -> Result<&mut Element> {
        match self.index.get(symbol) {
            Some(&i) => Ok(&mut self.elements[i]),
            None => Err(XrfError::invalid(format!("invalid element: {symbol}"))),
        }
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter()
    }

    pub fn binding_energies(&self, symbol: &str) -> Result<&BindingEnergies> {
        Ok(self.element(symbol)?.binding_energies())
    }

    /// # Errors
    /// `InvalidArgument` if a material of that name exists already.
    pub fn add_material(&mut self, material: Material) -> Result<()> {
        if self.material(material.name()).is_some() {
            return Err(XrfError::invalid(format!(
                "material {} already defined",
                material.name()
            )));
        }
        self.materials.push(material);
        Ok(())
    }

    pub fn remove_material(&mut self, name: &str) -> Result<Material> {
        let i = self
            .materials
            .iter()
            .position(|m| m.name() == name)
            .ok_or_else(|| XrfError::invalid(format!("non existing material: {name}")))?;
        Ok(self.materials.remove(i))
    }

    pub fn material(&self, name: &str) -> Option<&Material> {
        self.materials.iter().find(|m| m.name() == name)
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    /// Elemental mass fractions of an element, formula or material.
    ///
    /// Formulas take precedence over materials of the same name; materials
    /// may be made of elements, formulas or other materials.
    ///
    /// # Errors
    /// `InvalidArgument` if `name` is none of the three.
    pub fn composition(&self, name: &str) -> Result<Composition> {
        self.resolve(name, 0)
    }

    /// Elemental mass fractions of a mixture of named components,
    /// normalized to unit sum.
    ///
    /// # Errors
    /// `InvalidArgument` for a negative amount, a non-positive sum or an
    /// unknown component.
    pub fn composition_of(&self, components: &Composition) -> Result<Composition> {
        self.resolve_mixture(components, 0)
    }

    fn resolve(&self, name: &str, depth: usize) -> Result<Composition> {
        if depth > MAX_MATERIAL_DEPTH {
            return Err(XrfError::runtime(format!(
                "material {name} nests more than {MAX_MATERIAL_DEPTH} levels"
            )));
        }
        if let Some(composition) = self.formula_composition(name)? {
            return Ok(composition);
        }
        match self.material(name) {
            Some(material) if !material.composition().is_empty() => {
                self.resolve_mixture(material.composition(), depth + 1)
            }
            Some(_) => Err(XrfError::invalid(format!(
                "material {name} with empty or non-valid composition"
            ))),
            None => Err(XrfError::invalid(format!(
                "name {name} not accepted as element, material or chemical formula"
            ))),
        }
    }

    fn resolve_mixture(&self, components: &Composition, depth: usize) -> Result<Composition> {
        let mut result = Composition::new();
        let mut total = 0.0;
        for (name, &amount) in components {
            if !(amount >= 0.0) {
                return Err(XrfError::invalid(format!("{name} has a negative mass fraction")));
            }
            for (element, fraction) in self.resolve(name, depth)? {
                *result.entry(element).or_insert(0.0) += amount * fraction;
            }
            total += amount;
        }
        if !(total > 0.0) {
            return Err(XrfError::invalid("sum of mass fractions is less or equal to 0"));
        }
        for fraction in result.values_mut() {
            *fraction /= total;
        }
        Ok(result)
    }

    /// Mass fractions of a formula whose symbols are all known elements.
    fn formula_composition(&self, name: &str) -> Result<Option<Composition>> {
        let Ok(counts) = parse_formula(name) else {
            return Ok(None);
        };
        if !counts.keys().all(|symbol| self.contains_element(symbol)) {
            return Ok(None);
        }
        let mut composition = Composition::new();
        let mut total = 0.0;
        for (symbol, count) in counts {
            let mass = count * self.element(&symbol)?.atomic_mass();
            total += mass;
            composition.insert(symbol, mass);
        }
        if !(total > 0.0) {
            return Err(XrfError::invalid(format!("zero weight formula: {name}")));
        }
        for fraction in composition.values_mut() {
            *fraction /= total;
        }
        Ok(Some(composition))
    }

    /// Mass attenuation coefficients of an element, formula or material.
    pub fn mass_attenuation(&self, name: &str, energy: f64) -> Result<MassAttenuation> {
        if let Ok(element) = self.element(name) {
            return element.mass_attenuation(energy);
        }
        self.mass_attenuation_of(&self.composition(name)?, energy)
    }

    /// Mass-fraction weighted coefficients of an elemental composition.
    pub fn mass_attenuation_of(&self, composition: &Composition, energy: f64) -> Result<MassAttenuation> {
        let mut result = MassAttenuation {
            energy,
            ..Default::default()
        };
        for (symbol, &fraction) in composition {
            if !(fraction >= 0.0) {
                return Err(XrfError::invalid(format!("{symbol} has a negative mass fraction")));
            }
            let element = self.element(symbol)?;
            result.accumulate(&element.mass_attenuation(energy)?, fraction);
        }
        Ok(result)
    }

    pub fn mass_attenuation_grid_of(&self, composition: &Composition, energies: &[f64]) -> Result<Vec<MassAttenuation>> {
        energies
            .iter()
            .map(|&energy| self.mass_attenuation_of(composition, energy))
            .collect()
    }

    pub fn excitation_factors(&self, symbol: &str, energy: f64, weight: f64) -> Result<ExcitationFactors> {
        self.element(symbol)?.excitation_factors(energy, weight)
    }

    /// Fluorescing shells of `elements` ionized at `energy`, least bound
    /// first.
    pub fn peak_families<'a>(&self, elements: impl IntoIterator<Item = &'a str>, energy: f64) -> Result<Vec<PeakFamily>> {
        let mut families = Vec::new();
        for symbol in elements {
            let element = self.element(symbol)?;
            families.extend(element.excited_shells(energy).into_iter().map(|(shell, binding_energy)| {
                PeakFamily {
                    element: symbol.to_string(),
                    shell,
                    binding_energy,
                }
            }));
        }
        families.sort_by(|a, b| a.binding_energy.total_cmp(&b.binding_energy));
        Ok(families)
    }

    /// Escape peaks of a detector of elemental `composition` hit by photons
    /// of `energy`.
    ///
    /// Per detector line the escape probability is
    /// `(0.5/μ_inc)·(1 − s·ln(1 + 1/s))`, `s = sin(alpha_in)·μ_line/μ_inc`,
    /// times the line's excitation rate at its mass fraction. With a
    /// positive `mass_thickness` the probability is given per detected
    /// photon.
    pub fn escape(
        &self,
        composition: &Composition,
        energy: f64,
        mass_thickness: f64,
        params: &EscapeParameters,
    ) -> Result<EscapeLines> {
        let sin_alpha_in = if params.alpha_in == 90.0 {
            1.0
        } else {
            params.alpha_in.to_radians().sin().abs()
        };
        let mu_incident = self.mass_attenuation_of(composition, energy)?.total;
        if !(mu_incident > 0.0) {
            return Ok(EscapeLines::new());
        }
        let intrinsic_efficiency = if mass_thickness > 0.0 {
            1.0 - (-mu_incident * mass_thickness / sin_alpha_in).exp()
        } else {
            1.0
        };

        let mut peaks: Vec<(String, EmissionLine)> = Vec::new();
        for (symbol, &fraction) in composition {
            for (line, factor) in self.excitation_factors(symbol, energy, fraction)? {
                let mu_line = self.mass_attenuation_of(composition, factor.energy)?.total;
                let s = sin_alpha_in * mu_line / mu_incident;
                if !(s > 0.0) {
                    continue;
                }
                let mut rate = factor.rate * (0.5 / mu_incident) * (1.0 - s * (1.0 + 1.0 / s).ln());
                if !(rate > params.intensity_threshold) {
                    continue;
                }
                if mass_thickness > 0.0 {
                    rate /= intrinsic_efficiency;
                }
                let escape_energy = energy - factor.energy;
                if escape_energy > params.min_energy {
                    peaks.push((
                        format!("{symbol}_{line}esc"),
                        EmissionLine {
                            energy: escape_energy,
                            rate,
                        },
                    ));
                }
            }
        }
        peaks.sort_by(|a, b| b.1.rate.total_cmp(&a.1.rate));
        peaks.truncate(params.max_peaks);
        Ok(peaks.into_iter().collect())
    }

    /// Enable or disable memoisation for every element.
    pub fn set_cache_enabled(&mut self, enabled: bool) {
        for element in &mut self.elements {
            element.set_cache_enabled(enabled);
        }
    }

    /// Memoise `energies` for the elements of `composition`.
    pub fn update_cache(&mut self, composition: &Composition, energies: &[f64]) -> Result<()> {
        for symbol in composition.keys() {
            self.element_mut(symbol)?.update_cache(energies)?;
        }
        Ok(())
    }

    pub fn clear_cache(&mut self) {
        for element in &mut self.elements {
            element.clear_cache();
        }
    }

    /// Build a library from decoded records.
    pub fn from_records(snapshot: &LibrarySnapshot) -> Result<Self> {
        let mut library = Elements::new();
        for record in &snapshot.elements {
            library.add_element(Element::try_from(record)?);
        }
        for record in &snapshot.materials {
            library.add_material(Material::try_from(record)?)?;
        }
        tracing::debug!(
            elements = library.elements.len(),
            materials = library.materials.len(),
            "element library loaded"
        );
        Ok(library)
    }

    pub fn to_records(&self) -> LibrarySnapshot {
        LibrarySnapshot {
            elements: self.elements.iter().map(Element::to_record).collect(),
            materials: self.materials.iter().map(Material::to_record).collect(),
        }
    }

    /// Decode a postcard snapshot.
    pub fn from_snapshot(bytes: &[u8]) -> Result<Self> {
        let snapshot: LibrarySnapshot =
            postcard::from_bytes(bytes).map_err(|e| XrfError::Snapshot(e.to_string()))?;
        Self::from_records(&snapshot)
    }

    /// Decode a zstd-compressed postcard snapshot.
    pub fn from_compressed_snapshot(bytes: &[u8]) -> Result<Self> {
        let mut decoder = ruzstd::decoding::StreamingDecoder::new(bytes)
            .map_err(|e| XrfError::Snapshot(format!("failed to create zstd decoder: {e}")))?;
        let mut decompressed = Vec::new();
        std::io::Read::read_to_end(&mut decoder, &mut decompressed)
            .map_err(|e| XrfError::Snapshot(format!("failed to decompress snapshot: {e}")))?;
        Self::from_snapshot(&decompressed)
    }

    /// Encode the library as a postcard snapshot.
    pub fn to_snapshot(&self) -> Result<Vec<u8>> {
        postcard::to_allocvec(&self.to_records()).map_err(|e| XrfError::Snapshot(e.to_string()))
    }
}
