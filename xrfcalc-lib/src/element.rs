use std::collections::BTreeMap;

use xrfcalc_data::{ElementRecord, LabelledValue, PartialPhotoelectricRecord, ShellRecord};

use crate::cache::{BoundedCache, EnergyKey};
use crate::cascade::{EmissionLines, ShellCascadeModel, ShellModel};
use crate::constants::DEFAULT_CACHE_CAPACITY;
use crate::cross_section::{CrossSectionKind, CrossSectionTable, MassAttenuation, ShellAttenuation};
use crate::error::{Result, XrfError};
use crate::shell::{BindingEnergies, PartialShell, Shell, ShellMap, VacancyDistribution};

/// Line excited by photons of one energy.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ExcitationFactor {
    /// Line energy in keV.
    pub energy: f64,
    /// Photons emitted in the line per photoelectric absorption.
    pub factor: f64,
    /// `factor × weight × τ(E)`, τ the photoelectric mass attenuation.
    pub rate: f64,
}

/// Excitation factors keyed by line label.
pub type ExcitationFactors = BTreeMap<String, ExcitationFactor>;

#[derive(Debug, Clone)]
struct CachedExcitation {
    photoelectric: f64,
    lines: EmissionLines,
}

/// One chemical element: cross sections, binding energies and shell
/// cascade, with optional per-energy memoisation.
///
/// Every setter invalidates the caches it could affect.
#[derive(Debug, Clone)]
pub struct Element {
    symbol: String,
    atomic_number: u16,
    atomic_mass: f64,
    density: f64,
    binding: BindingEnergies,
    table: CrossSectionTable,
    reference_table: Option<CrossSectionTable>,
    cascade: ShellCascadeModel,
    mu_cache: BoundedCache<EnergyKey, ShellAttenuation>,
    excitation_cache: BoundedCache<EnergyKey, CachedExcitation>,
    cache_enabled: bool,
}

impl Element {
    /// # Errors
    /// `InvalidArgument` for an empty symbol or `atomic_number == 0`.
    pub fn new(symbol: &str, atomic_number: u16) -> Result<Self> {
        if symbol.is_empty() || !symbol.starts_with(|c: char| c.is_ascii_uppercase()) {
            return Err(XrfError::invalid(format!("invalid element symbol '{symbol}'")));
        }
        if atomic_number == 0 {
            return Err(XrfError::invalid(format!("{symbol}: atomic number must be positive")));
        }
        Ok(Element {
            symbol: symbol.to_string(),
            atomic_number,
            atomic_mass: 0.0,
            density: 1.0,
            binding: BindingEnergies::new(),
            table: CrossSectionTable::new(),
            reference_table: None,
            cascade: ShellCascadeModel::new(),
            mu_cache: BoundedCache::new(DEFAULT_CACHE_CAPACITY),
            excitation_cache: BoundedCache::new(DEFAULT_CACHE_CAPACITY),
            cache_enabled: false,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn atomic_number(&self) -> u16 {
        self.atomic_number
    }

    pub fn atomic_mass(&self) -> f64 {
        self.atomic_mass
    }

    pub fn set_atomic_mass(&mut self, mass: f64) -> Result<()> {
        if !(mass > 0.0 && mass.is_finite()) {
            return Err(XrfError::invalid(format!("{}: atomic mass must be positive", self.symbol)));
        }
        self.atomic_mass = mass;
        Ok(())
    }

    pub fn density(&self) -> f64 {
        self.density
    }

    pub fn set_density(&mut self, density: f64) -> Result<()> {
        if !(density > 0.0 && density.is_finite()) {
            return Err(XrfError::invalid(format!("{}: density must be positive", self.symbol)));
        }
        self.density = density;
        Ok(())
    }

    pub fn binding_energies(&self) -> &BindingEnergies {
        &self.binding
    }

    /// Replace the binding energies (keV) by `(level, energy)` pairs.
    pub fn set_binding_energies<S: AsRef<str>>(&mut self, pairs: impl IntoIterator<Item = (S, f64)>) -> Result<()> {
        self.binding = BindingEnergies::from_pairs(pairs)?;
        self.invalidate();
        Ok(())
    }

    pub fn cross_sections(&self) -> &CrossSectionTable {
        &self.table
    }

    pub fn cascade(&self) -> &ShellCascadeModel {
        &self.cascade
    }

    pub fn shell_model(&self, shell: Shell) -> Option<&ShellModel> {
        self.cascade.shell(shell)
    }

    /// Replace the tabulated mass attenuation coefficients (cm²/g).
    ///
    /// # Arguments
    /// * `energy` - ascending grid in keV, duplicated at absorption edges
    /// * `pair` - pair production, zero when `None`
    pub fn set_mass_attenuation_coefficients(
        &mut self,
        energy: &[f64],
        photoelectric: &[f64],
        coherent: &[f64],
        compton: &[f64],
        pair: Option<&[f64]>,
    ) -> Result<()> {
        self.table.set_totals(energy, photoelectric, coherent, compton, pair)?;
        self.reference_table = None;
        self.invalidate();
        Ok(())
    }

    pub fn set_partial_photoelectric(&mut self, shell: PartialShell, energy: &[f64], values: &[f64]) -> Result<()> {
        let binding = match shell {
            PartialShell::Bound(s) => self.binding.shell(s),
            PartialShell::AllOther => 0.0,
        };
        self.table.set_partial(shell, energy, values, binding)?;
        self.reference_table = None;
        self.invalidate();
        Ok(())
    }

    /// Re-base the tables on measured coefficients above `energy[0]`.
    ///
    /// Always starts from the tables as they were before the first
    /// re-basing, so repeated calls do not compound.
    pub fn set_measured_photoelectric(
        &mut self,
        energy: &[f64],
        photoelectric: &[f64],
        coherent: &[f64],
        compton: &[f64],
        pair: Option<&[f64]>,
    ) -> Result<()> {
        let reference = self.reference_table.take().unwrap_or_else(|| self.table.clone());
        let rebased = reference.rebaselined(self.binding.shells(), energy, photoelectric, coherent, compton, pair);
        self.reference_table = Some(reference);
        self.table = rebased?;
        self.invalidate();
        tracing::debug!(element = %self.symbol, points = energy.len(), "re-baselined cross sections");
        Ok(())
    }

    /// Update the yields of `shell` (`omega`, `f12`, ...).
    ///
    /// A rejected update leaves the shell model as it was.
    pub fn set_shell_constants<S: AsRef<str>>(
        &mut self,
        shell: Shell,
        values: impl IntoIterator<Item = (S, f64)>,
    ) -> Result<()> {
        self.update_shell_model(shell, |model| model.set_constants(values))
    }

    pub fn set_radiative_transitions<S: AsRef<str>>(
        &mut self,
        shell: Shell,
        transitions: impl IntoIterator<Item = (S, f64)>,
    ) -> Result<()> {
        self.update_shell_model(shell, |model| model.set_radiative_transitions(transitions))
    }

    pub fn set_nonradiative_transitions<S: AsRef<str>>(
        &mut self,
        shell: Shell,
        transitions: impl IntoIterator<Item = (S, f64)>,
    ) -> Result<()> {
        self.update_shell_model(shell, |model| model.set_nonradiative_transitions(transitions))
    }

    fn update_shell_model(&mut self, shell: Shell, update: impl FnOnce(&mut ShellModel) -> Result<()>) -> Result<()> {
        let mut model = self
            .cascade
            .shell(shell)
            .cloned()
            .unwrap_or_else(|| ShellModel::new(shell));
        update(&mut model)?;
        self.excitation_cache.clear();
        *self.cascade.shell_mut(shell) = model;
        Ok(())
    }

    fn invalidate(&mut self) {
        self.mu_cache.clear();
        self.excitation_cache.clear();
        self.cascade.clear_cache();
    }

    /// Mass attenuation coefficients (cm²/g) at `energy` (keV).
    pub fn mass_attenuation(&self, energy: f64) -> Result<MassAttenuation> {
        Ok(self.shell_attenuation(energy)?.totals)
    }

    pub fn mass_attenuation_grid(&self, energies: &[f64]) -> Result<Vec<MassAttenuation>> {
        energies.iter().map(|&e| self.mass_attenuation(e)).collect()
    }

    /// One process at several energies.
    pub fn mass_attenuation_of_kind(&self, energies: &[f64], kind: CrossSectionKind) -> Result<Vec<f64>> {
        energies
            .iter()
            .map(|&e| Ok(self.mass_attenuation(e)?.get(kind)))
            .collect()
    }

    /// Totals and partial photoelectric coefficients at `energy`.
    pub fn shell_attenuation(&self, energy: f64) -> Result<ShellAttenuation> {
        if self.cache_enabled {
            if let Some(cached) = self.mu_cache.get(&EnergyKey::from(energy)) {
                return Ok(*cached);
            }
        }
        self.table.attenuation(energy, self.binding.shells())
    }

    /// Probability per photoelectric absorption at `energy` of creating
    /// the vacancy in each shell. All zero below every edge.
    ///
    /// # Errors
    /// `Runtime` when no partial photoelectric table has been supplied.
    pub fn initial_vacancy_distribution(&self, energy: f64) -> Result<VacancyDistribution> {
        self.require_partials()?;
        let attenuation = self.shell_attenuation(energy)?;
        Ok(vacancies_from(&attenuation))
    }

    /// Initial distribution propagated through the cascade.
    pub fn cascade_modified_vacancy_distribution(&self, energy: f64) -> Result<VacancyDistribution> {
        Ok(self.cascade.propagate(&self.initial_vacancy_distribution(energy)?))
    }

    pub fn emitted_lines(
        &self,
        distribution: &VacancyDistribution,
        cascade: bool,
        apply_yield: bool,
    ) -> Result<EmissionLines> {
        self.cascade
            .emitted_lines(distribution, &self.binding, cascade, apply_yield)
    }

    /// Lines excited by photons of `energy` at mass fraction `weight`.
    ///
    /// # Errors
    /// `InvalidArgument` for a negative weight.
    pub fn excitation_factors(&self, energy: f64, weight: f64) -> Result<ExcitationFactors> {
        if !(weight >= 0.0) {
            return Err(XrfError::invalid(format!("{}: negative weight {weight}", self.symbol)));
        }
        let computed;
        let excitation = match self.cached_excitation(energy) {
            Some(cached) => cached,
            None => {
                computed = self.compute_excitation(energy)?;
                &computed
            }
        };
        let scale = weight * excitation.photoelectric;
        Ok(excitation
            .lines
            .iter()
            .map(|(label, line)| {
                let factor = ExcitationFactor {
                    energy: line.energy,
                    factor: line.rate,
                    rate: line.rate * scale,
                };
                (label.clone(), factor)
            })
            .collect())
    }

    fn cached_excitation(&self, energy: f64) -> Option<&CachedExcitation> {
        if !self.cache_enabled {
            return None;
        }
        self.excitation_cache.get(&EnergyKey::from(energy))
    }

    fn compute_excitation(&self, energy: f64) -> Result<CachedExcitation> {
        self.compute_excitation_from(&self.shell_attenuation(energy)?)
    }

    /// `(shell, binding energy)` of every shell that `energy` can ionize
    /// and that fluoresces, least bound first.
    pub fn excited_shells(&self, energy: f64) -> Vec<(Shell, f64)> {
        let mut shells: Vec<(Shell, f64)> = Shell::ALL
            .into_iter()
            .map(|s| (s, self.binding.shell(s)))
            .filter(|&(s, e)| e > 0.0 && e < energy && self.cascade.fluorescence_yield(s) > 0.0)
            .collect();
        shells.sort_by(|a, b| a.1.total_cmp(&b.1));
        shells
    }

    pub fn is_cache_enabled(&self) -> bool {
        self.cache_enabled
    }

    pub fn set_cache_enabled(&mut self, enabled: bool) {
        self.cache_enabled = enabled;
    }

    pub fn cache_len(&self) -> usize {
        self.mu_cache.len()
    }

    pub fn set_cache_capacity(&mut self, capacity: usize) {
        self.mu_cache.set_capacity(capacity);
        self.excitation_cache.set_capacity(capacity);
    }

    pub fn clear_cache(&mut self) {
        self.mu_cache.clear();
        self.excitation_cache.clear();
    }

    /// Empty the caches and memoise every energy of `energies`.
    pub fn fill_cache(&mut self, energies: &[f64]) -> Result<()> {
        self.clear_cache();
        self.update_cache(energies)
    }

    /// Memoise the energies of `energies` not cached yet. Energies that do
    /// not fit are skipped.
    pub fn update_cache(&mut self, energies: &[f64]) -> Result<()> {
        for &energy in energies {
            let key = EnergyKey::from(energy);
            if self.mu_cache.contains_key(&key) && self.excitation_cache.contains_key(&key) {
                continue;
            }
            let attenuation = self.table.attenuation(energy, self.binding.shells())?;
            let excitation = self.compute_excitation_from(&attenuation)?;
            if !self.mu_cache.insert(key, attenuation) || !self.excitation_cache.insert(key, excitation) {
                tracing::warn!(element = %self.symbol, energy, "cache full, remaining energies not cached");
                break;
            }
        }
        Ok(())
    }

    fn require_partials(&self) -> Result<()> {
        if self.table.has_partials() {
            Ok(())
        } else {
            Err(XrfError::runtime(format!(
                "{}: partial photoelectric cross sections not initialized",
                self.symbol
            )))
        }
    }

    fn compute_excitation_from(&self, attenuation: &ShellAttenuation) -> Result<CachedExcitation> {
        self.require_partials()?;
        let distribution = vacancies_from(attenuation);
        let lines = if distribution.sum() > 0.0 {
            self.cascade.emitted_lines(&distribution, &self.binding, true, true)?
        } else {
            EmissionLines::new()
        };
        Ok(CachedExcitation {
            photoelectric: attenuation.totals.photoelectric,
            lines,
        })
    }

    pub fn set_cascade_cache_enabled(&mut self, enabled: bool) {
        self.cascade.set_cache_enabled(enabled);
    }

    pub fn fill_cascade_cache(&mut self) -> Result<()> {
        self.excitation_cache.clear();
        self.cascade.fill_cache(&self.binding)
    }

    pub fn empty_cascade_cache(&mut self) {
        self.cascade.clear_cache();
    }

    pub fn cascade_cache_len(&self) -> usize {
        self.cascade.cache_len()
    }

    /// Serializable form of this element.
    pub fn to_record(&self) -> ElementRecord {
        let table = self.reference_table.as_ref().unwrap_or(&self.table);
        let column = |kind: CrossSectionKind| table.column(kind).to_vec();
        let cross_sections = xrfcalc_data::CrossSectionRecord {
            energy: table.energy().to_vec(),
            photoelectric: column(CrossSectionKind::Photoelectric),
            coherent: column(CrossSectionKind::Coherent),
            compton: column(CrossSectionKind::Compton),
            pair: column(CrossSectionKind::Pair),
        };
        let partial_photoelectric = PartialShell::ALL
            .into_iter()
            .filter_map(|shell| {
                table.partial_table(shell).map(|(energy, values)| PartialPhotoelectricRecord {
                    shell: shell.label().to_string(),
                    energy: energy.to_vec(),
                    values: values.to_vec(),
                })
            })
            .collect();
        let shells = self
            .cascade
            .defined_shells()
            .map(|model| {
                let constants = model.constants();
                let mut values = vec![LabelledValue::new("omega", constants.fluorescence_yield)];
                for (to, &f) in constants.coster_kronig.iter() {
                    if f > 0.0 {
                        let label = format!("f{}{}", model.shell().subshell_index(), to.subshell_index());
                        values.push(LabelledValue::new(label, f));
                    }
                }
                ShellRecord {
                    shell: model.shell().label().to_string(),
                    constants: values,
                    radiative: model
                        .radiative_transitions()
                        .iter()
                        .map(|t| LabelledValue::new(t.label.clone(), t.ratio))
                        .collect(),
                    nonradiative: model
                        .nonradiative_transitions()
                        .iter()
                        .map(|t| LabelledValue::new(t.label.clone(), t.ratio))
                        .collect(),
                }
            })
            .collect();
        ElementRecord {
            symbol: self.symbol.clone(),
            atomic_number: self.atomic_number,
            atomic_mass: self.atomic_mass,
            density: self.density,
            binding_energies: self.binding.iter().map(|(l, e)| LabelledValue::new(l, e)).collect(),
            cross_sections,
            partial_photoelectric,
            shells,
        }
    }
}

fn vacancies_from(attenuation: &ShellAttenuation) -> VacancyDistribution {
    let photoelectric = attenuation.totals.photoelectric;
    if photoelectric <= 0.0 {
        return ShellMap::default();
    }
    ShellMap::from_fn(|shell| attenuation.partial.shells[shell] / photoelectric)
}

fn labelled(values: &[LabelledValue]) -> impl Iterator<Item = (&str, f64)> {
    values.iter().map(|v| (v.label.as_str(), v.value))
}

impl TryFrom<&ElementRecord> for Element {
    type Error = XrfError;

    fn try_from(record: &ElementRecord) -> Result<Self> {
        let mut element = Element::new(&record.symbol, record.atomic_number)?;
        if record.atomic_mass > 0.0 {
            element.set_atomic_mass(record.atomic_mass)?;
        }
        if record.density > 0.0 {
            element.set_density(record.density)?;
        }
        element.set_binding_energies(labelled(&record.binding_energies))?;
        let cs = &record.cross_sections;
        if !cs.energy.is_empty() {
            let pair = (!cs.pair.is_empty()).then_some(cs.pair.as_slice());
            element.set_mass_attenuation_coefficients(&cs.energy, &cs.photoelectric, &cs.coherent, &cs.compton, pair)?;
        }
        for partial in &record.partial_photoelectric {
            let shell: PartialShell = partial.shell.parse()?;
            element.set_partial_photoelectric(shell, &partial.energy, &partial.values)?;
        }
        for shell_record in &record.shells {
            let shell: Shell = shell_record.shell.parse()?;
            element.set_shell_constants(shell, labelled(&shell_record.constants))?;
            element.set_radiative_transitions(shell, labelled(&shell_record.radiative))?;
            element.set_nonradiative_transitions(shell, labelled(&shell_record.nonradiative))?;
        }
        Ok(element)
    }
}
