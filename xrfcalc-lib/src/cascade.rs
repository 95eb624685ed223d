//! Vacancy cascade through the K, L and M shells.

use std::collections::BTreeMap;

use crate::cache::BoundedCache;
use crate::constants::{DEFAULT_CACHE_CAPACITY, DEFAULT_ORIGIN_BINDING_ENERGY};
use crate::error::{Result, XrfError};
use crate::shell::{BindingEnergies, Shell, ShellMap, VacancyDistribution};

/// A characteristic line: energy (keV) and rate.
///
/// Collections of lines are keyed by IUPAC transition label (`KL3`, `L3M5`...).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EmissionLine {
    pub energy: f64,
    pub rate: f64,
}

pub type EmissionLines = BTreeMap<String, EmissionLine>;

/// Fluorescence and Coster-Kronig yields of a shell.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ShellConstants {
    pub fluorescence_yield: f64,
    /// `f_ij` by destination subshell; non-zero only for less bound
    /// subshells of the same principal shell.
    pub coster_kronig: ShellMap<f64>,
}

impl ShellConstants {
    pub fn coster_kronig_total(&self) -> f64 {
        self.coster_kronig.sum()
    }

    pub fn auger_yield(&self) -> f64 {
        (1.0 - self.fluorescence_yield - self.coster_kronig_total()).max(0.0)
    }
}

/// Radiative transition filling a vacancy of the owning shell.
#[derive(Debug, Clone, PartialEq)]
pub struct RadiativeTransition {
    pub label: String,
    /// Level the electron comes from, where the vacancy moves to.
    pub origin: String,
    /// Fraction of radiative decays going through this line.
    pub ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonradiativeKind {
    Auger,
    CosterKronig,
}

/// Auger or Coster-Kronig transition `<vacancy>-<filling><ejected>`.
#[derive(Debug, Clone, PartialEq)]
pub struct NonradiativeTransition {
    pub label: String,
    pub filling: String,
    pub ejected: String,
    pub kind: NonradiativeKind,
    /// Normalized within the Auger group, or within the Coster-Kronig group
    /// sharing the same filling subshell.
    pub ratio: f64,
}

impl NonradiativeTransition {
    /// Vacancies created in `shell`: 0, 1 or 2.
    fn vacancies_in(&self, shell: Shell) -> f64 {
        let label = shell.label();
        [self.filling.as_str(), self.ejected.as_str()]
            .iter()
            .filter(|level| **level == label)
            .count() as f64
    }
}

/// Direct vacancy transfer from one shell to another, by mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VacancyTransfer {
    pub radiative: f64,
    pub auger: f64,
    pub coster_kronig: f64,
}

impl VacancyTransfer {
    pub fn total(&self) -> f64 {
        self.radiative + self.auger + self.coster_kronig
    }
}

/// Decay model of a single shell.
#[derive(Debug, Clone, PartialEq)]
pub struct ShellModel {
    shell: Shell,
    constants: ShellConstants,
    radiative: Vec<RadiativeTransition>,
    nonradiative: Vec<NonradiativeTransition>,
}

/// Split `L2M45` into `["L2", "M45"]`.
fn split_levels(pair: &str) -> Vec<&str> {
    let mut starts: Vec<usize> = pair
        .char_indices()
        .filter(|(_, c)| c.is_ascii_uppercase())
        .map(|(i, _)| i)
        .collect();
    starts.push(pair.len());
    starts.windows(2).map(|w| &pair[w[0]..w[1]]).collect()
}

impl ShellModel {
    pub fn new(shell: Shell) -> Self {
        ShellModel {
            shell,
            constants: ShellConstants::default(),
            radiative: Vec::new(),
            nonradiative: Vec::new(),
        }
    }

    pub fn shell(&self) -> Shell {
        self.shell
    }

    pub fn constants(&self) -> &ShellConstants {
        &self.constants
    }

    pub fn radiative_transitions(&self) -> &[RadiativeTransition] {
        &self.radiative
    }

    pub fn nonradiative_transitions(&self) -> &[NonradiativeTransition] {
        &self.nonradiative
    }

    /// Update yields from labelled values: `omega` for the fluorescence
    /// yield and `f<i><j>` for the Coster-Kronig yield from subshell `i`
    /// (this shell) to subshell `j` of the same principal shell.
    ///
    /// Constants not mentioned keep their value.
    ///
    /// # Errors
    /// `InvalidArgument` for unknown labels or values outside [0, 1].
    pub fn set_constants<S: AsRef<str>>(&mut self, values: impl IntoIterator<Item = (S, f64)>) -> Result<()> {
        let mut updated = self.constants;
        for (label, value) in values {
            let label = label.as_ref();
            if !(0.0..=1.0).contains(&value) {
                return Err(XrfError::invalid(format!(
                    "{} shell constant {label} = {value} outside [0, 1]",
                    self.shell
                )));
            }
            if label == "omega" {
                updated.fluorescence_yield = value;
                continue;
            }
            let destination = self.coster_kronig_destination(label).ok_or_else(|| {
                XrfError::invalid(format!("invalid {} shell constant '{label}'", self.shell))
            })?;
            updated.coster_kronig[destination] = value;
        }
        if updated.fluorescence_yield + updated.coster_kronig_total() > 1.0 + 1.0e-6 {
            tracing::warn!(shell = %self.shell, "fluorescence and Coster-Kronig yields exceed unity");
        }
        self.constants = updated;
        Ok(())
    }

    fn coster_kronig_destination(&self, label: &str) -> Option<Shell> {
        let digits = label.strip_prefix('f')?.as_bytes();
        if digits.len() != 2 || !digits.iter().all(u8::is_ascii_digit) {
            return None;
        }
        let (from, to) = ((digits[0] - b'0') as usize, (digits[1] - b'0') as usize);
        if from != self.shell.subshell_index() || to <= from {
            return None;
        }
        Shell::from_parts(self.shell.main_shell(), to)
    }

    /// Replace the radiative transitions. Ratios are normalized to unit
    /// sum; a `TOTAL` entry is ignored.
    ///
    /// # Errors
    /// `InvalidArgument` for labels not starting with this shell or
    /// negative ratios.
    pub fn set_radiative_transitions<S: AsRef<str>>(
        &mut self,
        transitions: impl IntoIterator<Item = (S, f64)>,
    ) -> Result<()> {
        let mut parsed = Vec::new();
        for (label, value) in transitions {
            let label = label.as_ref();
            if label == "TOTAL" {
                continue;
            }
            let origin = label
                .strip_prefix(self.shell.label())
                .filter(|rest| rest.starts_with(|c: char| c.is_ascii_uppercase()))
                .ok_or_else(|| {
                    XrfError::invalid(format!(
                        "radiative transition '{label}' does not fill a {} vacancy",
                        self.shell
                    ))
                })?;
            if !value.is_finite() || value < 0.0 {
                return Err(XrfError::invalid(format!(
                    "radiative transition {label} has invalid ratio {value}"
                )));
            }
            parsed.push(RadiativeTransition {
                label: label.to_string(),
                origin: origin.to_string(),
                ratio: value,
            });
        }
        let total: f64 = parsed.iter().map(|t| t.ratio).sum();
        for transition in &mut parsed {
            transition.ratio = if total > 0.0 { transition.ratio / total } else { 0.0 };
        }
        self.radiative = parsed;
        Ok(())
    }

    /// Replace the Auger and Coster-Kronig transitions.
    ///
    /// A transition whose filling electron comes from the same principal
    /// shell as the vacancy is Coster-Kronig, any other is Auger. Auger
    /// ratios are normalized together, Coster-Kronig ratios per filling
    /// subshell.
    ///
    /// # Errors
    /// `InvalidArgument` for malformed labels or negative ratios.
    pub fn set_nonradiative_transitions<S: AsRef<str>>(
        &mut self,
        transitions: impl IntoIterator<Item = (S, f64)>,
    ) -> Result<()> {
        let mut parsed = Vec::new();
        for (label, value) in transitions {
            let label = label.as_ref();
            if label == "TOTAL" {
                continue;
            }
            let malformed = || {
                XrfError::invalid(format!(
                    "invalid {} non-radiative transition '{label}'",
                    self.shell
                ))
            };
            let rest = label
                .strip_prefix(self.shell.label())
                .and_then(|rest| rest.strip_prefix('-'))
                .ok_or_else(malformed)?;
            let levels = split_levels(rest);
            if levels.len() != 2 || !rest.starts_with(|c: char| c.is_ascii_uppercase()) {
                return Err(malformed());
            }
            if !value.is_finite() || value < 0.0 {
                return Err(XrfError::invalid(format!(
                    "non-radiative transition {label} has invalid ratio {value}"
                )));
            }
            let kind = if levels[0].starts_with(self.shell.main_shell()) {
                if Shell::from_label(levels[0]).is_some_and(|s| s <= self.shell) {
                    return Err(malformed());
                }
                NonradiativeKind::CosterKronig
            } else {
                NonradiativeKind::Auger
            };
            parsed.push(NonradiativeTransition {
                label: label.to_string(),
                filling: levels[0].to_string(),
                ejected: levels[1].to_string(),
                kind,
                ratio: value,
            });
        }

        let mut group_totals: BTreeMap<(bool, String), f64> = BTreeMap::new();
        for t in &parsed {
            *group_totals.entry(Self::group_of(t)).or_default() += t.ratio;
        }
        for t in &mut parsed {
            let total = group_totals[&Self::group_of(t)];
            t.ratio = if total > 0.0 { t.ratio / total } else { 0.0 };
        }
        self.nonradiative = parsed;
        Ok(())
    }

    fn group_of(t: &NonradiativeTransition) -> (bool, String) {
        match t.kind {
            NonradiativeKind::Auger => (false, String::new()),
            NonradiativeKind::CosterKronig => (true, t.filling.clone()),
        }
    }

    /// Probability that one vacancy in this shell directly produces a
    /// vacancy in `destination`.
    pub fn direct_vacancy_transfer(&self, destination: Shell) -> VacancyTransfer {
        let mut transfer = VacancyTransfer::default();
        if destination <= self.shell {
            return transfer;
        }
        let omega = self.constants.fluorescence_yield;
        transfer.radiative = self
            .radiative
            .iter()
            .filter(|t| t.origin == destination.label())
            .map(|t| omega * t.ratio)
            .sum();

        let auger_yield = self.constants.auger_yield();
        for t in &self.nonradiative {
            let count = t.vacancies_in(destination);
            if count == 0.0 {
                continue;
            }
            match t.kind {
                NonradiativeKind::Auger => transfer.auger += auger_yield * t.ratio * count,
                NonradiativeKind::CosterKronig => {
                    let f = Shell::from_label(&t.filling)
                        .map(|s| self.constants.coster_kronig[s])
                        .unwrap_or(0.0);
                    transfer.coster_kronig += f * t.ratio * count;
                }
            }
        }
        transfer
    }
}

/// Energy of a radiative line, `E(destination) − E(origin)`.
///
/// # Errors
/// `Domain` if the destination binding energy is not positive,
/// `Runtime` for a negative origin binding energy.
pub fn line_energy(binding: &BindingEnergies, destination: Shell, origin: &str) -> Result<f64> {
    let upper = binding.shell(destination);
    if upper <= 0.0 {
        return Err(XrfError::domain(format!(
            "{destination} shell has no positive binding energy"
        )));
    }
    let lower = match binding.get(origin) {
        Some(e) if e < 0.0 => {
            return Err(XrfError::runtime(format!(
                "negative binding energy for level {origin}"
            )));
        }
        Some(e) if e > 0.0 => e,
        _ => DEFAULT_ORIGIN_BINDING_ENERGY,
    };
    Ok(upper - lower)
}

/// Decay models of every shell of an element and the vacancy cascade
/// connecting them.
#[derive(Debug, Clone)]
pub struct ShellCascadeModel {
    shells: ShellMap<Option<ShellModel>>,
    cache: BoundedCache<Shell, EmissionLines>,
    cache_enabled: bool,
}

impl Default for ShellCascadeModel {
    fn default() -> Self {
        ShellCascadeModel {
            shells: ShellMap::default(),
            cache: BoundedCache::new(DEFAULT_CACHE_CAPACITY),
            cache_enabled: false,
        }
    }
}

impl ShellCascadeModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shell(&self, shell: Shell) -> Option<&ShellModel> {
        self.shells[shell].as_ref()
    }

    /// Model of `shell`, created empty if needed. Invalidates the cache.
    pub fn shell_mut(&mut self, shell: Shell) -> &mut ShellModel {
        self.cache.clear();
        self.shells[shell].get_or_insert_with(|| ShellModel::new(shell))
    }

    pub fn defined_shells(&self) -> impl Iterator<Item = &ShellModel> {
        self.shells.values().filter_map(Option::as_ref)
    }

    pub fn fluorescence_yield(&self, shell: Shell) -> f64 {
        self.shell(shell)
            .map(|m| m.constants.fluorescence_yield)
            .unwrap_or(0.0)
    }

    /// Direct transfer ratio from `from` to `to`, zero if `from` has no model.
    pub fn direct_vacancy_transfer(&self, from: Shell, to: Shell) -> VacancyTransfer {
        self.shell(from)
            .map(|m| m.direct_vacancy_transfer(to))
            .unwrap_or_default()
    }

    /// Propagate vacancies from the deepest shell outward.
    ///
    /// Each shell, once its own probability is final, hands its vacancies
    /// to all less bound shells.
    pub fn propagate(&self, initial: &VacancyDistribution) -> VacancyDistribution {
        let mut result = *initial;
        for from in Shell::ALL {
            let vacancies = result[from];
            if vacancies <= 0.0 {
                continue;
            }
            let Some(model) = self.shell(from) else {
                continue;
            };
            for to in from.higher() {
                result[to] += vacancies * model.direct_vacancy_transfer(to).total();
            }
        }
        result
    }

    pub fn set_cache_enabled(&mut self, enabled: bool) {
        self.cache_enabled = enabled;
    }

    pub fn is_cache_enabled(&self) -> bool {
        self.cache_enabled
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Store, for every defined shell, the lines following a unit vacancy
    /// (cascade and yields applied).
    pub fn fill_cache(&mut self, binding: &BindingEnergies) -> Result<()> {
        self.cache.clear();
        for shell in Shell::ALL {
            if self.shells[shell].is_none() {
                continue;
            }
            let lines = self.compute_lines(&ShellMap::unit(shell), binding, true, true)?;
            if !self.cache.insert(shell, lines) {
                tracing::warn!("cascade cache full");
                break;
            }
        }
        Ok(())
    }

    /// Lines emitted by `distribution`.
    ///
    /// With `cascade` the distribution is first propagated; with
    /// `apply_yield` the rates are multiplied by the fluorescence yield.
    /// A populated, enabled cache serves the cascade-and-yield case.
    pub fn emitted_lines(
        &self,
        distribution: &VacancyDistribution,
        binding: &BindingEnergies,
        cascade: bool,
        apply_yield: bool,
    ) -> Result<EmissionLines> {
        if cascade && apply_yield && self.cache_enabled && !self.cache.is_empty() {
            return self.cached_lines(distribution);
        }
        self.compute_lines(distribution, binding, cascade, apply_yield)
    }

    fn cached_lines(&self, distribution: &VacancyDistribution) -> Result<EmissionLines> {
        let mut lines = EmissionLines::new();
        for (shell, &vacancies) in distribution.iter() {
            if vacancies <= 0.0 {
                continue;
            }
            let Some(cached) = self.cache.get(&shell) else {
                if self.shells[shell].is_some() {
                    return Err(XrfError::runtime(format!("{shell} shell missing from cascade cache")));
                }
                continue;
            };
            for (label, line) in cached {
                let entry = lines.entry(label.clone()).or_insert(EmissionLine {
                    energy: line.energy,
                    rate: 0.0,
                });
                entry.rate += vacancies * line.rate;
            }
        }
        Ok(lines)
    }

    fn compute_lines(
        &self,
        distribution: &VacancyDistribution,
        binding: &BindingEnergies,
        cascade: bool,
        apply_yield: bool,
    ) -> Result<EmissionLines> {
        let vacancies = if cascade {
            self.propagate(distribution)
        } else {
            *distribution
        };
        let mut lines = EmissionLines::new();
        for model in self.defined_shells() {
            let v = vacancies[model.shell];
            if v <= 0.0 {
                continue;
            }
            let weight = if apply_yield {
                v * model.constants.fluorescence_yield
            } else {
                v
            };
            for t in &model.radiative {
                let rate = t.ratio * weight;
                if rate <= 0.0 {
                    continue;
                }
                let energy = line_energy(binding, model.shell, &t.origin)?;
                lines.insert(t.label.clone(), EmissionLine { energy, rate });
            }
        }
        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn k_shell() -> ShellModel {
        let mut model = ShellModel::new(Shell::K);
        model.set_constants([("omega", 0.3)]).unwrap();
        model
            .set_radiative_transitions([("KL2", 1.0), ("KL3", 2.0), ("KM3", 1.0), ("TOTAL", 4.0)])
            .unwrap();
        model
            .set_nonradiative_transitions([("K-L1L1", 1.0), ("K-L2L3", 3.0)])
            .unwrap();
        model
    }

    #[test]
    fn test_radiative_ratios_are_normalized() {
        let model = k_shell();
        let total: f64 = model.radiative_transitions().iter().map(|t| t.ratio).sum();
        assert!((total - 1.0).abs() < 1e-15);
        assert_eq!(model.radiative_transitions()[1].origin, "L3");
    }

    #[test]
    fn test_direct_transfer_counts_both_vacancies() {
        let model = k_shell();
        let auger = 0.7;
        // K-L1L1 leaves two L1 vacancies
        let l1 = model.direct_vacancy_transfer(Shell::L1);
        assert!((l1.auger - auger * 0.25 * 2.0).abs() < 1e-15);
        assert_eq!(l1.radiative, 0.0);
        let l3 = model.direct_vacancy_transfer(Shell::L3);
        assert!((l3.radiative - 0.3 * 0.5).abs() < 1e-15);
        assert!((l3.auger - auger * 0.75).abs() < 1e-15);
        assert_eq!(model.direct_vacancy_transfer(Shell::K).total(), 0.0);
    }

    #[test]
    fn test_coster_kronig_classification() {
        let mut l1 = ShellModel::new(Shell::L1);
        l1.set_constants([("omega", 0.1), ("f12", 0.2), ("f13", 0.5)]).unwrap();
        l1.set_nonradiative_transitions([("L1-L2M4", 1.0), ("L1-L3M5", 1.0), ("L1-M4M5", 2.0)])
            .unwrap();
        let kinds: Vec<_> = l1.nonradiative_transitions().iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            [
                NonradiativeKind::CosterKronig,
                NonradiativeKind::CosterKronig,
                NonradiativeKind::Auger
            ]
        );
        // each Coster-Kronig group is normalized on its own
        let l2 = l1.direct_vacancy_transfer(Shell::L2);
        assert!((l2.coster_kronig - 0.2).abs() < 1e-15);
        let m4 = l1.direct_vacancy_transfer(Shell::M4);
        assert!((m4.coster_kronig - 0.2).abs() < 1e-15);
        assert!((m4.auger - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_labels() {
        let mut l1 = ShellModel::new(Shell::L1);
        assert!(l1.set_constants([("f21", 0.1)]).is_err());
        assert!(l1.set_constants([("omega", 1.5)]).is_err());
        assert!(l1.set_radiative_transitions([("KL3", 1.0)]).is_err());
        assert!(l1.set_nonradiative_transitions([("L1L2M4", 1.0)]).is_err());
        assert!(l1.set_nonradiative_transitions([("L1-L2", 1.0)]).is_err());
    }

    #[test]
    fn test_line_energy_defaults_origin() {
        let binding = BindingEnergies::from_pairs([("K", 7.112), ("L3", 0.7081)]).unwrap();
        assert!((line_energy(&binding, Shell::K, "L3").unwrap() - 6.4039).abs() < 1e-12);
        assert!((line_energy(&binding, Shell::K, "N1").unwrap() - 7.109).abs() < 1e-12);
        assert!(matches!(
            line_energy(&binding, Shell::L1, "M3"),
            Err(XrfError::Domain(_))
        ));
    }
}
