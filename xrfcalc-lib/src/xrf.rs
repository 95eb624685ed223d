use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::ops::Range;

use tracing::{debug, trace};

use crate::beam::Beam;
use crate::cache::EnergyKey;
use crate::config::{FluorescenceOptions, XrfConfig};
use crate::constants::{
    LAYER_TRANSMISSION_CUTOFF, LAYER_WEIGHT_CUTOFF, MINIMUM_EXCITATION_RATE, SINGULARITY_NUDGE,
    TERTIARY_ENHANCEMENT, TERTIARY_MASS_FRACTION,
};
use crate::element::ExcitationFactors;
use crate::elements::{Elements, EscapeLines};
use crate::error::{Result, XrfError};
use crate::material::{Composition, Layer};
use crate::result::{FluorescenceResult, LayerLines, LineKind, LineResult};
use crate::shell::ShellMap;
use crate::special::{de_boer_l0, de_boer_x};
use crate::target::{LineFamily, Target};

/// Fluorescence intensities of a multilayer sample.
///
/// Holds the measurement set-up; the element library is passed to every
/// computation so that one library can serve several set-ups.
///
/// # Example
/// ```no_run
/// use xrfcalc::{Beam, Elements, FluorescenceOptions, Layer, Target, Xrf, XrfConfig};
///
/// # fn run(elements: &Elements) -> xrfcalc::Result<()> {
/// let mut config = XrfConfig::new();
/// config.set_beam(Beam::monochromatic(10.0)?);
/// config.set_sample(vec![Layer::new("Fe", 7.874, 1.0e-3, 1.0)?], 0)?;
/// let xrf = Xrf::new(config);
/// let targets = ["Fe K".parse::<Target>()?];
/// let result = xrf.multilayer_fluorescence(&targets, elements, &FluorescenceOptions::default(), None)?;
/// println!("Fe K: {}", result.total_rate("Fe K"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Xrf {
    config: XrfConfig,
}

/// Line of a layer excited at the current beam energy, source of
/// secondary excitation in other layers.
struct SourceLine {
    name: String,
    energy: f64,
    rate: f64,
    /// Total attenuation of the source layer at `energy`.
    mu_total: f64,
}

/// Target line excited by the current ray.
#[derive(Default)]
struct RayLine {
    energy: f64,
    efficiency: f64,
    mu_1_i: f64,
    primary: f64,
    secondary: f64,
    rate: f64,
}

/// Total attenuation of sample layers, memoised per energy for one call.
struct LayerAttenuation<'a> {
    elements: &'a Elements,
    sample: &'a [Layer],
    compositions: &'a [Composition],
    values: HashMap<(usize, EnergyKey), f64>,
}

impl<'a> LayerAttenuation<'a> {
    fn new(elements: &'a Elements, sample: &'a [Layer], compositions: &'a [Composition]) -> Self {
        LayerAttenuation {
            elements,
            sample,
            compositions,
            values: HashMap::new(),
        }
    }

    fn total(&mut self, layer: usize, energy: f64) -> Result<f64> {
        match self.values.entry((layer, EnergyKey::from(energy))) {
            Entry::Occupied(e) => Ok(*e.get()),
            Entry::Vacant(e) => {
                let mu = self
                    .elements
                    .mass_attenuation_of(&self.compositions[layer], energy)?
                    .total;
                Ok(*e.insert(mu))
            }
        }
    }

    /// `Σ ρt·μ(E)` over `layers`.
    fn path(&mut self, layers: Range<usize>, energy: f64) -> Result<f64> {
        let mut sum = 0.0;
        for b in layers {
            sum += self.sample[b].mass_thickness() * self.total(b, energy)?;
        }
        Ok(sum)
    }
}

/// Unit-weight excitation factors, memoised per element and energy for one call.
struct ExcitationMemo<'a> {
    elements: &'a Elements,
    values: HashMap<(String, EnergyKey), ExcitationFactors>,
}

impl<'a> ExcitationMemo<'a> {
    fn factors(&mut self, symbol: &str, energy: f64) -> Result<&ExcitationFactors> {
        match self.values.entry((symbol.to_string(), EnergyKey::from(energy))) {
            Entry::Occupied(e) => Ok(e.into_mut()),
            Entry::Vacant(e) => Ok(e.insert(self.elements.excitation_factors(symbol, energy, 1.0)?)),
        }
    }
}

fn sin_degrees(angle: f64) -> f64 {
    angle.to_radians().sin()
}

impl Xrf {
    pub fn new(config: XrfConfig) -> Self {
        Xrf { config }
    }

    pub fn config(&self) -> &XrfConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut XrfConfig {
        &mut self.config
    }

    /// Fraction of the isotropic emission of `layer` reaching the detector
    /// window: `0.5·(1 − d/√(d² + r²))`, r the window radius and d the
    /// detector distance corrected by the exit path through the layers
    /// between the reference layer and `layer`.
    ///
    /// 1 without detector or for a zero diameter.
    pub fn geometric_efficiency(&self, layer: usize) -> Result<f64> {
        let sample = self.config.sample();
        if !sample.is_empty() && layer >= sample.len() {
            return Err(XrfError::invalid(format!(
                "layer {layer} outside a {}-layer sample",
                sample.len()
            )));
        }
        let Some(detector) = self.config.detector() else {
            return Ok(1.0);
        };
        let radius = 0.5 * detector.diameter();
        if radius == 0.0 {
            return Ok(1.0);
        }
        let mut distance = detector.distance();
        if distance == 0.0 && layer == 0 {
            return Ok(0.5);
        }
        let sin_out = sin_degrees(self.config.alpha_out());
        let reference = self.config.reference_layer();
        if layer > reference {
            distance += sample[reference..layer].iter().map(|l| l.thickness()).sum::<f64>() / sin_out;
        } else if layer < reference {
            distance -= sample[layer..reference].iter().map(|l| l.thickness()).sum::<f64>() / sin_out;
        }
        Ok(0.5 * (1.0 - distance / (distance * distance + radius * radius).sqrt()))
    }

    /// Lowest beam energy (keV) able to excite the family.
    pub fn energy_threshold(&self, element: &str, family: LineFamily, elements: &Elements) -> Result<f64> {
        Ok(family.energy_threshold(elements.binding_energies(element)?))
    }

    /// Probability that a photon of `energy` emitted by `layer` towards the
    /// detector is counted.
    fn detection_efficiency(&self, layer: usize, energy: f64, elements: &Elements, geometric: f64) -> Result<f64> {
        let mut efficiency = 1.0;
        for upper in &self.config.sample()[..layer] {
            efficiency *= upper.transmission(energy, elements, self.config.alpha_out())?;
        }
        for attenuator in self.config.attenuators() {
            efficiency *= attenuator.transmission(energy, elements, 90.0)?;
        }
        for table in self.config.user_attenuators() {
            efficiency *= table.transmission(energy);
        }
        efficiency *= geometric;
        if let Some(detector) = self.config.detector().filter(|d| d.has_material()) {
            efficiency *= 1.0 - detector.layer().transmission(energy, elements, 90.0)?;
        }
        Ok(efficiency)
    }

    /// Detected fluorescence of `targets` in the configured sample.
    ///
    /// `beam` replaces the configured beam when given and not empty.
    /// Without beam rays or sample layers the theoretical line ratios of
    /// each family are returned instead (see
    /// [`theoretical_ratios`](Self::theoretical_ratios)).
    ///
    /// # Errors
    /// Any failure aborts the whole computation: unknown elements or
    /// materials, target layers outside the sample, layers without mass
    /// thickness, invalid options.
    pub fn multilayer_fluorescence(
        &self,
        targets: &[Target],
        elements: &Elements,
        options: &FluorescenceOptions,
        beam: Option<&Beam>,
    ) -> Result<FluorescenceResult> {
        options.validate()?;
        let beam = match beam {
            Some(b) if !b.is_empty() => b,
            _ => self.config.beam(),
        };
        let sample = self.config.sample();
        for target in targets {
            elements.element(&target.element)?;
            if let Some(layer) = target.layer {
                if layer >= sample.len().max(1) {
                    return Err(XrfError::invalid(format!(
                        "{}: layer {layer} outside a {}-layer sample",
                        target.key(),
                        sample.len()
                    )));
                }
            }
        }
        if beam.is_empty() || sample.is_empty() {
            debug!("no beam or no sample, returning theoretical line ratios");
            return Self::theoretical_ratios(targets, elements);
        }
        for layer in sample {
            if !(layer.mass_thickness() > 0.0) {
                return Err(XrfError::runtime(format!(
                    "sample layer {} has no mass thickness",
                    layer.name()
                )));
            }
        }

        let sin_in = sin_degrees(self.config.alpha_in());
        let sin_out = sin_degrees(self.config.alpha_out());
        let compositions: Vec<Composition> = sample
            .iter()
            .map(|layer| layer.composition(elements))
            .collect::<Result<_>>()?;

        let energies = beam.energies();
        let mut weights = beam.weights();
        for filter in self.config.beam_filters() {
            for (w, t) in weights.iter_mut().zip(filter.transmission_grid(&energies, elements, 90.0)?) {
                *w *= t;
            }
        }
        for table in self.config.user_beam_filters() {
            for (w, &e) in weights.iter_mut().zip(&energies) {
                *w *= table.transmission(e);
            }
        }

        let geometric: Vec<f64> = if options.use_geometric_efficiency {
            (0..sample.len())
                .map(|i| self.geometric_efficiency(i))
                .collect::<Result<_>>()?
        } else {
            vec![1.0; sample.len()]
        };
        let thresholds: Vec<f64> = targets
            .iter()
            .map(|t| self.energy_threshold(&t.element, t.family, elements))
            .collect::<Result<_>>()?;
        let min_threshold = thresholds.iter().copied().fold(f64::INFINITY, f64::min);

        debug!(
            rays = energies.len(),
            layers = sample.len(),
            targets = targets.len(),
            secondary = options.secondary,
            "computing multilayer fluorescence"
        );

        let mut mu = LayerAttenuation::new(elements, sample, &compositions);
        let mut memo = ExcitationMemo {
            elements,
            values: HashMap::new(),
        };
        let mut escapes: HashMap<EnergyKey, EscapeLines> = HashMap::new();
        let mut result = FluorescenceResult::new();

        for (&energy, &weight) in energies.iter().zip(&weights).rev() {
            if energy < min_threshold {
                continue;
            }
            trace!(energy, weight, "ray");

            let mut mu_in = Vec::with_capacity(sample.len());
            let mut layer_weight = Vec::with_capacity(sample.len());
            let mut attenuation = 0.0_f64;
            for (i, layer) in sample.iter().enumerate() {
                layer_weight.push((-attenuation).exp());
                let mu_total = mu.total(i, energy)?;
                mu_in.push(mu_total);
                attenuation += layer.mass_thickness() * mu_total / sin_in;
            }

            let sources = if options.secondary > 0 {
                self.secondary_sources(
                    energy,
                    weight,
                    &layer_weight,
                    min_threshold,
                    options,
                    elements,
                    &compositions,
                    &mut memo,
                    &mut mu,
                )?
            } else {
                Vec::new()
            };

            for (target, &threshold) in targets.iter().zip(&thresholds) {
                if threshold > energy {
                    continue;
                }
                let primary_factors = elements.excitation_factors(&target.element, energy, weight)?;
                let key = target.key();
                let layers = match target.layer {
                    Some(layer) => layer..layer + 1,
                    None => 0..sample.len(),
                };
                for i in layers {
                    let mass_fraction = compositions[i].get(&target.element).copied().unwrap_or(0.0);
                    let mf_factor = if options.use_mass_fractions { mass_fraction } else { 1.0 };
                    if mf_factor == 0.0 {
                        continue;
                    }
                    let mut current: BTreeMap<String, RayLine> = BTreeMap::new();
                    let mut fresh: Vec<(String, LineResult)> = Vec::new();
                    for (label, factor) in &primary_factors {
                        if !target.family.matches(label) || !(factor.factor > 0.0) {
                            continue;
                        }
                        let line = match result.line(&key, i, label) {
                            Some(line) => line.clone(),
                            None => {
                                let mu_1_i = mu.total(i, factor.energy)?;
                                let efficiency = self.detection_efficiency(i, factor.energy, elements, geometric[i])?;
                                let line = LineResult::fluorescence(factor.energy, efficiency, mu_1_i);
                                fresh.push((label.clone(), line.clone()));
                                line
                            }
                        };
                        let x = mu_in[i] / sin_in + line.mu_1_i / sin_out;
                        let primary = (1.0 - (-x * sample[i].mass_thickness()).exp()) / x
                            * (mf_factor / sin_in)
                            * factor.rate
                            * layer_weight[i];
                        current.insert(
                            label.clone(),
                            RayLine {
                                energy: line.energy,
                                efficiency: line.efficiency,
                                mu_1_i: line.mu_1_i,
                                primary,
                                secondary: 0.0,
                                rate: primary * line.efficiency,
                            },
                        );
                    }
                    if current.is_empty() {
                        continue;
                    }
                    let lines = result.layer_mut(&key, i);
                    lines.extend(fresh);

                    if options.secondary > 0 {
                        let context = SecondaryContext {
                            target,
                            threshold,
                            layer: i,
                            sin_in,
                            sin_out,
                            mf_factor,
                            mu_in: &mu_in,
                            layer_weight: &layer_weight,
                        };
                        self.add_secondary(&context, &sources, &mut current, lines, &mut memo, &mut mu)?;
                    }

                    for (label, ray_line) in &current {
                        let mut total_escape = 0.0;
                        if let Some(detector) = self.config.detector().filter(|d| d.has_material()) {
                            let escape = match escapes.entry(EnergyKey::from(ray_line.energy)) {
                                Entry::Occupied(e) => e.into_mut(),
                                Entry::Vacant(e) => e.insert(detector.escape(ray_line.energy, elements)?),
                            };
                            for (escape_label, peak) in escape.iter() {
                                let escape_line = lines
                                    .entry(format!("{label} {escape_label}"))
                                    .or_insert_with(|| LineResult::escape(label, peak.energy, ray_line.efficiency));
                                total_escape += peak.rate;
                                escape_line.rate += peak.rate * ray_line.rate;
                                escape_line.escape_ratio = peak.rate;
                                escape_line.primary += peak.rate * ray_line.primary;
                                escape_line.secondary += peak.rate * ray_line.secondary;
                            }
                        }
                        if let Some(line) = lines.get_mut(label) {
                            line.rate += (1.0 - total_escape) * ray_line.rate;
                            line.primary += ray_line.primary;
                            line.secondary += ray_line.secondary;
                            line.mass_fraction = mass_fraction;
                        }
                    }
                }
            }
        }

        if options.secondary > 1 {
            apply_tertiary(&mut result);
        }
        Ok(result)
    }

    /// Lines excited by the ray in every layer, plus coherently scattered
    /// beam, able to excite the targets.
    #[allow(clippy::too_many_arguments)]
    fn secondary_sources(
        &self,
        energy: f64,
        weight: f64,
        layer_weight: &[f64],
        min_threshold: f64,
        options: &FluorescenceOptions,
        elements: &Elements,
        compositions: &[Composition],
        memo: &mut ExcitationMemo<'_>,
        mu: &mut LayerAttenuation<'_>,
    ) -> Result<Vec<Vec<SourceLine>>> {
        let limit = options.secondary_calculation_limit;
        let mut sources = Vec::with_capacity(compositions.len());
        for (j, composition) in compositions.iter().enumerate() {
            let mut layer_sources = Vec::new();
            let families = elements.peak_families(composition.keys().map(String::as_str), energy)?;
            for family in &families {
                let mass_fraction = composition.get(&family.element).copied().unwrap_or(0.0);
                let factors = memo.factors(&family.element, energy)?;
                for (label, factor) in factors {
                    if !label.starts_with(family.shell.label()) {
                        continue;
                    }
                    let rate = factor.rate * mass_fraction;
                    if !(rate > 0.0) || (limit > 0.0 && factor.rate < limit) || factor.energy < min_threshold {
                        continue;
                    }
                    layer_sources.push(SourceLine {
                        name: format!("{} {label}", family.element),
                        energy: factor.energy,
                        rate: rate * weight * layer_weight[j],
                        mu_total: 0.0,
                    });
                }
            }
            let coherent = elements.mass_attenuation_of(composition, energy)?.coherent;
            layer_sources.push(SourceLine {
                name: "coherent scattering".to_string(),
                energy,
                rate: weight * layer_weight[j] * coherent,
                mu_total: 0.0,
            });
            for source in &mut layer_sources {
                source.mu_total = mu.total(j, source.energy)?;
            }
            sources.push(layer_sources);
        }
        Ok(sources)
    }

    /// Secondary excitation of the target lines of one layer by the
    /// sources of every layer: de Boer L0 within the layer, X between
    /// layers.
    fn add_secondary(
        &self,
        ctx: &SecondaryContext<'_>,
        sources: &[Vec<SourceLine>],
        current: &mut BTreeMap<String, RayLine>,
        lines: &mut LayerLines,
        memo: &mut ExcitationMemo<'_>,
        mu: &mut LayerAttenuation<'_>,
    ) -> Result<()> {
        let sample = self.config.sample();
        let i = ctx.layer;
        let layer_1 = &sample[i];
        let d1 = layer_1.mass_thickness();
        let mu_1_lambda = ctx.mu_in[i];
        let scale = ctx.mf_factor * 0.5 / ctx.sin_in;

        for (j, layer_sources) in sources.iter().enumerate() {
            if j != i && ctx.layer_weight[j] / ctx.layer_weight[i] < LAYER_WEIGHT_CUTOFF {
                continue;
            }
            let d2 = sample[j].mass_thickness();
            let mu_2_lambda = ctx.mu_in[j];
            for source in layer_sources {
                if ctx.threshold > source.energy {
                    continue;
                }
                let factors = memo.factors(&ctx.target.element, source.energy)?;
                let contributor = format!("{} {j:02}", source.name);
                for (label, ray_line) in current.iter_mut() {
                    let Some(factor) = factors.get(label) else {
                        continue;
                    };
                    let mu_1_i = ray_line.mu_1_i;
                    let value = if i == j {
                        let p = mu_1_lambda / ctx.sin_in;
                        let p_nudged = if p == source.mu_total {
                            mu_1_lambda / (SINGULARITY_NUDGE * ctx.sin_in)
                        } else {
                            p
                        };
                        let mut value = de_boer_l0(p, mu_1_i / ctx.sin_out, source.mu_total, layer_1.density(), layer_1.thickness())?;
                        value += de_boer_l0(mu_1_i / ctx.sin_out, p_nudged, source.mu_total, layer_1.density(), layer_1.thickness())?;
                        value * scale * factor.rate * source.rate
                    } else if i < j {
                        if factor.rate < MINIMUM_EXCITATION_RATE {
                            continue;
                        }
                        let outgoing = (-mu_1_i * d1 / ctx.sin_out).exp();
                        if outgoing < LAYER_TRANSMISSION_CUTOFF {
                            continue;
                        }
                        let mu_1_j = mu.total(i, source.energy)?;
                        let mu_2_j = source.mu_total;
                        let mu_b = mu.path(i + 1..j, source.energy)?;
                        let p = mu_2_lambda / ctx.sin_in;
                        let x = de_boer_x(p, mu_1_i / ctx.sin_out, d1, d2, mu_1_j, mu_2_j, mu_b)?;
                        outgoing * source.rate * x * scale * factor.rate
                    } else {
                        let layer_factor = (-mu_2_lambda * d2 / ctx.sin_in).exp();
                        let mu_1_j = mu.total(i, source.energy)?;
                        let mu_2_j = source.mu_total;
                        let mu_b = mu.path(j + 1..i, source.energy)?;
                        let mut p = mu_2_lambda / ctx.sin_in;
                        if p == mu_2_j {
                            p = mu_2_lambda / (SINGULARITY_NUDGE * ctx.sin_in);
                        }
                        let x = de_boer_x(-p, -mu_1_i / ctx.sin_out, d1, d2, mu_1_j, mu_2_j, mu_b)?;
                        layer_factor * source.rate * x * scale * factor.rate
                    };
                    if let Some(line) = lines.get_mut(label) {
                        *line.contributors.entry(contributor.clone()).or_insert(0.0) += value;
                    }
                    ray_line.secondary += value;
                    ray_line.rate += value * ray_line.efficiency;
                }
            }
        }
        Ok(())
    }

    /// Radiative line ratios of each target family: a unit vacancy in each
    /// subshell of the family with yields applied and no cascade,
    /// normalized to unit sum, reported under layer 0.
    pub fn theoretical_ratios(targets: &[Target], elements: &Elements) -> Result<FluorescenceResult> {
        let mut result = FluorescenceResult::new();
        for target in targets {
            let element = elements.element(&target.element)?;
            let mut ratios: BTreeMap<String, (f64, f64)> = BTreeMap::new();
            for shell in target.family.shells() {
                if !(element.binding_energies().shell(shell) > 0.0) {
                    continue;
                }
                let emitted = element.emitted_lines(&ShellMap::unit(shell), false, true)?;
                for (label, line) in emitted {
                    if target.family.matches(&label) && line.rate > 0.0 {
                        ratios.entry(label).or_insert((line.energy, 0.0)).1 += line.rate;
                    }
                }
            }
            let total: f64 = ratios.values().map(|(_, rate)| rate).sum();
            let lines = result.layer_mut(&target.key(), 0);
            if !(total > 0.0) {
                continue;
            }
            for (label, (energy, rate)) in ratios {
                let mut line = LineResult::fluorescence(energy, 1.0, 0.0);
                line.rate = rate / total;
                line.primary = line.rate;
                line.mass_fraction = 1.0;
                lines.insert(label, line);
            }
        }
        Ok(result)
    }
}

struct SecondaryContext<'a> {
    target: &'a Target,
    threshold: f64,
    layer: usize,
    sin_in: f64,
    sin_out: f64,
    mf_factor: f64,
    mu_in: &'a [f64],
    layer_weight: &'a [f64],
}

/// Second generation of secondary excitation: lines enhanced by at least
/// [`TERTIARY_ENHANCEMENT`] re-excite the targets in proportion to their
/// enhancement, then every rate is rescaled by `(t + p + s)/(p + s)`.
fn apply_tertiary(result: &mut FluorescenceResult) {
    let mut enhancement: BTreeMap<String, f64> = BTreeMap::new();
    for (key, layers) in result.iter() {
        let element = key.split_whitespace().next().unwrap_or(key);
        for (layer, lines) in layers {
            for (label, line) in lines {
                if line.is_escape() || line.mass_fraction < TERTIARY_MASS_FRACTION {
                    continue;
                }
                let factor = line.enhancement();
                if factor >= TERTIARY_ENHANCEMENT {
                    enhancement.insert(format!("{element} {label} {layer:02}"), factor);
                }
            }
        }
    }
    debug!(contributors = enhancement.len(), "tertiary excitation");

    for (_, layers) in result.families_mut() {
        for lines in layers.values_mut() {
            let mut parents: BTreeMap<String, f64> = BTreeMap::new();
            for (label, line) in lines.iter_mut().filter(|(_, l)| !l.is_escape()) {
                let direct = line.primary + line.secondary;
                if line.enhancement() < TERTIARY_ENHANCEMENT {
                    line.tertiary = 0.0;
                } else {
                    line.tertiary = line
                        .contributors
                        .iter()
                        .filter_map(|(name, value)| enhancement.get(name).map(|f| value * (f - 1.0)))
                        .sum();
                    line.rate *= (line.tertiary + direct) / direct;
                }
                parents.insert(label.clone(), if direct > 0.0 { line.tertiary / direct } else { 0.0 });
            }
            for line in lines.values_mut() {
                let LineKind::Escape { parent } = &line.kind else {
                    continue;
                };
                let direct = line.primary + line.secondary;
                if line.enhancement() < TERTIARY_ENHANCEMENT {
                    line.tertiary = 0.0;
                    continue;
                }
                line.tertiary = direct * parents.get(parent).copied().unwrap_or(0.0);
                line.rate *= (line.tertiary + direct) / direct;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::Detector;

    fn stack() -> XrfConfig {
        let mut config = XrfConfig::new();
        config
            .set_sample(
                vec![
                    Layer::new("Cu", 8.96, 1.0e-4, 1.0).unwrap(),
                    Layer::new("Fe", 7.874, 2.0e-4, 1.0).unwrap(),
                    Layer::new("Si", 2.33, 1.0e-1, 1.0).unwrap(),
                ],
                1,
            )
            .unwrap();
        config
    }

    #[test]
    fn test_geometric_efficiency_without_detector_is_one() {
        let xrf = Xrf::new(stack());
        assert_eq!(xrf.geometric_efficiency(2).unwrap(), 1.0);
        assert!(xrf.geometric_efficiency(3).is_err());
    }

    #[test]
    fn test_geometric_efficiency_follows_layer_offsets() {
        let mut config = stack();
        config.set_geometry(45.0, 90.0, None).unwrap();
        let crystal = Layer::new("Si", 2.33, 0.05, 1.0).unwrap();
        config.set_detector(Some(Detector::new(crystal, 1.0, 2.0).unwrap()));
        let xrf = Xrf::new(config);
        let solid = |d: f64| 0.5 * (1.0 - d / (d * d + 0.25).sqrt());
        assert!((xrf.geometric_efficiency(1).unwrap() - solid(2.0)).abs() < 1e-15);
        assert!((xrf.geometric_efficiency(2).unwrap() - solid(2.0 + 2.0e-4)).abs() < 1e-15);
        assert!((xrf.geometric_efficiency(0).unwrap() - solid(2.0 - 1.0e-4)).abs() < 1e-15);

        let mut config = xrf.config().clone();
        let crystal = Layer::new("Si", 2.33, 0.05, 1.0).unwrap();
        config.set_detector(Some(Detector::new(crystal, 0.0, 2.0).unwrap()));
        assert_eq!(Xrf::new(config).geometric_efficiency(2).unwrap(), 1.0);
    }

    fn line(primary: f64, secondary: f64) -> LineResult {
        let mut line = LineResult::fluorescence(8.0, 1.0, 50.0);
        line.primary = primary;
        line.secondary = secondary;
        line.rate = primary + secondary;
        line.mass_fraction = 1.0;
        line
    }

    #[test]
    fn test_tertiary_uses_enhancement_of_contributors() {
        let mut result = FluorescenceResult::new();
        result.layer_mut("Cu K", 0).insert("KL3".to_string(), line(1.0, 0.5));
        let fe = result.layer_mut("Fe K", 1);
        let mut fe_kl3 = line(1.0, 0.2);
        fe_kl3.contributors.insert("Cu KL3 00".to_string(), 0.2);
        fe.insert("KL3".to_string(), fe_kl3);
        let mut escape = LineResult::escape("KL3", 4.7, 1.0);
        escape.primary = 0.01;
        escape.secondary = 0.002;
        escape.rate = 0.012;
        fe.insert("KL3 Si_KL3esc".to_string(), escape);

        apply_tertiary(&mut result);

        let fe_kl3 = result.line("Fe K", 1, "KL3").unwrap();
        assert!((fe_kl3.tertiary - 0.1).abs() < 1e-15);
        assert!((fe_kl3.rate - 1.3).abs() < 1e-12);
        let escape = result.line("Fe K", 1, "KL3 Si_KL3esc").unwrap();
        assert!((escape.tertiary - 0.001).abs() < 1e-15);
        assert!((escape.rate - 0.013).abs() < 1e-14);
        let cu = result.line("Cu K", 0, "KL3").unwrap();
        assert_eq!(cu.tertiary, 0.0);
        assert_eq!(cu.rate, 1.5);
    }
}
