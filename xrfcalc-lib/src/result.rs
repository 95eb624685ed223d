use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Origin of a detected line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LineKind {
    Fluorescence,
    /// Escape peak of the fluorescence line `parent` in the detector.
    Escape { parent: String },
}

/// Detected intensity of one line emitted by one layer.
///
/// Rates are photons per incident photon (per steradian when the geometric
/// efficiency is off); `rate` includes detection efficiency, the
/// `primary`, `secondary` and `tertiary` terms do not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineResult {
    /// keV
    pub energy: f64,
    pub rate: f64,
    pub primary: f64,
    pub secondary: f64,
    pub tertiary: f64,
    /// Attenuation along the exit path times geometric and detector
    /// efficiency.
    pub efficiency: f64,
    pub mass_fraction: f64,
    /// Total mass attenuation of the emitting layer at the line energy.
    pub mu_1_i: f64,
    /// Fraction of the parent line moved into this escape peak.
    pub escape_ratio: f64,
    pub kind: LineKind,
    /// Secondary contributions keyed by `<source line> <layer>`.
    pub contributors: BTreeMap<String, f64>,
}

impl LineResult {
    pub(crate) fn fluorescence(energy: f64, efficiency: f64, mu_1_i: f64) -> Self {
        LineResult {
            energy,
            rate: 0.0,
            primary: 0.0,
            secondary: 0.0,
            tertiary: 0.0,
            efficiency,
            mass_fraction: 0.0,
            mu_1_i,
            escape_ratio: 0.0,
            kind: LineKind::Fluorescence,
            contributors: BTreeMap::new(),
        }
    }

    pub(crate) fn escape(parent: &str, energy: f64, efficiency: f64) -> Self {
        LineResult {
            kind: LineKind::Escape {
                parent: parent.to_string(),
            },
            ..LineResult::fluorescence(energy, efficiency, 0.0)
        }
    }

    pub fn is_escape(&self) -> bool {
        matches!(self.kind, LineKind::Escape { .. })
    }

    /// `(primary + secondary) / primary`, 1 without primary excitation.
    pub fn enhancement(&self) -> f64 {
        if self.primary > 0.0 {
            (self.primary + self.secondary) / self.primary
        } else {
            1.0
        }
    }
}

/// Lines of one family emitted by one layer, keyed by transition label
/// (`KL3`) or `<line> <escape>` for escape peaks.
pub type LayerLines = BTreeMap<String, LineResult>;

/// Detected lines per target (`Fe K`) and sample layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FluorescenceResult {
    families: BTreeMap<String, BTreeMap<usize, LayerLines>>,
}

impl FluorescenceResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    pub fn family(&self, key: &str) -> Option<&BTreeMap<usize, LayerLines>> {
        self.families.get(key)
    }

    pub fn layer(&self, key: &str, layer: usize) -> Option<&LayerLines> {
        self.families.get(key)?.get(&layer)
    }

    pub fn line(&self, key: &str, layer: usize, line: &str) -> Option<&LineResult> {
        self.layer(key, layer)?.get(line)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeMap<usize, LayerLines>)> {
        self.families.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Summed detected rate of a family over layers and lines, escape
    /// peaks included.
    pub fn total_rate(&self, key: &str) -> f64 {
        self.families
            .get(key)
            .map(|layers| layers.values().flat_map(|lines| lines.values()).map(|l| l.rate).sum())
            .unwrap_or(0.0)
    }

    pub(crate) fn layer_mut(&mut self, key: &str, layer: usize) -> &mut LayerLines {
        self.families
            .entry(key.to_string())
            .or_default()
            .entry(layer)
            .or_default()
    }

    pub(crate) fn families_mut(&mut self) -> impl Iterator<Item = (&String, &mut BTreeMap<usize, LayerLines>)> {
        self.families.iter_mut()
    }
}
