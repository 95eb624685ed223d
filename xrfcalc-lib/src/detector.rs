use serde::{Deserialize, Serialize};

use crate::elements::{Elements, EscapeLines};
use crate::error::{Result, XrfError};
use crate::material::Layer;

/// Limits applied when computing escape peaks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EscapeParameters {
    /// Escape peaks at or below this energy (keV) are dropped.
    pub min_energy: f64,
    /// Lines of the detector material weaker than this are ignored.
    pub intensity_threshold: f64,
    /// Strongest peaks kept per parent line.
    pub max_peaks: usize,
    /// Entrance angle in degrees.
    pub alpha_in: f64,
}

impl Default for EscapeParameters {
    fn default() -> Self {
        EscapeParameters {
            min_energy: 0.010,
            intensity_threshold: 1.0e-7,
            max_peaks: 4,
            alpha_in: 90.0,
        }
    }
}

/// Detector crystal: a layer with an entrance window of given diameter at a
/// given distance from the reference sample layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detector {
    layer: Layer,
    /// cm
    diameter: f64,
    /// cm
    distance: f64,
    escape: EscapeParameters,
}

impl Detector {
    /// # Errors
    /// `InvalidArgument` for a negative diameter or distance.
    pub fn new(layer: Layer, diameter: f64, distance: f64) -> Result<Self> {
        let mut detector = Detector {
            layer,
            diameter: 0.0,
            distance: 0.0,
            escape: EscapeParameters::default(),
        };
        detector.set_diameter(diameter)?;
        detector.set_distance(distance)?;
        Ok(detector)
    }

    pub fn layer(&self) -> &Layer {
        &self.layer
    }

    pub fn diameter(&self) -> f64 {
        self.diameter
    }

    pub fn set_diameter(&mut self, diameter: f64) -> Result<()> {
        if !(diameter >= 0.0) {
            return Err(XrfError::invalid(format!("negative detector diameter {diameter}")));
        }
        self.diameter = diameter;
        Ok(())
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn set_distance(&mut self, distance: f64) -> Result<()> {
        if !(distance >= 0.0) {
            return Err(XrfError::invalid(format!("negative detector distance {distance}")));
        }
        self.distance = distance;
        Ok(())
    }

    /// Area of the entrance window in cm².
    pub fn active_area(&self) -> f64 {
        std::f64::consts::PI * 0.25 * self.diameter * self.diameter
    }

    pub fn escape_parameters(&self) -> &EscapeParameters {
        &self.escape
    }

    pub fn set_escape_parameters(&mut self, escape: EscapeParameters) {
        self.escape = escape;
    }

    /// Whether photons can be absorbed at all, i.e. whether escape peaks
    /// and intrinsic efficiency are meaningful.
    pub fn has_material(&self) -> bool {
        self.layer.mass_thickness() > 0.0
    }

    /// Escape peaks produced by photons of `energy` (keV).
    pub fn escape(&self, energy: f64, elements: &Elements) -> Result<EscapeLines> {
        let composition = self.layer.composition(elements)?;
        let mass_thickness = self.layer.mass_thickness();
        elements.escape(&composition, energy, mass_thickness, &self.escape)
    }
}
