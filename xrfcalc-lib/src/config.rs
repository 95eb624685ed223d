use serde::{Deserialize, Serialize};

use crate::beam::Beam;
use crate::detector::Detector;
use crate::error::{Result, XrfError};
use crate::material::Layer;
use crate::transmission::TransmissionTable;

/// Measurement set-up: excitation, sample stack and detection chain.
///
/// Angles are in degrees measured from the sample surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XrfConfig {
    alpha_in: f64,
    alpha_out: f64,
    scattering_angle: f64,
    beam: Beam,
    beam_filters: Vec<Layer>,
    user_beam_filters: Vec<TransmissionTable>,
    sample: Vec<Layer>,
    reference_layer: usize,
    attenuators: Vec<Layer>,
    user_attenuators: Vec<TransmissionTable>,
    detector: Option<Detector>,
}

impl Default for XrfConfig {
    fn default() -> Self {
        XrfConfig {
            alpha_in: 45.0,
            alpha_out: 45.0,
            scattering_angle: 90.0,
            beam: Beam::default(),
            beam_filters: Vec::new(),
            user_beam_filters: Vec::new(),
            sample: Vec::new(),
            reference_layer: 0,
            attenuators: Vec::new(),
            user_attenuators: Vec::new(),
            detector: None,
        }
    }
}

fn check_angle(name: &str, angle: f64) -> Result<()> {
    if !(angle > 0.0 && angle < 180.0) {
        return Err(XrfError::invalid(format!("{name} must be in (0, 180) degrees, got {angle}")));
    }
    Ok(())
}

impl XrfConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alpha_in(&self) -> f64 {
        self.alpha_in
    }

    pub fn alpha_out(&self) -> f64 {
        self.alpha_out
    }

    pub fn scattering_angle(&self) -> f64 {
        self.scattering_angle
    }

    /// # Errors
    /// `InvalidArgument` unless both incidence angles lie in (0, 180).
    pub fn set_geometry(&mut self, alpha_in: f64, alpha_out: f64, scattering_angle: Option<f64>) -> Result<()> {
        check_angle("alpha_in", alpha_in)?;
        check_angle("alpha_out", alpha_out)?;
        self.alpha_in = alpha_in;
        self.alpha_out = alpha_out;
        self.scattering_angle = scattering_angle.unwrap_or(alpha_in + alpha_out);
        Ok(())
    }

    pub fn beam(&self) -> &Beam {
        &self.beam
    }

    pub fn set_beam(&mut self, beam: Beam) {
        self.beam = beam;
    }

    pub fn beam_filters(&self) -> &[Layer] {
        &self.beam_filters
    }

    pub fn set_beam_filters(&mut self, filters: Vec<Layer>) {
        self.beam_filters = filters;
    }

    pub fn user_beam_filters(&self) -> &[TransmissionTable] {
        &self.user_beam_filters
    }

    pub fn set_user_beam_filters(&mut self, filters: Vec<TransmissionTable>) {
        self.user_beam_filters = filters;
    }

    pub fn sample(&self) -> &[Layer] {
        &self.sample
    }

    /// Replace the sample stack, top layer first.
    ///
    /// # Errors
    /// `InvalidArgument` when `reference_layer` is not a layer of a
    /// non-empty stack.
    pub fn set_sample(&mut self, layers: Vec<Layer>, reference_layer: usize) -> Result<()> {
        if !layers.is_empty() && reference_layer >= layers.len() {
            return Err(XrfError::invalid(format!(
                "reference layer {reference_layer} outside a {}-layer sample",
                layers.len()
            )));
        }
        self.sample = layers;
        self.reference_layer = reference_layer;
        Ok(())
    }

    /// Layer whose surface the detector distance is measured from.
    pub fn reference_layer(&self) -> usize {
        self.reference_layer
    }

    pub fn attenuators(&self) -> &[Layer] {
        &self.attenuators
    }

    pub fn set_attenuators(&mut self, attenuators: Vec<Layer>) {
        self.attenuators = attenuators;
    }

    pub fn user_attenuators(&self) -> &[TransmissionTable] {
        &self.user_attenuators
    }

    pub fn set_user_attenuators(&mut self, attenuators: Vec<TransmissionTable>) {
        self.user_attenuators = attenuators;
    }

    pub fn detector(&self) -> Option<&Detector> {
        self.detector.as_ref()
    }

    pub fn set_detector(&mut self, detector: Option<Detector>) {
        self.detector = detector;
    }

    /// Encode the set-up with postcard.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        postcard::to_allocvec(self).map_err(|e| XrfError::Snapshot(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        postcard::from_bytes(bytes).map_err(|e| XrfError::Snapshot(e.to_string()))
    }
}

/// Physics switches of one fluorescence computation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FluorescenceOptions {
    /// 0 primary only, 1 adds secondary, 2 adds tertiary excitation.
    pub secondary: u8,
    pub use_geometric_efficiency: bool,
    /// Scale rates by the element's mass fraction in each layer.
    pub use_mass_fractions: bool,
    /// When positive, source lines excited at a lower rate do not
    /// contribute to secondary excitation.
    pub secondary_calculation_limit: f64,
}

impl Default for FluorescenceOptions {
    fn default() -> Self {
        FluorescenceOptions {
            secondary: 0,
            use_geometric_efficiency: true,
            use_mass_fractions: true,
            secondary_calculation_limit: 0.0,
        }
    }
}

impl FluorescenceOptions {
    pub fn with_secondary(mut self, secondary: u8) -> Self {
        self.secondary = secondary;
        self
    }

    /// # Errors
    /// `InvalidArgument` for a level above 2 or a negative limit.
    pub fn validate(&self) -> Result<()> {
        if self.secondary > 2 {
            return Err(XrfError::invalid(format!(
                "secondary excitation level {} not in 0, 1, 2",
                self.secondary
            )));
        }
        if !(self.secondary_calculation_limit >= 0.0) {
            return Err(XrfError::invalid("negative secondary calculation limit"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = XrfConfig::default();
        assert_eq!(config.alpha_in(), 45.0);
        assert_eq!(config.scattering_angle(), 90.0);
        assert!(config.detector().is_none());
        assert_eq!(FluorescenceOptions::default().secondary, 0);
    }

    #[test]
    fn test_geometry_and_sample_checks() {
        let mut config = XrfConfig::new();
        assert!(config.set_geometry(0.0, 45.0, None).is_err());
        config.set_geometry(30.0, 60.0, None).unwrap();
        assert_eq!(config.scattering_angle(), 90.0);
        let layer = Layer::new("Fe", 7.874, 1.0e-3, 1.0).unwrap();
        assert!(config.set_sample(vec![layer.clone()], 1).is_err());
        config.set_sample(vec![layer], 0).unwrap();
        assert!(FluorescenceOptions::default().with_secondary(3).validate().is_err());
    }

    #[test]
    fn test_postcard_roundtrip() {
        let mut config = XrfConfig::new();
        config.set_beam(Beam::new(&[10.0, 12.0], &[1.0, 3.0], &[], &[]).unwrap());
        config
            .set_sample(vec![Layer::new("Fe2O3", 5.24, 2.0e-3, 1.0).unwrap()], 0)
            .unwrap();
        let decoded = XrfConfig::from_bytes(&config.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, config);
    }
}
