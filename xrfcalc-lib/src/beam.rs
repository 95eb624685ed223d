use serde::{Deserialize, Serialize};

use crate::error::{Result, XrfError};

/// One excitation energy of the beam.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ray {
    /// keV
    pub energy: f64,
    pub weight: f64,
    /// Whether the ray is a characteristic line of the source (not used in
    /// intensity calculations).
    pub characteristic: bool,
    pub divergency: f64,
}

/// Excitation spectrum: rays sorted by increasing energy with weights
/// normalized to unit sum (when the sum is positive).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Beam {
    rays: Vec<Ray>,
}

/// Per-ray value, or one value for every ray.
fn broadcast<T: Copy>(name: &str, values: &[T], n: usize, default: T) -> Result<Vec<T>> {
    match values.len() {
        0 => Ok(vec![default; n]),
        1 => Ok(vec![values[0]; n]),
        len if len == n => Ok(values.to_vec()),
        len => Err(XrfError::invalid(format!(
            "beam has {n} energies but {len} {name} values"
        ))),
    }
}

impl Beam {
    /// # Arguments
    /// * `energy` - keV, any order
    /// * `weight` - per ray, a single value or empty (all 1)
    /// * `characteristic`, `divergency` - same broadcasting as `weight`
    ///
    /// # Errors
    /// `InvalidArgument` for non-positive energies, negative weights or
    /// lengths that cannot be broadcast.
    pub fn new(energy: &[f64], weight: &[f64], characteristic: &[bool], divergency: &[f64]) -> Result<Self> {
        let n = energy.len();
        let weight = broadcast("weight", weight, n, 1.0)?;
        let characteristic = broadcast("characteristic", characteristic, n, true)?;
        let divergency = broadcast("divergency", divergency, n, 0.0)?;
        if energy.iter().any(|e| !(*e > 0.0) || !e.is_finite()) {
            return Err(XrfError::invalid("beam energies must be positive"));
        }
        if weight.iter().any(|w| !(*w >= 0.0) || !w.is_finite()) {
            return Err(XrfError::invalid("beam weights must not be negative"));
        }
        let mut rays: Vec<Ray> = (0..n)
            .map(|i| Ray {
                energy: energy[i],
                weight: weight[i],
                characteristic: characteristic[i],
                divergency: divergency[i],
            })
            .collect();
        let total: f64 = rays.iter().map(|r| r.weight).sum();
        if total > 0.0 {
            for ray in &mut rays {
                ray.weight /= total;
            }
        }
        rays.sort_by(|a, b| a.energy.total_cmp(&b.energy));
        Ok(Beam { rays })
    }

    pub fn monochromatic(energy: f64) -> Result<Self> {
        Beam::new(&[energy], &[], &[], &[])
    }

    pub fn rays(&self) -> &[Ray] {
        &self.rays
    }

    pub fn is_empty(&self) -> bool {
        self.rays.is_empty()
    }

    pub fn energies(&self) -> Vec<f64> {
        self.rays.iter().map(|r| r.energy).collect()
    }

    pub fn weights(&self) -> Vec<f64> {
        self.rays.iter().map(|r| r.weight).collect()
    }
}
