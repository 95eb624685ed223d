use serde::{Deserialize, Serialize};

use crate::error::{Result, XrfError};
use crate::interp;

/// Measured transmission curve of a filter or attenuator.
///
/// Linear between tabulated points; 1 for non-positive energies and from
/// the last tabulated energy on, 0 below the first one. An empty table
/// transmits everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransmissionTable {
    name: String,
    comment: String,
    energy: Vec<f64>,
    transmission: Vec<f64>,
}

impl TransmissionTable {
    /// # Errors
    /// `InvalidArgument` for mismatched lengths or negative values.
    pub fn new(name: &str, comment: &str, energy: &[f64], transmission: &[f64]) -> Result<Self> {
        if energy.len() != transmission.len() {
            return Err(XrfError::invalid(format!(
                "transmission table {name}: {} energies and {} transmissions",
                energy.len(),
                transmission.len()
            )));
        }
        if energy.iter().any(|e| !(*e >= 0.0)) {
            return Err(XrfError::invalid(format!("transmission table {name}: negative energy")));
        }
        if transmission.iter().any(|t| !(*t >= 0.0)) {
            return Err(XrfError::invalid(format!(
                "transmission table {name}: negative transmission"
            )));
        }
        let mut points: Vec<(f64, f64)> = energy.iter().copied().zip(transmission.iter().copied()).collect();
        // stable: the last value given for an energy wins
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        let mut table = TransmissionTable {
            name: name.to_string(),
            comment: comment.to_string(),
            ..Default::default()
        };
        for (e, t) in points {
            if table.energy.last() == Some(&e) {
                if let Some(last) = table.transmission.last_mut() {
                    *last = t;
                }
                continue;
            }
            table.energy.push(e);
            table.transmission.push(t);
        }
        Ok(table)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.energy.iter().copied().zip(self.transmission.iter().copied())
    }

    pub fn transmission(&self, energy: f64) -> f64 {
        if self.energy.is_empty() || energy <= 0.0 {
            return 1.0;
        }
        let upper = self.energy.partition_point(|&e| e <= energy);
        if upper == self.energy.len() {
            return 1.0;
        }
        if upper == 0 {
            return 0.0;
        }
        interp::interp_linear(energy, &self.energy, &self.transmission)
    }

    pub fn transmission_grid(&self, energies: &[f64]) -> Vec<f64> {
        energies.iter().map(|&e| self.transmission(e)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolation_and_limits() {
        let table = TransmissionTable::new("kapton", "", &[10.0, 2.0, 5.0], &[0.9, 0.1, 0.5]).unwrap();
        assert_eq!(table.transmission(1.0), 0.0);
        assert_eq!(table.transmission(0.0), 1.0);
        assert!((table.transmission(3.5) - 0.3).abs() < 1e-12);
        assert_eq!(table.transmission(5.0), 0.5);
        assert_eq!(table.transmission(10.0), 1.0);
        assert_eq!(table.transmission(20.0), 1.0);
    }

    #[test]
    fn test_empty_table_transmits() {
        assert_eq!(TransmissionTable::default().transmission(8.0), 1.0);
        assert!(TransmissionTable::new("bad", "", &[1.0], &[]).is_err());
        assert!(TransmissionTable::new("bad", "", &[1.0], &[-0.1]).is_err());
    }
}
