//! Synthetic elements with power-law cross sections.
//!
//! Every process follows `value_10 · (E / 10 keV)^slope`, the photoelectric
//! coefficient dropping by `jump` below the K edge. Log-log interpolation
//! is exact on such tables, so expected values can be written in closed
//! form.
#![allow(dead_code)]

use xrfcalc::{Element, Elements, PartialShell, Shell};

pub struct Synthetic {
    pub symbol: &'static str,
    pub atomic_number: u16,
    pub atomic_mass: f64,
    pub density: f64,
    pub binding: &'static [(&'static str, f64)],
    /// Photoelectric coefficient at 10 keV above the K edge.
    pub photo_10: f64,
    pub jump: f64,
    pub coherent_10: f64,
    pub compton_10: f64,
    pub omega_k: f64,
    pub k_lines: &'static [(&'static str, f64)],
}

pub const PHOTO_SLOPE: f64 = -2.8;
pub const COHERENT_SLOPE: f64 = -2.0;
pub const COMPTON_SLOPE: f64 = 0.2;

pub const GRID: [f64; 15] = [
    1.0, 1.5, 2.0, 3.0, 4.0, 5.0, 6.0, 8.0, 10.0, 12.0, 15.0, 20.0, 30.0, 50.0, 100.0,
];

pub const FE: Synthetic = Synthetic {
    symbol: "Fe",
    atomic_number: 26,
    atomic_mass: 55.845,
    density: 7.874,
    binding: &[("K", 7.112), ("L1", 0.8461), ("L2", 0.7211), ("L3", 0.7081), ("M3", 0.0528)],
    photo_10: 140.0,
    jump: 8.0,
    coherent_10: 4.0,
    compton_10: 0.12,
    omega_k: 0.34,
    k_lines: &[("KL2", 0.29), ("KL3", 0.57), ("KM3", 0.14)],
};

pub const CU: Synthetic = Synthetic {
    symbol: "Cu",
    atomic_number: 29,
    atomic_mass: 63.546,
    density: 8.96,
    binding: &[("K", 8.979), ("L1", 1.0961), ("L2", 0.9523), ("L3", 0.9327), ("M3", 0.0747)],
    photo_10: 105.0,
    jump: 7.7,
    coherent_10: 5.0,
    compton_10: 0.11,
    omega_k: 0.44,
    k_lines: &[("KL2", 0.30), ("KL3", 0.58), ("KM3", 0.12)],
};

pub const SI: Synthetic = Synthetic {
    symbol: "Si",
    atomic_number: 14,
    atomic_mass: 28.086,
    density: 2.329,
    binding: &[("K", 1.839), ("L1", 0.1497), ("L2", 0.0998), ("L3", 0.0994)],
    photo_10: 30.0,
    jump: 10.0,
    coherent_10: 1.3,
    compton_10: 0.15,
    omega_k: 0.05,
    k_lines: &[("KL2", 0.34), ("KL3", 0.66)],
};

pub const O: Synthetic = Synthetic {
    symbol: "O",
    atomic_number: 8,
    atomic_mass: 15.999,
    density: 0.001429,
    binding: &[("K", 0.5431), ("L1", 0.0416), ("L2", 0.0071), ("L3", 0.0071)],
    photo_10: 5.0,
    jump: 20.0,
    coherent_10: 0.6,
    compton_10: 0.14,
    omega_k: 0.0083,
    k_lines: &[("KL2", 1.0), ("KL3", 2.0)],
};

impl Synthetic {
    pub fn k_edge(&self) -> f64 {
        self.binding[0].1
    }

    pub fn photoelectric(&self, energy: f64, above_edge: bool) -> f64 {
        let value = self.photo_10 * (energy / 10.0).powf(PHOTO_SLOPE);
        if above_edge { value } else { value / self.jump }
    }

    pub fn coherent(&self, energy: f64) -> f64 {
        self.coherent_10 * (energy / 10.0).powf(COHERENT_SLOPE)
    }

    pub fn compton(&self, energy: f64) -> f64 {
        self.compton_10 * (energy / 10.0).powf(COMPTON_SLOPE)
    }

    /// Total mass attenuation away from the edge.
    pub fn total(&self, energy: f64) -> f64 {
        self.photoelectric(energy, energy > self.k_edge()) + self.coherent(energy) + self.compton(energy)
    }

    /// Grid with the K edge repeated, and whether each point is above it.
    pub fn grid(&self) -> (Vec<f64>, Vec<bool>) {
        let edge = self.k_edge();
        let mut energy = Vec::new();
        let mut above = Vec::new();
        let mut inserted = false;
        for &e in &GRID {
            if !inserted && edge < e {
                energy.extend([edge, edge]);
                above.extend([false, true]);
                inserted = true;
            }
            energy.push(e);
            above.push(e > edge);
        }
        (energy, above)
    }

    pub fn element(&self) -> Element {
        let mut element = Element::new(self.symbol, self.atomic_number).unwrap();
        element.set_atomic_mass(self.atomic_mass).unwrap();
        element.set_density(self.density).unwrap();
        element.set_binding_energies(self.binding.iter().copied()).unwrap();

        let (energy, above) = self.grid();
        let photo: Vec<f64> = energy
            .iter()
            .zip(&above)
            .map(|(&e, &a)| self.photoelectric(e, a))
            .collect();
        let coherent: Vec<f64> = energy.iter().map(|&e| self.coherent(e)).collect();
        let compton: Vec<f64> = energy.iter().map(|&e| self.compton(e)).collect();
        element
            .set_mass_attenuation_coefficients(&energy, &photo, &coherent, &compton, None)
            .unwrap();

        let k_fraction = 1.0 - 1.0 / self.jump;
        let k: Vec<f64> = photo
            .iter()
            .zip(&above)
            .map(|(&p, &a)| if a { p * k_fraction } else { 0.0 })
            .collect();
        let other: Vec<f64> = photo.iter().zip(&k).map(|(p, k)| p - k).collect();
        element
            .set_partial_photoelectric(PartialShell::Bound(Shell::K), &energy, &k)
            .unwrap();
        element
            .set_partial_photoelectric(PartialShell::AllOther, &energy, &other)
            .unwrap();

        element
            .set_shell_constants(Shell::K, [("omega", self.omega_k)])
            .unwrap();
        element
            .set_radiative_transitions(Shell::K, self.k_lines.iter().copied())
            .unwrap();
        element
            .set_nonradiative_transitions(Shell::K, [("K-L1L1", 0.1), ("K-L1L3", 0.2), ("K-L3L3", 0.7)])
            .unwrap();
        element
            .set_shell_constants(Shell::L3, [("omega", 0.01)])
            .unwrap();
        element
            .set_radiative_transitions(Shell::L3, [("L3M5", 1.0)])
            .unwrap();
        element
    }
}

/// Library holding Fe, Cu, Si and O.
pub fn library() -> Elements {
    let mut elements = Elements::new();
    for synthetic in [&FE, &CU, &SI, &O] {
        elements.add_element(synthetic.element());
    }
    elements
}
