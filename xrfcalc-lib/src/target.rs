use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, XrfError};
use crate::shell::{BindingEnergies, Shell};

/// Group of lines reported together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LineFamily {
    /// All lines filling a vacancy of one principal shell (`K`, `L`, `M`).
    Main(char),
    /// K lines from L shells.
    Ka,
    /// K lines from any other shell.
    Kb,
    /// Lines filling a vacancy of one subshell (`L1`, `M5`...).
    Subshell(Shell),
}

impl LineFamily {
    pub fn label(&self) -> String {
        match self {
            LineFamily::Main(c) => c.to_string(),
            LineFamily::Ka => "Ka".to_string(),
            LineFamily::Kb => "Kb".to_string(),
            LineFamily::Subshell(shell) => shell.label().to_string(),
        }
    }

    /// Principal shell letter.
    pub fn main_shell(&self) -> char {
        match self {
            LineFamily::Main(c) => *c,
            LineFamily::Ka | LineFamily::Kb => 'K',
            LineFamily::Subshell(shell) => shell.main_shell(),
        }
    }

    /// Whether the transition `line` (e.g. `KL3`, `L3M5`) belongs here.
    pub fn matches(&self, line: &str) -> bool {
        match self {
            LineFamily::Main(c) => line.starts_with(*c),
            LineFamily::Ka => line.starts_with("KL"),
            LineFamily::Kb => line.starts_with('K') && !line.starts_with("KL"),
            LineFamily::Subshell(shell) => line
                .strip_prefix(shell.label())
                .is_some_and(|origin| origin.starts_with(|c: char| c.is_ascii_uppercase())),
        }
    }

    /// Vacancy shells whose decay feeds the family.
    pub fn shells(&self) -> Vec<Shell> {
        match self {
            LineFamily::Subshell(shell) => vec![*shell],
            _ => Shell::of_main_shell(self.main_shell()).collect(),
        }
    }

    /// Lowest excitation energy (keV): the least bound subshell of the
    /// principal shell with a positive binding energy, 0 when none.
    pub fn energy_threshold(&self, binding: &BindingEnergies) -> f64 {
        Shell::of_main_shell(self.main_shell())
            .map(|s| binding.shell(s))
            .rev()
            .find(|&e| e > 0.0)
            .unwrap_or(0.0)
    }
}

impl fmt::Display for LineFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl FromStr for LineFamily {
    type Err = XrfError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" => Err(XrfError::invalid("please specify K, L or M as peak family")),
            "K" | "L" | "M" => Ok(LineFamily::Main(s.chars().next().unwrap_or('K'))),
            "Ka" => Ok(LineFamily::Ka),
            "Kb" => Ok(LineFamily::Kb),
            _ => s
                .parse::<Shell>()
                .map(LineFamily::Subshell)
                .map_err(|_| XrfError::invalid(format!("invalid peak family '{s}'"))),
        }
    }
}

/// Element, line family and optionally the only sample layer to compute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub element: String,
    pub family: LineFamily,
    /// `None` computes every layer.
    pub layer: Option<usize>,
}

impl Target {
    pub fn new(element: &str, family: LineFamily) -> Self {
        Target {
            element: element.to_string(),
            family,
            layer: None,
        }
    }

    pub fn in_layer(mut self, layer: usize) -> Self {
        self.layer = Some(layer);
        self
    }

    /// Result key, e.g. `Fe K`.
    pub fn key(&self) -> String {
        format!("{} {}", self.element, self.family)
    }
}

impl FromStr for Target {
    type Err = XrfError;

    /// `"Fe K"` or `"Fe K 1"`.
    fn from_str(s: &str) -> Result<Self> {
        let fields: Vec<&str> = s.split_whitespace().collect();
        match fields.as_slice() {
            [element, family] => Ok(Target::new(element, family.parse()?)),
            [element, family, layer] => {
                let layer = layer
                    .parse::<usize>()
                    .map_err(|_| XrfError::invalid(format!("invalid layer index in '{s}'")))?;
                Ok(Target::new(element, family.parse()?).in_layer(layer))
            }
            _ => Err(XrfError::invalid(format!(
                "expected '<element> <family> [layer]', got '{s}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_matching() {
        let ka: LineFamily = "Ka".parse().unwrap();
        let kb: LineFamily = "Kb".parse().unwrap();
        assert!(ka.matches("KL3") && !ka.matches("KM3"));
        assert!(kb.matches("KM3") && kb.matches("KN2") && !kb.matches("KL2"));
        let l3: LineFamily = "L3".parse().unwrap();
        assert!(l3.matches("L3M5") && !l3.matches("L2M4"));
        assert_eq!(LineFamily::Main('L').shells(), vec![Shell::L1, Shell::L2, Shell::L3]);
        assert!("".parse::<LineFamily>().is_err());
        assert!("N".parse::<LineFamily>().is_err());
    }

    #[test]
    fn test_parse_target() {
        let target: Target = "Fe K 1".parse().unwrap();
        assert_eq!(target.element, "Fe");
        assert_eq!(target.family, LineFamily::Main('K'));
        assert_eq!(target.layer, Some(1));
        assert_eq!(target.key(), "Fe K");
        assert!("Fe".parse::<Target>().is_err());
        assert!("Fe K x".parse::<Target>().is_err());
    }

    #[test]
    fn test_threshold_uses_least_bound_subshell() {
        let binding = BindingEnergies::from_pairs([("L1", 0.8461), ("L2", 0.7211), ("L3", 0.7081)]).unwrap();
        assert_eq!(LineFamily::Main('L').energy_threshold(&binding), 0.7081);
        assert_eq!(LineFamily::Subshell(Shell::L1).energy_threshold(&binding), 0.7081);
        assert_eq!(LineFamily::Main('K').energy_threshold(&binding), 0.0);
    }
}
