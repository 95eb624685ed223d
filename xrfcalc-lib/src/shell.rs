use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, XrfError};

/// Atomic subshells taking part in the fluorescence cascade, in order of
/// decreasing binding energy.
///
/// A vacancy can only move from a shell to a shell of higher [`rank`](Shell::rank).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Shell {
    K,
    L1,
    L2,
    L3,
    M1,
    M2,
    M3,
    M4,
    M5,
}

impl Shell {
    pub const ALL: [Shell; 9] = [
        Shell::K,
        Shell::L1,
        Shell::L2,
        Shell::L3,
        Shell::M1,
        Shell::M2,
        Shell::M3,
        Shell::M4,
        Shell::M5,
    ];

    /// Position in the cascade order (K = 0 ... M5 = 8).
    pub fn rank(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            Shell::K => "K",
            Shell::L1 => "L1",
            Shell::L2 => "L2",
            Shell::L3 => "L3",
            Shell::M1 => "M1",
            Shell::M2 => "M2",
            Shell::M3 => "M3",
            Shell::M4 => "M4",
            Shell::M5 => "M5",
        }
    }

    /// Principal shell letter: `'K'`, `'L'` or `'M'`.
    pub fn main_shell(self) -> char {
        match self {
            Shell::K => 'K',
            Shell::L1 | Shell::L2 | Shell::L3 => 'L',
            _ => 'M',
        }
    }

    /// One-based index within the principal shell (L3 -> 3).
    pub fn subshell_index(self) -> usize {
        match self {
            Shell::K | Shell::L1 | Shell::M1 => 1,
            Shell::L2 | Shell::M2 => 2,
            Shell::L3 | Shell::M3 => 3,
            Shell::M4 => 4,
            Shell::M5 => 5,
        }
    }

    pub fn from_label(label: &str) -> Option<Shell> {
        Shell::ALL.into_iter().find(|s| s.label() == label)
    }

    /// Subshell `index` (one-based) of principal shell `main`.
    pub fn from_parts(main: char, index: usize) -> Option<Shell> {
        Shell::ALL
            .into_iter()
            .find(|s| s.main_shell() == main && s.subshell_index() == index)
    }

    /// Shells a vacancy in `self` may be transferred to.
    pub fn higher(self) -> impl Iterator<Item = Shell> {
        Shell::ALL.into_iter().skip(self.rank() + 1)
    }

    /// Subshells of a principal shell, deepest first.
    pub fn of_main_shell(main: char) -> impl DoubleEndedIterator<Item = Shell> {
        Shell::ALL.into_iter().filter(move |s| s.main_shell() == main)
    }
}

impl fmt::Display for Shell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Shell {
    type Err = XrfError;

    fn from_str(s: &str) -> Result<Self> {
        Shell::from_label(s).ok_or_else(|| XrfError::invalid(format!("invalid shell name '{s}'")))
    }
}

/// Shells carrying a partial photoelectric cross section: the nine
/// cascade shells plus everything less bound than M5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PartialShell {
    Bound(Shell),
    AllOther,
}

impl PartialShell {
    pub const ALL: [PartialShell; 10] = [
        PartialShell::Bound(Shell::K),
        PartialShell::Bound(Shell::L1),
        PartialShell::Bound(Shell::L2),
        PartialShell::Bound(Shell::L3),
        PartialShell::Bound(Shell::M1),
        PartialShell::Bound(Shell::M2),
        PartialShell::Bound(Shell::M3),
        PartialShell::Bound(Shell::M4),
        PartialShell::Bound(Shell::M5),
        PartialShell::AllOther,
    ];

    pub fn index(self) -> usize {
        match self {
            PartialShell::Bound(shell) => shell.rank(),
            PartialShell::AllOther => 9,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PartialShell::Bound(shell) => shell.label(),
            PartialShell::AllOther => "all other",
        }
    }
}

impl FromStr for PartialShell {
    type Err = XrfError;

    fn from_str(s: &str) -> Result<Self> {
        if s == "all other" || s == "all others" {
            return Ok(PartialShell::AllOther);
        }
        s.parse().map(PartialShell::Bound)
    }
}

impl From<Shell> for PartialShell {
    fn from(shell: Shell) -> Self {
        PartialShell::Bound(shell)
    }
}

/// A value per cascade shell.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ShellMap<T>([T; 9]);

impl<T> ShellMap<T> {
    pub fn from_fn(f: impl FnMut(Shell) -> T) -> Self {
        ShellMap(Shell::ALL.map(f))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Shell, &T)> {
        Shell::ALL.into_iter().zip(self.0.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Shell, &mut T)> {
        Shell::ALL.into_iter().zip(self.0.iter_mut())
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.0.iter()
    }
}

impl<T: Clone> ShellMap<T> {
    pub fn filled(value: T) -> Self {
        ShellMap::from_fn(|_| value.clone())
    }
}

impl ShellMap<f64> {
    pub fn sum(&self) -> f64 {
        self.0.iter().sum()
    }

    /// Unit vacancy in `shell`, nothing elsewhere.
    pub fn unit(shell: Shell) -> Self {
        let mut map = ShellMap::default();
        map[shell] = 1.0;
        map
    }
}

impl<T> Index<Shell> for ShellMap<T> {
    type Output = T;

    fn index(&self, shell: Shell) -> &T {
        &self.0[shell.rank()]
    }
}

impl<T> IndexMut<Shell> for ShellMap<T> {
    fn index_mut(&mut self, shell: Shell) -> &mut T {
        &mut self.0[shell.rank()]
    }
}

/// Vacancy probability per shell at one photon energy.
pub type VacancyDistribution = ShellMap<f64>;

/// Binding energies (keV) of an element.
///
/// Cascade shells are stored in a [`ShellMap`] (0 when unknown); any other
/// level (N1, O3, ...) is kept by label for line-energy lookups.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindingEnergies {
    shells: ShellMap<f64>,
    levels: BTreeMap<String, f64>,
}

impl BindingEnergies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(label, energy)` pairs.
    ///
    /// # Errors
    /// `InvalidArgument` for a non-finite or negative energy.
    pub fn from_pairs<S: AsRef<str>>(pairs: impl IntoIterator<Item = (S, f64)>) -> Result<Self> {
        let mut energies = Self::new();
        for (label, value) in pairs {
            energies.set(label.as_ref(), value)?;
        }
        Ok(energies)
    }

    pub fn set(&mut self, label: &str, value: f64) -> Result<()> {
        if !value.is_finite() || value < 0.0 {
            return Err(XrfError::invalid(format!(
                "binding energy of {label} must be a non-negative number, got {value}"
            )));
        }
        if let Some(shell) = Shell::from_label(label) {
            self.shells[shell] = value;
        }
        self.levels.insert(label.to_string(), value);
        Ok(())
    }

    /// Binding energy of a cascade shell, 0.0 when unknown.
    pub fn shell(&self, shell: Shell) -> f64 {
        self.shells[shell]
    }

    pub fn shells(&self) -> &ShellMap<f64> {
        &self.shells
    }

    pub fn get(&self, label: &str) -> Option<f64> {
        self.levels.get(label).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.levels.iter().map(|(k, &v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn has_positive(&self) -> bool {
        self.shells.values().any(|&e| e > 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_is_cascade_order() {
        for pair in Shell::ALL.windows(2) {
            assert!(pair[0].rank() < pair[1].rank());
            assert!(pair[0] < pair[1]);
        }
        assert_eq!(Shell::L2.higher().count(), 6);
    }

    #[test]
    fn test_parse_labels() {
        assert_eq!("L3".parse::<Shell>().unwrap(), Shell::L3);
        assert!("N1".parse::<Shell>().is_err());
        assert_eq!("all other".parse::<PartialShell>().unwrap(), PartialShell::AllOther);
        assert_eq!(Shell::from_parts('M', 4), Some(Shell::M4));
        assert_eq!(Shell::M4.subshell_index(), 4);
    }

    #[test]
    fn test_binding_energies_levels() {
        let be = BindingEnergies::from_pairs([("K", 7.112), ("L3", 0.7081), ("N1", 0.0)]).unwrap();
        assert_eq!(be.shell(Shell::K), 7.112);
        assert_eq!(be.shell(Shell::M1), 0.0);
        assert_eq!(be.get("N1"), Some(0.0));
        assert!(be.get("O1").is_none());
        assert!(BindingEnergies::from_pairs([("K", -1.0)]).is_err());
    }
}
