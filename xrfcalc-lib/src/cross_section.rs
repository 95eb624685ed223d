use crate::constants::{EDGE_MATCH_TOLERANCE, EDGE_SPLIT};
use crate::error::{Result, XrfError};
use crate::interp;
use crate::shell::{PartialShell, Shell, ShellMap};

/// Interaction process of a mass attenuation coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossSectionKind {
    Photoelectric,
    Coherent,
    Compton,
    Pair,
    Total,
}

/// Mass attenuation coefficients (cm²/g) at one energy (keV).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MassAttenuation {
    pub energy: f64,
    pub coherent: f64,
    pub compton: f64,
    pub pair: f64,
    pub photoelectric: f64,
    pub total: f64,
}

impl MassAttenuation {
    pub fn get(&self, kind: CrossSectionKind) -> f64 {
        match kind {
            CrossSectionKind::Photoelectric => self.photoelectric,
            CrossSectionKind::Coherent => self.coherent,
            CrossSectionKind::Compton => self.compton,
            CrossSectionKind::Pair => self.pair,
            CrossSectionKind::Total => self.total,
        }
    }

    /// Add `weight` times `other` to every process.
    pub fn accumulate(&mut self, other: &MassAttenuation, weight: f64) {
        self.coherent += weight * other.coherent;
        self.compton += weight * other.compton;
        self.pair += weight * other.pair;
        self.photoelectric += weight * other.photoelectric;
        self.total += weight * other.total;
    }
}

/// Partial photoelectric coefficients (cm²/g) per shell.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PartialPhotoelectric {
    pub shells: ShellMap<f64>,
    pub all_other: f64,
}

impl PartialPhotoelectric {
    pub fn get(&self, shell: PartialShell) -> f64 {
        match shell {
            PartialShell::Bound(s) => self.shells[s],
            PartialShell::AllOther => self.all_other,
        }
    }

    pub fn total(&self) -> f64 {
        self.shells.sum() + self.all_other
    }
}

/// Totals and per-shell photoelectric split at one energy.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ShellAttenuation {
    pub totals: MassAttenuation,
    pub partial: PartialPhotoelectric,
}

/// An absorption edge found in a tabulated photoelectric column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub energy: f64,
    /// Index of the pre-edge point; the post-edge point follows it.
    pub index: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct PartialTable {
    energy: Vec<f64>,
    values: Vec<f64>,
}

/// Tabulated mass attenuation coefficients of one element.
///
/// The process columns share one energy grid; each partial photoelectric
/// table has its own. Both may repeat an energy at an absorption edge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrossSectionTable {
    energy: Vec<f64>,
    photoelectric: Vec<f64>,
    coherent: Vec<f64>,
    compton: Vec<f64>,
    pair: Vec<f64>,
    total: Vec<f64>,
    partial: [Option<PartialTable>; 10],
}

fn validate_columns(energy: &[f64], columns: &[(&str, &[f64])]) -> Result<()> {
    if energy.is_empty() {
        return Err(XrfError::invalid("empty energy grid"));
    }
    for (name, column) in columns {
        if column.len() != energy.len() {
            return Err(XrfError::invalid(format!(
                "{name} has {} values for {} energies",
                column.len(),
                energy.len()
            )));
        }
        if column.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(XrfError::invalid(format!(
                "{name} values must be finite and non-negative"
            )));
        }
    }
    if energy.iter().any(|e| !e.is_finite()) || !interp::is_non_decreasing(energy) {
        return Err(XrfError::invalid("energies must be given in ascending order"));
    }
    Ok(())
}

impl CrossSectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self) -> bool {
        !self.energy.is_empty()
    }

    pub fn has_partials(&self) -> bool {
        self.partial.iter().any(Option::is_some)
    }

    pub fn energy(&self) -> &[f64] {
        &self.energy
    }

    /// Tabulated column of one process on [`energy`](Self::energy).
    pub fn column(&self, kind: CrossSectionKind) -> &[f64] {
        match kind {
            CrossSectionKind::Photoelectric => &self.photoelectric,
            CrossSectionKind::Coherent => &self.coherent,
            CrossSectionKind::Compton => &self.compton,
            CrossSectionKind::Pair => &self.pair,
            CrossSectionKind::Total => &self.total,
        }
    }

    /// `(energy, values)` of a partial photoelectric table, if set.
    pub fn partial_table(&self, shell: PartialShell) -> Option<(&[f64], &[f64])> {
        self.partial[shell.index()]
            .as_ref()
            .map(|t| (t.energy.as_slice(), t.values.as_slice()))
    }

    /// Replace the process columns. `pair` defaults to zero.
    ///
    /// # Errors
    /// `InvalidArgument` for mismatched lengths, negative values or a
    /// decreasing energy grid.
    pub fn set_totals(
        &mut self,
        energy: &[f64],
        photoelectric: &[f64],
        coherent: &[f64],
        compton: &[f64],
        pair: Option<&[f64]>,
    ) -> Result<()> {
        let zeros = vec![0.0; energy.len()];
        let pair = pair.unwrap_or(&zeros);
        validate_columns(
            energy,
            &[
                ("photoelectric", photoelectric),
                ("coherent", coherent),
                ("compton", compton),
                ("pair", pair),
            ],
        )?;
        self.total = (0..energy.len())
            .map(|i| photoelectric[i] + coherent[i] + compton[i] + pair[i])
            .collect();
        self.energy = energy.to_vec();
        self.photoelectric = photoelectric.to_vec();
        self.coherent = coherent.to_vec();
        self.compton = compton.to_vec();
        self.pair = pair.to_vec();
        Ok(())
    }

    /// Replace the partial photoelectric table of `shell`.
    ///
    /// Values below `binding` (the shell's binding energy, ignored for
    /// [`PartialShell::AllOther`]) are forced to zero. A duplicated energy at
    /// or above the binding energy is split by 1e-6 keV and takes the
    /// post-edge value on both points.
    pub fn set_partial(
        &mut self,
        shell: PartialShell,
        energy: &[f64],
        values: &[f64],
        binding: f64,
    ) -> Result<()> {
        validate_columns(energy, &[(shell.label(), values)])?;
        let mut energy = energy.to_vec();
        let mut values = values.to_vec();
        if let PartialShell::Bound(_) = shell {
            for i in 0..energy.len() {
                if energy[i] < binding {
                    values[i] = 0.0;
                } else if i > 0 && energy[i] == energy[i - 1] {
                    energy[i] += EDGE_SPLIT;
                    values[i - 1] = values[i];
                }
            }
        }
        self.partial[shell.index()] = Some(PartialTable { energy, values });
        Ok(())
    }

    /// Partial photoelectric coefficients at `energy`.
    ///
    /// Without any partial table the whole photoelectric coefficient is
    /// reported under `all_other`.
    pub fn partial_photoelectric(&self, energy: f64, binding: &ShellMap<f64>) -> Result<PartialPhotoelectric> {
        let mut result = PartialPhotoelectric::default();
        if !self.has_partials() {
            result.all_other = interp::interpolate(&self.energy, &self.photoelectric, energy);
            return Ok(result);
        }
        for shell in Shell::ALL {
            if let Some(table) = &self.partial[shell.rank()] {
                result.shells[shell] = bound_partial(table, shell, binding[shell], energy)?;
            }
        }
        if let Some(table) = &self.partial[PartialShell::AllOther.index()] {
            result.all_other = interp::interpolate(&table.energy, &table.values, energy);
        }
        Ok(result)
    }

    /// Mass attenuation coefficients and photoelectric split at `energy`.
    ///
    /// The photoelectric coefficient is the sum of the partial ones.
    ///
    /// # Errors
    /// `Runtime` if the table was never set or the total is not finite.
    pub fn attenuation(&self, energy: f64, binding: &ShellMap<f64>) -> Result<ShellAttenuation> {
        if !self.is_initialized() {
            return Err(XrfError::runtime(
                "mass attenuation coefficients not initialized",
            ));
        }
        let partial = self.partial_photoelectric(energy, binding)?;
        let coherent = interp::interpolate(&self.energy, &self.coherent, energy);
        let compton = interp::interpolate(&self.energy, &self.compton, energy);
        let pair = interp::interpolate(&self.energy, &self.pair, energy);
        let photoelectric = partial.total();
        let total = coherent + compton + pair + photoelectric;
        if !total.is_finite() {
            return Err(XrfError::runtime(format!(
                "non-finite total mass attenuation at {energy} keV"
            )));
        }
        Ok(ShellAttenuation {
            totals: MassAttenuation {
                energy,
                coherent,
                compton,
                pair,
                photoelectric,
                total,
            },
            partial,
        })
    }

    /// A copy of this table re-based on externally supplied coefficients.
    ///
    /// Points of this table below `energy[0]` are kept, the supplied grid
    /// follows. Every partial table is rescaled by the ratio of supplied
    /// to tabulated photoelectric coefficient, and shells whose edge is
    /// found in the supplied data are zeroed below it. An edge tabulated
    /// below the shell binding energy is moved onto it.
    pub fn rebaselined(
        &self,
        binding: &ShellMap<f64>,
        energy: &[f64],
        photoelectric: &[f64],
        coherent: &[f64],
        compton: &[f64],
        pair: Option<&[f64]>,
    ) -> Result<CrossSectionTable> {
        if !self.is_initialized() {
            return Err(XrfError::runtime(
                "reference mass attenuation coefficients not initialized",
            ));
        }
        let zeros = vec![0.0; energy.len()];
        let pair = pair.unwrap_or(&zeros);
        validate_columns(
            energy,
            &[
                ("photoelectric", photoelectric),
                ("coherent", coherent),
                ("compton", compton),
                ("pair", pair),
            ],
        )?;

        let edges = if binding.values().any(|&e| e > 0.0) {
            extract_edge_energies(energy, photoelectric, binding)?
        } else {
            ShellMap::default()
        };

        let start = self.energy.partition_point(|&e| e < energy[0]);
        let mut grid: Vec<f64> = self.energy[..start].to_vec();
        for (k, &e) in energy.iter().enumerate() {
            let mut value = e;
            for (shell, edge) in edges.iter() {
                if let Some(edge) = edge {
                    if k == edge.index + 1 && edge.energy < binding[shell] {
                        tracing::debug!(%shell, edge = edge.energy, binding = binding[shell], "edge moved onto binding energy");
                        value = binding[shell];
                    }
                }
            }
            if let Some(&last) = grid.last() {
                if value < last {
                    value = last + EDGE_SPLIT;
                }
            }
            grid.push(value);
        }
        if !interp::is_non_decreasing(&grid) {
            return Err(XrfError::runtime("inconsistent energy grid after re-baselining"));
        }

        let n = grid.len();
        let mut new_photo = Vec::with_capacity(n);
        let mut new_coherent = Vec::with_capacity(n);
        let mut new_compton = Vec::with_capacity(n);
        let mut new_pair = Vec::with_capacity(n);
        let mut partial_columns: [Vec<f64>; 10] = Default::default();
        for &e in &grid {
            let attenuation = self.attenuation(e, binding)?;
            new_photo.push(attenuation.totals.photoelectric);
            new_coherent.push(attenuation.totals.coherent);
            new_compton.push(attenuation.totals.compton);
            new_pair.push(attenuation.totals.pair);
            for shell in PartialShell::ALL {
                partial_columns[shell.index()].push(attenuation.partial.get(shell));
            }
        }
        let reference_photo = new_photo.clone();
        for k in 0..energy.len() {
            new_photo[start + k] = photoelectric[k];
            new_coherent[start + k] = coherent[k];
            new_compton[start + k] = compton[k];
            new_pair[start + k] = pair[k];
        }

        for shell in PartialShell::ALL {
            let first_excited = match shell {
                PartialShell::Bound(s) => edges[s].map(|edge| start + edge.index + 1),
                PartialShell::AllOther => None,
            };
            let column = &mut partial_columns[shell.index()];
            for i in 0..n {
                if first_excited.is_some_and(|first| i < first) {
                    column[i] = 0.0;
                } else if i >= start {
                    column[i] = if reference_photo[i] > 0.0 {
                        photoelectric[i - start] * column[i] / reference_photo[i]
                    } else {
                        0.0
                    };
                }
            }
        }

        let mut table = CrossSectionTable::new();
        table.set_totals(&grid, &new_photo, &new_coherent, &new_compton, Some(&new_pair))?;
        if self.has_partials() {
            for shell in PartialShell::ALL {
                if self.partial[shell.index()].is_none() {
                    continue;
                }
                let shell_binding = match shell {
                    PartialShell::Bound(s) => binding[s],
                    PartialShell::AllOther => 0.0,
                };
                table.set_partial(shell, &grid, &partial_columns[shell.index()], shell_binding)?;
            }
        }
        Ok(table)
    }
}

/// Partial coefficient of a bound shell at `x`.
///
/// Zero below the binding energy. Where the bracketing values are not
/// both positive (the edge falls between two grid points) the value is
/// extrapolated downward from the first positive pair.
fn bound_partial(table: &PartialTable, shell: Shell, binding: f64, x: f64) -> Result<f64> {
    if binding <= 0.0 || x < binding {
        return Ok(0.0);
    }
    let (grid, values) = (table.energy.as_slice(), table.values.as_slice());
    if grid.is_empty() {
        return Ok(0.0);
    }
    let (lo, hi) = interp::edge_bracket(grid, x);
    let (y0, y1) = (values[lo], values[hi]);
    if interp::is_collapsed(grid, lo, hi) {
        let at_edge = lo != hi && grid[lo] == grid[hi];
        if at_edge && y1 > 0.0 {
            return Ok(y1);
        }
        if y0 > 0.0 {
            return Ok(y0);
        }
        if y1 > 0.0 {
            return Ok(y1);
        }
        return extrapolate(grid, values, lo, shell, x);
    }
    if x == grid[hi] && y1 > 0.0 {
        return Ok(y1);
    }
    if y0 > 0.0 {
        if y1 > 0.0 {
            return Ok(interp::loglog(grid[lo], grid[hi], y0, y1, x));
        }
        return Ok(0.0);
    }
    extrapolate(grid, values, lo, shell, x)
}

fn extrapolate(grid: &[f64], values: &[f64], from: usize, shell: Shell, x: f64) -> Result<f64> {
    match interp::first_positive_pair(grid, values, from) {
        Some((i, j)) => Ok(interp::loglog_extrapolate(grid[i], grid[j], values[i], values[j], x)),
        None => Err(XrfError::runtime(format!(
            "no positive {shell} photoelectric values to extrapolate from at {x} keV"
        ))),
    }
}

/// Locate absorption edges in a photoelectric column.
///
/// An edge is a repeated energy across which the coefficient rises.
/// Candidates are taken from the highest energy down and matched to the
/// closest binding energy within 100 eV, shells being assigned in cascade
/// order (an edge can only belong to a shell less bound than the previous
/// match).
///
/// # Errors
/// `InvalidArgument` for empty or mismatched columns, or when no binding
/// energy is positive.
pub fn extract_edge_energies(
    energy: &[f64],
    photoelectric: &[f64],
    binding: &ShellMap<f64>,
) -> Result<ShellMap<Option<Edge>>> {
    if energy.is_empty() || photoelectric.is_empty() {
        return Err(XrfError::invalid("empty energy or photoelectric column"));
    }
    if energy.len() != photoelectric.len() {
        return Err(XrfError::invalid(
            "energy and photoelectric columns differ in length",
        ));
    }
    if !binding.values().any(|&e| e > 0.0) {
        return Err(XrfError::invalid("no binding energies defined"));
    }

    let mut edges: ShellMap<Option<Edge>> = ShellMap::default();
    let mut next_shell = 0;
    for i in (0..energy.len() - 1).rev() {
        if energy[i] != energy[i + 1] || photoelectric[i] >= photoelectric[i + 1] {
            continue;
        }
        let candidate = energy[i];
        let matched = Shell::ALL[next_shell.min(Shell::ALL.len())..]
            .iter()
            .filter(|&&s| binding[s] > 0.0 && (candidate - binding[s]).abs() < EDGE_MATCH_TOLERANCE)
            .min_by(|&&a, &&b| {
                (candidate - binding[a])
                    .abs()
                    .total_cmp(&(candidate - binding[b]).abs())
            })
            .copied();
        if let Some(shell) = matched {
            edges[shell] = Some(Edge {
                energy: candidate,
                index: i,
            });
            next_shell = shell.rank() + 1;
        }
    }
    Ok(edges)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding() -> ShellMap<f64> {
        let mut b = ShellMap::default();
        b[Shell::K] = 7.112;
        b[Shell::L3] = 0.7081;
        b
    }

    #[test]
    fn test_extract_edges() {
        let energy = [5.0, 7.1, 7.1, 10.0];
        let photo = [100.0, 50.0, 400.0, 200.0];
        let edges = extract_edge_energies(&energy, &photo, &binding()).unwrap();
        assert_eq!(edges[Shell::K], Some(Edge { energy: 7.1, index: 1 }));
        assert!(edges[Shell::L3].is_none());
    }

    #[test]
    fn test_extract_edges_errors() {
        assert!(extract_edge_energies(&[], &[], &binding()).is_err());
        assert!(extract_edge_energies(&[1.0], &[1.0, 2.0], &binding()).is_err());
        assert!(extract_edge_energies(&[1.0], &[1.0], &ShellMap::default()).is_err());
    }

    #[test]
    fn test_partial_is_zero_below_binding() {
        let mut table = CrossSectionTable::new();
        let e = [5.0, 7.112, 7.112, 10.0];
        table
            .set_totals(&e, &[10.0, 5.0, 50.0, 20.0], &[1.0; 4], &[1.0; 4], None)
            .unwrap();
        table
            .set_partial(PartialShell::Bound(Shell::K), &e, &[3.0, 2.0, 40.0, 16.0], 7.112)
            .unwrap();
        let b = binding();
        let below = table.partial_photoelectric(7.0, &b).unwrap();
        assert_eq!(below.shells[Shell::K], 0.0);
        let at_edge = table.partial_photoelectric(7.112, &b).unwrap();
        assert_eq!(at_edge.shells[Shell::K], 40.0);
        let (grid, values) = table.partial_table(Shell::K.into()).unwrap();
        assert_eq!(values[0], 0.0);
        assert!(grid[2] > grid[1]);
    }

    #[test]
    fn test_uninitialized_table() {
        let table = CrossSectionTable::new();
        assert!(matches!(
            table.attenuation(10.0, &binding()),
            Err(XrfError::Runtime(_))
        ));
    }
}
