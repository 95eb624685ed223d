//! Interpolation on tabulated energy grids.
//!
//! Grids are non-decreasing and may repeat an energy at an absorption
//! edge: the first of the two points is the pre-edge value, the second the
//! post-edge value.

use crate::constants::COLLAPSED_BRACKET;

/// Bracketing indices `(lo, hi)` of `x` in `grid` (lower-bound search).
///
/// Past the end the last pair is returned, before the start `(0, 1)`.
/// A single-point grid gives `(0, 0)`.
pub fn bracket(grid: &[f64], x: f64) -> (usize, usize) {
    if grid.len() < 2 {
        return (0, 0);
    }
    let hi = grid.partition_point(|&v| v < x);
    if hi >= grid.len() {
        (grid.len() - 2, grid.len() - 1)
    } else if hi > 0 {
        (hi - 1, hi)
    } else {
        (0, 1)
    }
}

/// Like [`bracket`], but a query sitting exactly on a duplicated edge
/// energy moves to the post-edge pair.
pub fn edge_bracket(grid: &[f64], x: f64) -> (usize, usize) {
    let (lo, hi) = bracket(grid, x);
    if x == grid[hi] && hi + 1 < grid.len() && grid[hi + 1] == grid[hi] {
        (hi, hi + 1)
    } else {
        (lo, hi)
    }
}

/// True when the bracket cannot support log-log interpolation.
pub fn is_collapsed(grid: &[f64], lo: usize, hi: usize) -> bool {
    lo == hi || grid[hi] - grid[lo] < COLLAPSED_BRACKET
}

/// Log-log interpolation between `(x0, y0)` and `(x1, y1)`.
///
/// Both ordinates must be positive and `x0 < x1`.
pub fn loglog(x0: f64, x1: f64, y0: f64, y1: f64, x: f64) -> f64 {
    if x == x1 {
        return y1;
    }
    if x == x0 {
        return y0;
    }
    let b = 1.0 / (x1 / x0).ln();
    let a = (x1 / x).ln() * b;
    let b = b * (x / x0).ln();
    (a * y0.ln() + b * y1.ln()).exp()
}

/// Power law through `(x0, y0)` and `(x1, y1)` evaluated at `x`, which
/// may lie outside `[x0, x1]`.
pub fn loglog_extrapolate(x0: f64, x1: f64, y0: f64, y1: f64, x: f64) -> f64 {
    let slope = (y1 / y0).ln() / (x1 / x0).ln();
    (y0.ln() + slope * (x / x0).ln()).exp()
}

/// First index `i >= start` with `values[i] > 0`, `values[i + 1] > 0` and
/// distinct energies, usable as a log-log extrapolation pair.
pub fn first_positive_pair(grid: &[f64], values: &[f64], start: usize) -> Option<(usize, usize)> {
    let mut i = start;
    while i + 1 < values.len() {
        if values[i] > 0.0 && values[i + 1] > 0.0 && grid[i + 1] - grid[i] >= COLLAPSED_BRACKET {
            return Some((i, i + 1));
        }
        i += 1;
    }
    None
}

/// Interpolate a positive-valued channel (scattering, pair production).
///
/// Exact grid points return the tabulated value, a duplicated edge
/// returns its post-edge value. Where the lower bracketing value vanishes
/// the value is extrapolated downward from the nearest positive pair.
pub fn interpolate(grid: &[f64], values: &[f64], x: f64) -> f64 {
    if grid.is_empty() {
        return 0.0;
    }
    let (lo, hi) = edge_bracket(grid, x);
    let (y0, y1) = (values[lo], values[hi]);
    if is_collapsed(grid, lo, hi) {
        if lo != hi && grid[lo] == grid[hi] {
            return y1;
        }
        return if y0 != 0.0 { y0 } else { y1 };
    }
    let (x0, x1) = (grid[lo], grid[hi]);
    if y0 > 0.0 && y1 > 0.0 {
        return loglog(x0, x1, y0, y1, x);
    }
    if x == x1 {
        return y1;
    }
    if y1 > 0.0 && x - x0 > 1.0e-5 {
        if let Some((i, j)) = first_positive_pair(grid, values, hi) {
            return loglog_extrapolate(grid[i], grid[j], values[i], values[j], x);
        }
    }
    0.0
}

/// Linear interpolation, clamped at both ends.
pub fn interp_linear(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    if x <= xp[0] {
        return fp[0];
    }
    if x >= xp[xp.len() - 1] {
        return fp[fp.len() - 1];
    }

    let idx = xp.partition_point(|&v| v < x);
    if xp[idx] == x {
        return fp[idx];
    }

    let lo = idx - 1;
    let t = (x - xp[lo]) / (xp[idx] - xp[lo]);
    fp[lo] + t * (fp[idx] - fp[lo])
}

/// True when `grid` never decreases.
pub fn is_non_decreasing(grid: &[f64]) -> bool {
    grid.windows(2).all(|w| w[0] <= w[1])
}
