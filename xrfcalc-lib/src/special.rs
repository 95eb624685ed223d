//! Exponential integrals and the de Boer secondary-excitation integrals.
//!
//! D.K.G. de Boer, "Calculation of X-ray fluorescence intensities from
//! bulk and multilayer samples", X-Ray Spectrom. 19 (1990) 145-154.

use crate::constants::{CONTINUED_FRACTION_MAX_ITERATIONS, CONTINUED_FRACTION_TOLERANCE, EULER_GAMMA};
use crate::error::{Result, XrfError};

const FACTORIAL: [f64; 11] = [
    1.0, 1.0, 2.0, 6.0, 24.0, 120.0, 720.0, 5040.0, 40320.0, 362880.0, 3628800.0,
];

/// Exponential integral E1(x).
///
/// Negative arguments use the first ten terms of the power series
/// (A&S 5.1.11), `0 < x < 1` the polynomial A&S 5.1.53 and `x >= 1`
/// the continued fraction of [`de_boer_d`].
///
/// # Errors
/// `Domain` for `x == 0`.
pub fn e1(x: f64) -> Result<f64> {
    if x == 0.0 {
        return Err(XrfError::domain("E1(x) is not defined for x = 0"));
    }
    if x < 0.0 {
        return Ok(e1_series(x));
    }
    if x < 1.0 {
        Ok(as_5_1_53_unchecked(x) - x.ln())
    } else {
        Ok((-x).exp() * continued_fraction_d(x))
    }
}

/// Exponential integral E_n(x), by upward recurrence from E1.
///
/// # Errors
/// `Domain` for `n == 0` or for `n == 1` and `x == 0`.
pub fn exponential_integral(n: u32, x: f64) -> Result<f64> {
    match n {
        0 => Err(XrfError::domain("E_n(x) needs n >= 1")),
        1 => e1(x),
        _ if x == 0.0 => Ok(1.0 / f64::from(n - 1)),
        _ => {
            let previous = exponential_integral(n - 1, x)?;
            Ok(((-x).exp() - x * previous) / f64::from(n - 1))
        }
    }
}

fn e1_series(x: f64) -> f64 {
    let mut result = -EULER_GAMMA;
    for n in (1..=10).rev() {
        result -= (-x).powi(n as i32) / (n as f64 * FACTORIAL[n]);
    }
    result - (-x).ln()
}

/// `E1(x) + ln(x)` for `0 <= x <= 1` (A&S 5.1.53, |error| < 2e-7).
pub fn as_5_1_53(x: f64) -> Result<f64> {
    if !(0.0..=1.0).contains(&x) {
        return Err(XrfError::domain(format!(
            "AS 5.1.53 is valid for 0 <= x <= 1, got {x}"
        )));
    }
    Ok(as_5_1_53_unchecked(x))
}

fn as_5_1_53_unchecked(x: f64) -> f64 {
    const A: [f64; 6] = [
        -0.57721566,
        0.99999193,
        -0.24991055,
        0.05519968,
        -0.00976004,
        0.00107857,
    ];
    let mut result = A[5] * x;
    for a in A[1..5].iter().rev() {
        result = (result + a) * x;
    }
    result + A[0]
}

/// `x·exp(x)·E1(x)` for `x >= 1` (A&S 5.1.56, |error| < 5e-5).
pub fn as_5_1_56(x: f64) -> Result<f64> {
    const A: [f64; 4] = [8.5733287401, 18.0590169730, 8.6347608925, 0.2677737343];
    const B: [f64; 4] = [9.5733223454, 25.6329561486, 21.0996530827, 3.9584969228];
    if x < 1.0 {
        return Err(XrfError::domain(format!(
            "AS 5.1.56 is valid for x >= 1, got {x}"
        )));
    }
    let mut num = 1.0;
    let mut den = 1.0;
    for (a, b) in A.iter().zip(B.iter()) {
        num = num * x + a;
        den = den * x + b;
    }
    Ok(num / den)
}

/// `D(x) = exp(x)·E1(x)`.
///
/// Returns a non-finite value at `x == 0`; callers test the finiteness of
/// whatever they build from it.
pub fn de_boer_d(x: f64) -> f64 {
    if x < 0.0 {
        x.exp() * e1_series(x)
    } else if x > 1.0 {
        continued_fraction_d(x)
    } else {
        x.exp() * (as_5_1_53_unchecked(x) - x.ln())
    }
}

/// Modified Lentz evaluation of `exp(x)·E1(x)`, valid for `x > 1`.
///
/// On non-convergence the mean of the A&S 5.1.20 bounds is returned.
fn continued_fraction_d(x: f64) -> f64 {
    let mut b = 1.0 + x;
    let mut f = b;
    let mut c = f;
    let mut d = 0.0;
    for i in 1..CONTINUED_FRACTION_MAX_ITERATIONS {
        b += 2.0;
        let a = -((i * i) as f64);
        c = b + a / c;
        d = 1.0 / (b + a * d);
        let delta = c * d;
        f *= delta;
        if (delta - 1.0).abs() < CONTINUED_FRACTION_TOLERANCE {
            return 1.0 / f;
        }
    }
    tracing::warn!(x, "continued fraction for exp(x)E1(x) failed to converge");
    let lower = 0.5 * (1.0 + 2.0 / x).ln();
    let upper = (1.0 + 1.0 / x).ln();
    0.5 * (lower + upper)
}

fn finite(value: f64, what: &str) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(XrfError::runtime(format!("{what}: non-finite result")))
    }
}

/// Secondary excitation within a single layer (de Boer eq. 6).
///
/// # Arguments
/// * `mu1` - incident attenuation over sin(alpha_in) (cm²/g)
/// * `mu2` - fluorescence attenuation over sin(alpha_out) (cm²/g)
/// * `muj` - attenuation of the layer at the exciting line energy (cm²/g)
/// * `density` - g/cm³
/// * `thickness` - cm
///
/// Thick layers (`(mu1 + mu2)·ρt > 10`) use the infinite-thickness limit,
/// very thin ones (`< 0.01`) contribute nothing.
pub fn de_boer_l0(mu1: f64, mu2: f64, muj: f64, density: f64, thickness: f64) -> Result<f64> {
    if !mu1.is_finite() || !mu2.is_finite() || !muj.is_finite() {
        return Err(XrfError::runtime(format!(
            "de Boer L0 received non-finite input mu1={mu1} mu2={mu2} muj={muj}"
        )));
    }
    if mu1 <= 0.0 || mu2 <= 0.0 || muj <= 0.0 {
        return Err(XrfError::runtime(format!(
            "de Boer L0 received non-positive input mu1={mu1} mu2={mu2} muj={muj}"
        )));
    }

    let d = thickness * density;
    if (mu1 + mu2) * d > 10.0 {
        let thick = (muj / mu1) * (1.0 + mu1 / muj).ln() / ((mu1 + mu2) * muj);
        return finite(thick, "de Boer L0 thick target");
    }
    if (mu1 + mu2) * d < 0.01 {
        return Ok(0.0);
    }

    let mut value = de_boer_d((muj - mu2) * d) / (mu2 * (mu1 + mu2));
    value = value - de_boer_d(muj * d) / (mu1 * mu2) + de_boer_d((muj + mu1) * d) / (mu1 * (mu1 + mu2));
    value *= (-(mu1 + muj) * d).exp();
    value += (1.0 + mu1 / muj).ln() / (mu1 * (mu1 + mu2));

    let attenuation = (-(mu1 + mu2) * d).exp() / (mu2 * (mu1 + mu2));
    if mu2 < muj {
        value += attenuation * (1.0 - mu2 / muj).ln();
    } else {
        value += attenuation * (mu2 / muj - 1.0).ln();
    }

    if value < 0.0 {
        return Err(XrfError::runtime(format!(
            "de Boer L0 negative result {value} (mu1={mu1} mu2={mu2} muj={muj} d={d})"
        )));
    }
    finite(value, "de Boer L0")
}

/// Indefinite double integral of de Boer's multilayer kernel.
///
/// `mubj_dt` is `Σ ρ·t·μ` of the layers between the fluorescing and the
/// exciting layer at the exciting energy.
pub fn de_boer_v(p: f64, q: f64, d1: f64, d2: f64, mu1j: f64, mu2j: f64, mubj_dt: f64) -> Result<f64> {
    if mubj_dt == 0.0 && d1 == 0.0 && d2 == 0.0 {
        let t1 = (1.0 - q / mu1j).abs();
        let t2 = (1.0 + p / mu2j).abs();
        let value = -((mu2j / p) * t2.ln() + (mu1j / q) * t1.ln()) / (p * mu1j + q * mu2j);
        return finite(value, "de Boer V(0, 0)");
    }

    let path = mu1j * d1 + mubj_dt + mu2j * d2;
    let term1 = finite(
        (mu2j / (p * (p * mu1j + q * mu2j))) * de_boer_d((1.0 + p / mu2j) * path),
        "de Boer V first term",
    )?;
    let mut term2 = finite(
        (mu1j / (q * (p * mu1j + q * mu2j))) * de_boer_d((1.0 - q / mu1j) * path),
        "de Boer V second term",
    )?;
    term2 = finite(term2 - de_boer_d(path) / (p * q), "de Boer V third term")?;
    finite(
        ((q - mu1j) * d1 - (p + mu2j) * d2 - mubj_dt).exp() * (term1 + term2),
        "de Boer V",
    )
}

/// Secondary excitation of layer 1 by layer 2:
/// `X = V(d1, d2) − V(d1, 0) − V(0, d2) + V(0, 0)`.
///
/// `d1`, `d2` are mass thicknesses (g/cm²). When layer 2 lies below the
/// fluorescing layer `p` and `q` are the plain attenuations over the
/// sines; above it both are passed negated.
pub fn de_boer_x(p: f64, q: f64, d1: f64, d2: f64, mu1j: f64, mu2j: f64, mubj_dt: f64) -> Result<f64> {
    Ok(de_boer_v(p, q, d1, d2, mu1j, mu2j, mubj_dt)?
        - de_boer_v(p, q, d1, 0.0, mu1j, mu2j, mubj_dt)?
        - de_boer_v(p, q, 0.0, d2, mu1j, mu2j, mubj_dt)?
        + de_boer_v(p, q, 0.0, 0.0, mu1j, mu2j, mubj_dt)?)
}
