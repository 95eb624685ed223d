use approx::assert_relative_eq;
use xrfcalc::XrfError;
use xrfcalc::special::{as_5_1_53, as_5_1_56, de_boer_d, de_boer_l0, de_boer_x, e1, exponential_integral};

#[test]
fn test_de_boer_d_bounds() {
    // A&S 5.1.19 and 5.1.20
    for k in 0..=60 {
        let x = 10f64.powf(-2.0 + 5.0 * f64::from(k) / 60.0);
        let d = de_boer_d(x);
        assert!(1.0 / (x + 1.0) < d && d < 1.0 / x, "x = {x}, D = {d}");
        assert!(0.5 * (1.0 + 2.0 / x).ln() < d && d < (1.0 + 1.0 / x).ln(), "x = {x}, D = {d}");
    }
}

#[test]
fn test_de_boer_d_matches_e1() {
    for x in [0.05, 0.3, 0.9, 1.5, 4.0, 25.0] {
        assert_relative_eq!(de_boer_d(x), x.exp() * e1(x).unwrap(), max_relative = 1e-9);
    }
}

#[test]
fn test_rational_approximations_agree() {
    // x·exp(x)·E1(x) from the continued fraction and from A&S 5.1.56
    for x in [1.0, 2.0, 5.0, 20.0, 100.0] {
        assert_relative_eq!(x * de_boer_d(x), as_5_1_56(x).unwrap(), max_relative = 1e-4);
    }
    assert!(matches!(as_5_1_56(0.5), Err(XrfError::Domain(_))));
    assert!(matches!(as_5_1_53(1.5), Err(XrfError::Domain(_))));
    assert!(matches!(as_5_1_53(-0.1), Err(XrfError::Domain(_))));
}

#[test]
fn test_exponential_integral_recurrence() {
    assert_relative_eq!(exponential_integral(2, 0.0).unwrap(), 1.0);
    assert_relative_eq!(exponential_integral(3, 0.0).unwrap(), 0.5);
    // E2(1) = 0.1484955068 (A&S table 5.1)
    assert_relative_eq!(exponential_integral(2, 1.0).unwrap(), 0.1484955068, max_relative = 1e-4);
    assert!(exponential_integral(0, 1.0).is_err());
    assert!(exponential_integral(1, 0.0).is_err());
}

#[test]
fn test_l0_thin_layer_vanishes() {
    let (mu1, mu2, muj): (f64, f64, f64) = (100.0, 80.0, 90.0);
    assert_eq!(de_boer_l0(mu1, mu2, muj, 1.0, 0.0099 / 180.0).unwrap(), 0.0);
    let thin = de_boer_l0(mu1, mu2, muj, 1.0, 0.02 / 180.0).unwrap();
    let thick = de_boer_l0(mu1, mu2, muj, 1.0, 1.0).unwrap();
    assert!(thin > 0.0 && thin < 1e-3 * thick);
}

#[test]
fn test_l0_approaches_thick_target_limit() {
    let (mu1, mu2, muj): (f64, f64, f64) = (100.0, 80.0, 90.0);
    let limit = (muj / mu1) * (1.0 + mu1 / muj).ln() / ((mu1 + mu2) * muj);
    assert_relative_eq!(de_boer_l0(mu1, mu2, muj, 1.0, 1.0).unwrap(), limit);
    // just below the switch to the closed form
    let below = de_boer_l0(mu1, mu2, muj, 1.0, 9.99 / 180.0).unwrap();
    assert_relative_eq!(below, limit, max_relative = 1e-3);
}

#[test]
fn test_l0_grows_with_thickness() {
    let values: Vec<f64> = [0.02, 0.05, 0.2, 0.5, 1.0, 2.0, 5.0, 9.99]
        .iter()
        .map(|k| de_boer_l0(100.0, 80.0, 90.0, 1.0, k / 180.0).unwrap())
        .collect();
    assert!(values.windows(2).all(|w| w[0] < w[1]), "{values:?}");
}

#[test]
fn test_l0_rejects_non_positive_attenuation() {
    assert!(matches!(de_boer_l0(0.0, 80.0, 90.0, 1.0, 1.0), Err(XrfError::Runtime(_))));
    assert!(matches!(de_boer_l0(100.0, f64::NAN, 90.0, 1.0, 1.0), Err(XrfError::Runtime(_))));
}

#[test]
fn test_x_layer_above_is_positive() {
    // Cu K radiation from a 1 µm Cu layer exciting a 1 µm Fe layer below
    let sin45 = 45f64.to_radians().sin();
    let (d1, d2) = (7.874e-4, 8.96e-4);
    let (mu_incident, mu_fe_ka, mu_fe_cuka, mu_cu_cuka) = (66.6, 70.8, 54.5, 32.9);
    let x = de_boer_x(
        -mu_incident / sin45,
        -mu_fe_ka / sin45,
        d1,
        d2,
        mu_fe_cuka,
        mu_cu_cuka,
        0.0,
    )
    .unwrap();
    assert!(x > 0.0);
}
