mod common;

use approx::assert_relative_eq;
use common::{CU, FE};
use xrfcalc::{Shell, XrfError};

#[test]
fn test_initial_vacancies_follow_partial_cross_sections() {
    let fe = FE.element();
    let above = fe.initial_vacancy_distribution(10.0).unwrap();
    assert_relative_eq!(above[Shell::K], 1.0 - 1.0 / FE.jump, max_relative = 1e-12);
    assert_eq!(above[Shell::L3], 0.0);
    let below = fe.initial_vacancy_distribution(7.0).unwrap();
    assert!(below.values().all(|&v| v == 0.0));
}

#[test]
fn test_excitation_factors_scale_with_weight() {
    let fe = FE.element();
    let photo = fe.mass_attenuation(10.0).unwrap().photoelectric;
    let vacancy = 1.0 - 1.0 / FE.jump;
    let factors = fe.excitation_factors(10.0, 0.25).unwrap();
    for (label, ratio) in FE.k_lines {
        let line = &factors[*label];
        assert_relative_eq!(line.factor, vacancy * FE.omega_k * ratio, max_relative = 1e-12);
        assert_relative_eq!(line.rate, line.factor * 0.25 * photo, max_relative = 1e-12);
    }
    assert_relative_eq!(factors["KL3"].energy, 7.112 - 0.7081, max_relative = 1e-14);
    assert!(matches!(fe.excitation_factors(10.0, -1.0), Err(XrfError::InvalidArgument(_))));
    assert!(fe.excitation_factors(7.0, 1.0).unwrap().is_empty());
}

#[test]
fn test_cascade_feeds_l3_lines() {
    let fe = FE.element();
    let factors = fe.excitation_factors(10.0, 1.0).unwrap();
    let vacancy = 1.0 - 1.0 / FE.jump;
    // KL3 radiative plus K-L1L3 and two vacancies from K-L3L3
    let to_l3 = FE.omega_k * 0.57 + (1.0 - FE.omega_k) * (0.2 + 2.0 * 0.7);
    assert_relative_eq!(factors["L3M5"].factor, vacancy * to_l3 * 0.01, max_relative = 1e-12);
    // M5 has no binding energy: 3 eV is assumed
    assert_relative_eq!(factors["L3M5"].energy, 0.7081 - 0.003, max_relative = 1e-14);
    let cascaded = fe.cascade_modified_vacancy_distribution(10.0).unwrap();
    assert_relative_eq!(cascaded[Shell::L3], vacancy * to_l3, max_relative = 1e-12);
}

#[test]
fn test_caches_do_not_change_results() {
    let mut cu = CU.element();
    let energies = [9.5, 12.0, 20.0];
    let plain: Vec<_> = energies
        .iter()
        .map(|&e| cu.excitation_factors(e, 0.5).unwrap())
        .collect();
    cu.set_cache_enabled(true);
    cu.fill_cache(&energies).unwrap();
    assert_eq!(cu.cache_len(), energies.len());
    cu.set_cascade_cache_enabled(true);
    cu.fill_cascade_cache().unwrap();
    assert!(cu.cascade_cache_len() > 0);
    for (e, expected) in energies.iter().zip(&plain) {
        let cached = cu.excitation_factors(*e, 0.5).unwrap();
        for (label, line) in expected {
            assert_relative_eq!(cached[label].rate, line.rate, max_relative = 1e-12);
            assert_relative_eq!(cached[label].energy, line.energy);
        }
    }
    // an energy outside the cache is still computed
    assert!(!cu.excitation_factors(15.0, 1.0).unwrap().is_empty());
}

#[test]
fn test_resetting_tables_clears_caches() {
    let mut fe = FE.element();
    fe.set_cache_enabled(true);
    fe.fill_cache(&[10.0]).unwrap();
    assert_eq!(fe.cache_len(), 1);
    fe.set_shell_constants(Shell::K, [("omega", 0.5)]).unwrap();
    let factors = fe.excitation_factors(10.0, 1.0).unwrap();
    assert_relative_eq!(factors["KL3"].factor, (1.0 - 1.0 / FE.jump) * 0.5 * 0.57, max_relative = 1e-12);
}

#[test]
fn test_peak_families_are_sorted_by_binding_energy() {
    let elements = common::library();
    let families = elements.peak_families(["Fe", "Cu"], 12.0).unwrap();
    let labels: Vec<String> = families.iter().map(ToString::to_string).collect();
    assert_eq!(labels, ["Fe L3", "Cu L3", "Fe K", "Cu K"]);
    let families = elements.peak_families(["Fe", "Cu"], 8.0).unwrap();
    assert_eq!(families.last().unwrap().to_string(), "Fe K");
}
