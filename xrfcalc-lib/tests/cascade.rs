mod common;

use approx::assert_relative_eq;
use common::{CU, FE};
use xrfcalc::{Shell, ShellMap};

#[test]
fn test_unit_vacancy_without_cascade() {
    let fe = FE.element();
    let unit = ShellMap::unit(Shell::K);
    let with_yield = fe.emitted_lines(&unit, false, true).unwrap();
    let total: f64 = with_yield.values().map(|l| l.rate).sum();
    assert_relative_eq!(total, FE.omega_k, max_relative = 1e-12);
    assert!(!with_yield.contains_key("L3M5"));

    let without_yield = fe.emitted_lines(&unit, false, false).unwrap();
    let total: f64 = without_yield.values().map(|l| l.rate).sum();
    assert_relative_eq!(total, 1.0, max_relative = 1e-12);
    assert_relative_eq!(without_yield["KL3"].rate, 0.57, max_relative = 1e-12);
}

#[test]
fn test_cascade_adds_outer_shell_lines() {
    let fe = FE.element();
    let unit = ShellMap::unit(Shell::K);
    let lines = fe.emitted_lines(&unit, true, true).unwrap();
    let to_l3 = FE.omega_k * 0.57 + (1.0 - FE.omega_k) * (0.2 + 2.0 * 0.7);
    assert_relative_eq!(lines["L3M5"].rate, to_l3 * 0.01, max_relative = 1e-12);
    // cascading leaves the K lines untouched
    assert_relative_eq!(lines["KL2"].rate, FE.omega_k * 0.29, max_relative = 1e-12);
}

#[test]
fn test_yields_do_not_exceed_unity() {
    let cu = CU.element();
    for shell in [Shell::K, Shell::L3] {
        let constants = cu.shell_model(shell).unwrap().constants();
        assert!(constants.fluorescence_yield + constants.auger_yield() <= 1.0 + 1e-12);
    }
    assert!(cu.shell_model(Shell::L1).is_none());
}

#[test]
fn test_cascade_cache_matches_direct_computation() {
    let mut cu = CU.element();
    let energies = [9.0, 10.0, 25.0];
    let direct: Vec<_> = energies
        .iter()
        .map(|&e| {
            let vacancies = cu.initial_vacancy_distribution(e).unwrap();
            cu.emitted_lines(&vacancies, true, true).unwrap()
        })
        .collect();
    cu.set_cascade_cache_enabled(true);
    cu.fill_cascade_cache().unwrap();
    assert_eq!(cu.cascade_cache_len(), 2);
    for (e, expected) in energies.iter().zip(&direct) {
        let vacancies = cu.initial_vacancy_distribution(*e).unwrap();
        let cached = cu.emitted_lines(&vacancies, true, true).unwrap();
        assert_eq!(cached.len(), expected.len());
        for (label, line) in expected {
            assert_relative_eq!(cached[label].rate, line.rate, max_relative = 1e-12);
        }
    }
    cu.empty_cascade_cache();
    assert_eq!(cu.cascade_cache_len(), 0);
}

#[test]
fn test_invalid_transitions_are_rejected() {
    let mut fe = FE.element();
    assert!(fe.set_radiative_transitions(Shell::K, [("L3M5", 1.0)]).is_err());
    assert!(fe.set_radiative_transitions(Shell::K, [("KL3", -1.0)]).is_err());
    assert!(fe.set_nonradiative_transitions(Shell::L3, [("L3-L2M5", 1.0)]).is_err());
    assert!(fe.set_shell_constants(Shell::L1, [("omega", 1.5)]).is_err());
    assert!(fe.set_shell_constants(Shell::L1, [("f21", 0.2)]).is_err());
}

#[test]
fn test_rejected_update_keeps_shell_model() {
    let mut fe = FE.element();
    assert!(fe.set_shell_constants(Shell::L2, [("bogus", 0.5)]).is_err());
    assert!(fe.shell_model(Shell::L2).is_none());

    let k_model = fe.shell_model(Shell::K).unwrap().clone();
    assert!(fe.set_radiative_transitions(Shell::K, [("KL2", 0.5), ("L3M5", 0.5)]).is_err());
    assert!(fe.set_nonradiative_transitions(Shell::K, [("K-L1L1", -0.5)]).is_err());
    assert!(fe.set_shell_constants(Shell::K, [("omega", 2.0)]).is_err());
    assert_eq!(fe.shell_model(Shell::K), Some(&k_model));

    let lines = fe.emitted_lines(&ShellMap::unit(Shell::K), false, true).unwrap();
    assert_relative_eq!(lines["KL3"].rate, FE.omega_k * 0.57, max_relative = 1e-12);
}
