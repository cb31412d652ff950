// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — CRM Scenario Tests
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! End-to-end checks of the rate-matrix engine against analytic results.

use crm_core::atomic::{StateRecord, StateTable};
use crm_core::electrons::{maxwellian, maxwellians, ElectronBackground};
use crm_core::model::{ImpurityModel, Representation};
use crm_core::partition::SerialCommunicator;
use crm_core::rate_matrix::{LocalElectronState, RateMatrix, RateMatrixBuilder};
use crm_core::saha;
use crm_core::solver::{evolve, evolve_distributed, solve_direct, EvolveSettings, StopReason};
use crm_core::transitions::{
    RateData, SpontaneousEmissionRecord, StateKey, TransitionKind, TransitionRecord, TransitionSet,
};
use crm_math::DenseSystem;
use crm_types::config::{ProcessToggles, RunConfig};
use crm_types::constants::{EL_CHARGE, EL_MASS};
use crm_types::state::{Normalization, VelocityGrid};
use ndarray::{s, Array1, Array2};

fn state(stage: usize, name: &str, g: u32, energy: f64) -> StateRecord {
    StateRecord {
        ionization_stage: stage,
        name: name.to_string(),
        statistical_weight: g,
        energy,
    }
}

/// Unit cross section above `threshold`.
fn step_sigma(threshold: f64) -> RateData {
    RateData::CrossSection {
        energy: vec![threshold, 1.0e3],
        sigma: vec![1.0, 1.0],
    }
}

/// Neutral and ion ground states joined by ionization with threshold `eps`.
fn two_stage(g_neutral: u32, g_ion: u32, eps: f64) -> (StateTable, Vec<TransitionRecord>) {
    let states = StateTable::load(&[state(0, "g", g_neutral, 0.0), state(1, "g", g_ion, eps)], None).unwrap();
    let catalog = vec![TransitionRecord {
        kind: TransitionKind::Ionization,
        from: StateKey::new(0, "g"),
        to: StateKey::new(1, "g"),
        data: step_sigma(eps),
    }];
    (states, catalog)
}

fn ionization_only() -> ProcessToggles {
    ProcessToggles {
        ionization: true,
        ..ProcessToggles::none()
    }
}

fn fine_grid() -> VelocityGrid {
    VelocityGrid::uniform(4000, 0.0025)
}

// ── Scenario A: two-level Saha ratio ─────────────────────────────────

#[test]
fn direct_solve_reproduces_saha_ratio() {
    let (states, catalog) = two_stage(1, 2, 2.0);
    let grid = fine_grid();
    let norm = Normalization::unit();
    let set = TransitionSet::build(&states, &catalog, &[], &ionization_only(), &grid, &norm).unwrap();
    let builder = RateMatrixBuilder::new(&set, &grid, &norm);

    for &(ne, te) in &[(1.0, 1.0), (0.5, 1.5), (2.0, 0.8)] {
        let f = maxwellian(&grid, ne, te);
        let local = LocalElectronState {
            density: ne,
            temperature: te,
            distribution: f.view(),
        };
        let matrices = vec![builder.build::<DenseSystem>(0, &local).unwrap()];
        let mut n = Array2::from_shape_vec((1, 2), vec![1.0, 0.0]).unwrap();
        solve_direct(&matrices, &mut n, 1e-12).unwrap();

        let ratio = n[[0, 1]] / n[[0, 0]];
        let expected = 2.0 * 2.0 * te.powf(1.5) * (-2.0 / te).exp() / ne;
        assert!(
            (ratio - expected).abs() / expected < 1e-2,
            "ne={ne} te={te}: ratio {ratio}, Saha {expected}"
        );

        let fractions = saha::stage_fractions(&states, ne, te, &norm).unwrap();
        assert!((fractions[1] / fractions[0] - expected).abs() / expected < 1e-12);
    }
}

// ── Detailed balance on Maxwellian electrons ─────────────────────────

#[test]
fn inverse_rates_obey_detailed_balance() {
    let states = StateTable::load(
        &[state(0, "g", 2, 0.0), state(0, "x", 6, 1.5), state(1, "g", 1, 4.0)],
        None,
    )
    .unwrap();
    let ramp = RateData::CrossSection {
        energy: vec![1.5, 5.0, 50.0, 500.0],
        sigma: vec![0.2, 1.0, 0.6, 0.1],
    };
    let catalog = vec![
        TransitionRecord {
            kind: TransitionKind::Excitation,
            from: StateKey::new(0, "g"),
            to: StateKey::new(0, "x"),
            data: ramp,
        },
        TransitionRecord {
            kind: TransitionKind::Ionization,
            from: StateKey::new(0, "g"),
            to: StateKey::new(1, "g"),
            data: step_sigma(4.0),
        },
    ];
    let grid = fine_grid();
    let norm = Normalization::unit();
    let set = TransitionSet::build(&states, &catalog, &[], &ProcessToggles::default(), &grid, &norm).unwrap();
    let builder = RateMatrixBuilder::new(&set, &grid, &norm);

    for &(ne, te) in &[(1.0, 1.0), (3.0, 2.0), (0.7, 0.6)] {
        let f = maxwellian(&grid, ne, te);
        let local = LocalElectronState {
            density: ne,
            temperature: te,
            distribution: f.view(),
        };
        let m = builder.build::<DenseSystem>(0, &local).unwrap();
        let rates = m.rate_coefficients();

        let ex = rates[0];
        let expected_ex = ex.inverse * 3.0 * (-1.5 / te).exp();
        assert!(
            (ex.forward - expected_ex).abs() / ex.forward < 1e-2,
            "excitation te={te}: {} vs {expected_ex}",
            ex.forward
        );

        let iz = rates[1];
        let expected_iz = iz.inverse * 2.0 * 0.5 * te.powf(1.5) * (-4.0 / te).exp() / ne;
        assert!(
            (iz.forward - expected_iz).abs() / iz.forward < 1e-2,
            "ionization te={te}: {} vs {expected_iz}",
            iz.forward
        );
    }
}

// ── Scenario B: evolution converges onto the direct solution ─────────

#[test]
fn evolution_converges_monotonically_to_direct_solution() {
    let (states, catalog) = two_stage(1, 1, 1.0);
    let grid = VelocityGrid::uniform(1000, 0.006);
    let norm = Normalization {
        collrate_const: 100.0,
        ..Normalization::unit()
    };
    let set = TransitionSet::build(&states, &catalog, &[], &ionization_only(), &grid, &norm).unwrap();
    let builder = RateMatrixBuilder::new(&set, &grid, &norm);

    let ne = Array1::from(vec![1.0, 1.0, 1.0]);
    let te = Array1::from(vec![0.8, 1.0, 1.2]);
    let f = maxwellians(&grid, &ne, &te);
    let matrices: Vec<RateMatrix<DenseSystem>> = builder.build_all(&ne, &te, f.view()).unwrap();

    let init = Array2::from_shape_fn((3, 2), |(_, j)| if j == 0 { 1.0 } else { 0.0 });
    let mut evolved = init.clone();
    let mut direct = init;
    let settings = EvolveSettings {
        delta_t: 1e-3,
        dndt_thresh: 1e-5,
        max_steps: 1000,
        divergence_window: 0.1,
        tolerance: 1e-12,
    };
    let report = evolve(&matrices, evolved.view_mut(), &settings, &SerialCommunicator).unwrap();
    solve_direct(&matrices, &mut direct, 1e-12).unwrap();

    assert_eq!(report.stop, StopReason::Converged);
    assert!(report.residual < 1e-5);
    assert!(report.steps < 1000);
    for w in report.residual_history.windows(2) {
        assert!(w[1] <= w[0], "residual rose: {} -> {}", w[0], w[1]);
    }
    for (a, b) in evolved.iter().zip(direct.iter()) {
        assert!((a - b).abs() / b.abs() < 1e-6, "evolved {a} vs direct {b}");
    }
}

// ── Scenario C: spontaneous decay ────────────────────────────────────

#[test]
fn spontaneous_emission_decays_exponentially() {
    let states = StateTable::load(&[state(0, "lo", 1, 0.0), state(0, "up", 3, 1.0)], None).unwrap();
    let spontem = vec![SpontaneousEmissionRecord {
        stage: 0,
        upper: "up".into(),
        lower: "lo".into(),
        rate: 1.0,
    }];
    let grid = VelocityGrid::uniform(10, 0.1);
    let norm = Normalization::unit();
    let toggles = ProcessToggles {
        emission: true,
        ..ProcessToggles::none()
    };
    let set = TransitionSet::build(&states, &[], &spontem, &toggles, &grid, &norm).unwrap();
    assert_eq!(set.len(), 1);

    let f = Array1::zeros(grid.len());
    let local = LocalElectronState {
        density: 1.0,
        temperature: 1.0,
        distribution: f.view(),
    };
    let matrices = vec![RateMatrixBuilder::new(&set, &grid, &norm)
        .build::<DenseSystem>(0, &local)
        .unwrap()];

    let dt = 1e-3;
    let steps = 500;
    let settings = EvolveSettings {
        delta_t: dt,
        dndt_thresh: 0.0,
        max_steps: steps,
        divergence_window: 1.0,
        tolerance: 1e-12,
    };
    let mut n = Array2::from_shape_vec((1, 2), vec![0.0, 1.0]).unwrap();
    let report = evolve(&matrices, n.view_mut(), &settings, &SerialCommunicator).unwrap();
    assert_eq!(report.stop, StopReason::MaxSteps);
    assert_eq!(report.steps, steps);

    let discrete = (1.0 + dt).powi(-(steps as i32));
    assert!((n[[0, 1]] - discrete).abs() < 1e-12);
    assert!((n[[0, 1]] - (-(dt * steps as f64)).exp()).abs() < 1e-3);
    assert!((n[[0, 0]] + n[[0, 1]] - 1.0).abs() < 1e-12);
}

// ── Scenario D: distributed residual is the global maximum ───────────

#[test]
fn distributed_residual_is_global_max() {
    let (states, catalog) = two_stage(1, 1, 1.0);
    let grid = VelocityGrid::uniform(400, 0.015);
    let norm = Normalization {
        collrate_const: 10.0,
        ..Normalization::unit()
    };
    let set = TransitionSet::build(&states, &catalog, &[], &ionization_only(), &grid, &norm).unwrap();
    let builder = RateMatrixBuilder::new(&set, &grid, &norm);

    let num_x = 40;
    let ne = Array1::from_elem(num_x, 1.0);
    let te = Array1::linspace(0.5, 2.0, num_x);
    let f = maxwellians(&grid, &ne, &te);
    let matrices: Vec<RateMatrix<DenseSystem>> = builder.build_all(&ne, &te, f.view()).unwrap();
    let init = Array2::from_shape_fn((num_x, 2), |(_, j)| if j == 0 { 1.0 } else { 0.0 });
    let settings = EvolveSettings {
        delta_t: 1e-2,
        dndt_thresh: 1e-6,
        max_steps: 2000,
        divergence_window: 0.1,
        tolerance: 1e-12,
    };

    // First-step residual of every cell on its own
    let per_cell: Vec<f64> = (0..num_x)
        .map(|c| {
            let mut n = init.slice(s![c..c + 1, ..]).to_owned();
            let one = EvolveSettings {
                max_steps: 1,
                ..settings
            };
            evolve(&matrices[c..c + 1], n.view_mut(), &one, &SerialCommunicator)
                .unwrap()
                .residual
        })
        .collect();
    let true_max = per_cell.iter().copied().fold(0.0, f64::max);
    let first_partition_max = per_cell[..10].iter().copied().fold(0.0, f64::max);
    assert!(first_partition_max < true_max);

    let mut distributed = init.clone();
    let report = evolve_distributed(&matrices, &mut distributed, &settings, 4).unwrap();
    assert_eq!(report.residual_history[0], true_max);

    let mut serial = init;
    let reference = evolve(&matrices, serial.view_mut(), &settings, &SerialCommunicator).unwrap();
    assert_eq!(report.residual_history, reference.residual_history);
    assert_eq!(report.stop, reference.stop);
    assert_eq!(distributed, serial);
}

// ── Config-driven model run ──────────────────────────────────────────

fn hydrogen_like() -> (Vec<StateRecord>, Vec<TransitionRecord>, Vec<SpontaneousEmissionRecord>) {
    let states = vec![
        state(0, "1s", 2, 0.0),
        state(0, "2p", 6, 10.2),
        state(1, "bare", 1, 13.6),
    ];
    let xs = |e: f64| RateData::CrossSection {
        energy: vec![e, 2.5 * e, 1e4],
        sigma: vec![2e-21, 8e-21, 4e-22],
    };
    let transitions = vec![
        TransitionRecord {
            kind: TransitionKind::Ionization,
            from: StateKey::new(0, "1s"),
            to: StateKey::new(1, "bare"),
            data: xs(13.6),
        },
        TransitionRecord {
            kind: TransitionKind::Ionization,
            from: StateKey::new(0, "2p"),
            to: StateKey::new(1, "bare"),
            data: xs(3.4),
        },
        TransitionRecord {
            kind: TransitionKind::Excitation,
            from: StateKey::new(0, "1s"),
            to: StateKey::new(0, "2p"),
            data: xs(10.2),
        },
        TransitionRecord {
            kind: TransitionKind::RadiativeRecombination,
            from: StateKey::new(1, "bare"),
            to: StateKey::new(0, "1s"),
            data: RateData::Interpolant {
                temperature: vec![1.0, 10.0, 100.0],
                coefficient: vec![1e-19, 3e-20, 5e-21],
            },
        },
    ];
    let spontem = vec![SpontaneousEmissionRecord {
        stage: 0,
        upper: "2p".into(),
        lower: "1s".into(),
        rate: 6.3e8,
    }];
    (states, transitions, spontem)
}

/// Physical Maxwellian distributions on a shared speed grid.
fn kinetic_background(te: &[f64], ne: &[f64]) -> ElectronBackground {
    let t_max = te.iter().copied().fold(0.0, f64::max);
    let v_max = 6.0 * (2.0 * t_max * EL_CHARGE / EL_MASS).sqrt();
    let num_v = 1500;
    let dv = v_max / num_v as f64;
    let v = Array1::from_shape_fn(num_v, |i| (i as f64 + 0.5) * dv);
    let f = Array2::from_shape_fn((te.len(), num_v), |(c, i)| {
        let kt = te[c] * EL_CHARGE;
        ne[c] * (EL_MASS / (2.0 * std::f64::consts::PI * kt)).powf(1.5) * (-EL_MASS * v[i] * v[i] / (2.0 * kt)).exp()
    });
    let x = Array1::linspace(0.0, 0.1, te.len());
    ElectronBackground::from_distribution(x, f, v).unwrap()
}

#[test]
fn kinetic_maxwellian_run_matches_maxwellian_run() {
    let config = RunConfig::from_json_str(
        r#"{"kinetic_electrons": true, "maxwellian_electrons": true, "solver": {"num_workers": 2}}"#,
    )
    .unwrap();
    let (s, t, e) = hydrogen_like();
    let bg = kinetic_background(&[8.0, 12.0, 16.0, 20.0], &[1e19, 2e19, 2e19, 1e19]);
    let mut model = ImpurityModel::new("H", &s, &t, &e, bg, config).unwrap();

    let totals: Vec<f64> = model
        .densities(Representation::Kinetic)
        .unwrap()
        .rows()
        .into_iter()
        .map(|r| r.sum())
        .collect();
    let summaries = model.run().unwrap().to_vec();
    assert_eq!(summaries.len(), 2);
    assert!(summaries.iter().all(|s| s.report.is_some()));

    let kin = model.densities(Representation::Kinetic).unwrap();
    let max = model.densities(Representation::Maxwellian).unwrap();
    for (c, total) in totals.iter().enumerate() {
        assert!((kin.row(c).sum() - total).abs() / total < 1e-8);
        assert!((max.row(c).sum() - total).abs() / total < 1e-8);
        for j in 0..kin.ncols() {
            assert!(
                (kin[[c, j]] - max[[c, j]]).abs() / total < 1e-2,
                "cell {c} state {j}: kinetic {} vs maxwellian {}",
                kin[[c, j]],
                max[[c, j]]
            );
        }
    }

    let zeff = model.z_eff(Representation::Kinetic).unwrap();
    assert!(zeff.iter().all(|z| z.is_finite() && *z >= 0.0));
    let stage = model.stage_densities(Representation::Maxwellian).unwrap();
    assert_eq!(stage.dim(), (4, 2));
}

#[test]
fn sparse_backend_matches_dense_backend() {
    let (s, t, e) = hydrogen_like();
    let profiles = || {
        ElectronBackground::from_profiles(
            Array1::linspace(0.0, 1.0, 3),
            Array1::from(vec![5.0, 10.0, 15.0]),
            Array1::from_elem(3, 5e18),
        )
        .unwrap()
    };
    let dense_cfg = RunConfig::from_json_str(r#"{"evolve": false}"#).unwrap();
    let sparse_cfg = RunConfig::from_json_str(r#"{"evolve": false, "solver": {"backend": "sparse"}}"#).unwrap();

    let mut dense = ImpurityModel::new("H", &s, &t, &e, profiles(), dense_cfg).unwrap();
    let mut sparse = ImpurityModel::new("H", &s, &t, &e, profiles(), sparse_cfg).unwrap();
    dense.run().unwrap();
    sparse.run().unwrap();

    let a = dense.densities(Representation::Maxwellian).unwrap();
    let b = sparse.densities(Representation::Maxwellian).unwrap();
    for (x, y) in a.iter().zip(b.iter()) {
        assert!((x - y).abs() <= 1e-6 * a.sum(), "dense {x} vs sparse {y}");
    }
}
