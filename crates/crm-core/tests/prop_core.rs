// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Property-Based Tests (proptest) for crm-core
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Property-based tests for crm-core using proptest.
//!
//! Covers: column sums of assembled rate matrices, particle conservation
//! under direct solve and evolution, idempotent direct solves, clamped
//! radiative recombination, balanced partitions.

use crm_core::atomic::{StateRecord, StateTable};
use crm_core::electrons::maxwellian;
use crm_core::partition::{decompose, SerialCommunicator};
use crm_core::rate_matrix::{LocalElectronState, RateMatrix, RateMatrixBuilder};
use crm_core::solver::{evolve, solve_direct, EvolveSettings};
use crm_core::transitions::{RateData, StateKey, TransitionKind, TransitionRecord, TransitionSet};
use crm_math::{DenseSystem, LinearSystem};
use crm_types::config::ProcessToggles;
use crm_types::state::{Normalization, VelocityGrid};
use ndarray::Array2;
use proptest::prelude::*;

/// Three-stage ladder with one excited state in stage 0.
fn ladder() -> (StateTable, Vec<TransitionRecord>) {
    let rec = |stage: usize, name: &str, g: u32, e: f64| StateRecord {
        ionization_stage: stage,
        name: name.to_string(),
        statistical_weight: g,
        energy: e,
    };
    let states = StateTable::load(
        &[
            rec(0, "g", 1, 0.0),
            rec(0, "x", 3, 0.7),
            rec(1, "g", 2, 1.5),
            rec(2, "g", 1, 4.0),
        ],
        None,
    )
    .unwrap();
    let xs = |e: f64| RateData::CrossSection {
        energy: vec![e, 3.0 * e, 100.0],
        sigma: vec![0.5, 1.0, 0.2],
    };
    let t = |kind, from: (usize, &str), to: (usize, &str), data| TransitionRecord {
        kind,
        from: StateKey::new(from.0, from.1),
        to: StateKey::new(to.0, to.1),
        data,
    };
    let catalog = vec![
        t(TransitionKind::Excitation, (0, "g"), (0, "x"), xs(0.7)),
        t(TransitionKind::Ionization, (0, "g"), (1, "g"), xs(1.5)),
        t(TransitionKind::Ionization, (0, "x"), (1, "g"), xs(0.8)),
        t(TransitionKind::Ionization, (1, "g"), (2, "g"), xs(2.5)),
        t(
            TransitionKind::RadiativeRecombination,
            (2, "g"),
            (1, "g"),
            // Extrapolates negative above T = 3
            RateData::Interpolant {
                temperature: vec![0.5, 2.0],
                coefficient: vec![0.05, 0.02],
            },
        ),
    ];
    (states, catalog)
}

fn matrix(ne: f64, te: f64) -> RateMatrix<DenseSystem> {
    let (states, catalog) = ladder();
    let grid = VelocityGrid::uniform(300, 0.03);
    let norm = Normalization::unit();
    let set = TransitionSet::build(&states, &catalog, &[], &ProcessToggles::default(), &grid, &norm).unwrap();
    let f = maxwellian(&grid, ne, te);
    let local = LocalElectronState {
        density: ne,
        temperature: te,
        distribution: f.view(),
    };
    RateMatrixBuilder::new(&set, &grid, &norm).build(0, &local).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Every assembled matrix has zero column sums and non-negative
    /// off-diagonal entries, even where α(T) extrapolates below zero.
    #[test]
    fn assembled_matrix_is_a_rate_matrix(ne in 0.1f64..5.0, te in 0.3f64..6.0) {
        let m = matrix(ne, te);
        for s in m.column_sums() {
            prop_assert!(s.abs() < 1e-10, "column sum {}", s);
        }
        let dense = m.system.to_dense();
        for ((r, c), v) in dense.indexed_iter() {
            if r != c {
                prop_assert!(*v >= 0.0, "negative gain at ({}, {}): {}", r, c, v);
            }
        }
        prop_assert!(m.rate_coefficients().iter().all(|p| p.forward >= 0.0 && p.inverse >= 0.0));
    }

    /// Direct solve keeps the cell total and is idempotent.
    #[test]
    fn direct_solve_conserves_and_is_idempotent(
        ne in 0.2f64..4.0,
        te in 0.4f64..3.0,
        init in prop::collection::vec(0.0f64..2.0, 4),
    ) {
        prop_assume!(init.iter().sum::<f64>() > 0.1);
        let total: f64 = init.iter().sum();
        let matrices = vec![matrix(ne, te)];
        let mut n = Array2::from_shape_vec((1, 4), init).unwrap();
        solve_direct(&matrices, &mut n, 1e-12).unwrap();
        prop_assert!((n.sum() - total).abs() / total < 1e-12);
        let once = n.clone();
        solve_direct(&matrices, &mut n, 1e-12).unwrap();
        for (a, b) in n.iter().zip(once.iter()) {
            prop_assert!((a - b).abs() <= 1e-10 * total);
        }
    }

    /// Backward-Euler steps conserve the cell total.
    #[test]
    fn evolution_conserves_total(
        ne in 0.2f64..4.0,
        te in 0.4f64..3.0,
        dt in 1e-3f64..1.0,
        steps in 1usize..30,
    ) {
        let matrices = vec![matrix(ne, te)];
        let mut n = Array2::from_shape_vec((1, 4), vec![1.0, 0.0, 0.5, 0.0]).unwrap();
        let settings = EvolveSettings {
            delta_t: dt,
            dndt_thresh: 0.0,
            max_steps: steps,
            divergence_window: 1.0,
            tolerance: 1e-12,
        };
        let report = evolve(&matrices, n.view_mut(), &settings, &SerialCommunicator).unwrap();
        prop_assert_eq!(report.steps, steps);
        prop_assert!((n.sum() - 1.5).abs() < 1e-10);
        prop_assert!(n.iter().all(|v| *v > -1e-12));
    }

    /// Partitions tile the grid with sizes differing by at most one.
    #[test]
    fn partitions_tile_grid(num_x in 1usize..500, workers in 1usize..16) {
        prop_assume!(workers <= num_x);
        let parts = decompose(num_x, workers).unwrap();
        prop_assert_eq!(parts.len(), workers);
        prop_assert_eq!(parts[0].min_x, 0);
        prop_assert_eq!(parts[workers - 1].max_x, num_x);
        let lens: Vec<usize> = parts.iter().map(|p| p.len()).collect();
        let (lo, hi) = (lens.iter().min().unwrap(), lens.iter().max().unwrap());
        prop_assert!(hi - lo <= 1);
        for w in parts.windows(2) {
            prop_assert_eq!(w[0].max_x, w[1].min_x);
        }
    }
}
