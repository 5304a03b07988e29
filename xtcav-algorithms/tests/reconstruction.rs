//! End-to-end retrieval scenarios on synthetic shots.
#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]

mod common;

use approx::assert_relative_eq;
use common::{bunch, gaussian, nolasing, profile, shot, CENTER, NX};
use ndarray::{Array1, Array2, Array3};
use xtcav_algorithms::{
    average_profiles, current_window, reconstruct_pulse, AveragedProfiles, AveragingConfig,
    ReconstructionConfig, ShotProfile, ShotToShot, Warning,
};
use xtcav_core::E_CHARGE;

/// Slice energy lost by every lasing slice (MeV).
const DELTA_E: f64 = 2.0;

/// One sample per pixel, `t = -24 ..= 25` fs.
fn pixel_axis() -> Array1<f64> {
    Array1::from_iter((0..NX).map(|k| k as f64 - 24.0))
}

/// Current of `x_profile` on the pixel axis (time runs against the pixels).
fn current_on_axis(x_profile: &[f64], shot: &ShotToShot) -> Vec<f64> {
    let electrons = shot.num_electrons();
    (0..NX)
        .map(|k| x_profile[NX - 1 - k] / 1e-15 * electrons)
        .collect()
}

/// Single-group reference with the given per-bunch currents, flat slice
/// energy and 1 MeV slice spread.
fn hand_reference(currents: &[Vec<f64>]) -> AveragedProfiles {
    let num_bunches = currents.len();
    let mut e_current = Array3::zeros((num_bunches, 1, NX));
    for (j, current) in currents.iter().enumerate() {
        for (k, &v) in current.iter().enumerate() {
            e_current[[j, 0, k]] = v;
        }
    }
    AveragedProfiles {
        t: pixel_axis(),
        e_current,
        e_com_slice: Array3::zeros((num_bunches, 1, NX)),
        e_rms_slice: Array3::from_elem((num_bunches, 1, NX), 1.0),
        dist_t: Array2::zeros((num_bunches, 1)),
        dist_e: Array2::zeros((num_bunches, 1)),
        t_rms: Array2::zeros((num_bunches, 1)),
        e_rms: Array2::zeros((num_bunches, 1)),
        event_time: Array2::zeros((num_bunches, 1)),
        event_fid: Array2::zeros((num_bunches, 1)),
        num_bunches,
        num_groups: 1,
        group_members: vec![vec![vec![0]]; num_bunches],
        warnings: Vec::new(),
    }
}

fn bunch_shapes() -> Vec<Vec<f64>> {
    vec![gaussian(20.0, 4.0, 0.5), gaussian(30.0, 4.0, 0.5)]
}

/// Two bunches losing `DELTA_E` everywhere, with a slice spread of 1.5 MeV.
fn two_bunch_lasing() -> ShotProfile {
    let loss = vec![-DELTA_E; NX];
    let spread = vec![1.5; NX];
    profile(
        bunch_shapes()
            .into_iter()
            .map(|p| bunch(p, CENTER.0, &loss, &spread))
            .collect(),
        shot(7),
    )
}

#[test]
fn test_constant_energy_loss_two_bunches() {
    let lasing = two_bunch_lasing();
    let currents: Vec<Vec<f64>> = bunch_shapes()
        .iter()
        .map(|p| current_on_axis(p, &lasing.shot_to_shot))
        .collect();
    let reference = hand_reference(&currents);

    let result = reconstruct_pulse(&lasing, &reference, &ReconstructionConfig::default());
    assert!(result.is_clean(), "{:?}", result.warnings);
    assert_eq!(result.num_bunches, 2);
    assert_eq!(result.t.len(), NX);

    for (j, current) in currents.iter().enumerate() {
        assert_eq!(result.reference_group[j], Some(0));
        assert!(result.match_correlation[j] > 1.0 - 1e-9);
        assert_relative_eq!(result.bunch_delay[j], 0.0);

        let peak = current.iter().copied().fold(0.0, f64::max);
        for k in 0..NX {
            let expected = if current[k] > 0.1 * peak {
                DELTA_E * E_CHARGE * 1e6 * current[k] * 1e-9
            } else {
                0.0
            };
            assert_relative_eq!(
                result.power_raw_com[[j, k]],
                expected,
                max_relative = 1e-12,
                epsilon = 1e-30
            );
        }
    }
}

#[test]
fn test_gas_detector_calibration() {
    let lasing = two_bunch_lasing();
    let currents: Vec<Vec<f64>> = bunch_shapes()
        .iter()
        .map(|p| current_on_axis(p, &lasing.shot_to_shot))
        .collect();
    let reference = hand_reference(&currents);

    let result = reconstruct_pulse(&lasing, &reference, &ReconstructionConfig::default());
    let xray_energy = lasing.shot_to_shot.xray_energy;
    assert_relative_eq!(result.xray_energy, xray_energy);
    assert_relative_eq!(
        result.e_bunch_com.iter().sum::<f64>(),
        xray_energy,
        max_relative = 1e-9
    );
    assert_relative_eq!(
        result.e_bunch_rms.iter().sum::<f64>(),
        xray_energy,
        max_relative = 1e-9
    );
    // The calibrated COM curve integrates back to the gas-detector energy.
    let dt_seconds = reference.dt() * 1e-15;
    let total: f64 = result.power_com.sum() * dt_seconds * 1e9;
    assert_relative_eq!(total, xray_energy, max_relative = 1e-9);
}

#[test]
fn test_identical_reference_member_agrees() {
    let shapes = [
        gaussian(18.0, 5.0, 0.6),
        gaussian(25.0, 5.0, 0.6),
        gaussian(32.0, 5.0, 0.6),
    ];
    let references: Vec<ShotProfile> = shapes
        .iter()
        .enumerate()
        .map(|(i, p)| nolasing(p.clone(), i as u32))
        .collect();
    let reference = average_profiles(
        &references,
        &AveragingConfig::default().with_shots_per_group(1),
    );
    assert_eq!(reference.num_groups, 3);

    // Spread growth scaled so both methods see a power proportional to the
    // current: loss is constant and spread^2 grows like current^(1/3).
    let member = &shapes[1];
    let shot_to_shot = shot(99);
    let electrons = shot_to_shot.num_electrons();
    let pixel_current: Vec<f64> = member.iter().map(|p| p / 1e-15 * electrons).collect();
    let peak = pixel_current.iter().copied().fold(0.0, f64::max);
    let spread: Vec<f64> = pixel_current
        .iter()
        .map(|i| (1.0 + (i / peak).cbrt()).sqrt())
        .collect();
    let loss = vec![-1.0; NX];
    let lasing = |xray_energy: f64| {
        profile(
            vec![bunch(member.clone(), CENTER.0, &loss, &spread)],
            shot_to_shot.clone().with_xray_energy(xray_energy),
        )
    };

    let config = ReconstructionConfig::default();
    let first = reconstruct_pulse(&lasing(1e-3), &reference, &config);
    assert_eq!(first.reference_group, vec![Some(1)]);
    assert_relative_eq!(first.match_correlation[0], 1.0, epsilon = 1e-12);

    // Calibrate to exactly the energy the COM method sees so no offset is
    // spread over the current tails.
    let com_energy = first.power_raw_com.sum() * 1e9 * reference.dt() * 1e-15;
    let result = reconstruct_pulse(&lasing(com_energy), &reference, &config);
    assert!(result.power_agreement[0] > 0.99, "{}", result.power_agreement[0]);
    assert!(result.power_agreement[0] <= 1.0);
}

#[test]
fn test_window_matches_current_threshold() {
    let lasing = two_bunch_lasing();
    let currents: Vec<Vec<f64>> = bunch_shapes()
        .iter()
        .map(|p| current_on_axis(p, &lasing.shot_to_shot))
        .collect();
    let reference = hand_reference(&currents);
    let result = reconstruct_pulse(&lasing, &reference, &ReconstructionConfig::default());

    let (start, end) = current_window(&currents[0], &currents[0], 0.1).unwrap();
    for k in 0..NX {
        let inside = (start..=end).contains(&k);
        assert_eq!(result.lasing_e_com[[0, k]] != 0.0, inside, "sample {k}");
        assert_eq!(result.power_raw_rms[[0, k]] > 0.0, inside, "sample {k}");
    }
}

#[test]
fn test_bunch_count_mismatch() {
    let lasing = nolasing(gaussian(20.0, 4.0, 0.5), 3);
    let reference = hand_reference(&[
        current_on_axis(&gaussian(20.0, 4.0, 0.5), &lasing.shot_to_shot),
        current_on_axis(&gaussian(30.0, 4.0, 0.5), &lasing.shot_to_shot),
    ]);

    let result = reconstruct_pulse(&lasing, &reference, &ReconstructionConfig::default());
    assert_eq!(result.num_bunches, 2);
    assert!(result.warnings.contains(&Warning::BunchCountMismatch {
        expected: 2,
        found: 1
    }));
    assert_eq!(result.reference_group, vec![Some(0), None]);
    assert!(result.power_raw_com.row(1).iter().all(|&p| p == 0.0));
    assert!(result.lasing_e_current.row(1).iter().all(|&c| c == 0.0));
}

#[test]
fn test_empty_reference() {
    let shots = vec![nolasing(gaussian(25.0, 5.0, 0.6), 0)];
    let reference = average_profiles(&shots, &AveragingConfig::default());
    assert!(reference.is_empty());

    let lasing = nolasing(gaussian(25.0, 5.0, 0.6), 1);
    let result = reconstruct_pulse(&lasing, &reference, &ReconstructionConfig::default());
    assert!(result.warnings.contains(&Warning::EmptyReference));
    assert!(result.warnings.contains(&Warning::UncalibratedRms));
    assert_eq!(result.reference_group, vec![None]);
    assert!(result.power_com.iter().all(|p| p.is_finite()));
    assert!(result.power_rms.iter().all(|&p| p == 0.0));
}

#[test]
fn test_negative_current_is_clamped() {
    let mut dipped = gaussian(25.0, 5.0, 0.6);
    dipped[25] = -1e-3;
    let loss = vec![-DELTA_E; NX];
    let spread = vec![1.5; NX];
    let lasing = profile(vec![bunch(dipped, CENTER.0, &loss, &spread)], shot(5));
    let reference = hand_reference(&[current_on_axis(
        &gaussian(25.0, 5.0, 0.6),
        &lasing.shot_to_shot,
    )]);

    let result = reconstruct_pulse(&lasing, &reference, &ReconstructionConfig::default());
    // Pixel 25 sits at t = 0, sample 24.
    assert!(result.lasing_e_current[[0, 24]] < 0.0);
    assert_relative_eq!(result.power_raw_rms[[0, 24]], 0.0);
    assert!(result.power_raw_rms.iter().all(|p| p.is_finite()));
    assert!(result.power_rms.iter().all(|p| p.is_finite()));
    assert!(result.power_agreement[0].is_finite());
}
