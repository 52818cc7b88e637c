extern crate radec_od as od;

use super::generation::bursts;
use super::{assert_covariance_close, assert_valid_covariance, Scenario};
use od::linalg::{DMatrix, Matrix6, Vector2};
use od::od::prelude::*;
use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;
use rstest::*;
use std::sync::Arc;

#[fixture]
fn cosm() -> Arc<Cosm> {
    Cosm::iers2010()
}

/// Fixed steps and a reduced gravity field keep the truth and the estimator on the same dynamics
fn settings() -> ODSettings {
    ODSettings::builder()
        .integrator(IntegratorConfig::builder().fixed_step_s(60.0).build())
        .force_models(
            ForceModelsConfig::builder()
                .gravity_degree(8)
                .gravity_order(8)
                .build(),
        )
        .build()
}

fn guess_of(truth: Spacecraft) -> Spacecraft {
    let mut guess = truth;
    guess.orbit.radius_km[0] += 1.0;
    guess.orbit.radius_km[2] -= 0.5;
    guess.orbit.velocity_km_s[1] += 1e-4;
    guess
}

/// Covariance of a least squares fit of the measurements at the provided state, (Σ Hᵀ W H)⁻¹, where H maps a change
/// of the state onto the angles of one measurement and W holds the squared weights over the squared sigmas.
///
/// The normal matrix is inverted from the singular values of the column equilibrated and weighted partials.
fn covariance_at(
    state: Spacecraft,
    msrs: &[AngularRaDec],
    settings: &ODSettings,
    cosm: Arc<Cosm>,
) -> Matrix6<f64> {
    let dynamics = DynamicsConfig::new(state, settings, cosm.clone()).unwrap();
    let mut sorted = msrs.to_vec();
    sorted.sort_by_key(|msr| std::cmp::Reverse(msr.epoch));

    let mut instance = dynamics.propagator().with(state.with_stm());
    let mut partials = DMatrix::<f64>::zeros(2 * sorted.len(), 6);
    for (k, msr) in sorted.iter().enumerate() {
        let at_msr = instance.until_epoch(msr.epoch).unwrap();
        let est = msr.estimate(&at_msr, &cosm, &Vector2::zeros());
        assert!(est.is_processed(), "{msr}");
        let h = est.h_tilde * at_msr.stm().unwrap();
        for axis in 0..2 {
            let weight = msr.weight[axis] / msr.sigma[axis];
            for col in 0..6 {
                partials[(2 * k + axis, col)] = weight * h[(axis, col)];
            }
        }
    }

    let norms: Vec<f64> = (0..6).map(|col| partials.column(col).norm()).collect();
    for (col, norm) in norms.iter().enumerate() {
        partials.column_mut(col).unscale_mut(*norm);
    }
    let svd = partials.svd(false, true);
    let v_t = svd.v_t.unwrap();
    let mut covariance = Matrix6::zeros();
    for i in 0..6 {
        for j in 0..6 {
            let mut value = 0.0;
            for (k, sv) in svd.singular_values.iter().enumerate() {
                value += v_t[(k, i)] * v_t[(k, j)] / (sv * sv);
            }
            covariance[(i, j)] = value / (norms[i] * norms[j]);
        }
    }
    covariance
}

#[rstest]
#[case::af3(Scenario::af3())]
#[case::cp1(Scenario::cp1())]
#[case::sa2(Scenario::sa2())]
fn noise_free_recovery(cosm: Arc<Cosm>, #[case] scenario: Scenario) {
    let _ = pretty_env_logger::try_init();
    let name = scenario.name;
    let settings = settings();
    let truth =
        DynamicsConfig::new(scenario.spacecraft(&cosm), &settings, cosm.clone()).unwrap();
    let msrs = bursts(&truth, &scenario, None);
    assert_eq!(msrs[msrs.len() - 1].epoch, scenario.od_epoch);

    let truth_at_od = truth
        .propagator()
        .with(truth.reference())
        .until_epoch(scenario.od_epoch)
        .unwrap();

    let solution =
        process_measurements(guess_of(truth.reference()), msrs.clone(), &settings, cosm.clone())
            .unwrap();
    println!("{solution}");

    assert!(solution.converged);
    assert_eq!(solution.epoch(), scenario.od_epoch);
    assert_eq!(solution.frame(), cosm.earth_gcrf());
    let (dr_km, dv_km_s) = solution.state.rss(&truth_at_od);
    assert!(dr_km < 1e-3, "{name}: position error of {dr_km} km");
    assert!(dv_km_s < 1e-6, "{name}: velocity error of {dv_km_s} km/s");
    assert!(solution.rms < 1e-3, "{name}: RMS of {}", solution.rms);
    assert_valid_covariance(&solution.covariance);

    let reference = covariance_at(solution.state, &msrs, &settings, cosm.clone());
    assert_covariance_close(&solution.covariance, &reference, 1e-6);

    // The order of the measurements does not matter
    let mut reversed = msrs;
    reversed.reverse();
    let other = process_measurements(guess_of(truth.reference()), reversed, &settings, cosm).unwrap();
    assert_eq!(other.epoch(), scenario.od_epoch);
    let (dr_km, dv_km_s) = other.state.rss(&solution.state);
    assert!(dr_km < 1e-6 && dv_km_s < 1e-9);
}

#[rstest]
#[case::af3(Scenario::af3())]
#[case::cp1(Scenario::cp1())]
#[case::sa2(Scenario::sa2())]
fn noisy_recovery(cosm: Arc<Cosm>, #[case] scenario: Scenario) {
    let _ = pretty_env_logger::try_init();
    let name = scenario.name;
    let settings = settings();
    let truth =
        DynamicsConfig::new(scenario.spacecraft(&cosm), &settings, cosm.clone()).unwrap();
    let mut rng = Pcg64Mcg::seed_from_u64(123_456);
    let msrs = bursts(&truth, &scenario, Some(&mut rng));

    let truth_at_od = truth
        .propagator()
        .with(truth.reference())
        .until_epoch(scenario.od_epoch)
        .unwrap();

    let solution =
        process_measurements(guess_of(truth.reference()), msrs.clone(), &settings, cosm.clone())
            .unwrap();
    println!("{solution}\n{solution:e}");

    assert!(solution.converged, "{name}");
    assert!(solution.iterations <= 20);
    assert_eq!(solution.epoch(), scenario.od_epoch);
    assert_valid_covariance(&solution.covariance);

    let reference = covariance_at(solution.state, &msrs, &settings, cosm.clone());
    assert_covariance_close(&solution.covariance, &reference, 1e-6);

    // The residuals are consistent with the noise level
    assert!(solution.rms < 3.0, "{name}: RMS of {}", solution.rms);

    let errors = solution.cartesian() - truth_at_od.orbit.to_cartesian_vec();
    let sigmas = solution.sigmas();
    for i in 0..6 {
        assert!(
            errors[i].abs() < 5.0 * sigmas[i],
            "{name} component {i}: error {:e} vs sigma {:e}",
            errors[i],
            sigmas[i]
        );
    }
    assert!(solution.sigma_position_km() > 0.0);
    assert!(solution.sigma_velocity_km_s() > 0.0);
    assert!(solution.keplerian().unwrap()[1] < 0.05);

    // Same seed, same observations
    let mut rng = Pcg64Mcg::seed_from_u64(123_456);
    let replayed = bursts(&truth, &scenario, Some(&mut rng));
    assert_eq!(replayed, msrs);
}

#[rstest]
fn single_measurement_is_underdetermined(cosm: Arc<Cosm>) {
    let settings = settings();
    let scenario = Scenario::af3();
    let truth = DynamicsConfig::new(scenario.spacecraft(&cosm), &settings, cosm.clone()).unwrap();
    let msrs = bursts(&truth, &scenario, None);

    let err = process_measurements(truth.reference(), msrs[..1].to_vec(), &settings, cosm).unwrap_err();
    assert!(
        matches!(
            err,
            ODError::EstimationFailure {
                source: BLSError::Underdetermined { rows: 2, cols: 6 }
            }
        ),
        "{err}"
    );
}

#[rstest]
fn iteration_limit_is_not_an_error(cosm: Arc<Cosm>) {
    let mut settings = settings();
    settings.estimator.max_iterations = 1;
    let scenario = Scenario::af3();
    let truth = DynamicsConfig::new(scenario.spacecraft(&cosm), &settings, cosm.clone()).unwrap();
    let msrs = bursts(&truth, &scenario, None);

    let solution = process_measurements(guess_of(truth.reference()), msrs, &settings, cosm).unwrap();
    assert!(!solution.converged);
    assert_eq!(solution.iterations, 1);
    // The initial guess is returned as is, at the OD epoch
    assert!(solution.rms > 0.0);
}

#[rstest]
fn sub_second_measurement_epochs(cosm: Arc<Cosm>) {
    let settings = settings();
    let scenario = Scenario::cp1();
    let truth = DynamicsConfig::new(scenario.spacecraft(&cosm), &settings, cosm.clone()).unwrap();
    let sigma = scenario.sigma_rad();
    let sim = RaDecGenerator::builder()
        .station(Arc::new(scenario.station.clone()))
        .sigma(Vector2::new(sigma, sigma))
        .target_id(scenario.target_id)
        .cosm(cosm.clone())
        .build();

    // Observations a few nanoseconds off the whole second
    let mut msrs = Vec::new();
    for (k, offset) in [(0_i64, 60_i64), (1, 21_660), (2, 43_260)] {
        let start = scenario.epoch + offset * Unit::Second + (k + 1) * Unit::Nanosecond;
        msrs.extend(
            sim.generate(
                truth.propagator(),
                truth.reference(),
                start,
                start + Unit::Minute,
                (10 * Unit::Second) + 7 * Unit::Nanosecond,
                None,
            )
            .unwrap(),
        );
    }
    let last = msrs.iter().map(|msr| msr.epoch).max().unwrap();

    let solution = process_measurements(guess_of(truth.reference()), msrs, &settings, cosm).unwrap();
    assert!(solution.converged);
    assert_eq!(solution.epoch(), last);
    let truth_at_od = truth.propagator().with(truth.reference()).until_epoch(last).unwrap();
    let (dr_km, _) = solution.state.rss(&truth_at_od);
    assert!(dr_km < 1e-3, "position error of {dr_km} km");
}
