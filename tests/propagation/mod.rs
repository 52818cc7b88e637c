extern crate radec_od as od;

use od::cosmic::{Cosm, Orbit};
use od::dynamics::{OrbitalDynamics, SpacecraftDynamics};
use od::linalg::Vector6;
use od::od::prelude::ForceModelsConfig;
use od::propagators::{PropOpts, Propagator, RSSCartesianStep};
use od::time::{Epoch, Unit};
use od::{Spacecraft, State};
use rstest::*;
use std::sync::Arc;

#[fixture]
fn cosm() -> Arc<Cosm> {
    Cosm::iers2010()
}

fn leo(cosm: &Cosm) -> Orbit {
    let epoch = Epoch::from_gregorian_utc_hms(2023, 3, 18, 0, 0, 0);
    Orbit::try_keplerian(7_000.0, 0.01, 51.6, 40.0, 20.0, 10.0, epoch, cosm.earth_gcrf()).unwrap()
}

#[rstest]
fn two_body_period_closure(cosm: Arc<Cosm>) {
    let _ = pretty_env_logger::try_init();
    let start = Spacecraft::new(leo(&cosm), 500.0);
    let prop = Propagator::default(SpacecraftDynamics::new(OrbitalDynamics::two_body()));

    let end = prop.with(start).for_duration(start.orbit.period()).unwrap();
    let (dr_km, dv_km_s) = end.rss(&start);
    assert!(dr_km < 1e-4, "position closure {dr_km} km");
    assert!(dv_km_s < 1e-7, "velocity closure {dv_km_s} km/s");
    assert_eq!(end.orbit.epoch, start.orbit.epoch + start.orbit.period());
}

#[rstest]
fn forward_then_backward(cosm: Arc<Cosm>) {
    let start = Spacecraft::new(leo(&cosm), 500.0);
    let dynamics = ForceModelsConfig::default().dynamics(cosm.clone()).unwrap();
    let prop = Propagator::default(dynamics);

    let mut instance = prop.with(start);
    instance.for_duration(6 * Unit::Hour).unwrap();
    let back = instance.until_epoch(start.orbit.epoch).unwrap();

    let (dr_km, _) = back.rss(&start);
    assert!(dr_km < 1e-3, "round trip error {dr_km} km");
    assert_eq!(back.orbit.epoch, start.orbit.epoch);
}

/// Targets which are not a whole number of steps away are reached exactly, to the nanosecond.
#[rstest]
fn nanosecond_targets(cosm: Arc<Cosm>) {
    let start = Spacecraft::new(leo(&cosm), 500.0);
    let dynamics = SpacecraftDynamics::new(OrbitalDynamics::two_body());
    let adaptive = Propagator::default(dynamics.clone());
    let fixed = Propagator::dp45(dynamics, PropOpts::<RSSCartesianStep>::with_fixed_step_s(60.0));

    let target = Epoch::from_gregorian_utc(2023, 3, 18, 6, 19, 26, 14_074_098);
    for offset_ns in [-999_999_999_i64, -7, -1, 0, 1, 3, 999_999_999] {
        let epoch = target + offset_ns * Unit::Nanosecond;
        assert_eq!(adaptive.with(start).until_epoch(epoch).unwrap().orbit.epoch, epoch);

        let mut instance = fixed.with(start);
        assert_eq!(instance.until_epoch(epoch).unwrap().orbit.epoch, epoch);
        let back = instance.until_epoch(start.orbit.epoch).unwrap();
        assert_eq!(back.orbit.epoch, start.orbit.epoch);
    }
}

/// The state transition matrix of the full force models matches central finite differences.
#[rstest]
fn stm_matches_finite_differences(cosm: Arc<Cosm>) {
    let _ = pretty_env_logger::try_init();
    let start = Spacecraft::new(leo(&cosm), 500.0);
    let dynamics = ForceModelsConfig::builder()
        .srp(None)
        .build()
        .dynamics(cosm.clone())
        .unwrap();
    let prop = Propagator::dp45(dynamics, PropOpts::<RSSCartesianStep>::with_fixed_step_s(30.0));
    let duration = 1 * Unit::Hour;

    let end = prop.with(start.with_stm()).for_duration(duration).unwrap();
    let stm = end.stm().unwrap();

    let propagate = |state: &Vector6<f64>| -> Vector6<f64> {
        let sc = start.with_orbit(Orbit::cartesian_vec(state, start.orbit.epoch, start.orbit.frame));
        prop.with(sc)
            .for_duration(duration)
            .unwrap()
            .orbit
            .to_cartesian_vec()
    };

    let nominal = start.orbit.to_cartesian_vec();
    for j in 0..6 {
        let step = if j < 3 { 1e-3 } else { 1e-6 };
        let mut plus = nominal;
        let mut minus = nominal;
        plus[j] += step;
        minus[j] -= step;
        let fd = (propagate(&plus) - propagate(&minus)) / (2.0 * step);
        let column = stm.column(j).into_owned();
        assert!(
            (fd - column).norm() < 1e-4 * column.norm(),
            "column {j}: {fd} != {column}"
        );
    }
}
