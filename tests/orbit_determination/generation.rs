extern crate radec_od as od;

use super::Scenario;
use od::linalg::Vector2;
use od::od::prelude::*;
use od::time::TimeScale;
use rand_pcg::Pcg64Mcg;
use std::sync::Arc;

/// Three one minute bursts of observations on the UTC ten second grid. The first burst starts one minute after the
/// reference epoch and each next burst starts six hours after the end of the previous one.
pub(crate) fn bursts(
    dynamics: &DynamicsConfig,
    scenario: &Scenario,
    mut rng: Option<&mut Pcg64Mcg>,
) -> Vec<AngularRaDec> {
    let sigma = scenario.sigma_rad();
    let sim = RaDecGenerator::builder()
        .station(Arc::new(scenario.station.clone()))
        .sigma(Vector2::new(sigma, sigma))
        .target_id(scenario.target_id)
        .cosm(dynamics.cosm().clone())
        .build();

    let step = 10 * Unit::Second;
    let mut msrs = Vec::with_capacity(21);
    let mut start = (dynamics.epoch() + Unit::Minute).to_time_scale(TimeScale::UTC);
    for _ in 0..3 {
        let stop = start + Unit::Minute;
        let mut first = start.floor(step);
        if first < start {
            first += step;
        }
        msrs.extend(
            sim.generate(
                dynamics.propagator(),
                dynamics.reference(),
                first,
                stop,
                step,
                rng.as_deref_mut(),
            )
            .unwrap(),
        );
        start = stop + 6 * Unit::Hour;
    }
    msrs
}

#[test]
fn burst_schedule() {
    let cosm = Cosm::iers2010();
    let settings = ODSettings::builder()
        .force_models(ForceModelsConfig::two_body())
        .build();

    for (scenario, per_burst) in [(Scenario::af3(), 7), (Scenario::cp1(), 6), (Scenario::sa2(), 6)] {
        let truth = DynamicsConfig::new(scenario.spacecraft(&cosm), &settings, cosm.clone()).unwrap();
        let msrs = bursts(&truth, &scenario, None);
        assert_eq!(msrs.len(), 3 * per_burst, "{}", scenario.name);
        assert_eq!(msrs[msrs.len() - 1].epoch, scenario.od_epoch, "{}", scenario.name);
        assert!(msrs[0].epoch >= scenario.epoch + Unit::Minute);
        assert!(msrs[0].epoch < scenario.epoch + 70 * Unit::Second);
        assert!(msrs.iter().all(|msr| msr.target_id == scenario.target_id));
    }
}
