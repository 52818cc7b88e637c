extern crate radec_od as od;

use super::generation::bursts;
use super::{assert_valid_covariance, Scenario};
use od::io::oif::load_oif;
use od::linalg::{Vector2, Vector3};
use od::od::prelude::*;
use od::time::TimeScale;
use std::fmt::Write;
use std::fs;

/// Writes the observations as an OIF file, relative to a whole TT day, with the sensor position of each record in GCRF.
fn write_oif(msrs: &[AngularRaDec], sensor: &str, cosm: &Cosm) -> String {
    let mjd_tt = msrs[0].epoch.to_mjd_tt_days().floor();
    let base = Epoch::from_mjd_in_time_scale(mjd_tt, TimeScale::TT);

    let mut oif = String::new();
    writeln!(oif, "CLASSIFICATION: UNCLASSIFIED").unwrap();
    writeln!(
        oif,
        "Observation Debug Output (RA,Dec, in GCRF; SenPos in GCRF) from {sensor} Chip 0 Filter \"None\" with base MJD = {mjd_tt} 0.0"
    )
    .unwrap();
    writeln!(oif, "TargetID\t\tTime(Seconds)\tRA(Degrees)\tDec(Degrees)\tSensorPosX\tSensorPosY\tSensorPosZ\tSensorVelX\tSensorVelY\tSensorVelZ\tVizMag\tEstRange").unwrap();
    for msr in msrs {
        let r = msr.station.position_gcrf_km(msr.epoch, cosm).unwrap();
        let v = Vector3::new(0.0, 0.0, cosm.earth_angular_velocity_rad_s).cross(&r);
        writeln!(
            oif,
            " {}\t\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t13.000000\t0.000000",
            msr.target_id,
            (msr.epoch - base).to_seconds(),
            msr.ra_deg(),
            msr.dec_deg(),
            r[0],
            r[1],
            r[2],
            v[0],
            v[1],
            v[2]
        )
        .unwrap();
    }
    writeln!(oif, "NaN\t\tNaN\tNaN\tNaN\tNaN\tNaN\tNaN\tNaN\tNaN\tNaN\tNaN\tNaN").unwrap();
    oif
}

#[test]
fn oif_file_to_orbit() {
    let _ = pretty_env_logger::try_init();
    let cosm = Cosm::iers2010();
    let settings = ODSettings::builder()
        .integrator(IntegratorConfig::builder().fixed_step_s(60.0).build())
        .force_models(
            ForceModelsConfig::builder()
                .gravity_degree(8)
                .gravity_order(8)
                .build(),
        )
        .build();

    for scenario in [Scenario::af3(), Scenario::cp1()] {
        let name = scenario.name;
        let truth = DynamicsConfig::new(scenario.spacecraft(&cosm), &settings, cosm.clone()).unwrap();
        let generated = bursts(&truth, &scenario, None);

        let path = std::env::temp_dir().join(format!("radec_od_{name}_{}.oif", std::process::id()));
        fs::write(&path, write_oif(&generated, "Sensor 7", &cosm)).unwrap();
        let sigma = scenario.sigma_rad();
        let msrs = load_oif(&path, Vector2::new(sigma, sigma), &cosm).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(msrs.len(), generated.len(), "{name}");
        for (loaded, msr) in msrs.iter().zip(&generated) {
            assert_eq!(loaded.target_id, scenario.target_id);
            assert_eq!(loaded.station.name, "Sensor 7");
            assert!((loaded.epoch - msr.epoch).abs() <= 1 * Unit::Nanosecond);
            assert!((loaded.observed - msr.observed).norm() < 1e-12);
            let (r_loaded, r_station) = (
                loaded.station.position_gcrf_km(loaded.epoch, &cosm).unwrap(),
                msr.station.position_gcrf_km(msr.epoch, &cosm).unwrap(),
            );
            assert!((r_loaded - r_station).norm() < 1e-6, "{name}: sensor moved by {r_loaded} km");
        }

        let mut guess = truth.reference();
        guess.orbit.radius_km[1] -= 2.0;
        guess.orbit.velocity_km_s[0] += 1e-4;
        let solution = process_measurements(guess, msrs.clone(), &settings, cosm.clone()).unwrap();
        println!("{solution}");

        let od_epoch = msrs[msrs.len() - 1].epoch;
        assert!(solution.converged, "{name}");
        assert_eq!(solution.epoch(), od_epoch);
        assert_valid_covariance(&solution.covariance);

        let truth_at_od = truth
            .propagator()
            .with(truth.reference())
            .until_epoch(od_epoch)
            .unwrap();
        let (dr_km, dv_km_s) = solution.state.rss(&truth_at_od);
        assert!(dr_km < 1e-2, "{name}: position error of {dr_km} km");
        assert!(dv_km_s < 1e-5, "{name}: velocity error of {dv_km_s} km/s");
    }
}
