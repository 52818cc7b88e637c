extern crate radec_od as od;

use od::cosmic::{Cosm, Orbit};
use od::io::ConfigRepr;
use od::linalg::Matrix6;
use od::od::prelude::*;

mod generation;
mod oif;
mod scenarios;

/// A GEO target tracked by one ground station
#[derive(Clone, Debug)]
pub(crate) struct Scenario {
    pub name: &'static str,
    pub target_id: &'static str,
    pub station: GroundStation,
    pub epoch: Epoch,
    /// GCRF position (km) and velocity (km/s) at the epoch
    pub rv: [f64; 6],
    pub sigma_deg: f64,
    /// Epoch of the last measurement of the third burst
    pub od_epoch: Epoch,
}

impl Scenario {
    pub fn af3() -> Self {
        Self {
            name: "AF3",
            target_id: "50008",
            station: GroundStation::diego_garcia(),
            epoch: Epoch::from_gregorian_utc_hms(2023, 3, 18, 0, 0, 0),
            rv: [
                -4.062348841462340e+04,
                -1.131092510063584e+04,
                -1.074224879016023e+02,
                8.243020099302774e-01,
                -2.957143748313477e+00,
                -1.692574154589104e-01,
            ],
            sigma_deg: 0.005,
            od_epoch: Epoch::from_gregorian_utc_hms(2023, 3, 18, 12, 4, 0),
        }
    }

    pub fn cp1() -> Self {
        Self {
            name: "CP1",
            target_id: "50013",
            station: GroundStation::maui(),
            epoch: Epoch::from_gregorian_utc(2023, 3, 18, 0, 14, 26, 889_000_000),
            rv: [
                4.189974449058950e+04,
                -4.713177927901786e+03,
                3.562232987686665e+02,
                3.433104066667355e-01,
                3.055016180848359e+00,
                5.550461291772908e-02,
            ],
            sigma_deg: 0.01,
            od_epoch: Epoch::from_gregorian_utc_hms(2023, 3, 18, 12, 18, 20),
        }
    }

    pub fn sa2() -> Self {
        Self {
            name: "SA2",
            target_id: "50036",
            station: GroundStation::eglin(),
            epoch: Epoch::from_gregorian_utc(2023, 3, 18, 0, 12, 14, 305_000_000),
            rv: [
                -1.824071309541569e+04,
                3.801466820067245e+04,
                3.508492406457166e+02,
                -2.771468115015459e+00,
                -1.330284523529563e+00,
                5.610314702236215e-02,
            ],
            sigma_deg: 0.01,
            od_epoch: Epoch::from_gregorian_utc_hms(2023, 3, 18, 12, 16, 10),
        }
    }

    pub fn orbit(&self, cosm: &Cosm) -> Orbit {
        let [x, y, z, vx, vy, vz] = self.rv;
        Orbit::cartesian(x, y, z, vx, vy, vz, self.epoch, cosm.earth_gcrf())
    }

    pub fn spacecraft(&self, cosm: &Cosm) -> Spacecraft {
        Spacecraft::new(self.orbit(cosm), 500.0)
    }

    /// Measurement sigma, in radians
    pub fn sigma_rad(&self) -> f64 {
        self.sigma_deg.to_radians()
    }
}

/// Checks that the covariance is symmetric with a positive diagonal and a positive semi definite correlation matrix
pub(crate) fn assert_valid_covariance(covar: &Matrix6<f64>) {
    assert_eq!(*covar, covar.transpose());
    let mut correlation = *covar;
    for i in 0..6 {
        assert!(covar[(i, i)] > 0.0, "non positive variance {i}: {covar:e}");
        for j in 0..6 {
            correlation[(i, j)] /= (covar[(i, i)] * covar[(j, j)]).sqrt();
        }
    }
    let min_eigenvalue = correlation.symmetric_eigenvalues().min();
    assert!(min_eigenvalue > -1e-9, "covariance is not PSD: {min_eigenvalue:e}");
}

/// Checks each element of the covariance against the reference, relative to the standard deviations of its row and column
pub(crate) fn assert_covariance_close(covar: &Matrix6<f64>, reference: &Matrix6<f64>, tol: f64) {
    for i in 0..6 {
        for j in 0..6 {
            let scale = (reference[(i, i)] * reference[(j, j)]).sqrt();
            let diff = (covar[(i, j)] - reference[(i, j)]).abs();
            assert!(
                diff <= tol * scale,
                "covariance ({i}, {j}): {:e} vs {:e}",
                covar[(i, j)],
                reference[(i, j)]
            );
        }
    }
}

#[test]
fn empty_measurements() {
    let cosm = Cosm::iers2010();
    let sc = Scenario::af3().spacecraft(&cosm);

    for settings in [ODSettings::default(), ODSettings::builder().build()] {
        let err = process_measurements(sc, Vec::new(), &settings, cosm.clone()).unwrap_err();
        assert!(matches!(err, ODError::InvalidInput { .. }), "{err}");
    }
}

#[test]
fn settings_from_yaml() {
    let settings = ODSettings::loads(
        r#"
integrator:
  fixed_step_s: 60.0
force_models:
  gravity_degree: 0
  gravity_order: 0
  sun: false
  moon: false
  srp: null
"#,
    )
    .unwrap();
    assert_eq!(settings.force_models, ForceModelsConfig::two_body());
    assert_eq!(settings.estimator, EstimatorConfig::default());
    assert_eq!(settings.integrator.prop_opts().max_step, 60 * Unit::Second);
}
