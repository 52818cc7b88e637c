/*
    Nyx, blazing fast astrodynamics
    Copyright (C) 2018-onwards Christopher Rabotin <christopher.rabotin@gmail.com>

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use crate::cosmic::Spacecraft;
use crate::linalg::{DMatrix, DVector, Vector2};
use crate::od::drivers::{
    ParameterDrivers, ParameterDriversList, CR_DRIVER, MU_DRIVER, ORBITAL_DRIVERS,
};
use crate::od::msr::{AngularRaDec, EstimatedMeasurement};
use crate::od::observer::EvaluationEvent;
use crate::od::process::conf::EstimatorConfig;
use crate::od::process::DynamicsConfig;
use crate::propagators::PropagationError;
use crate::utils::{between_pm_pi, symmetrize};
use crate::State;
use snafu::prelude::*;
use std::sync::mpsc::Sender;
use std::time::Instant;
use typed_builder::TypedBuilder;

mod solution;
pub use solution::BatchSolution;

/// Normalized step of the central finite differences of the propagator drivers
const FD_NORMALIZED_STEP: f64 = 0.1;

#[derive(Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum BLSError {
    #[snafu(display("propagation failed during evaluation {evaluation}: {source}"))]
    Propagation {
        evaluation: usize,
        source: PropagationError,
    },
    #[snafu(display(
        "singular system: |R[{index}, {index}]| = {value:e} is not above the threshold of {threshold:e}"
    ))]
    SingularMatrix {
        index: usize,
        value: f64,
        threshold: f64,
    },
    #[snafu(display("underdetermined system: {rows} residuals for {cols} parameters"))]
    Underdetermined { rows: usize, cols: usize },
    #[snafu(display("no parameter is selected for estimation"))]
    NoParameters,
    #[snafu(display("too few measurements ({count}) to estimate the state"))]
    TooFewMeasurements { count: usize },
}

/// The weighted residuals and their Jacobian with respect to the normalized drivers, at one trial point.
#[derive(Clone, Debug)]
struct Evaluation {
    residuals: DVector<f64>,
    jacobian: DMatrix<f64>,
    nb_processed: usize,
    rms: f64,
}

/// A Gauss-Newton batch least squares estimator of angles-only measurements, solved by QR decomposition.
///
/// Each evaluation propagates the trial state from the reference epoch of the dynamics to every measurement,
/// backward for those before the reference epoch and forward for the others. The orbital columns of the Jacobian
/// are mapped through the state transition matrix, the propagator columns are computed by central finite
/// differences and the bias columns are analytical.
#[derive(TypedBuilder)]
#[builder(doc)]
pub struct BatchEstimator {
    pub dynamics: DynamicsConfig,
    #[builder(default)]
    pub config: EstimatorConfig,
    /// Receives a copy of every evaluation
    #[builder(default, setter(strip_option))]
    pub observer: Option<Sender<EvaluationEvent>>,
}

impl BatchEstimator {
    /// Builds the drivers of this estimation, selected according to the configuration.
    pub fn drivers(&self, measurements: &[AngularRaDec]) -> ParameterDrivers {
        let orbital = self
            .dynamics
            .orbital_drivers(self.config.position_scale_m * 1e-3);

        let mut propagator = self.dynamics.propagator_drivers();
        propagator.select(CR_DRIVER, self.config.estimate_cr);
        propagator.select(MU_DRIVER, self.config.estimate_mu);

        let mut measurement =
            ParameterDriversList::measurements(measurements.iter().map(|msr| msr.station.as_ref()));
        for driver in &mut measurement.drivers {
            driver.selected = self.config.estimate_station_biases;
        }

        ParameterDrivers {
            orbital,
            propagator,
            measurement,
        }
    }

    /// Fits the drivers to the measurements until the largest change of a normalized driver between two evaluations
    /// is below the convergence threshold.
    ///
    /// Reaching the maximum number of iterations or of evaluations is not an error: the last evaluated point is
    /// returned with `converged` set to false.
    pub fn estimate(&self, measurements: &[AngularRaDec]) -> Result<BatchSolution, BLSError> {
        ensure!(
            !measurements.is_empty(),
            TooFewMeasurementsSnafu {
                count: measurements.len()
            }
        );

        let mut drivers = self.drivers(measurements);
        ensure!(drivers.nb_selected() > 0, NoParametersSnafu);

        info!(
            "Batch least squares of {} measurements for {} parameters at {}",
            measurements.len(),
            drivers.nb_selected(),
            self.dynamics.epoch()
        );
        info!("{}", self.config);
        let tick = Instant::now();

        let mut iterations = 0;
        let mut evaluations = 0;
        let mut previous: Option<DVector<f64>> = None;
        let mut converged = false;

        let last = loop {
            iterations += 1;
            evaluations += 1;

            let eval = self.evaluate(&drivers, measurements, evaluations)?;
            self.notify(iterations, evaluations, &drivers, &eval, measurements.len());

            let current = drivers.normalized();
            if let Some(previous) = &previous {
                let change = (&current - previous).amax();
                debug!("[{iterations}] largest normalized change: {change:e}");
                if change <= self.config.convergence_threshold {
                    converged = true;
                    break eval;
                }
            }

            if iterations >= self.config.max_iterations
                || evaluations >= self.config.max_evaluations
            {
                warn!(
                    "Batch least squares stopped after {iterations} iterations and {evaluations} evaluations without converging"
                );
                break eval;
            }

            let delta = self.solve(&eval)?;
            drivers.set_normalized(&(&current + delta));
            previous = Some(current);
        };

        let covariance = self.covariance(&last, &drivers)?;
        let estimate = self.dynamics.trial_state(&drivers);

        if converged {
            info!(
                "Converged after {iterations} iterations in {} (RMS = {:.6})",
                crate::time::Duration::from(tick.elapsed()),
                last.rms
            );
        }

        Ok(BatchSolution {
            estimate,
            covariance,
            drivers,
            iterations,
            evaluations,
            rms: last.rms,
            converged,
        })
    }

    /// Propagates the trial state of the drivers to the epoch of each measurement, in the order of the measurements.
    fn states_at(
        &self,
        drivers: &ParameterDrivers,
        measurements: &[AngularRaDec],
        with_stm: bool,
    ) -> Result<Vec<Spacecraft>, PropagationError> {
        let trial = self.dynamics.trial_state(drivers);
        let reference_epoch = trial.epoch();

        let (mut before, mut after): (Vec<usize>, Vec<usize>) =
            (0..measurements.len()).partition(|&i| measurements[i].epoch < reference_epoch);
        before.sort_by_key(|&i| std::cmp::Reverse(measurements[i].epoch));
        after.sort_by_key(|&i| measurements[i].epoch);

        let mut states = vec![trial; measurements.len()];
        for indexes in [before, after] {
            let mut instance = if with_stm {
                self.dynamics.build(drivers)
            } else {
                self.dynamics.propagator().with(trial)
            };
            for i in indexes {
                states[i] = instance.until_epoch(measurements[i].epoch)?;
            }
        }
        Ok(states)
    }

    fn estimated(
        &self,
        drivers: &ParameterDrivers,
        measurements: &[AngularRaDec],
        states: &[Spacecraft],
    ) -> Vec<EstimatedMeasurement> {
        measurements
            .iter()
            .zip(states)
            .map(|(msr, state)| {
                msr.estimate(
                    state,
                    self.dynamics.cosm(),
                    &drivers.station_bias(&msr.station),
                )
            })
            .collect()
    }

    /// Partials of the estimated angles of each measurement with respect to the named normalized propagator driver.
    fn propagator_partials(
        &self,
        drivers: &ParameterDrivers,
        name: &str,
        measurements: &[AngularRaDec],
        evaluation: usize,
    ) -> Result<Vec<Vector2<f64>>, BLSError> {
        let mut achieved = [0.0; 2];
        let mut computed = Vec::with_capacity(2);

        for (k, step) in [FD_NORMALIZED_STEP, -FD_NORMALIZED_STEP].iter().enumerate() {
            let mut perturbed = drivers.clone();
            if let Some(driver) = perturbed.propagator.find_mut(name) {
                driver.set_normalized_value(driver.normalized_value() + step);
                // Bounds may clamp the step
                achieved[k] = driver.normalized_value();
            }
            let states = self
                .states_at(&perturbed, measurements, false)
                .context(PropagationSnafu { evaluation })?;
            computed.push(self.estimated(&perturbed, measurements, &states));
        }

        let delta = achieved[0] - achieved[1];
        if delta == 0.0 {
            warn!("{name} is stuck at a bound: its partials are zero");
            return Ok(vec![Vector2::zeros(); measurements.len()]);
        }

        Ok(computed[0]
            .iter()
            .zip(&computed[1])
            .map(|(plus, minus)| {
                let mut diff = plus.estimated - minus.estimated;
                diff[0] = between_pm_pi(diff[0]);
                diff / delta
            })
            .collect())
    }

    /// Evaluates the weighted residuals and the Jacobian of all processed measurements at the trial point of the drivers.
    fn evaluate(
        &self,
        drivers: &ParameterDrivers,
        measurements: &[AngularRaDec],
        evaluation: usize,
    ) -> Result<Evaluation, BLSError> {
        let states = self
            .states_at(drivers, measurements, true)
            .context(PropagationSnafu { evaluation })?;
        let estimated = self.estimated(drivers, measurements, &states);

        // Columns are ordered as the selected drivers: orbital, propagator, measurement
        let orbital_cols: Vec<(usize, f64)> = ORBITAL_DRIVERS
            .iter()
            .enumerate()
            .filter_map(|(k, name)| {
                drivers
                    .orbital
                    .find(name)
                    .filter(|driver| driver.selected)
                    .map(|driver| (k, driver.scale))
            })
            .collect();

        let propagator_partials = drivers
            .propagator
            .selected()
            .map(|driver| self.propagator_partials(drivers, &driver.name, measurements, evaluation))
            .collect::<Result<Vec<_>, _>>()?;

        let first_bias_col = orbital_cols.len() + propagator_partials.len();
        let bias_drivers: Vec<(String, f64)> = drivers
            .measurement
            .selected()
            .map(|driver| (driver.name.clone(), driver.scale))
            .collect();

        let processed: Vec<usize> = (0..measurements.len())
            .filter(|&i| estimated[i].is_processed())
            .collect();
        let rows = 2 * processed.len();
        let cols = drivers.nb_selected();

        let mut residuals = DVector::zeros(rows);
        let mut jacobian = DMatrix::zeros(rows, cols);

        for (pair, &i) in processed.iter().enumerate() {
            let msr = &measurements[i];
            let est = &estimated[i];
            let stm = states[i].stm().map_err(|source| BLSError::Propagation {
                evaluation,
                source: PropagationError::Dynamics { source },
            })?;
            let h = est.h_tilde * stm;
            let residual = est.residual();
            let bias_names = [
                ParameterDriversList::ra_bias_name(&msr.station),
                ParameterDriversList::dec_bias_name(&msr.station),
            ];

            for axis in 0..2 {
                let row = 2 * pair + axis;
                let weight = msr.weight[axis] / msr.sigma[axis];
                residuals[row] = weight * residual[axis];

                for (col, (k, scale)) in orbital_cols.iter().enumerate() {
                    jacobian[(row, col)] = weight * h[(axis, *k)] * scale;
                }

                for (p, partials) in propagator_partials.iter().enumerate() {
                    jacobian[(row, orbital_cols.len() + p)] = weight * partials[i][axis];
                }

                for (b, (name, scale)) in bias_drivers.iter().enumerate() {
                    if *name == bias_names[axis] {
                        jacobian[(row, first_bias_col + b)] = weight * scale;
                    }
                }
            }
        }

        let rms = if rows > 0 {
            (residuals.norm_squared() / rows as f64).sqrt()
        } else {
            0.0
        };

        debug!(
            "evaluation {evaluation}: {} of {} measurements processed, RMS = {rms:.6}",
            processed.len(),
            measurements.len()
        );

        Ok(Evaluation {
            residuals,
            jacobian,
            nb_processed: processed.len(),
            rms,
        })
    }

    /// QR factors of the Jacobian, checking that the system is neither underdetermined nor singular
    fn qr_factors(&self, jacobian: &DMatrix<f64>) -> Result<(DMatrix<f64>, DMatrix<f64>), BLSError> {
        let (rows, cols) = jacobian.shape();
        ensure!(rows >= cols, UnderdeterminedSnafu { rows, cols });

        let qr = jacobian.clone().qr();
        let r = qr.r();
        let threshold = self.config.singularity_threshold;
        for index in 0..cols {
            let value = r[(index, index)].abs();
            ensure!(
                value > threshold,
                SingularMatrixSnafu {
                    index,
                    value,
                    threshold
                }
            );
        }

        Ok((qr.q(), r))
    }

    /// Solves J·δ = r in the least squares sense
    fn solve(&self, eval: &Evaluation) -> Result<DVector<f64>, BLSError> {
        let (q, r) = self.qr_factors(&eval.jacobian)?;
        let threshold = self.config.singularity_threshold;
        r.solve_upper_triangular(&(q.transpose() * &eval.residuals))
            .context(SingularMatrixSnafu {
                index: 0_usize,
                value: 0.0,
                threshold,
            })
    }

    /// Covariance of the drivers in physical units: diag(scale)·(RᵀR)⁻¹·diag(scale)
    fn covariance(&self, eval: &Evaluation, drivers: &ParameterDrivers) -> Result<DMatrix<f64>, BLSError> {
        let (_, r) = self.qr_factors(&eval.jacobian)?;
        let cols = r.ncols();
        let threshold = self.config.singularity_threshold;
        let r_inv = r
            .solve_upper_triangular(&DMatrix::identity(cols, cols))
            .context(SingularMatrixSnafu {
                index: 0_usize,
                value: 0.0,
                threshold,
            })?;
        let scales = DMatrix::from_diagonal(&drivers.scales());
        let normalized = &r_inv * r_inv.transpose();
        Ok(symmetrize(&(&scales * normalized * &scales)))
    }

    fn notify(
        &self,
        iteration: usize,
        evaluation: usize,
        drivers: &ParameterDrivers,
        eval: &Evaluation,
        nb_total: usize,
    ) {
        if let Some(tx) = &self.observer {
            let event = EvaluationEvent {
                iteration,
                evaluation,
                orbit: self.dynamics.trial_state(drivers).orbit,
                drivers: drivers.clone(),
                nb_processed: eval.nb_processed,
                nb_total,
                rms: eval.rms,
            };
            if tx.send(event).is_err() {
                warn!("convergence observer disconnected at evaluation {evaluation}");
            }
        }
    }
}

#[cfg(test)]
mod ut_blse {
    use super::*;
    use crate::cosmic::{Cosm, Orbit};
    use crate::od::process::conf::{ForceModelsConfig, IntegratorConfig, ODSettings};
    use crate::od::simulator::RaDecGenerator;
    use crate::od::GroundStation;
    use crate::time::{Epoch, Unit};
    use approx::assert_relative_eq;
    use std::sync::mpsc::channel;
    use std::sync::Arc;

    /// GEO truth, three bursts of one minute six hours apart, and a two body dynamics at the truth epoch
    fn setup() -> (Spacecraft, Vec<AngularRaDec>, DynamicsConfig) {
        let cosm = Cosm::iers2010();
        let epoch = Epoch::from_gregorian_utc_hms(2023, 3, 18, 0, 0, 0);
        let orbit = Orbit::cartesian(
            -40_623.488_414_623_40,
            -11_310.925_100_635_84,
            -107.422_487_901_602_3,
            0.824_302_009_930_277_4,
            -2.957_143_748_313_477,
            -0.169_257_415_458_910_4,
            epoch,
            cosm.earth_gcrf(),
        );
        let truth = Spacecraft::new(orbit, 500.0);
        let settings = ODSettings::builder()
            .integrator(IntegratorConfig::builder().fixed_step_s(60.0).build())
            .force_models(ForceModelsConfig::two_body())
            .build();
        let dynamics = DynamicsConfig::new(truth, &settings, cosm.clone()).unwrap();
        let truth = dynamics.reference();

        let sim = RaDecGenerator::builder()
            .station(Arc::new(GroundStation::diego_garcia()))
            .sigma(Vector2::new(0.005_f64.to_radians(), 0.005_f64.to_radians()))
            .target_id("AF3")
            .cosm(cosm)
            .build();

        let mut msrs = Vec::new();
        for burst in 0..3 {
            let start = epoch + (burst * 6) * Unit::Hour;
            msrs.extend(
                sim.generate(
                    dynamics.propagator(),
                    truth,
                    start,
                    start + Unit::Minute,
                    10 * Unit::Second,
                    None,
                )
                .unwrap(),
            );
        }
        assert_eq!(msrs.len(), 21);
        (truth, msrs, dynamics)
    }

    /// Same dynamics, with the reference state shifted by 1 km and 0.1 m/s
    fn perturbed(dynamics: &DynamicsConfig) -> DynamicsConfig {
        let mut guess = dynamics.reference();
        guess.orbit.radius_km[0] += 1.0;
        guess.orbit.radius_km[2] -= 0.5;
        guess.orbit.velocity_km_s[1] += 1e-4;
        DynamicsConfig::from_propagator(guess, dynamics.propagator().clone(), Cosm::iers2010())
    }

    #[test]
    fn noise_free_convergence() {
        let _ = pretty_env_logger::try_init();
        let (truth, msrs, dynamics) = setup();

        let (tx, rx) = channel();
        let estimator = BatchEstimator::builder()
            .dynamics(perturbed(&dynamics))
            .observer(tx)
            .build();
        let solution = estimator.estimate(&msrs).unwrap();
        drop(estimator);

        println!("{solution}");
        assert!(solution.converged);
        assert!(solution.iterations <= 10);
        assert_eq!(solution.iterations, solution.evaluations);
        assert!(solution.rms < 1e-3, "rms = {}", solution.rms);

        let (dr_km, dv_km_s) = solution.estimate.rss(&truth);
        assert!(dr_km < 1e-3, "position error {dr_km} km");
        assert!(dv_km_s < 1e-7, "velocity error {dv_km_s} km/s");
        assert_eq!(solution.estimate.orbit.epoch, truth.orbit.epoch);

        // One event per evaluation
        let events: Vec<EvaluationEvent> = rx.iter().collect();
        assert_eq!(events.len(), solution.evaluations);
        assert!(events.iter().all(|e| e.nb_processed == 21 && e.nb_total == 21));
        assert!(events[0].rms > events[events.len() - 1].rms);

        // Covariance is symmetric with a positive diagonal
        let covar = solution.orbital_covariance();
        assert_eq!(covar, covar.transpose());
        for i in 0..6 {
            assert!(covar[(i, i)] > 0.0);
        }
        let mut correlation = solution.covariance.clone();
        for i in 0..6 {
            for j in 0..6 {
                correlation[(i, j)] /= (covar[(i, i)] * covar[(j, j)]).sqrt();
            }
        }
        assert!(correlation.symmetric_eigenvalues().min() > -1e-9);
    }

    #[test]
    fn jacobian_columns() {
        let (_, msrs, dynamics) = setup();
        let estimator = BatchEstimator::builder()
            .dynamics(perturbed(&dynamics))
            .config(
                EstimatorConfig::builder()
                    .estimate_station_biases(true)
                    .build(),
            )
            .build();

        let drivers = estimator.drivers(&msrs);
        assert_eq!(drivers.nb_selected(), 8);
        let eval = estimator.evaluate(&drivers, &msrs, 1).unwrap();
        assert_eq!(eval.jacobian.shape(), (42, 8));
        assert_eq!(eval.nb_processed, 21);

        // Bias columns are the weighted scale on their own axis only
        let sigma = msrs[0].sigma;
        for pair in 0..21 {
            assert_relative_eq!(eval.jacobian[(2 * pair, 6)], 1e-6 / sigma[0], max_relative = 1e-12);
            assert_eq!(eval.jacobian[(2 * pair, 7)], 0.0);
            assert_eq!(eval.jacobian[(2 * pair + 1, 6)], 0.0);
            assert_relative_eq!(eval.jacobian[(2 * pair + 1, 7)], 1e-6 / sigma[1], max_relative = 1e-12);
        }

        // Orbital columns match the change of the residuals for a one meter step in x
        let mut stepped = drivers.clone();
        let mut normalized = drivers.normalized();
        normalized[0] += 1.0;
        stepped.set_normalized(&normalized);
        let stepped_eval = estimator.evaluate(&stepped, &msrs, 2).unwrap();
        for row in 0..42 {
            let fd = eval.residuals[row] - stepped_eval.residuals[row];
            let analytical = eval.jacobian[(row, 0)];
            assert!(
                (fd - analytical).abs() <= 1e-3 * analytical.abs().max(1e-6),
                "row {row}: {fd:e} != {analytical:e}"
            );
        }
    }

    #[test]
    fn singular_and_underdetermined() {
        let (_, msrs, dynamics) = setup();

        // The coefficient of reflectivity has no effect on a two body orbit
        let estimator = BatchEstimator::builder()
            .dynamics(dynamics.clone())
            .config(EstimatorConfig::builder().estimate_cr(true).build())
            .build();
        assert!(matches!(
            estimator.estimate(&msrs),
            Err(BLSError::SingularMatrix { index: 6, .. })
        ));

        let estimator = BatchEstimator::builder().dynamics(dynamics).build();
        assert!(matches!(
            estimator.estimate(&msrs[..2]),
            Err(BLSError::Underdetermined { rows: 4, cols: 6 })
        ));
        assert!(matches!(
            estimator.estimate(&[]),
            Err(BLSError::TooFewMeasurements { count: 0 })
        ));
    }

    #[test]
    fn evaluation_cap_is_not_an_error() {
        let (_, msrs, dynamics) = setup();
        let estimator = BatchEstimator::builder()
            .dynamics(perturbed(&dynamics))
            .config(EstimatorConfig::builder().max_evaluations(2).build())
            .build();
        let solution = estimator.estimate(&msrs).unwrap();
        assert!(!solution.converged);
        assert_eq!(solution.evaluations, 2);
        assert_eq!(solution.iterations, 2);
    }
}
