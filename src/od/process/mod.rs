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

use crate::cosmic::{Cosm, Spacecraft};
use crate::od::blse::BatchEstimator;
use crate::od::msr::AngularRaDec;
use crate::od::observer::ConvergenceObserver;
use crate::od::{EstimationFailureSnafu, InvalidInputSnafu, ODConfigSnafu, ODError};
use snafu::{ensure, ResultExt};
use std::sync::mpsc::channel;
use std::sync::Arc;
use std::thread;

/// Settings of the integrator, of the force models and of the estimator.
pub mod conf;
pub use conf::{EstimatorConfig, ForceModelsConfig, IntegratorConfig, ODSettings};

mod dynamics;
pub use dynamics::DynamicsConfig;

mod solution;
pub use solution::{CovarianceRepresentation, StateAndCovariance};

/// Determines the orbit of a spacecraft from its right ascension and declination measurements.
///
/// The measurements may be provided in any order: they are sorted chronologically and the state is estimated at the
/// epoch of the last one (the OD epoch). The initial state is propagated to the OD epoch first if needed. Each call
/// builds its own dynamics and estimator, and reports every evaluation of the estimator to a convergence observer.
///
/// Returns the estimated state and its Cartesian covariance at the OD epoch, even if the estimator reached its
/// iteration or evaluation limit before converging.
pub fn process_measurements(
    initial_state: Spacecraft,
    mut measurements: Vec<AngularRaDec>,
    settings: &ODSettings,
    cosm: Arc<Cosm>,
) -> Result<StateAndCovariance, ODError> {
    settings.validate().context(ODConfigSnafu)?;
    ensure!(
        !measurements.is_empty(),
        InvalidInputSnafu {
            msg: "no measurements to process"
        }
    );
    ensure!(
        initial_state
            .orbit
            .to_cartesian_vec()
            .iter()
            .all(|x| x.is_finite()),
        InvalidInputSnafu {
            msg: format!("initial state is not finite: {}", initial_state.orbit)
        }
    );
    if let Some(msr) = measurements.iter().find(|msr| {
        !msr.observed.iter().all(|x| x.is_finite())
            || !msr.sigma.iter().all(|s| s.is_finite() && *s > 0.0)
    }) {
        return InvalidInputSnafu {
            msg: format!("measurement {msr} has a non finite value or a non positive sigma"),
        }
        .fail();
    }

    measurements.sort_by_key(|msr| msr.epoch);
    let od_epoch = measurements[measurements.len() - 1].epoch;

    let mut dynamics = DynamicsConfig::new(initial_state, settings, cosm)?;
    dynamics.shift_epoch(od_epoch)?;
    info!(
        "Orbit determination of {} measurements at {od_epoch}",
        measurements.len()
    );

    let initial_orbit = dynamics.reference().orbit;
    let solution = thread::scope(|scope| {
        let (tx, rx) = channel();
        let observer = scope.spawn(move || ConvergenceObserver::new(initial_orbit).listen(rx));

        let estimator = BatchEstimator::builder()
            .dynamics(dynamics)
            .config(settings.estimator)
            .observer(tx)
            .build();
        let solution = estimator.estimate(&measurements);

        drop(estimator);
        if observer.join().is_err() {
            warn!("convergence observer panicked");
        }
        solution
    })
    .context(EstimationFailureSnafu)?;

    let result = StateAndCovariance {
        state: solution.estimate,
        covariance: solution.orbital_covariance(),
        representation: CovarianceRepresentation::Cartesian,
        converged: solution.converged,
        iterations: solution.iterations,
        rms: solution.rms,
    };
    info!("{result}");
    Ok(result)
}
