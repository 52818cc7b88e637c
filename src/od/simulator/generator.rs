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

use super::Cosm;
use crate::dynamics::SpacecraftDynamics;
use crate::linalg::Vector2;
use crate::od::msr::{AngularRaDec, MeasurementError};
use crate::od::noise::RaDecNoise;
use crate::od::{
    AstroFailureSnafu, GroundStation, InvalidInputSnafu, ODError, PropagationFailureSnafu,
};
use crate::propagators::{ErrorCtrl, Propagator};
use crate::time::{Duration, Epoch, TimeSeries};
use crate::Spacecraft;
use rand_pcg::Pcg64Mcg;
use snafu::{ensure, ResultExt};
use std::sync::Arc;
use std::time::Instant;
use typed_builder::TypedBuilder;

/// Generates right ascension and declination observations of a propagated spacecraft, as seen from one ground station.
#[derive(Clone, Debug, TypedBuilder)]
#[builder(doc)]
pub struct RaDecGenerator {
    pub station: Arc<GroundStation>,
    /// One sigma of the right ascension and declination, in radians
    pub sigma: Vector2<f64>,
    #[builder(default = Vector2::new(1.0, 1.0))]
    pub weight: Vector2<f64>,
    #[builder(default = String::from("UNKNOWN"), setter(into))]
    pub target_id: String,
    pub cosm: Arc<Cosm>,
}

impl RaDecGenerator {
    /// Generates one observation every `step` between `start` and `end` (both included), propagating `initial_state`.
    ///
    /// When a noise source is provided, a zero mean Gaussian noise of covariance diag(σ_ra², σ_dec²) is added to each
    /// observation, the right ascension noise being drawn first. The source is advanced by every draw, so several calls
    /// sharing one source produce different noise sequences. Without a source, the observations are exact.
    ///
    /// Observations below the elevation mask of the station, if any, are not generated.
    pub fn generate<E: ErrorCtrl>(
        &self,
        prop: &Propagator<SpacecraftDynamics, E>,
        initial_state: Spacecraft,
        start: Epoch,
        end: Epoch,
        step: Duration,
        mut rng: Option<&mut Pcg64Mcg>,
    ) -> Result<Vec<AngularRaDec>, ODError> {
        ensure!(
            step > Duration::ZERO,
            InvalidInputSnafu {
                msg: format!("measurement step must be positive but is {step}")
            }
        );

        let tick = Instant::now();
        let mut noise = RaDecNoise::from_sigmas(&self.sigma);
        let mut instance = prop.with(initial_state);
        let mut measurements = Vec::new();

        for epoch in TimeSeries::inclusive(start, end, step) {
            let state = instance
                .until_epoch(epoch)
                .context(PropagationFailureSnafu {
                    action: format!("generating measurements at {epoch}"),
                })?;

            if let Some(mask_deg) = self.station.elevation_mask_deg {
                let elevation_deg = self
                    .station
                    .elevation_deg_of(&state.orbit, &self.cosm)
                    .context(AstroFailureSnafu {
                        action: format!("computing the elevation at {epoch}"),
                    })?;
                if elevation_deg < mask_deg {
                    debug!(
                        "{} below the elevation mask of {} at {epoch} ({elevation_deg:.3} deg)",
                        self.target_id, self.station.name
                    );
                    continue;
                }
            }

            let computed = match AngularRaDec::compute(&self.station, &state.orbit, &self.cosm) {
                Ok((computed, _)) => computed,
                Err(MeasurementError::MeasurementAstro { source }) => {
                    return Err(ODError::AstroFailure {
                        action: format!("generating the measurement at {epoch}"),
                        source,
                    })
                }
                Err(e) => {
                    warn!("{e}: no measurement generated");
                    continue;
                }
            };

            let noises = match rng.as_deref_mut() {
                Some(rng) => noise.sample(epoch, rng),
                None => Vector2::zeros(),
            };

            measurements.push(
                AngularRaDec::new(
                    self.station.clone(),
                    epoch,
                    computed[0] + noises[0],
                    computed[1] + noises[1],
                    self.sigma,
                    self.target_id.clone(),
                )
                .with_weight(self.weight),
            );
        }

        let tock: Duration = tick.elapsed().into();
        info!(
            "Generated {} measurements of {} from {} in {tock}",
            measurements.len(),
            self.target_id,
            self.station.name
        );

        Ok(measurements)
    }
}
