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

use super::{
    DegenerateGeometrySnafu, EstimatedMeasurement, MeasurementAstroSnafu, MeasurementError,
    MeasurementStatus,
};
use crate::cosmic::{Cosm, Orbit, Spacecraft};
use crate::linalg::{Const, Matrix2x6, OVector, Vector2, U6};
use crate::od::GroundStation;
use crate::time::Epoch;
use crate::utils::between_0_tau;
use hyperdual::linalg::norm;
use hyperdual::{hyperspace_from_vector, Float, OHyperdual};
use snafu::{ensure, ResultExt};
use std::fmt;
use std::sync::Arc;

/// Below this distance to the celestial pole axis (in km), the right ascension of the line of sight is undefined.
const POLE_AXIS_TOL_KM: f64 = 1e-9;

/// An observed right ascension and declination of a spacecraft, seen from a ground station, in the inertial frame.
///
/// The observation does not account for the light time nor for aberration.
#[derive(Clone, Debug, PartialEq)]
pub struct AngularRaDec {
    pub station: Arc<GroundStation>,
    pub epoch: Epoch,
    /// Right ascension and declination, in radians
    pub observed: Vector2<f64>,
    /// One sigma of the right ascension and of the declination, in radians
    pub sigma: Vector2<f64>,
    pub weight: Vector2<f64>,
    pub target_id: String,
}

impl AngularRaDec {
    /// Initializes a new observation with unit weights.
    ///
    /// **Units:** radians
    pub fn new(
        station: Arc<GroundStation>,
        epoch: Epoch,
        ra_rad: f64,
        dec_rad: f64,
        sigma: Vector2<f64>,
        target_id: String,
    ) -> Self {
        Self {
            station,
            epoch,
            observed: Vector2::new(ra_rad, dec_rad),
            sigma,
            weight: Vector2::new(1.0, 1.0),
            target_id,
        }
    }

    /// Returns a copy of this observation with the provided weights
    pub fn with_weight(mut self, weight: Vector2<f64>) -> Self {
        self.weight = weight;
        self
    }

    pub fn ra_deg(&self) -> f64 {
        self.observed[0].to_degrees()
    }

    pub fn dec_deg(&self) -> f64 {
        self.observed[1].to_degrees()
    }

    /// Computes the geometric right ascension (between 0 and 2π) and declination of the provided inertial orbit
    /// seen from the station, and their partials with respect to the Cartesian state.
    pub fn compute(
        station: &GroundStation,
        rx: &Orbit,
        cosm: &Cosm,
    ) -> Result<(Vector2<f64>, Matrix2x6<f64>), MeasurementError> {
        let tx = station
            .position_gcrf_km(rx.epoch, cosm)
            .context(MeasurementAstroSnafu)?;
        let mut rho = rx.to_cartesian_vec();
        for i in 0..3 {
            rho[i] -= tx[i];
        }

        let los_xy_km = rho[0].hypot(rho[1]);
        ensure!(
            los_xy_km > POLE_AXIS_TOL_KM,
            DegenerateGeometrySnafu {
                epoch: rx.epoch,
                los_km: los_xy_km
            }
        );

        let hyperstate = hyperspace_from_vector(&rho);
        Ok(Self::compute_sensitivity(&hyperstate))
    }

    fn compute_sensitivity(
        state: &OVector<OHyperdual<f64, Const<7>>, U6>,
    ) -> (Vector2<f64>, Matrix2x6<f64>) {
        // Extract data from hyperspace
        let range_vec = state.fixed_rows::<3>(0).into_owned();

        let ra = range_vec[1].atan2(range_vec[0]);
        let dec = (range_vec[2] / norm(&range_vec)).asin();

        let mut fx = Vector2::zeros();
        let mut pmat = Matrix2x6::zeros();
        for i in 0..2 {
            let angle = if i == 0 { ra } else { dec };
            fx[i] = angle.real();
            for j in 1..7 {
                pmat[(i, j - 1)] = angle[j];
            }
        }
        fx[0] = between_0_tau(fx[0]);
        (fx, pmat)
    }

    /// Evaluates this observation at the provided trial state, adding the provided station biases (in radians).
    ///
    /// The estimated measurement is rejected if either weight is not positive or if the geometry is degenerate.
    pub fn estimate(&self, rx: &Spacecraft, cosm: &Cosm, bias: &Vector2<f64>) -> EstimatedMeasurement {
        match Self::compute(&self.station, &rx.orbit, cosm) {
            Ok((computed, h_tilde)) => {
                let status = if self.weight.iter().all(|w| *w > 0.0) {
                    MeasurementStatus::Processed
                } else {
                    MeasurementStatus::Rejected
                };
                EstimatedMeasurement {
                    epoch: self.epoch,
                    observed: self.observed,
                    estimated: Vector2::new(
                        between_0_tau(computed[0] + bias[0]),
                        computed[1] + bias[1],
                    ),
                    h_tilde,
                    status,
                }
            }
            Err(e) => {
                match e {
                    MeasurementError::DegenerateGeometry { .. } => {
                        debug!("{e}: rejecting observation of {}", self.target_id)
                    }
                    MeasurementError::MeasurementAstro { .. } => {
                        warn!("{e}: rejecting observation of {}", self.target_id)
                    }
                }
                EstimatedMeasurement {
                    epoch: self.epoch,
                    observed: self.observed,
                    estimated: self.observed,
                    h_tilde: Matrix2x6::zeros(),
                    status: MeasurementStatus::Rejected,
                }
            }
        }
    }
}

impl fmt::Display for AngularRaDec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} @ {}: RA = {:.6} deg  Dec = {:.6} deg (from {})",
            self.target_id,
            self.epoch,
            self.ra_deg(),
            self.dec_deg(),
            self.station.name
        )
    }
}
