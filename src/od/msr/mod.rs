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

use crate::cosmic::AstroError;
use crate::linalg::{Matrix2x6, Vector2};
use crate::time::Epoch;
use crate::utils::between_pm_pi;
use snafu::prelude::*;
use std::fmt;

mod radec;
pub use radec::AngularRaDec;

#[derive(Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum MeasurementError {
    #[snafu(display(
        "right ascension is undefined at {epoch}: the line of sight is {los_km:.3e} km from the celestial pole axis"
    ))]
    DegenerateGeometry { epoch: Epoch, los_km: f64 },
    #[snafu(display("station position unavailable: {source}"))]
    MeasurementAstro { source: AstroError },
}

/// Whether an estimated measurement contributes to the residuals of an evaluation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MeasurementStatus {
    Processed,
    /// Non positive weight, or a geometry where the model is undefined
    Rejected,
}

/// The model-predicted counterpart of an observed right ascension and declination, at a trial state.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EstimatedMeasurement {
    pub epoch: Epoch,
    /// Observed right ascension and declination, in radians
    pub observed: Vector2<f64>,
    /// Computed right ascension (between 0 and 2π) and declination, in radians
    pub estimated: Vector2<f64>,
    /// Partials of the estimated measurement with respect to the Cartesian state at the measurement epoch
    pub h_tilde: Matrix2x6<f64>,
    pub status: MeasurementStatus,
}

impl EstimatedMeasurement {
    /// Observed minus computed, in radians, with the right ascension residual wrapped between -π and π.
    pub fn residual(&self) -> Vector2<f64> {
        let delta = self.observed - self.estimated;
        Vector2::new(between_pm_pi(delta[0]), delta[1])
    }

    pub fn is_processed(&self) -> bool {
        self.status == MeasurementStatus::Processed
    }
}

impl fmt::Display for EstimatedMeasurement {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let residual = self.residual();
        write!(
            f,
            "{}: RA = {:.6} deg (O-C {:.3e} deg)  Dec = {:.6} deg (O-C {:.3e} deg)  {:?}",
            self.epoch,
            self.estimated[0].to_degrees(),
            residual[0].to_degrees(),
            self.estimated[1].to_degrees(),
            residual[1].to_degrees(),
            self.status
        )
    }
}
