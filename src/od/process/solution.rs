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

use crate::cosmic::{AstroError, Frame, Spacecraft};
use crate::linalg::{Matrix6, Vector6};
use crate::time::Epoch;
use serde_derive::{Deserialize, Serialize};
use std::fmt;

/// Convention of the rows and columns of a state covariance
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CovarianceRepresentation {
    /// x, y, z (km) then vx, vy, vz (km/s), in the frame of the state
    Cartesian,
}

impl fmt::Display for CovarianceRepresentation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Cartesian => write!(f, "Cartesian"),
        }
    }
}

/// The result of an orbit determination: the estimated state and its covariance at the OD epoch.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StateAndCovariance {
    pub state: Spacecraft,
    pub covariance: Matrix6<f64>,
    pub representation: CovarianceRepresentation,
    /// Whether the estimator converged before its iteration or evaluation limit
    pub converged: bool,
    pub iterations: usize,
    /// Root mean square of the weighted residuals of the last evaluation
    pub rms: f64,
}

impl StateAndCovariance {
    pub fn epoch(&self) -> Epoch {
        self.state.orbit.epoch
    }

    pub fn frame(&self) -> Frame {
        self.state.orbit.frame
    }

    /// Cartesian state vector, in km and km/s
    pub fn cartesian(&self) -> Vector6<f64> {
        self.state.orbit.to_cartesian_vec()
    }

    /// Keplerian elements of the state: sma (km), ecc, inc, raan, aop, ta (degrees)
    pub fn keplerian(&self) -> Result<Vector6<f64>, AstroError> {
        let orbit = &self.state.orbit;
        if orbit.frame.mu_km3_s2 <= 0.0 {
            return Err(AstroError::NoGravitationalParameter {
                action: "Keplerian elements of the OD solution",
            });
        }
        Ok(orbit.to_keplerian_vec())
    }

    /// Root sum square of the position standard deviations, in km
    pub fn sigma_position_km(&self) -> f64 {
        self.covariance.fixed_view::<3, 3>(0, 0).trace().sqrt()
    }

    /// Root sum square of the velocity standard deviations, in km/s
    pub fn sigma_velocity_km_s(&self) -> f64 {
        self.covariance.fixed_view::<3, 3>(3, 3).trace().sqrt()
    }

    /// One sigma of each Cartesian component
    pub fn sigmas(&self) -> Vector6<f64> {
        self.covariance.diagonal().map(|var| var.max(0.0).sqrt())
    }
}

impl fmt::Display for StateAndCovariance {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let sigmas = self.sigmas();
        let fmt_sigmas: Vec<String> = sigmas.iter().map(|s| format!("{s:e}")).collect();
        write!(
            f,
            "=== OD solution @ {} ({} covariance, {}) ===\nstate {}\nsigmas [{}]\nRMS {:.6} after {} iterations\n",
            self.epoch(),
            self.representation,
            if self.converged {
                "converged"
            } else {
                "NOT converged"
            },
            self.state.orbit,
            fmt_sigmas.join(","),
            self.rms,
            self.iterations
        )
    }
}

impl fmt::LowerExp for StateAndCovariance {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "=== OD solution @ {} ===\nCovariance {:e}", self.epoch(), self.covariance)
    }
}
