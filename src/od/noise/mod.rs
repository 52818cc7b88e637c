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

use crate::linalg::{Matrix2, Vector2};
use hifitime::Epoch;
use rand::Rng;
use serde_derive::{Deserialize, Serialize};

pub mod white;

pub use white::WhiteNoise;

/// Trait for any kind of stochastic modeling, developing primarily for synthetic orbit determination measurements.
pub trait Stochastics {
    /// Return the variance of this stochastic noise model at a given time.
    fn covariance(&self, epoch: Epoch) -> f64;

    /// Returns a new sample of these stochastics
    fn sample<R: Rng>(&mut self, epoch: Epoch, rng: &mut R) -> f64;
}

/// Uncorrelated noise on the right ascension and the declination, i.e. a Gaussian of covariance diag(σ_ra², σ_dec²).
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RaDecNoise {
    pub ra: WhiteNoise,
    pub dec: WhiteNoise,
}

impl RaDecNoise {
    /// Zero mean noise with the provided one-sigma values, in radians.
    pub fn from_sigmas(sigmas_rad: &Vector2<f64>) -> Self {
        Self {
            ra: WhiteNoise::constant_white_noise(sigmas_rad[0]),
            dec: WhiteNoise::constant_white_noise(sigmas_rad[1]),
        }
    }

    pub fn covariance(&self, epoch: Epoch) -> Matrix2<f64> {
        Matrix2::from_diagonal(&Vector2::new(
            self.ra.covariance(epoch),
            self.dec.covariance(epoch),
        ))
    }

    /// Draws the right ascension noise and then the declination noise from the provided generator.
    pub fn sample<R: Rng>(&mut self, epoch: Epoch, rng: &mut R) -> Vector2<f64> {
        let ra = self.ra.sample(epoch, rng);
        let dec = self.dec.sample(epoch, rng);
        Vector2::new(ra, dec)
    }
}
