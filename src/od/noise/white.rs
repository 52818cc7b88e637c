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

use hifitime::Epoch;
use rand::Rng;
use rand_distr::StandardNormal;
use serde_derive::{Deserialize, Serialize};

use super::Stochastics;

/// Uncorrelated Gaussian noise on one angle.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WhiteNoise {
    pub mean: f64,
    /// One sigma of the normal distribution
    pub sigma: f64,
}

impl WhiteNoise {
    /// Initializes a zero mean white noise with the provided one-sigma.
    pub fn constant_white_noise(sigma: f64) -> Self {
        Self {
            sigma,
            ..Default::default()
        }
    }
}

impl Stochastics for WhiteNoise {
    fn covariance(&self, _epoch: Epoch) -> f64 {
        self.sigma.powi(2)
    }

    fn sample<R: Rng>(&mut self, _epoch: Epoch, rng: &mut R) -> f64 {
        let draw: f64 = rng.sample(StandardNormal);
        self.mean + self.sigma * draw
    }
}
