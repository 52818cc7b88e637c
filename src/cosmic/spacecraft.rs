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

use serde_derive::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use super::{Orbit, State};
use crate::dynamics::DynamicsError;
use crate::linalg::{Const, Matrix6, OVector};
use crate::time::Epoch;

use std::default::Default;
use std::fmt;

/// Attitude rule of the spacecraft during the propagation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttitudeMode {
    /// Attitude is fixed with respect to the inertial integration frame
    #[default]
    Inertial,
}

/// Solar radiation pressure configuration of a spacecraft, modeled as a sphere.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, TypedBuilder)]
#[builder(doc)]
pub struct SrpConfig {
    /// solar radiation pressure area in m^2
    #[builder(default = 0.02)]
    pub area_m2: f64,
    /// coefficient of reflectivity, must be between 0.0 (translucent) and 2.0 (all radiation absorbed and twice the force is transmitted back).
    #[builder(default = 1.0)]
    pub cr: f64,
}

impl Default for SrpConfig {
    fn default() -> Self {
        Self {
            area_m2: 0.02,
            cr: 1.0,
        }
    }
}

/// A spacecraft state, composed of its orbit, its fixed mass (in kg), its SRP configuration and its attitude rule.
#[derive(Clone, Copy, Debug, Default)]
pub struct Spacecraft {
    /// Initial orbit the vehicle is in
    pub orbit: Orbit,
    /// Mass in kilogram, constant throughout the propagation
    pub mass_kg: f64,
    pub srp: SrpConfig,
    pub attitude: AttitudeMode,
}

impl Spacecraft {
    /// Initialize a spacecraft state from the orbit and its mass, with the default SRP configuration.
    pub fn new(orbit: Orbit, mass_kg: f64) -> Self {
        Self {
            orbit,
            mass_kg,
            srp: SrpConfig::default(),
            attitude: AttitudeMode::Inertial,
        }
    }

    /// Returns a copy of the state with a new SRP area and CR
    pub fn with_srp(mut self, srp_area_m2: f64, cr: f64) -> Self {
        self.srp = SrpConfig {
            area_m2: srp_area_m2,
            cr,
        };
        self
    }

    /// Returns a copy of the state with a new coefficient of reflectivity
    pub fn with_cr(mut self, cr: f64) -> Self {
        self.srp.cr = cr;
        self
    }

    /// Returns a copy of the state with a new orbit
    pub fn with_orbit(mut self, orbit: Orbit) -> Self {
        self.orbit = orbit;
        self
    }

    /// Returns the root sum square error between this spacecraft and the other, in kilometers for the position and kilometers per second in velocity
    pub fn rss(&self, other: &Self) -> (f64, f64) {
        self.orbit.rss(&other.orbit)
    }

    /// Sets the STM of this state of identity, which also enables computation of the STM for spacecraft navigation
    pub fn enable_stm(&mut self) {
        self.orbit.enable_stm();
    }

    /// Copies the current state but sets the STM to identity
    pub fn with_stm(mut self) -> Self {
        self.enable_stm();
        self
    }
}

impl PartialEq for Spacecraft {
    fn eq(&self, other: &Self) -> bool {
        self.orbit == other.orbit
            && (self.mass_kg - other.mass_kg).abs() < f64::EPSILON
            && self.srp == other.srp
            && self.attitude == other.attitude
    }
}

impl fmt::Display for Spacecraft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "total mass = {:.3} kg @  {}  SRP: area = {} m^2, Cr = {}",
            self.mass_kg, self.orbit, self.srp.area_m2, self.srp.cr
        )
    }
}

impl State for Spacecraft {
    type Size = Const<6>;
    type VecLength = Const<42>;

    fn to_vector(&self) -> OVector<f64, Const<42>> {
        self.orbit.to_vector()
    }

    fn stm(&self) -> Result<Matrix6<f64>, DynamicsError> {
        self.orbit.stm()
    }

    fn reset_stm(&mut self) {
        self.orbit.reset_stm();
    }

    fn unset_stm(&mut self) {
        self.orbit.unset_stm();
    }

    fn set(&mut self, epoch: Epoch, vector: &OVector<f64, Const<42>>) {
        self.orbit.set(epoch, vector);
    }

    fn epoch(&self) -> Epoch {
        self.orbit.epoch
    }

    fn set_epoch(&mut self, epoch: Epoch) {
        self.orbit.epoch = epoch
    }
}
