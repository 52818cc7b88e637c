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

use crate::dynamics::DynamicsError;
use crate::linalg::allocator::Allocator;
use crate::linalg::{DefaultAllocator, DimName, OMatrix, OVector};
use crate::time::{Duration, Epoch};
use anise::errors::AlmanacError;
use serde_derive::{Deserialize, Serialize};
use snafu::Snafu;
use std::fmt;

/// A trait for generic propagation and estimation state.
/// `Size` is the size of the estimated state, `VecLength` the size of the propagated vector including the STM.
pub trait State: Default + Copy + PartialEq + fmt::Display + Send + Sync
where
    Self: Sized,
    DefaultAllocator:
        Allocator<Self::Size> + Allocator<Self::Size, Self::Size> + Allocator<Self::VecLength>,
{
    /// Size of the state and its STM
    type Size: DimName;
    type VecLength: DimName;

    /// Return this state as a vector for the propagation/estimation
    fn to_vector(&self) -> OVector<f64, Self::VecLength>;

    /// Return the state transition matrix, or an error if it is not enabled on this state.
    fn stm(&self) -> Result<OMatrix<f64, Self::Size, Self::Size>, DynamicsError>;

    /// Resets the STM to identity, enabling it if needed.
    fn reset_stm(&mut self);

    /// Unsets the STM for this state
    fn unset_stm(&mut self);

    /// Set this state from the provided vector
    fn set(&mut self, epoch: Epoch, vector: &OVector<f64, Self::VecLength>);

    /// Reconstruct a new State from the provided delta time in seconds compared to the current state
    /// and with the provided vector.
    fn set_with_delta_seconds(
        mut self,
        delta_t_s: f64,
        vector: &OVector<f64, Self::VecLength>,
    ) -> Self {
        self.set(self.epoch() + Duration::from_seconds(delta_t_s), vector);
        self
    }

    /// Retrieve the Epoch
    fn epoch(&self) -> Epoch;
    /// Set the Epoch
    fn set_epoch(&mut self, epoch: Epoch);
}

/// Orientation of a frame centered on the Earth
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    /// Geocentric celestial reference frame, the integration frame
    GCRF,
    /// Earth fixed frame, rotating with the Earth
    ITRF,
}

/// A frame is an orientation centered on the Earth, with the physical constants needed to compute orbital elements.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub orientation: Orientation,
    /// Gravitational parameter, in km^3/s^2
    pub mu_km3_s2: f64,
    /// Equatorial radius of the ellipsoid, in km
    pub equatorial_radius_km: f64,
    pub flattening: f64,
}

impl Frame {
    pub fn is_inertial(&self) -> bool {
        self.orientation == Orientation::GCRF
    }

    /// Returns a copy of this frame with a different gravitational parameter.
    pub fn with_mu_km3_s2(mut self, mu_km3_s2: f64) -> Self {
        self.mu_km3_s2 = mu_km3_s2;
        self
    }

    /// Returns a copy of this frame with the provided orientation.
    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self {
            orientation: Orientation::GCRF,
            mu_km3_s2: EARTH_GM_KM3_S2,
            equatorial_radius_km: EARTH_EQUATORIAL_RADIUS_KM,
            flattening: EARTH_FLATTENING,
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Earth {:?} (μ = {} km^3/s^2)", self.orientation, self.mu_km3_s2)
    }
}

#[derive(Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AstroError {
    #[snafu(display("parabolic orbits have ill-defined Keplerian orbital elements (ecc = {ecc})"))]
    ParabolicEccentricity { ecc: f64 },
    #[snafu(display("true anomaly of {ta_deg} deg is physically impossible for a hyperbolic orbit"))]
    HyperbolicTrueAnomaly { ta_deg: f64 },
    #[snafu(display("semilatus rectum is zero: cannot build orbit from Keplerian elements"))]
    ParabolicSemiParam,
    #[snafu(display("{action} requires a non-zero gravitational parameter"))]
    NoGravitationalParameter { action: &'static str },
    #[snafu(display("{action} failed: {source}"))]
    AstroAlmanac {
        action: &'static str,
        #[snafu(source(from(AlmanacError, Box::new)))]
        source: Box<AlmanacError>,
    },
}

mod orbit;
pub use self::orbit::*;

mod spacecraft;
pub use self::spacecraft::*;

mod cosm;
pub use self::cosm::*;

/// Speed of light in kilometers per second
pub const SPEED_OF_LIGHT_KM_S: f64 = 299_792.458;

/// Astronomical unit, in kilometers, according to the [IAU](https://www.iau.org/public/themes/measuring/).
pub const AU: f64 = 149_597_870.700;

/// Earth gravitational parameter (IERS 2010), in km^3/s^2
pub const EARTH_GM_KM3_S2: f64 = 398_600.441_5;
/// Earth equatorial radius (IERS 2010), in km
pub const EARTH_EQUATORIAL_RADIUS_KM: f64 = 6_378.136_3;
/// Earth flattening (WGS84 / IERS 2010)
pub const EARTH_FLATTENING: f64 = 1.0 / 298.257_223_563;
/// Earth mean rotation rate, in rad/s
pub const EARTH_ANGULAR_VELOCITY_RAD_S: f64 = 7.292_115_146_706_979e-5;
/// Sun gravitational parameter, in km^3/s^2
pub const SUN_GM_KM3_S2: f64 = 1.327_124_400_18e11;
/// Moon gravitational parameter, in km^3/s^2
pub const MOON_GM_KM3_S2: f64 = 4_902.800_066;
/// Equatorial radius of the Sun, in km
pub const SUN_RADIUS_KM: f64 = 696_000.0;
