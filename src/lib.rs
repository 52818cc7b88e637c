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

/*! # radec-od

Batch least squares orbit determination of Earth orbiting spacecraft from right ascension and declination
tracking, built on numerically integrated dynamics (spherical harmonics, Sun and Moon point masses,
solar radiation pressure) and a Gauss-Newton estimator with a QR solver.

The entry point is [`od::process_measurements`], which returns the estimated [`Spacecraft`] state and its
Cartesian covariance at the epoch of the last measurement.
*/

/// Provides the propagators / integrators used for the orbit determination.
pub mod propagators;

/// Provides the dynamics used for orbital mechanics, which can be combined.
pub mod dynamics;

/// Provides the orbit and spacecraft states, and the Earth, Sun and Moon models.
pub mod cosmic;

/// Utility functions shared by different modules.
pub mod utils;

/// All the input/output needs for this library: configuration files, gravity fields and tracking data.
pub mod io;

/// All of the orbit determination tools: measurements, simulation, batch estimation.
pub mod od;

#[macro_use]
extern crate log;
extern crate hifitime;
extern crate nalgebra as na;

/// Re-export of hifitime
pub mod time {
    pub use hifitime::*;
}

/// Re-export nalgebra
pub mod linalg {
    pub use na::base::*;
}

/// Re-export some useful things
pub use self::cosmic::{Orbit, Spacecraft, State};
