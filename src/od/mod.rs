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
use crate::io::{ConfigError, InputOutputError};
use crate::propagators::PropagationError;
use snafu::prelude::*;

pub use crate::dynamics::Dynamics;
pub use crate::State;

/// Provides the ground stations tracking the spacecraft.
mod ground_station;
pub use ground_station::GroundStation;

/// Provides the right ascension and declination measurement model.
pub mod msr;

/// Provides noise modeling
pub mod noise;

/// Provides the functionality to simulate angles-only measurements from ground stations
pub mod simulator;

/// Provides the named estimation parameters: orbital, propagator and measurement drivers.
pub mod drivers;

/// Provides the Gauss-Newton batch least squares estimator.
pub mod blse;

/// Provides the convergence observer, which reports every evaluation of the batch estimator.
pub mod observer;

/// Provides the dynamics configuration, the OD settings, and the orbit determination entry point.
pub mod process;

pub use process::{process_measurements, StateAndCovariance};

#[allow(unused_imports)]
pub mod prelude {
    pub use super::blse::*;
    pub use super::drivers::*;
    pub use super::ground_station::*;
    pub use super::msr::*;
    pub use super::noise::{Stochastics, WhiteNoise};
    pub use super::observer::*;
    pub use super::process::*;
    pub use super::simulator::*;
    pub use super::*;

    pub use crate::cosmic::{Cosm, Frame, Orbit, Spacecraft};
    pub use crate::time::{Duration, Epoch, TimeUnits, Unit};
}

#[derive(Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ODError {
    #[snafu(display("invalid orbit determination input: {msg}"))]
    InvalidInput { msg: String },
    #[snafu(display("propagation failed when {action}: {source}"))]
    PropagationFailure {
        action: String,
        source: PropagationError,
    },
    #[snafu(display("orbit determination failed: {source}"))]
    EstimationFailure { source: blse::BLSError },
    #[snafu(display("malformed tracking or gravity data: {source}"))]
    FileFormat { source: InputOutputError },
    #[snafu(display("could not read input: {source}"))]
    IOError { source: InputOutputError },
    #[snafu(display("OD failed because {source}"))]
    ODConfigError { source: ConfigError },
    #[snafu(display("{action} failed: {source}"))]
    AstroFailure { action: String, source: AstroError },
}

impl From<InputOutputError> for ODError {
    fn from(source: InputOutputError) -> Self {
        match source {
            InputOutputError::FileFormat { .. } => Self::FileFormat { source },
            InputOutputError::StdIOError { .. } => Self::IOError { source },
            InputOutputError::GravityFieldSize { .. } => Self::InvalidInput {
                msg: source.to_string(),
            },
        }
    }
}
