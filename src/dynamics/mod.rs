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

use crate::cosmic::{AstroError, Orbit, Spacecraft};
use crate::linalg::allocator::Allocator;
use crate::linalg::{Const, DefaultAllocator, Matrix3, Matrix6, OMatrix, OVector, Vector3, Vector6};
use crate::State;
use snafu::Snafu;

use std::fmt;

/// Cartesian-based orbital dynamics, including the third body point masses.
///
/// Ensure coordinate frames match or perform transformations when combining dynamics.
pub mod orbital;
pub use self::orbital::*;

/// Spacecraft dynamics: orbital dynamics plus the force models which depend on the spacecraft itself.
pub mod spacecraft;
pub use self::spacecraft::*;

/// Solar radiation pressure models.
pub mod solarpressure;
pub use self::solarpressure::*;

/// Spherical harmonic gravity models.
pub mod sph_harmonics;
pub use self::sph_harmonics::*;

/// A trait for models with equations of motion that can be integrated.
///
/// This trait is designed for composition, allowing different dynamics to be combined.
#[allow(clippy::type_complexity)]
pub trait Dynamics: Clone + Sync + Send
where
    DefaultAllocator: Allocator<<Self::StateType as State>::Size>
        + Allocator<<Self::StateType as State>::VecLength>
        + Allocator<<Self::StateType as State>::Size, <Self::StateType as State>::Size>,
{
    type StateType: State;

    /// Defines the equations of motion.
    ///
    /// - `delta_t`: Time in seconds past the context epoch.
    /// - `state_vec`: The state vector, which changes at each integration step.
    /// - `state_ctx`: The state context, used to rebuild the state from the state vector.
    fn eom(
        &self,
        delta_t: f64,
        state_vec: &OVector<f64, <Self::StateType as State>::VecLength>,
        state_ctx: &Self::StateType,
    ) -> Result<OVector<f64, <Self::StateType as State>::VecLength>, DynamicsError>;

    /// Defines the equations of motion and their jacobian with respect to the state, computed with dual numbers.
    fn dual_eom(
        &self,
        _delta_t: f64,
        _osculating_state: &Self::StateType,
    ) -> Result<
        (
            OVector<f64, <Self::StateType as State>::Size>,
            OMatrix<f64, <Self::StateType as State>::Size, <Self::StateType as State>::Size>,
        ),
        DynamicsError,
    > {
        Err(DynamicsError::StateTransitionMatrixUnset)
    }

    /// Performs final changes after each successful integration step.
    ///
    /// Also called before the first integration step to update the initial state if needed.
    fn finally(&self, next_state: Self::StateType) -> Result<Self::StateType, DynamicsError> {
        Ok(next_state)
    }
}

/// A trait for immutable dynamics that return a force (e.g. solar radiation pressure).
///
/// The force is divided by the spacecraft's mass to compute acceleration (F=ma).
pub trait ForceModel: Send + Sync + fmt::Display {
    /// Force in kg km/s^2 applied on the spacecraft
    fn eom(&self, ctx: &Spacecraft) -> Result<Vector3<f64>, DynamicsError>;

    /// Force and its partial derivatives with respect to the position
    fn dual_eom(&self, osc_ctx: &Spacecraft) -> Result<(Vector3<f64>, Matrix3<f64>), DynamicsError>;
}

/// A trait for immutable dynamics that return an acceleration (e.g. spherical harmonics).
pub trait AccelModel: Send + Sync + fmt::Display {
    /// Acceleration in km/s^2
    fn eom(&self, osc: &Orbit) -> Result<Vector3<f64>, DynamicsError>;

    /// Acceleration and its partial derivatives with respect to the position
    fn dual_eom(&self, osc: &Orbit) -> Result<(Vector3<f64>, Matrix3<f64>), DynamicsError>;
}

/// Dynamical model errors.
#[derive(Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DynamicsError {
    /// State Transition Matrix (STM) was expected but not set.
    #[snafu(display("expected STM to be set"))]
    StateTransitionMatrixUnset,
    #[snafu(display("spacecraft mass must be positive to compute {model} but it is {mass_kg} kg"))]
    NonPositiveMass { model: String, mass_kg: f64 },
    #[snafu(display("{model} computed a non finite acceleration at {epoch}"))]
    NonFiniteAcceleration { model: String, epoch: String },
    #[snafu(display("{model} failed: {source}"))]
    DynamicsAstro {
        model: &'static str,
        source: AstroError,
    },
}

/// Rebuilds the propagated vector from the state derivative, its jacobian and the current STM stored in the propagated vector.
///
/// The STM derivative is Φ̇ = A·Φ, stored column major after the state derivative.
pub(crate) fn stm_derivative(
    d_x: &Vector6<f64>,
    grad: &Matrix6<f64>,
    state_vec: &OVector<f64, Const<42>>,
) -> OVector<f64, Const<42>> {
    let stm = Matrix6::from_column_slice(&state_vec.as_slice()[6..]);
    let stm_dt = grad * stm;

    let mut d_vec = OVector::<f64, Const<42>>::zeros();
    d_vec.fixed_rows_mut::<6>(0).copy_from(d_x);
    for (idx, val) in stm_dt.as_slice().iter().enumerate() {
        d_vec[idx + 6] = *val;
    }
    d_vec
}
