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

use crate::linalg::allocator::Allocator;
use crate::linalg::{DefaultAllocator, DimName, OVector, Vector3};
use std::fmt::Debug;

// This determines when to take into consideration the magnitude of the state_delta -- prevents dividing by too small of a number.
const REL_ERR_THRESH: f64 = 0.1;

/// The Error Control trait manages how a propagator computes the error in the current step.
///
/// Every implementor must be `Default` so that fixed step options can be built without an error controller.
pub trait ErrorCtrl
where
    Self: Copy + Clone + Debug + Default + Send + Sync,
{
    /// Computes the actual error of the current step.
    ///
    /// The `error_est` is the estimated error computed from the difference in the two stages of
    /// of the RK propagator. The `candidate` variable is the candidate state, and `cur_state` is
    /// the current state. This function must return the error.
    fn estimate<N: DimName>(
        error_est: &OVector<f64, N>,
        candidate: &OVector<f64, N>,
        cur_state: &OVector<f64, N>,
    ) -> f64
    where
        DefaultAllocator: Allocator<N>;
}

/// An RSS step error control which effectively computes the L2 norm of the provided Vector of size 3
///
/// Note that this error controller should be preferrably be used only with slices of a state with the same units.
/// For example, one should probably use this for position independently of using it for the velocity.
/// (Source)[https://github.com/ChristopherRabotin/GMAT/blob/37201a6290e7f7b941bc98ee973a527a5857104b/src/base/forcemodel/ODEModel.cpp#L3045]
pub fn rss_step(prop_err: &Vector3<f64>, candidate: &Vector3<f64>, cur_state: &Vector3<f64>) -> f64 {
    let mag = (candidate - cur_state).norm();
    let err = prop_err.norm();
    if mag > REL_ERR_THRESH {
        err / mag
    } else {
        err
    }
}

fn radius<N: DimName>(vec: &OVector<f64, N>) -> Vector3<f64>
where
    DefaultAllocator: Allocator<N>,
{
    Vector3::new(vec[0], vec[1], vec[2])
}

fn velocity<N: DimName>(vec: &OVector<f64, N>) -> Vector3<f64>
where
    DefaultAllocator: Allocator<N>,
{
    Vector3::new(vec[3], vec[4], vec[5])
}

/// An RSS step error control on the position and velocity components only (the STM is not error controlled).
///
/// The error is the largest of the RSS step errors of the position and of the velocity.
#[derive(Clone, Copy, Debug, Default)]
pub struct RSSCartesianStep;

impl ErrorCtrl for RSSCartesianStep {
    fn estimate<N: DimName>(
        error_est: &OVector<f64, N>,
        candidate: &OVector<f64, N>,
        cur_state: &OVector<f64, N>,
    ) -> f64
    where
        DefaultAllocator: Allocator<N>,
    {
        let err_radius = rss_step(&radius(error_est), &radius(candidate), &radius(cur_state));
        let err_velocity = rss_step(
            &velocity(error_est),
            &velocity(candidate),
            &velocity(cur_state),
        );
        err_radius.max(err_velocity)
    }
}

/// An absolute position error control, in kilometers.
///
/// The velocity error is converted to an equivalent position error by scaling it with r/v of the candidate state,
/// such that the tolerance of the propagator is the maximum position error allowed per step.
#[derive(Clone, Copy, Debug, Default)]
pub struct PositionError;

impl ErrorCtrl for PositionError {
    fn estimate<N: DimName>(
        error_est: &OVector<f64, N>,
        candidate: &OVector<f64, N>,
        _cur_state: &OVector<f64, N>,
    ) -> f64
    where
        DefaultAllocator: Allocator<N>,
    {
        let err_radius = radius(error_est).norm();
        let vmag = velocity(candidate).norm();
        let err_velocity = if vmag > f64::EPSILON {
            velocity(error_est).norm() * radius(candidate).norm() / vmag
        } else {
            velocity(error_est).norm()
        };
        err_radius.max(err_velocity)
    }
}

#[cfg(test)]
mod ut_error_ctrl {
    use super::*;
    use crate::linalg::Vector6;

    #[test]
    fn position_error_scaling() {
        let cur = Vector6::new(7000.0, 0.0, 0.0, 0.0, 7.0, 0.0);
        let candidate = Vector6::new(7000.0, 70.0, 0.0, -0.07, 7.0, 0.0);
        let err = Vector6::new(1e-3, 0.0, 0.0, 0.0, 1e-6, 0.0);
        // Velocity error scaled by r/v = 1000 s
        let val = PositionError::estimate(&err, &candidate, &cur);
        assert!((val - 1e-3).abs() < 1e-6);

        let err = Vector6::new(1e-4, 0.0, 0.0, 0.0, 1e-6, 0.0);
        let val = PositionError::estimate(&err, &candidate, &cur);
        assert!(val > 1e-4);

        let rss = RSSCartesianStep::estimate(&err, &candidate, &cur);
        // Position moved by 70 km, so the position error is relative
        assert!((rss - (1e-4_f64 / 70.0).max(1e-6)).abs() < 1e-12);
    }
}
