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

use std::fmt;

use crate::time::{Duration, Unit};

use super::{ErrorCtrl, PositionError, RSSCartesianStep};
use typed_builder::TypedBuilder;

/// Step size settings of the integrator.
///
/// Adaptive options bound the step between `min_step` and `max_step` and retry a rejected step up to `attempts` times.
/// Fixed step options run the higher order solution of the embedded method without any error estimate.
#[derive(Clone, Copy, Debug, TypedBuilder)]
#[builder(doc)]
pub struct PropOpts<E: ErrorCtrl> {
    #[builder(default_code = "60.0 * Unit::Second")]
    pub init_step: Duration,
    #[builder(default_code = "0.001 * Unit::Second")]
    pub min_step: Duration,
    #[builder(default_code = "2700.0 * Unit::Second")]
    pub max_step: Duration,
    /// Maximum error of a step, in the units of the error controller
    #[builder(default = 1e-12)]
    pub tolerance: f64,
    #[builder(default = 50)]
    pub attempts: u8,
    #[builder(default = false)]
    pub fixed_step: bool,
    #[builder(default)]
    pub error_ctrl: E,
}

impl<E: ErrorCtrl> PropOpts<E> {
    /// Adaptive step options starting at the maximum step, with up to 50 attempts per step.
    pub fn with_adaptive_step(min_step: Duration, max_step: Duration, tolerance: f64, error_ctrl: E) -> Self {
        Self {
            init_step: max_step,
            min_step,
            max_step,
            tolerance,
            attempts: 50,
            fixed_step: false,
            error_ctrl,
        }
    }

    pub fn with_fixed_step(step: Duration) -> Self {
        Self {
            init_step: step,
            min_step: step,
            max_step: step,
            tolerance: 0.0,
            attempts: 0,
            fixed_step: true,
            error_ctrl: E::default(),
        }
    }

    pub fn with_fixed_step_s(step_s: f64) -> Self {
        Self::with_fixed_step(step_s * Unit::Second)
    }

    /// Caps the step size, lowering the initial step if needed
    pub fn set_max_step(&mut self, max_step: Duration) {
        if self.init_step > max_step {
            self.init_step = max_step;
        }
        self.max_step = max_step;
    }
}

impl<E: ErrorCtrl> fmt::Display for PropOpts<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fixed_step {
            write!(f, "fixed step of {}", self.min_step)
        } else {
            write!(
                f,
                "adaptive step in [{}, {}] with a tolerance of {:e} ({} attempts)",
                self.min_step, self.max_step, self.tolerance, self.attempts,
            )
        }
    }
}

impl PropOpts<PositionError> {
    /// Adaptive step options where the tolerance is the maximum position error of a step, in meters.
    pub fn with_position_error_m(min_step: Duration, max_step: Duration, position_error_m: f64) -> Self {
        Self::with_adaptive_step(min_step, max_step, position_error_m * 1e-3, PositionError {})
    }
}

impl Default for PropOpts<RSSCartesianStep> {
    /// Tight adaptive options used to build reference trajectories.
    fn default() -> Self {
        Self::builder().build()
    }
}
