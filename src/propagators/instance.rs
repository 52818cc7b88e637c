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
use super::error_ctrl::ErrorCtrl;
use super::{DynamicsSnafu, IntegrationDetails, PropagationError, Propagator};
use crate::dynamics::Dynamics;
use crate::linalg::allocator::Allocator;
use crate::linalg::{DefaultAllocator, OVector};
use crate::time::{Duration, Epoch, Unit};
use crate::State;
use snafu::ResultExt;
use std::time::Instant;

type StateVector<D> = OVector<f64, <<D as Dynamics>::StateType as State>::VecLength>;

/// Safety factor applied to the step proposed by the error estimate
const STEP_SAFETY: f64 = 0.9;

/// A propagator bound to a state: each call advances that state, forward or backward.
pub struct PropInstance<'a, D: Dynamics, E: ErrorCtrl>
where
    DefaultAllocator: Allocator<<D::StateType as State>::Size>
        + Allocator<<D::StateType as State>::Size, <D::StateType as State>::Size>
        + Allocator<<D::StateType as State>::VecLength>,
{
    pub state: D::StateType,
    pub prop: &'a Propagator<D, E>,
    /// Details of the last accepted step
    pub details: IntegrationDetails,
    /// Magnitude of the next step, adapted after each accepted step
    pub(crate) step_size: Duration,
    pub(crate) fixed_step: bool,
    /// Derivatives at each stage of the method
    pub(crate) k: Vec<StateVector<D>>,
}

impl<D: Dynamics, E: ErrorCtrl> PropInstance<'_, D, E>
where
    DefaultAllocator: Allocator<<D::StateType as State>::Size>
        + Allocator<<D::StateType as State>::Size, <D::StateType as State>::Size>
        + Allocator<<D::StateType as State>::VecLength>,
{
    /// Propagates the state for the provided duration, backward if the duration is negative.
    ///
    /// The last step is shortened to land exactly on the final epoch, without altering the adapted step size.
    pub fn for_duration(&mut self, duration: Duration) -> Result<D::StateType, PropagationError> {
        if duration == Duration::ZERO {
            return Ok(self.state);
        }
        let stop_time = self.state.epoch() + duration;
        let backward = duration.is_negative();
        let tick = Instant::now();

        self.state = self
            .prop
            .dynamics
            .finally(self.state)
            .context(DynamicsSnafu)?;

        loop {
            let remaining = stop_time - self.state.epoch();
            if remaining == Duration::ZERO {
                break;
            }
            let step = if backward {
                -self.step_size
            } else {
                self.step_size
            };

            if remaining.abs() <= self.step_size {
                self.final_step(remaining)?;
                break;
            }
            self.single_step(step)?;
        }

        if duration.abs() >= 2 * Unit::Minute {
            let tock: Duration = tick.elapsed().into();
            trace!("Propagated for {duration} until {stop_time} in {tock}");
        }
        Ok(self.state)
    }

    /// Propagates the state until the provided epoch, which may precede the current one.
    pub fn until_epoch(&mut self, end_time: Epoch) -> Result<D::StateType, PropagationError> {
        let duration: Duration = end_time - self.state.epoch();
        self.for_duration(duration)
    }

    /// Takes a step of exactly the provided duration
    fn final_step(&mut self, step: Duration) -> Result<(), PropagationError> {
        let (step_size, fixed_step) = (self.step_size, self.fixed_step);
        self.fixed_step = true;
        let result = self.single_step(step);
        self.step_size = step_size;
        self.fixed_step = fixed_step;
        result
    }

    /// Takes one accepted step, attempting `step` first
    fn single_step(&mut self, step: Duration) -> Result<(), PropagationError> {
        let (dt, state_vec) = self.derive(step)?;
        let next_epoch = self.state.epoch() + dt;
        if state_vec.iter().any(|x| !x.is_finite()) {
            return Err(PropagationError::NonFiniteState { epoch: next_epoch });
        }
        self.state.set(next_epoch, &state_vec);
        self.state = self
            .prop
            .dynamics
            .finally(self.state)
            .context(DynamicsSnafu)?;
        Ok(())
    }

    /// Evaluates all of the stages for a step of `step_s` seconds, returning the next state and its error estimate.
    fn stages(
        &mut self,
        state_vec: &StateVector<D>,
        step_s: f64,
    ) -> Result<(StateVector<D>, StateVector<D>), PropagationError> {
        let prop = self.prop;
        self.k[0] = prop
            .dynamics
            .eom(0.0, state_vec, &self.state)
            .context(DynamicsSnafu)?;

        let mut a_idx = 0;
        for i in 1..prop.stages {
            // c_i is the sum of the a_ij of this stage
            let mut c_i = 0.0;
            let mut w_i = StateVector::<D>::zeros();
            for k_j in &self.k[..i] {
                let a_ij = prop.a_coeffs[a_idx];
                c_i += a_ij;
                w_i += a_ij * k_j;
                a_idx += 1;
            }
            self.k[i] = prop
                .dynamics
                .eom(c_i * step_s, &(state_vec + step_s * w_i), &self.state)
                .context(DynamicsSnafu)?;
        }

        let mut next_state = state_vec.clone();
        let mut error_est = StateVector::<D>::zeros();
        for (i, k_i) in self.k.iter().enumerate() {
            let b_i = prop.b_coeffs[i];
            if !self.fixed_step {
                error_est += step_s * (b_i - prop.b_coeffs[i + prop.stages]) * k_i;
            }
            next_state += step_s * b_i * k_i;
        }
        Ok((next_state, error_est))
    }

    /// Integrates one step, shrinking it until the error is within the tolerance for adaptive options.
    ///
    /// Returns the step actually taken and the next state. A fixed step is returned as provided, so that the
    /// epoch of the next state is exact to the nanosecond.
    fn derive(&mut self, step: Duration) -> Result<(Duration, StateVector<D>), PropagationError> {
        let state_vec = self.state.to_vector();
        let mut step_s = step.to_seconds();
        let prop = self.prop;
        let opts = &prop.opts;
        let order = f64::from(prop.order);
        self.details.attempts = 1;

        loop {
            let (next_state, error_est) = self.stages(&state_vec, step_s)?;
            if self.fixed_step {
                self.details.step = step;
                return Ok((step, next_state));
            }

            let error = E::estimate(&error_est, &next_state, &state_vec);
            self.details.error = error;
            let at_min_step = step_s.abs() <= opts.min_step.to_seconds();
            let out_of_attempts = self.details.attempts >= opts.attempts;

            if error <= opts.tolerance || at_min_step || out_of_attempts {
                if out_of_attempts {
                    warn!(
                        "step accepted with an error of {error:e} after {} attempts",
                        self.details.attempts
                    );
                }
                self.details.step = step_s * Unit::Second;
                let mut next_step_s = step_s.abs();
                if error < opts.tolerance {
                    next_step_s = (STEP_SAFETY * next_step_s * (opts.tolerance / error).powf(1.0 / order))
                        .min(opts.max_step.to_seconds());
                }
                self.step_size = next_step_s * Unit::Second;
                return Ok((self.details.step, next_state));
            }

            self.details.attempts += 1;
            let proposed_s = STEP_SAFETY * step_s * (opts.tolerance / error).powf(1.0 / (order - 1.0));
            step_s = if proposed_s.abs() < opts.min_step.to_seconds() {
                opts.min_step.to_seconds() * step_s.signum()
            } else {
                proposed_s
            };
        }
    }
}
