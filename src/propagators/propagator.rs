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

use super::error_ctrl::{ErrorCtrl, RSSCartesianStep};
use super::{Dormand45, IntegrationDetails, PropInstance, PropOpts, RK};
use crate::dynamics::Dynamics;
use crate::linalg::allocator::Allocator;
use crate::linalg::{DefaultAllocator, OVector};
use crate::time::Duration;
use crate::State;

/// Integrates the spacecraft dynamics forward or backward in time with an embedded Runge Kutta method.
///
/// A propagator is immutable once built: each call to `with` creates an independent instance, so the same propagator
/// serves the truth trajectory, the measurement generation, and every evaluation of the estimator.
#[derive(Clone, Debug)]
pub struct Propagator<D: Dynamics, E: ErrorCtrl>
where
    DefaultAllocator: Allocator<<D::StateType as State>::Size>
        + Allocator<<D::StateType as State>::Size, <D::StateType as State>::Size>
        + Allocator<<D::StateType as State>::VecLength>,
{
    pub dynamics: D,
    pub opts: PropOpts<E>,
    pub(crate) order: u8,
    /// Number of evaluations of the dynamics per step
    pub(crate) stages: usize,
    pub(crate) a_coeffs: &'static [f64],
    pub(crate) b_coeffs: &'static [f64],
}

impl<D: Dynamics, E: ErrorCtrl> Propagator<D, E>
where
    DefaultAllocator: Allocator<<D::StateType as State>::Size>
        + Allocator<<D::StateType as State>::Size, <D::StateType as State>::Size>
        + Allocator<<D::StateType as State>::VecLength>,
{
    /// Builds a propagator with the coefficients of the provided method.
    pub fn new<T: RK>(dynamics: D, opts: PropOpts<E>) -> Self {
        Self {
            dynamics,
            opts,
            stages: T::STAGES,
            order: T::ORDER,
            a_coeffs: T::A_COEFFS,
            b_coeffs: T::B_COEFFS,
        }
    }

    /// Caps the step of the integrator, e.g. to sample the trajectory at least every `step`
    pub fn set_max_step(&mut self, step: Duration) {
        self.opts.set_max_step(step);
    }

    /// A Dormand Prince 4-5 propagator with custom propagator options.
    pub fn dp45(dynamics: D, opts: PropOpts<E>) -> Self {
        Self::new::<Dormand45>(dynamics, opts)
    }

    pub fn with(&self, state: D::StateType) -> PropInstance<'_, D, E> {
        let mut k = Vec::with_capacity(self.stages + 1);
        for _ in 0..self.stages {
            k.push(OVector::<f64, <D::StateType as State>::VecLength>::zeros());
        }
        PropInstance {
            state,
            prop: self,
            details: IntegrationDetails {
                step: self.opts.init_step,
                error: 0.0,
                attempts: 1,
            },
            step_size: self.opts.init_step,
            fixed_step: self.opts.fixed_step,
            k,
        }
    }
}

impl<D: Dynamics> Propagator<D, RSSCartesianStep>
where
    DefaultAllocator: Allocator<<D::StateType as State>::Size>
        + Allocator<<D::StateType as State>::Size, <D::StateType as State>::Size>
        + Allocator<<D::StateType as State>::VecLength>,
{
    /// Dormand Prince 45 with tight RSS step control, for reference trajectories.
    pub fn default(dynamics: D) -> Self {
        Self::new::<Dormand45>(dynamics, PropOpts::default())
    }
}
