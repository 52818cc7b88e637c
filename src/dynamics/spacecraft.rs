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

use super::orbital::{assemble_jacobian, OrbitalDynamics};
use super::{stm_derivative, Dynamics, DynamicsError, ForceModel};
use crate::cosmic::Spacecraft;
use crate::linalg::{Const, Matrix6, OVector, Vector6};
use crate::State;
use std::fmt;
use std::sync::Arc;

/// A generic spacecraft dynamics: the orbital dynamics plus the force models, whose forces are divided by the spacecraft mass.
#[derive(Clone)]
pub struct SpacecraftDynamics {
    pub orbital_dyn: OrbitalDynamics,
    pub force_models: Vec<Arc<dyn ForceModel>>,
}

impl SpacecraftDynamics {
    /// Initialize a spacecraft dynamics with the provided orbital dynamics and no force model.
    pub fn new(orbital_dyn: OrbitalDynamics) -> Self {
        Self {
            orbital_dyn,
            force_models: Vec::new(),
        }
    }

    /// Initialize the spacecraft dynamics with a single force model
    pub fn from_model(orbital_dyn: OrbitalDynamics, force_model: Arc<dyn ForceModel>) -> Self {
        Self::from_models(orbital_dyn, vec![force_model])
    }

    /// Initialize the spacecraft dynamics with the provided force models
    pub fn from_models(orbital_dyn: OrbitalDynamics, force_models: Vec<Arc<dyn ForceModel>>) -> Self {
        Self {
            orbital_dyn,
            force_models,
        }
    }

    /// Add a force model to these dynamics
    pub fn add_model(&mut self, force_model: Arc<dyn ForceModel>) {
        self.force_models.push(force_model);
    }

    fn check_mass(&self, sc: &Spacecraft) -> Result<(), DynamicsError> {
        if !self.force_models.is_empty() && sc.mass_kg <= 0.0 {
            return Err(DynamicsError::NonPositiveMass {
                model: format!("{self}"),
                mass_kg: sc.mass_kg,
            });
        }
        Ok(())
    }
}

impl fmt::Display for SpacecraftDynamics {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let force_models: Vec<String> = self.force_models.iter().map(|x| format!("{x}")).collect();
        write!(
            f,
            "Spacecraft dynamics (with force models: {}) {}",
            force_models.join("; "),
            self.orbital_dyn
        )
    }
}

impl Dynamics for SpacecraftDynamics {
    type StateType = Spacecraft;

    fn eom(
        &self,
        delta_t_s: f64,
        state: &OVector<f64, Const<42>>,
        ctx: &Spacecraft,
    ) -> Result<OVector<f64, Const<42>>, DynamicsError> {
        let osc_sc = ctx.set_with_delta_seconds(delta_t_s, state);

        if ctx.orbit.stm.is_some() {
            let (d_x, grad) = self.dual_eom(delta_t_s, &osc_sc)?;
            return Ok(stm_derivative(&d_x, &grad, state));
        }

        self.check_mass(&osc_sc)?;
        let mut acc = self.orbital_dyn.acceleration(&osc_sc.orbit)?;
        for model in &self.force_models {
            acc += model.eom(&osc_sc)? / osc_sc.mass_kg;
        }

        if acc.iter().any(|x| !x.is_finite()) {
            return Err(DynamicsError::NonFiniteAcceleration {
                model: format!("{self}"),
                epoch: format!("{}", osc_sc.epoch()),
            });
        }

        let mut d_x = OVector::<f64, Const<42>>::zeros();
        d_x.fixed_rows_mut::<3>(0).copy_from(&osc_sc.orbit.velocity_km_s);
        d_x.fixed_rows_mut::<3>(3).copy_from(&acc);
        Ok(d_x)
    }

    fn dual_eom(
        &self,
        _delta_t_s: f64,
        ctx: &Spacecraft,
    ) -> Result<(Vector6<f64>, Matrix6<f64>), DynamicsError> {
        self.check_mass(ctx)?;
        let (mut acc, mut acc_grad) = self.orbital_dyn.dual_acceleration(&ctx.orbit)?;

        for model in &self.force_models {
            let (model_frc, model_grad) = model.dual_eom(ctx)?;
            acc += model_frc / ctx.mass_kg;
            acc_grad += model_grad / ctx.mass_kg;
        }

        if acc.iter().chain(acc_grad.iter()).any(|x| !x.is_finite()) {
            return Err(DynamicsError::NonFiniteAcceleration {
                model: format!("{self}"),
                epoch: format!("{}", ctx.epoch()),
            });
        }

        Ok(assemble_jacobian(&ctx.orbit.velocity_km_s, &acc, &acc_grad))
    }
}
