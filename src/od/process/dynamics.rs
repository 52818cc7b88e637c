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

use super::conf::ODSettings;
use crate::cosmic::{Cosm, Orbit, Spacecraft};
use crate::dynamics::SpacecraftDynamics;
use crate::od::drivers::{ParameterDrivers, ParameterDriversList, CR_DRIVER, MU_DRIVER, ORBITAL_DRIVERS};
use crate::od::{ODError, PropagationFailureSnafu};
use crate::propagators::{PositionError, PropInstance, Propagator};
use crate::time::Epoch;
use crate::State;
use snafu::ResultExt;
use std::fmt;
use std::sync::Arc;

/// The dynamics of an orbit determination: a reference spacecraft state and the propagator of its force models.
///
/// The reference state is the point around which the orbital drivers are normalized. Building a propagator from
/// a set of drivers is deterministic: identical normalized drivers always yield the same trial state.
#[derive(Clone)]
pub struct DynamicsConfig {
    reference: Spacecraft,
    prop: Propagator<SpacecraftDynamics, PositionError>,
    cosm: Arc<Cosm>,
}

impl DynamicsConfig {
    /// Builds the dynamics from the OD settings. The SRP configuration of the settings, if any, replaces that of `initial`.
    pub fn new(initial: Spacecraft, settings: &ODSettings, cosm: Arc<Cosm>) -> Result<Self, ODError> {
        let dynamics = settings.force_models.dynamics(cosm.clone())?;
        let prop = Propagator::dp45(dynamics, settings.integrator.prop_opts());

        let mut reference = initial;
        reference.unset_stm();
        if let Some(srp) = settings.force_models.srp {
            reference = reference.with_srp(srp.area_m2, srp.cr);
        }

        Ok(Self::from_propagator(reference, prop, cosm))
    }

    /// Uses a propagator that was already set up
    pub fn from_propagator(
        reference: Spacecraft,
        prop: Propagator<SpacecraftDynamics, PositionError>,
        cosm: Arc<Cosm>,
    ) -> Self {
        let mut reference = reference;
        reference.unset_stm();
        Self {
            reference,
            prop,
            cosm,
        }
    }

    pub fn reference(&self) -> Spacecraft {
        self.reference
    }

    pub fn epoch(&self) -> Epoch {
        self.reference.orbit.epoch
    }

    pub fn cosm(&self) -> &Arc<Cosm> {
        &self.cosm
    }

    pub fn propagator(&self) -> &Propagator<SpacecraftDynamics, PositionError> {
        &self.prop
    }

    /// Cartesian drivers of the reference orbit, all selected, with a position scale in km
    pub fn orbital_drivers(&self, position_scale_km: f64) -> ParameterDriversList {
        ParameterDriversList::orbital(&self.reference.orbit, position_scale_km)
    }

    /// Drivers of the coefficient of reflectivity and of the gravitational parameter, not selected
    pub fn propagator_drivers(&self) -> ParameterDriversList {
        ParameterDriversList::propagator(&self.reference)
    }

    /// Maps the physical values of the drivers onto a spacecraft state at the reference epoch.
    ///
    /// Drivers which are not part of the lists keep the value of the reference state.
    pub fn trial_state(&self, drivers: &ParameterDrivers) -> Spacecraft {
        let mut state = self.reference.orbit.to_cartesian_vec();
        for (i, name) in ORBITAL_DRIVERS.iter().enumerate() {
            if let Some(value) = drivers.orbital.value_of(name) {
                state[i] = value;
            }
        }

        let mut frame = self.reference.orbit.frame;
        if let Some(mu_km3_s2) = drivers.propagator.value_of(MU_DRIVER) {
            frame = frame.with_mu_km3_s2(mu_km3_s2);
        }

        let mut trial = self
            .reference
            .with_orbit(Orbit::cartesian_vec(&state, self.epoch(), frame));
        if let Some(cr) = drivers.propagator.value_of(CR_DRIVER) {
            trial = trial.with_cr(cr);
        }
        trial
    }

    /// Builds a propagator instance from the trial state of these drivers, with its STM set to identity.
    pub fn build(&self, drivers: &ParameterDrivers) -> PropInstance<'_, SpacecraftDynamics, PositionError> {
        self.prop.with(self.trial_state(drivers).with_stm())
    }

    /// Propagates the reference state to the target epoch and uses the result as the new reference.
    ///
    /// Nothing happens if the reference is already at the target epoch.
    pub fn shift_epoch(&mut self, target: Epoch) -> Result<(), ODError> {
        if self.epoch() == target {
            return Ok(());
        }

        let from = self.epoch();
        let mut shifted = self
            .prop
            .with(self.reference)
            .until_epoch(target)
            .context(PropagationFailureSnafu {
                action: format!("shifting the reference state from {from} to {target}"),
            })?;
        shifted.unset_stm();

        debug!("Reference state shifted from {from} to {target}");
        self.reference = shifted;
        Ok(())
    }
}

impl fmt::Display for DynamicsConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} with {}", self.reference, self.prop.dynamics)
    }
}
