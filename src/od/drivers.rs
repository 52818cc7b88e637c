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

use crate::cosmic::{Orbit, Spacecraft};
use crate::linalg::{DVector, Vector2};
use crate::od::GroundStation;
use std::fmt;

/// Name of the propagator driver of the coefficient of reflectivity
pub const CR_DRIVER: &str = "reflection coefficient";
/// Name of the propagator driver of the Earth gravitational parameter
pub const MU_DRIVER: &str = "central attraction coefficient";
/// Scale of the gravitational parameter driver, relative to its reference value
const MU_RELATIVE_SCALE: f64 = 1e-5;
/// Names of the Cartesian orbital drivers, in the order of the state vector
pub const ORBITAL_DRIVERS: [&str; 6] = ["x", "y", "z", "vx", "vy", "vz"];

/// A named scalar estimation parameter.
///
/// The optimizer works on the normalized value, (value - reference) / scale, so that all parameters
/// have comparable magnitudes. Physical values are clamped to the [min, max] bounds.
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterDriver {
    pub name: String,
    pub reference: f64,
    pub value: f64,
    pub scale: f64,
    pub min: f64,
    pub max: f64,
    /// Whether this parameter is estimated, or kept fixed to its value
    pub selected: bool,
}

impl ParameterDriver {
    /// Initializes an unbounded driver, not selected, whose value is the reference value.
    pub fn new(name: &str, reference: f64, scale: f64) -> Self {
        Self {
            name: name.to_string(),
            reference,
            value: reference,
            scale,
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
            selected: false,
        }
    }

    pub fn with_selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }

    pub fn with_bounds(mut self, min: f64, max: f64) -> Self {
        self.min = min;
        self.max = max;
        self.set_value(self.value);
        self
    }

    /// Sets the physical value, clamped to the bounds of this driver
    pub fn set_value(&mut self, value: f64) {
        self.value = value.clamp(self.min, self.max);
    }

    pub fn normalized_value(&self) -> f64 {
        (self.value - self.reference) / self.scale
    }

    pub fn set_normalized_value(&mut self, normalized: f64) {
        self.set_value(self.reference + self.scale * normalized);
    }
}

impl fmt::Display for ParameterDriver {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} = {} (ref. {}, scale {:e}{})",
            self.name,
            self.value,
            self.reference,
            self.scale,
            if self.selected { ", estimated" } else { "" }
        )
    }
}

/// An ordered list of parameter drivers.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParameterDriversList {
    pub drivers: Vec<ParameterDriver>,
}

impl ParameterDriversList {
    /// Cartesian orbital drivers, all selected.
    ///
    /// The position scale is provided in km and the velocity scale is derived from it as μ·ΔP/(|v|·|r|²),
    /// i.e. the velocity change of a Keplerian orbit whose position changes by ΔP.
    pub fn orbital(orbit: &Orbit, position_scale_km: f64) -> Self {
        let mut velocity_scale_km_s = orbit.frame.mu_km3_s2 * position_scale_km
            / (orbit.vmag_km_s() * orbit.rmag_km().powi(2));
        if !velocity_scale_km_s.is_finite() || velocity_scale_km_s <= 0.0 {
            velocity_scale_km_s = position_scale_km;
        }
        let state = orbit.to_cartesian_vec();
        let drivers = ORBITAL_DRIVERS
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let scale = if i < 3 {
                    position_scale_km
                } else {
                    velocity_scale_km_s
                };
                ParameterDriver::new(name, state[i], scale).with_selected(true)
            })
            .collect();
        Self { drivers }
    }

    /// Drivers of the coefficient of reflectivity and of the gravitational parameter, not selected.
    pub fn propagator(sc: &Spacecraft) -> Self {
        Self {
            drivers: vec![
                ParameterDriver::new(CR_DRIVER, sc.srp.cr, 1.0).with_bounds(0.0, 2.0),
                ParameterDriver::new(
                    MU_DRIVER,
                    sc.orbit.frame.mu_km3_s2,
                    sc.orbit.frame.mu_km3_s2 * MU_RELATIVE_SCALE,
                )
                .with_bounds(0.0, f64::INFINITY),
            ],
        }
    }

    /// Right ascension and declination bias drivers of each station (in radians, zero by default), not selected.
    pub fn measurements<'a, I>(stations: I) -> Self
    where
        I: IntoIterator<Item = &'a GroundStation>,
    {
        let mut list = Self::default();
        for station in stations {
            let ra_name = Self::ra_bias_name(station);
            if list.find(&ra_name).is_none() {
                list.drivers
                    .push(ParameterDriver::new(&ra_name, 0.0, 1e-6).with_bounds(-0.1, 0.1));
                list.drivers.push(
                    ParameterDriver::new(&Self::dec_bias_name(station), 0.0, 1e-6)
                        .with_bounds(-0.1, 0.1),
                );
            }
        }
        list
    }

    pub fn ra_bias_name(station: &GroundStation) -> String {
        format!("{} ra bias", station.name)
    }

    pub fn dec_bias_name(station: &GroundStation) -> String {
        format!("{} dec bias", station.name)
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }

    pub fn find(&self, name: &str) -> Option<&ParameterDriver> {
        self.drivers.iter().find(|d| d.name == name)
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut ParameterDriver> {
        self.drivers.iter_mut().find(|d| d.name == name)
    }

    /// Current value of the named driver, if it exists
    pub fn value_of(&self, name: &str) -> Option<f64> {
        self.find(name).map(|d| d.value)
    }

    /// Selects (or deselects) the named driver, returns false if it does not exist
    pub fn select(&mut self, name: &str, selected: bool) -> bool {
        match self.find_mut(name) {
            Some(driver) => {
                driver.selected = selected;
                true
            }
            None => false,
        }
    }

    pub fn selected(&self) -> impl Iterator<Item = &ParameterDriver> {
        self.drivers.iter().filter(|d| d.selected)
    }

    pub fn selected_mut(&mut self) -> impl Iterator<Item = &mut ParameterDriver> {
        self.drivers.iter_mut().filter(|d| d.selected)
    }

    pub fn nb_selected(&self) -> usize {
        self.selected().count()
    }
}

/// The three lists of drivers of an estimation: orbital, propagator and measurement parameters.
///
/// The selected drivers, in this order, form the normalized parameter vector of the optimizer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParameterDrivers {
    pub orbital: ParameterDriversList,
    pub propagator: ParameterDriversList,
    pub measurement: ParameterDriversList,
}

impl ParameterDrivers {
    fn lists(&self) -> [&ParameterDriversList; 3] {
        [&self.orbital, &self.propagator, &self.measurement]
    }

    fn selected(&self) -> impl Iterator<Item = &ParameterDriver> {
        self.lists().into_iter().flat_map(|list| list.selected())
    }

    pub fn nb_selected(&self) -> usize {
        self.selected().count()
    }

    pub fn selected_names(&self) -> Vec<String> {
        self.selected().map(|d| d.name.clone()).collect()
    }

    pub fn selected_values(&self) -> Vec<f64> {
        self.selected().map(|d| d.value).collect()
    }

    pub fn normalized(&self) -> DVector<f64> {
        DVector::from_iterator(self.nb_selected(), self.selected().map(|d| d.normalized_value()))
    }

    pub fn scales(&self) -> DVector<f64> {
        DVector::from_iterator(self.nb_selected(), self.selected().map(|d| d.scale))
    }

    /// Sets the normalized values of the selected drivers, in order.
    pub fn set_normalized(&mut self, normalized: &DVector<f64>) {
        let selected = self
            .orbital
            .selected_mut()
            .chain(self.propagator.selected_mut())
            .chain(self.measurement.selected_mut());
        for (driver, value) in selected.zip(normalized.iter()) {
            driver.set_normalized_value(*value);
        }
    }

    /// Right ascension and declination biases of the provided station, in radians
    pub fn station_bias(&self, station: &GroundStation) -> Vector2<f64> {
        Vector2::new(
            self.measurement
                .value_of(&ParameterDriversList::ra_bias_name(station))
                .unwrap_or(0.0),
            self.measurement
                .value_of(&ParameterDriversList::dec_bias_name(station))
                .unwrap_or(0.0),
        )
    }
}
