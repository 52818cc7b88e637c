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

use crate::cosmic::{Cosm, SrpConfig};
use crate::dynamics::{
    Harmonics, OrbitalDynamics, PointMasses, SolarPressure, SpacecraftDynamics, ThirdBody,
};
use crate::io::gravity::{HarmonicsMem, EMBEDDED_MAX_DEGREE};
use crate::io::{ConfigError, ConfigRepr, InputOutputError, InvalidConfigSnafu};
use crate::propagators::{PositionError, PropOpts};
use crate::time::Unit;
use serde_derive::{Deserialize, Serialize};
use snafu::ensure;
use std::default::Default;
use std::fmt;
use std::sync::Arc;
use typed_builder::TypedBuilder;

/// Configuration of the adaptive Dormand Prince integrator used for the orbit determination.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, TypedBuilder)]
#[builder(doc)]
#[serde(default)]
pub struct IntegratorConfig {
    #[builder(default = 1e-3)]
    pub min_step_s: f64,
    #[builder(default = 300.0)]
    pub max_step_s: f64,
    /// Maximum position error of each step, in meters
    #[builder(default = 10.0)]
    pub position_error_m: f64,
    /// If set, the integrator takes fixed steps of this duration in seconds and the other settings are ignored
    #[builder(default, setter(strip_option))]
    pub fixed_step_s: Option<f64>,
}

impl IntegratorConfig {
    pub fn prop_opts(&self) -> PropOpts<PositionError> {
        match self.fixed_step_s {
            Some(step_s) => PropOpts::with_fixed_step_s(step_s),
            None => PropOpts::with_position_error_m(
                self.min_step_s * Unit::Second,
                self.max_step_s * Unit::Second,
                self.position_error_m,
            ),
        }
    }
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl fmt::Display for IntegratorConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.fixed_step_s {
            Some(step_s) => write!(f, "fixed step of {step_s} s"),
            None => write!(
                f,
                "adaptive step in [{}, {}] s with a position error of {} m",
                self.min_step_s, self.max_step_s, self.position_error_m
            ),
        }
    }
}

/// The force models applied on top of the central body attraction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, TypedBuilder)]
#[builder(doc)]
#[serde(default)]
pub struct ForceModelsConfig {
    #[builder(default = 21)]
    pub gravity_degree: u16,
    #[builder(default = 21)]
    pub gravity_order: u16,
    /// Normalized coefficients file (`n m C S` per line), the embedded EGM96 field (up to 21x21) is used if unset
    #[builder(default, setter(strip_option, into))]
    pub gravity_file: Option<String>,
    #[builder(default = true)]
    pub sun: bool,
    #[builder(default = true)]
    pub moon: bool,
    /// Solar radiation pressure area and coefficient of reflectivity, no SRP if unset
    #[builder(default = Some(SrpConfig::default()))]
    pub srp: Option<SrpConfig>,
}

impl ForceModelsConfig {
    /// Two body dynamics only
    pub fn two_body() -> Self {
        Self::builder()
            .gravity_degree(0)
            .gravity_order(0)
            .sun(false)
            .moon(false)
            .srp(None)
            .build()
    }

    /// Builds the spacecraft dynamics, loading the gravity field if needed.
    pub fn dynamics(&self, cosm: Arc<Cosm>) -> Result<SpacecraftDynamics, InputOutputError> {
        let mut orbital_dyn = OrbitalDynamics::two_body();

        if self.gravity_degree >= 2 {
            let stor = match &self.gravity_file {
                Some(path) => HarmonicsMem::from_file(path, self.gravity_degree, self.gravity_order)?,
                None => HarmonicsMem::egm96(self.gravity_degree, self.gravity_order)?,
            };
            orbital_dyn.add_model(Harmonics::from_stor(stor, cosm.clone()));
        }

        let mut bodies = Vec::with_capacity(2);
        if self.moon {
            bodies.push(ThirdBody::Moon);
        }
        if self.sun {
            bodies.push(ThirdBody::Sun);
        }
        if !bodies.is_empty() {
            orbital_dyn.add_model(PointMasses::new(&bodies, cosm.clone()));
        }

        let mut sc_dyn = SpacecraftDynamics::new(orbital_dyn);
        if self.srp.is_some() {
            sc_dyn.add_model(SolarPressure::new(cosm));
        }

        debug!("OD dynamics: {sc_dyn}");
        Ok(sc_dyn)
    }
}

impl Default for ForceModelsConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Configuration of the Gauss-Newton batch least squares estimator.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, TypedBuilder)]
#[builder(doc)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Maximum change of any normalized parameter between two evaluations for the solution to be converged
    #[builder(default = 1e-3)]
    pub convergence_threshold: f64,
    #[builder(default = 20)]
    pub max_iterations: usize,
    #[builder(default = 25)]
    pub max_evaluations: usize,
    /// Diagonal elements of the R factor of the QR decomposition below this value make the system singular
    #[builder(default = 1e-11)]
    pub singularity_threshold: f64,
    /// Position scale of the orbital parameters, in meters
    #[builder(default = 1.0)]
    pub position_scale_m: f64,
    /// Also estimate the coefficient of reflectivity
    #[builder(default = false)]
    pub estimate_cr: bool,
    /// Also estimate the Earth gravitational parameter
    #[builder(default = false)]
    pub estimate_mu: bool,
    /// Also estimate a right ascension and a declination bias per station
    #[builder(default = false)]
    pub estimate_station_biases: bool,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl fmt::Display for EstimatorConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Gauss-Newton until {:e} (max {} iterations, {} evaluations), QR singular below {:e}",
            self.convergence_threshold,
            self.max_iterations,
            self.max_evaluations,
            self.singularity_threshold
        )
    }
}

/// All of the settings of an orbit determination.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, TypedBuilder)]
#[builder(doc)]
#[serde(default)]
pub struct ODSettings {
    #[builder(default)]
    pub integrator: IntegratorConfig,
    #[builder(default)]
    pub force_models: ForceModelsConfig,
    #[builder(default)]
    pub estimator: EstimatorConfig,
}

impl ODSettings {
    /// Checks that the settings can drive an orbit determination.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let integ = &self.integrator;
        match integ.fixed_step_s {
            Some(step_s) => ensure!(
                step_s.is_finite() && step_s > 0.0,
                InvalidConfigSnafu {
                    msg: format!("fixed step must be positive but is {step_s} s")
                }
            ),
            None => {
                ensure!(
                    integ.min_step_s > 0.0 && integ.min_step_s <= integ.max_step_s,
                    InvalidConfigSnafu {
                        msg: format!(
                            "step bounds [{}, {}] s are invalid",
                            integ.min_step_s, integ.max_step_s
                        )
                    }
                );
                ensure!(
                    integ.position_error_m > 0.0,
                    InvalidConfigSnafu {
                        msg: format!("position error of {} m is not positive", integ.position_error_m)
                    }
                );
            }
        }

        let fm = &self.force_models;
        ensure!(
            fm.gravity_order <= fm.gravity_degree,
            InvalidConfigSnafu {
                msg: format!(
                    "gravity order {} exceeds the degree {}",
                    fm.gravity_order, fm.gravity_degree
                )
            }
        );
        if fm.gravity_file.is_none() {
            ensure!(
                fm.gravity_degree <= EMBEDDED_MAX_DEGREE,
                InvalidConfigSnafu {
                    msg: format!(
                        "embedded EGM96 field stops at degree {EMBEDDED_MAX_DEGREE} but {} was requested without a gravity file",
                        fm.gravity_degree
                    )
                }
            );
        }
        if let Some(srp) = fm.srp {
            ensure!(
                srp.area_m2 >= 0.0 && srp.cr >= 0.0,
                InvalidConfigSnafu {
                    msg: format!("SRP area and Cr must not be negative: {srp:?}")
                }
            );
        }

        let est = &self.estimator;
        ensure!(
            est.convergence_threshold > 0.0,
            InvalidConfigSnafu {
                msg: "convergence threshold must be positive"
            }
        );
        ensure!(
            est.max_iterations > 0 && est.max_evaluations > 0,
            InvalidConfigSnafu {
                msg: "at least one iteration and one evaluation are needed"
            }
        );
        ensure!(
            est.singularity_threshold >= 0.0,
            InvalidConfigSnafu {
                msg: "singularity threshold must not be negative"
            }
        );
        ensure!(
            est.position_scale_m > 0.0,
            InvalidConfigSnafu {
                msg: "position scale must be positive"
            }
        );
        Ok(())
    }
}

impl ConfigRepr for ODSettings {}
