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

use super::{stm_derivative, AccelModel, Dynamics, DynamicsAstroSnafu, DynamicsError};
use crate::cosmic::{Cosm, Orbit};
use crate::linalg::{Const, Matrix3, Matrix6, OVector, Vector3, Vector6, U3};
use crate::State;
use hyperdual::linalg::norm;
use hyperdual::{extract_jacobian_and_result, hyperspace_from_vector, Float, OHyperdual};
use snafu::ResultExt;
use std::fmt;
use std::sync::Arc;

pub use super::sph_harmonics::Harmonics;

/// `OrbitalDynamics` provides the equations of motion of the central body attraction, plus any additional acceleration model.
///
/// When the orbit carries an STM, the STM derivative is computed from the jacobian of the dynamics.
#[derive(Clone)]
pub struct OrbitalDynamics {
    pub accel_models: Vec<Arc<dyn AccelModel>>,
}

impl OrbitalDynamics {
    /// Initializes an OrbitalDynamics which only models the attraction of the central body.
    pub fn two_body() -> Self {
        Self::new(vec![])
    }

    /// Initialize point mass dynamics with the provided third bodies
    pub fn point_masses(bodies: &[ThirdBody], cosm: Arc<Cosm>) -> Self {
        Self::new(vec![PointMasses::new(bodies, cosm)])
    }

    /// Initialize orbital dynamics with a list of acceleration models
    pub fn new(accel_models: Vec<Arc<dyn AccelModel>>) -> Self {
        Self { accel_models }
    }

    /// Initialize new orbital mechanics with the provided model.
    /// **Note:** Orbital dynamics _always_ include two body dynamics, these cannot be turned off.
    pub fn from_model(accel_model: Arc<dyn AccelModel>) -> Self {
        Self::new(vec![accel_model])
    }

    /// Add a model to the currently defined orbital dynamics
    pub fn add_model(&mut self, accel_model: Arc<dyn AccelModel>) {
        self.accel_models.push(accel_model);
    }

    /// Total acceleration of this orbit, excluding any force applied on a spacecraft
    pub(crate) fn acceleration(&self, osc: &Orbit) -> Result<Vector3<f64>, DynamicsError> {
        let mut acc = (-osc.frame.mu_km3_s2 / osc.rmag_km().powi(3)) * osc.radius_km;
        for model in &self.accel_models {
            acc += model.eom(osc)?;
        }
        Ok(acc)
    }

    /// Acceleration and its jacobian with respect to the position
    pub(crate) fn dual_acceleration(
        &self,
        osc: &Orbit,
    ) -> Result<(Vector3<f64>, Matrix3<f64>), DynamicsError> {
        let radius: Vector3<OHyperdual<f64, Const<4>>> = hyperspace_from_vector(&osc.radius_km);
        let rmag = norm(&radius);
        let body_acceleration =
            radius * (OHyperdual::<f64, Const<4>>::from_real(-osc.frame.mu_km3_s2) / rmag.powi(3));

        let (mut acc, mut grad) =
            extract_jacobian_and_result::<_, U3, U3, _>(&body_acceleration);

        for model in &self.accel_models {
            let (model_acc, model_grad) = model.dual_eom(osc)?;
            acc += model_acc;
            grad += model_grad;
        }

        Ok((acc, grad))
    }
}

impl fmt::Display for OrbitalDynamics {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let models: Vec<String> = self.accel_models.iter().map(|x| format!("{x}")).collect();
        write!(f, "Orbital dynamics: two body + {}", models.join("; "))
    }
}

impl Dynamics for OrbitalDynamics {
    type StateType = Orbit;

    fn eom(
        &self,
        delta_t_s: f64,
        state: &OVector<f64, Const<42>>,
        ctx: &Orbit,
    ) -> Result<OVector<f64, Const<42>>, DynamicsError> {
        let osc = ctx.set_with_delta_seconds(delta_t_s, state);
        if ctx.stm.is_some() {
            let (d_x, grad) = self.dual_eom(delta_t_s, &osc)?;
            Ok(stm_derivative(&d_x, &grad, state))
        } else {
            // Still return something of size 42, but the STM will be zeros.
            let acc = self.acceleration(&osc)?;
            let mut d_x = OVector::<f64, Const<42>>::zeros();
            d_x.fixed_rows_mut::<3>(0).copy_from(&osc.velocity_km_s);
            d_x.fixed_rows_mut::<3>(3).copy_from(&acc);
            Ok(d_x)
        }
    }

    fn dual_eom(
        &self,
        _delta_t_s: f64,
        osc: &Orbit,
    ) -> Result<(Vector6<f64>, Matrix6<f64>), DynamicsError> {
        let (acc, acc_grad) = self.dual_acceleration(osc)?;
        Ok(assemble_jacobian(&osc.velocity_km_s, &acc, &acc_grad))
    }
}

/// Builds the state derivative and its jacobian from the velocity, the acceleration and the acceleration partials.
///
/// The velocity partials of the acceleration are zero for every model supported here.
pub(crate) fn assemble_jacobian(
    velocity: &Vector3<f64>,
    acc: &Vector3<f64>,
    acc_grad: &Matrix3<f64>,
) -> (Vector6<f64>, Matrix6<f64>) {
    let mut fx = Vector6::zeros();
    fx.fixed_rows_mut::<3>(0).copy_from(velocity);
    fx.fixed_rows_mut::<3>(3).copy_from(acc);

    let mut grad = Matrix6::zeros();
    grad.fixed_view_mut::<3, 3>(0, 3).copy_from(&Matrix3::identity());
    grad.fixed_view_mut::<3, 3>(3, 0).copy_from(acc_grad);
    (fx, grad)
}

/// Third bodies whose point mass attraction can be modeled
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ThirdBody {
    Sun,
    Moon,
}

impl ThirdBody {
    /// Gravitational parameter of this body, in km^3/s^2
    pub fn gm_km3_s2(&self, cosm: &Cosm) -> f64 {
        match self {
            Self::Sun => cosm.sun_gm_km3_s2,
            Self::Moon => cosm.moon_gm_km3_s2,
        }
    }

    /// Position of this body with respect to the Earth, in the inertial frame
    pub fn position_km(
        &self,
        cosm: &Cosm,
        epoch: crate::time::Epoch,
    ) -> Result<Vector3<f64>, DynamicsError> {
        let position = match self {
            Self::Sun => cosm.sun_position_km(epoch),
            Self::Moon => cosm.moon_position_km(epoch),
        };
        position.context(DynamicsAstroSnafu {
            model: "point masses",
        })
    }
}

impl fmt::Display for ThirdBody {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Sun => write!(f, "Sun"),
            Self::Moon => write!(f, "Moon"),
        }
    }
}

/// PointMasses model: the differential attraction of third bodies on an Earth orbiter
pub struct PointMasses {
    pub bodies: Vec<ThirdBody>,
    pub cosm: Arc<Cosm>,
}

impl PointMasses {
    /// Initializes the multibody point mass dynamics with the provided list of bodies
    pub fn new(bodies: &[ThirdBody], cosm: Arc<Cosm>) -> Arc<Self> {
        Arc::new(Self {
            bodies: bodies.to_vec(),
            cosm,
        })
    }
}

impl fmt::Display for PointMasses {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let names: Vec<String> = self.bodies.iter().map(|b| format!("{b}")).collect();
        write!(f, "Point masses of {}", names.join(", "))
    }
}

impl AccelModel for PointMasses {
    fn eom(&self, osc: &Orbit) -> Result<Vector3<f64>, DynamicsError> {
        let mut d_x = Vector3::zeros();
        for third_body in &self.bodies {
            let gm = third_body.gm_km3_s2(&self.cosm);
            // Third body as seen from the Earth
            let r_ij = third_body.position_km(&self.cosm, osc.epoch)?;
            let r_ij3 = r_ij.norm().powi(3);
            // Spacecraft as seen from the third body
            let r_j = osc.radius_km - r_ij;
            let r_j3 = r_j.norm().powi(3);
            d_x += -gm * (r_j / r_j3 + r_ij / r_ij3);
        }
        Ok(d_x)
    }

    fn dual_eom(&self, osc: &Orbit) -> Result<(Vector3<f64>, Matrix3<f64>), DynamicsError> {
        let radius: Vector3<OHyperdual<f64, Const<4>>> = hyperspace_from_vector(&osc.radius_km);

        let mut fx = Vector3::zeros();
        let mut grad = Matrix3::zeros();

        for third_body in &self.bodies {
            let gm_d = OHyperdual::<f64, Const<4>>::from_real(-third_body.gm_km3_s2(&self.cosm));
            let r_ij_real = third_body.position_km(&self.cosm, osc.epoch)?;
            // Constant with respect to the spacecraft position
            let r_ij: Vector3<OHyperdual<f64, Const<4>>> =
                Vector3::from_iterator(r_ij_real.iter().map(|x| OHyperdual::from_real(*x)));
            let r_ij3 = norm(&r_ij).powi(3) / gm_d;
            let r_j = radius - r_ij;
            let r_j3 = norm(&r_j).powi(3) / gm_d;
            let third_body_acc_d = r_j / r_j3 + r_ij / r_ij3;

            let (fxp, gradp) = extract_jacobian_and_result::<_, U3, U3, _>(&third_body_acc_d);
            fx += fxp;
            grad += gradp;
        }

        Ok((fx, grad))
    }
}

#[cfg(test)]
mod ut_orbital {
    use super::*;
    use crate::time::Epoch;
    use approx::assert_abs_diff_eq;

    fn geo_orbit() -> Orbit {
        let cosm = Cosm::iers2010();
        Orbit::cartesian(
            -40_623.488_414_623_4,
            -11_310.925_100_635_84,
            -107.422_487_901_602_3,
            0.824_302_009_930_277_4,
            -2.957_143_748_313_477,
            -0.169_257_415_458_910_4,
            Epoch::from_gregorian_utc_at_midnight(2023, 3, 18),
            cosm.earth_gcrf(),
        )
    }

    #[test]
    fn two_body_jacobian_matches_finite_differences() {
        let orbit = geo_orbit();
        let dynamics = OrbitalDynamics::two_body();
        let (acc, grad) = dynamics.dual_acceleration(&orbit).unwrap();
        assert_abs_diff_eq!(acc, dynamics.acceleration(&orbit).unwrap(), epsilon = 1e-15);

        let step_km = 1e-2;
        for j in 0..3 {
            let mut plus = orbit;
            plus.radius_km[j] += step_km;
            let mut minus = orbit;
            minus.radius_km[j] -= step_km;
            let col = (dynamics.acceleration(&plus).unwrap()
                - dynamics.acceleration(&minus).unwrap())
                / (2.0 * step_km);
            for i in 0..3 {
                assert_abs_diff_eq!(grad[(i, j)], col[i], epsilon = 1e-14);
            }
        }
    }

    #[test]
    fn point_masses_jacobian_matches_finite_differences() {
        let orbit = geo_orbit();
        let pm = PointMasses::new(&[ThirdBody::Sun, ThirdBody::Moon], Cosm::iers2010());
        let (acc, grad) = pm.dual_eom(&orbit).unwrap();
        let acc_real = pm.eom(&orbit).unwrap();
        assert_abs_diff_eq!(acc, acc_real, epsilon = 1e-16);
        // Lunisolar perturbation at GEO is about 1e-8 km/s^2
        assert!(acc_real.norm() > 1e-9 && acc_real.norm() < 1e-7);

        let step_km = 1.0;
        for j in 0..3 {
            let mut plus = orbit;
            plus.radius_km[j] += step_km;
            let mut minus = orbit;
            minus.radius_km[j] -= step_km;
            let col = (pm.eom(&plus).unwrap() - pm.eom(&minus).unwrap()) / (2.0 * step_km);
            for i in 0..3 {
                assert_abs_diff_eq!(grad[(i, j)], col[i], epsilon = 1e-18);
            }
        }
    }

    #[test]
    fn stm_derivative_layout() {
        let orbit = geo_orbit().with_stm();
        let dynamics = OrbitalDynamics::two_body();
        let d_x = dynamics.eom(0.0, &orbit.to_vector(), &orbit).unwrap();
        let (_, grad) = dynamics.dual_eom(0.0, &orbit).unwrap();
        // With Φ = I, the STM derivative is the jacobian itself
        let stm_dt = Matrix6::from_column_slice(&d_x.as_slice()[6..]);
        assert_abs_diff_eq!(stm_dt, grad, epsilon = 1e-18);
        assert_abs_diff_eq!(d_x[0], orbit.velocity_km_s[0], epsilon = 1e-15);
    }
}
