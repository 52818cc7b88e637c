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

use super::{DynamicsAstroSnafu, DynamicsError, ForceModel};
use crate::cosmic::{Cosm, Orbit, Spacecraft, AU, SPEED_OF_LIGHT_KM_S};
use crate::linalg::{Const, Matrix3, Vector3, U3};
use hyperdual::linalg::norm;
use hyperdual::{extract_jacobian_and_result, hyperspace_from_vector, Float, OHyperdual};
use snafu::ResultExt;
use std::fmt;
use std::sync::Arc;

/// Solar flux at one astronomical unit, in W/m^2
pub const SOLAR_FLUX_W_M2: f64 = 1367.0;

/// Computation of solar radiation pressure with a cannonball model and a cylindrical Earth shadow.
#[derive(Clone)]
pub struct SolarPressure {
    /// solar flux at 1 AU, in W/m^2
    pub phi: f64,
    pub cosm: Arc<Cosm>,
}

impl SolarPressure {
    /// Will set the solar flux at 1 AU to: Phi = 1367.0
    pub fn new(cosm: Arc<Cosm>) -> Arc<Self> {
        Arc::new(Self::default_raw(cosm))
    }

    /// Solar radiation pressure without the Arc, with the default solar flux
    pub fn default_raw(cosm: Arc<Cosm>) -> Self {
        Self {
            phi: SOLAR_FLUX_W_M2,
            cosm,
        }
    }

    /// Radiation pressure at 1 AU, in N/m^2
    pub fn pressure_n_m2(&self) -> f64 {
        self.phi / (SPEED_OF_LIGHT_KM_S * 1e3)
    }

    /// Returns 1.0 if the orbit sees the Sun and 0.0 if it is in the cylindrical shadow of the Earth.
    pub fn illumination(&self, orbit: &Orbit) -> Result<f64, DynamicsError> {
        let r_sun = self.sun_position_km(orbit)?;
        Ok(self.cylindrical_shadow(orbit, &r_sun))
    }

    fn sun_position_km(&self, orbit: &Orbit) -> Result<Vector3<f64>, DynamicsError> {
        self.cosm
            .sun_position_km(orbit.epoch)
            .context(DynamicsAstroSnafu { model: "SRP" })
    }

    fn cylindrical_shadow(&self, orbit: &Orbit, r_sun: &Vector3<f64>) -> f64 {
        let sun_dir = r_sun.normalize();
        let proj = orbit.radius_km.dot(&sun_dir);
        if proj >= 0.0 {
            return 1.0;
        }
        let perp = orbit.radius_km - proj * sun_dir;
        if perp.norm() < self.cosm.earth_equatorial_radius_km {
            0.0
        } else {
            1.0
        }
    }

    /// Product of all the constants of the force, in kg km^3/s^2: the force is this factor times d/|d|^3
    fn factor(&self, ctx: &Spacecraft, r_sun: &Vector3<f64>) -> f64 {
        // The flux is in N/m^2 = kg/(m s^2), converted to kg km/s^2 per m^2 of area
        self.cylindrical_shadow(&ctx.orbit, r_sun)
            * self.pressure_n_m2()
            * ctx.srp.cr
            * ctx.srp.area_m2
            * AU.powi(2)
            * 1e-3
    }
}

impl ForceModel for SolarPressure {
    fn eom(&self, ctx: &Spacecraft) -> Result<Vector3<f64>, DynamicsError> {
        // Vector from the Sun to the spacecraft
        let r_sun = self.sun_position_km(&ctx.orbit)?;
        let r_sun_sc = ctx.orbit.radius_km - r_sun;
        let dist = r_sun_sc.norm();
        Ok(self.factor(ctx, &r_sun) * r_sun_sc / dist.powi(3))
    }

    fn dual_eom(&self, ctx: &Spacecraft) -> Result<(Vector3<f64>, Matrix3<f64>), DynamicsError> {
        let radius: Vector3<OHyperdual<f64, Const<4>>> =
            hyperspace_from_vector(&ctx.orbit.radius_km);
        let r_sun_real = self.sun_position_km(&ctx.orbit)?;
        let r_sun: Vector3<OHyperdual<f64, Const<4>>> =
            Vector3::from_iterator(r_sun_real.iter().map(|x| OHyperdual::from_real(*x)));
        let r_sun_sc = radius - r_sun;
        let dist3 = norm(&r_sun_sc).powi(3);
        let force = r_sun_sc
            * (OHyperdual::<f64, Const<4>>::from_real(self.factor(ctx, &r_sun_real)) / dist3);

        Ok(extract_jacobian_and_result::<_, U3, U3, _>(&force))
    }
}

impl fmt::Display for SolarPressure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "SRP with φ = {} W/m^2 and cylindrical shadow", self.phi)
    }
}
