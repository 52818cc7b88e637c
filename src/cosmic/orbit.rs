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

use super::{AstroError, Frame, State};
use crate::dynamics::DynamicsError;
use crate::linalg::{Const, Matrix6, OVector, Vector3, Vector6};
use crate::time::{Duration, Epoch, Unit};
use crate::utils::between_0_360;
use std::f64::consts::PI;
use std::f64::EPSILON;
use std::fmt;

/// If an orbit has an eccentricity below the following value, it is considered circular (only affects warning messages)
pub const ECC_EPSILON: f64 = 1e-11;

/// Orbit defines an orbital state
///
/// Unless noted otherwise, algorithms are from GMAT 2016a [StateConversionUtil.cpp](https://github.com/ChristopherRabotin/GMAT/blob/37201a6290e7f7b941bc98ee973a527a5857104b/src/base/util/StateConversionUtil.cpp).
/// Regardless of the constructor used, this struct stores all the state information in Cartesian coordinates
/// as these are always non singular.
#[derive(Copy, Clone, Debug)]
pub struct Orbit {
    pub radius_km: Vector3<f64>,
    pub velocity_km_s: Vector3<f64>,
    pub epoch: Epoch,
    /// Frame contains everything we need to compute state information
    pub frame: Frame,
    /// Optionally stores the state transition matrix from the start of the propagation until the current time (i.e. trajectory STM, not step-size STM)
    pub stm: Option<Matrix6<f64>>,
}

impl Orbit {
    /// Creates a new Orbit in the provided frame at the provided Epoch.
    ///
    /// **Units:** km, km, km, km/s, km/s, km/s
    #[allow(clippy::too_many_arguments)]
    pub fn cartesian(
        x_km: f64,
        y_km: f64,
        z_km: f64,
        vx_km_s: f64,
        vy_km_s: f64,
        vz_km_s: f64,
        epoch: Epoch,
        frame: Frame,
    ) -> Self {
        Self {
            radius_km: Vector3::new(x_km, y_km, z_km),
            velocity_km_s: Vector3::new(vx_km_s, vy_km_s, vz_km_s),
            epoch,
            frame,
            stm: None,
        }
    }

    /// Creates a new Orbit from the provided position and velocity vectors
    pub fn new(radius_km: Vector3<f64>, velocity_km_s: Vector3<f64>, epoch: Epoch, frame: Frame) -> Self {
        Self {
            radius_km,
            velocity_km_s,
            epoch,
            frame,
            stm: None,
        }
    }

    /// Creates a new Orbit around in the provided frame from the borrowed state vector
    ///
    /// The state vector **must** be x, y, z, vx, vy, vz.
    pub fn cartesian_vec(state: &Vector6<f64>, epoch: Epoch, frame: Frame) -> Self {
        Self::new(
            state.fixed_rows::<3>(0).into_owned(),
            state.fixed_rows::<3>(3).into_owned(),
            epoch,
            frame,
        )
    }

    /// Attempts to create a new Orbit from the Keplerian orbital elements.
    ///
    /// **Units:** km, none, degrees, degrees, degrees, degrees
    ///
    /// NOTE: The state is defined in Cartesian coordinates as they are non-singular. This causes rounding
    /// errors when creating a state from its Keplerian orbital elements.
    /// One should expect these errors to be on the order of 1e-12.
    #[allow(clippy::too_many_arguments)]
    pub fn try_keplerian(
        sma_km: f64,
        ecc: f64,
        inc_deg: f64,
        raan_deg: f64,
        aop_deg: f64,
        ta_deg: f64,
        epoch: Epoch,
        frame: Frame,
    ) -> Result<Self, AstroError> {
        let gm = frame.mu_km3_s2;
        if gm.abs() < EPSILON {
            return Err(AstroError::NoGravitationalParameter {
                action: "Keplerian to Cartesian conversion",
            });
        }
        // Algorithm from GMAT's StateConversionUtil::KeplerianToCartesian
        let ecc = if ecc < 0.0 {
            warn!("eccentricity cannot be negative: sign of eccentricity changed");
            ecc * -1.0
        } else {
            ecc
        };
        let sma = if ecc > 1.0 && sma_km > 0.0 {
            warn!("eccentricity > 1 (hyperbolic) BUT SMA > 0 (elliptical): sign of SMA changed");
            sma_km * -1.0
        } else if ecc < 1.0 && sma_km < 0.0 {
            warn!("eccentricity < 1 (elliptical) BUT SMA < 0 (hyperbolic): sign of SMA changed");
            sma_km * -1.0
        } else {
            sma_km
        };
        if (sma * (1.0 - ecc)).abs() < 1e-3 {
            warn!("radius of periapsis is less than one meter");
        }
        if (1.0 - ecc).abs() < EPSILON {
            return Err(AstroError::ParabolicEccentricity { ecc });
        }
        if ecc > 1.0 {
            let ta = between_0_360(ta_deg);
            if ta > (PI - (1.0 / ecc).acos()).to_degrees() {
                return Err(AstroError::HyperbolicTrueAnomaly { ta_deg });
            }
        }

        let inc = inc_deg.to_radians();
        let raan = raan_deg.to_radians();
        let aop = aop_deg.to_radians();
        let ta = ta_deg.to_radians();
        let p = sma * (1.0 - ecc.powi(2));
        if p.abs() < EPSILON {
            return Err(AstroError::ParabolicSemiParam);
        }

        let radius = p / (1.0 + ecc * ta.cos());
        let (sin_aop_ta, cos_aop_ta) = (aop + ta).sin_cos();
        let (sin_inc, cos_inc) = inc.sin_cos();
        let (sin_raan, cos_raan) = raan.sin_cos();
        let (sin_aop, cos_aop) = aop.sin_cos();
        let x = radius * (cos_aop_ta * cos_raan - cos_inc * sin_aop_ta * sin_raan);
        let y = radius * (cos_aop_ta * sin_raan + cos_inc * sin_aop_ta * cos_raan);
        let z = radius * sin_aop_ta * sin_inc;
        let sqrt_gm_p = (gm / p).sqrt();
        let cos_ta_ecc = ta.cos() + ecc;
        let sin_ta = ta.sin();

        let vx = sqrt_gm_p * cos_ta_ecc * (-sin_aop * cos_raan - cos_inc * sin_raan * cos_aop)
            - sqrt_gm_p * sin_ta * (cos_aop * cos_raan - cos_inc * sin_raan * sin_aop);
        let vy = sqrt_gm_p * cos_ta_ecc * (-sin_aop * sin_raan + cos_inc * cos_raan * cos_aop)
            - sqrt_gm_p * sin_ta * (cos_aop * sin_raan + cos_inc * cos_raan * sin_aop);
        let vz = sqrt_gm_p * (cos_ta_ecc * sin_inc * cos_aop - sin_ta * sin_inc * sin_aop);

        Ok(Self::cartesian(x, y, z, vx, vy, vz, epoch, frame))
    }

    /// Returns the magnitude of the radius vector in km
    pub fn rmag_km(&self) -> f64 {
        self.radius_km.norm()
    }

    /// Returns the magnitude of the velocity vector in km/s
    pub fn vmag_km_s(&self) -> f64 {
        self.velocity_km_s.norm()
    }

    /// Returns this state as a Cartesian Vector6 in [km, km, km, km/s, km/s, km/s]
    ///
    /// Note that the time is **not** returned in the vector.
    pub fn to_cartesian_vec(&self) -> Vector6<f64> {
        Vector6::new(
            self.radius_km[0],
            self.radius_km[1],
            self.radius_km[2],
            self.velocity_km_s[0],
            self.velocity_km_s[1],
            self.velocity_km_s[2],
        )
    }

    /// Returns this state as a Keplerian Vector6 in [km, none, degrees, degrees, degrees, degrees]
    pub fn to_keplerian_vec(&self) -> Vector6<f64> {
        Vector6::new(
            self.sma_km(),
            self.ecc(),
            self.inc_deg(),
            self.raan_deg(),
            self.aop_deg(),
            self.ta_deg(),
        )
    }

    /// Returns the orbital momentum vector
    pub fn hvec(&self) -> Vector3<f64> {
        self.radius_km.cross(&self.velocity_km_s)
    }

    /// Returns the norm of the orbital momentum
    pub fn hmag_km2_s(&self) -> f64 {
        self.hvec().norm()
    }

    /// Returns the eccentricity vector (no unit)
    pub fn evec(&self) -> Vector3<f64> {
        let gm = self.frame.mu_km3_s2;
        let r = self.radius_km;
        let v = self.velocity_km_s;
        ((v.norm().powi(2) - gm / r.norm()) * r - (r.dot(&v)) * v) / gm
    }

    /// Returns the specific mechanical energy in km^2/s^2
    pub fn energy_km2_s2(&self) -> f64 {
        self.vmag_km_s().powi(2) / 2.0 - self.frame.mu_km3_s2 / self.rmag_km()
    }

    /// Returns the semi-major axis in km
    pub fn sma_km(&self) -> f64 {
        -self.frame.mu_km3_s2 / (2.0 * self.energy_km2_s2())
    }

    /// Returns the period
    pub fn period(&self) -> Duration {
        2.0 * PI * (self.sma_km().powi(3) / self.frame.mu_km3_s2).sqrt() * Unit::Second
    }

    /// Returns the eccentricity (no unit)
    pub fn ecc(&self) -> f64 {
        self.evec().norm()
    }

    /// Returns the inclination in degrees
    pub fn inc_deg(&self) -> f64 {
        (self.hvec()[2] / self.hmag_km2_s()).acos().to_degrees()
    }

    /// Returns the argument of periapsis in degrees
    pub fn aop_deg(&self) -> f64 {
        let n = Vector3::new(0.0, 0.0, 1.0).cross(&self.hvec());
        let cos_aop = n.dot(&self.evec()) / (n.norm() * self.ecc());
        let aop = cos_aop.acos();
        if aop.is_nan() {
            if cos_aop > 1.0 {
                180.0
            } else {
                0.0
            }
        } else if self.evec()[2] < 0.0 {
            (2.0 * PI - aop).to_degrees()
        } else {
            aop.to_degrees()
        }
    }

    /// Returns the right ascension of the ascending node in degrees
    pub fn raan_deg(&self) -> f64 {
        let n = Vector3::new(0.0, 0.0, 1.0).cross(&self.hvec());
        let cos_raan = n[0] / n.norm();
        let raan = cos_raan.acos();
        if raan.is_nan() {
            if cos_raan > 1.0 {
                180.0
            } else {
                0.0
            }
        } else if n[1] < 0.0 {
            (2.0 * PI - raan).to_degrees()
        } else {
            raan.to_degrees()
        }
    }

    /// Returns the true anomaly in degrees between 0 and 360.0
    ///
    /// LIMITATION: For an orbit whose true anomaly is (very nearly) 0.0 or 180.0, this function may return either 0.0 or 180.0 with a very small time increment.
    pub fn ta_deg(&self) -> f64 {
        if self.ecc() < ECC_EPSILON {
            warn!(
                "true anomaly ill-defined for circular orbit (e = {})",
                self.ecc()
            );
        }
        let cos_nu = self.evec().dot(&self.radius_km) / (self.ecc() * self.rmag_km());
        let ta = cos_nu.acos();
        if ta.is_nan() {
            if cos_nu > 1.0 {
                180.0
            } else {
                0.0
            }
        } else if self.radius_km.dot(&self.velocity_km_s) < 0.0 {
            (2.0 * PI - ta).to_degrees()
        } else {
            ta.to_degrees()
        }
    }

    /// Returns the root sum squared (RSS) radius and velocity errors between this state and another one, in km and km/s.
    pub fn rss(&self, other: &Self) -> (f64, f64) {
        (
            (self.radius_km - other.radius_km).norm(),
            (self.velocity_km_s - other.velocity_km_s).norm(),
        )
    }

    /// Returns whether this orbit and another are equal within the specified radial and velocity absolute tolerances
    pub fn eq_within(&self, other: &Self, radial_tol_km: f64, velocity_tol_km_s: f64) -> bool {
        let (dr, dv) = self.rss(other);
        self.epoch == other.epoch
            && self.frame == other.frame
            && dr <= radial_tol_km
            && dv <= velocity_tol_km_s
    }

    /// Enable the STM of this orbit, initialized to identity
    pub fn enable_stm(&mut self) {
        self.stm = Some(Matrix6::identity());
    }

    /// Copies this orbit with the STM enabled
    pub fn with_stm(mut self) -> Self {
        self.enable_stm();
        self
    }
}

impl Default for Orbit {
    fn default() -> Self {
        Self::new(
            Vector3::zeros(),
            Vector3::zeros(),
            Epoch::from_tai_seconds(0.0),
            Frame::default(),
        )
    }
}

impl PartialEq for Orbit {
    /// Two states are equal if their position are equal within one centimeter and their velocities within one centimeter per second.
    fn eq(&self, other: &Orbit) -> bool {
        self.eq_within(other, 1e-5, 1e-5)
    }
}

impl State for Orbit {
    type Size = Const<6>;
    type VecLength = Const<42>;

    /// Returns the position, velocity and the STM (column major, zeros if disabled)
    fn to_vector(&self) -> OVector<f64, Const<42>> {
        let mut as_vec = OVector::<f64, Const<42>>::zeros();
        as_vec.fixed_rows_mut::<3>(0).copy_from(&self.radius_km);
        as_vec.fixed_rows_mut::<3>(3).copy_from(&self.velocity_km_s);
        if let Some(stm) = self.stm {
            for (idx, stm_val) in stm.as_slice().iter().enumerate() {
                as_vec[idx + 6] = *stm_val;
            }
        }
        as_vec
    }

    fn stm(&self) -> Result<Matrix6<f64>, DynamicsError> {
        self.stm.ok_or(DynamicsError::StateTransitionMatrixUnset)
    }

    fn reset_stm(&mut self) {
        self.stm = Some(Matrix6::identity());
    }

    fn unset_stm(&mut self) {
        self.stm = None;
    }

    fn set(&mut self, epoch: Epoch, vector: &OVector<f64, Const<42>>) {
        if self.stm.is_some() {
            self.stm = Some(Matrix6::from_column_slice(&vector.as_slice()[6..]));
        }
        self.epoch = epoch;
        self.radius_km = vector.fixed_rows::<3>(0).into_owned();
        self.velocity_km_s = vector.fixed_rows::<3>(3).into_owned();
    }

    fn epoch(&self) -> Epoch {
        self.epoch
    }

    fn set_epoch(&mut self, epoch: Epoch) {
        self.epoch = epoch
    }
}

impl fmt::Display for Orbit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "[{}] {}\tposition = [{:.6}, {:.6}, {:.6}] km\tvelocity = [{:.9}, {:.9}, {:.9}] km/s",
            self.frame,
            self.epoch,
            self.radius_km[0],
            self.radius_km[1],
            self.radius_km[2],
            self.velocity_km_s[0],
            self.velocity_km_s[1],
            self.velocity_km_s[2]
        )
    }
}
