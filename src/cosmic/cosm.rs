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

use super::{
    AstroAlmanacSnafu, AstroError, Frame, Orientation, EARTH_ANGULAR_VELOCITY_RAD_S,
    EARTH_EQUATORIAL_RADIUS_KM, EARTH_FLATTENING, EARTH_GM_KM3_S2, MOON_GM_KM3_S2, SUN_GM_KM3_S2,
};
use crate::linalg::{Matrix3, Vector3};
use crate::time::Epoch;
use crate::utils::{between_pm_180, r1, r2, r3};
use anise::constants::frames::{EARTH_ITRF93, EARTH_J2000, MOON_J2000, SUN_J2000};
use anise::errors::{EphemerisSnafu, OrientationSnafu};
use anise::prelude::Almanac;
use snafu::ResultExt;
use std::f64::consts::TAU;
use std::fmt;
use std::sync::Arc;

/// Mean obliquity of the ecliptic at J2000, in degrees
const OBLIQUITY_J2000_DEG: f64 = 23.439_291_11;
/// Modified Julian date of the J2000 reference epoch
const MJD_J2000: f64 = 51_544.5;
const DAYS_PER_CENTURY: f64 = 36_525.0;
const ARCSEC_PER_DEG: f64 = 3_600.0;
const ARCSEC_PER_REVOLUTION: f64 = 1_296_000.0;

/// IAU 1980 nutation series: multipliers of (l, l', F, D, Ω) and the coefficients A + B t of Δψ and C + D t of Δε,
/// in units of 0.0001 arcsec.
const NUTATION_IAU1980: [([i8; 5], [f64; 4]); 106] = [
    ([0, 0, 0, 0, 1], [-171996.0, -174.2, 92025.0, 8.9]),
    ([0, 0, 2, -2, 2], [-13187.0, -1.6, 5736.0, -3.1]),
    ([0, 0, 2, 0, 2], [-2274.0, -0.2, 977.0, -0.5]),
    ([0, 0, 0, 0, 2], [2062.0, 0.2, -895.0, 0.5]),
    ([0, 1, 0, 0, 0], [1426.0, -3.4, 54.0, -0.1]),
    ([1, 0, 0, 0, 0], [712.0, 0.1, -7.0, 0.0]),
    ([0, 1, 2, -2, 2], [-517.0, 1.2, 224.0, -0.6]),
    ([0, 0, 2, 0, 1], [-386.0, -0.4, 200.0, 0.0]),
    ([1, 0, 2, 0, 2], [-301.0, 0.0, 129.0, -0.1]),
    ([0, -1, 2, -2, 2], [217.0, -0.5, -95.0, 0.3]),
    ([1, 0, 0, -2, 0], [-158.0, 0.0, -1.0, 0.0]),
    ([0, 0, 2, -2, 1], [129.0, 0.1, -70.0, 0.0]),
    ([-1, 0, 2, 0, 2], [123.0, 0.0, -53.0, 0.0]),
    ([1, 0, 0, 0, 1], [63.0, 0.1, -33.0, 0.0]),
    ([0, 0, 0, 2, 0], [63.0, 0.0, -2.0, 0.0]),
    ([-1, 0, 2, 2, 2], [-59.0, 0.0, 26.0, 0.0]),
    ([-1, 0, 0, 0, 1], [-58.0, -0.1, 32.0, 0.0]),
    ([1, 0, 2, 0, 1], [-51.0, 0.0, 27.0, 0.0]),
    ([2, 0, 0, -2, 0], [48.0, 0.0, 1.0, 0.0]),
    ([-2, 0, 2, 0, 1], [46.0, 0.0, -24.0, 0.0]),
    ([0, 0, 2, 2, 2], [-38.0, 0.0, 16.0, 0.0]),
    ([2, 0, 2, 0, 2], [-31.0, 0.0, 13.0, 0.0]),
    ([2, 0, 0, 0, 0], [29.0, 0.0, -1.0, 0.0]),
    ([1, 0, 2, -2, 2], [29.0, 0.0, -12.0, 0.0]),
    ([0, 0, 2, 0, 0], [26.0, 0.0, -1.0, 0.0]),
    ([0, 0, 2, -2, 0], [-22.0, 0.0, 0.0, 0.0]),
    ([-1, 0, 2, 0, 1], [21.0, 0.0, -10.0, 0.0]),
    ([0, 2, 0, 0, 0], [17.0, -0.1, 0.0, 0.0]),
    ([0, 2, 2, -2, 2], [-16.0, 0.1, 7.0, 0.0]),
    ([-1, 0, 0, 2, 1], [16.0, 0.0, -8.0, 0.0]),
    ([0, 1, 0, 0, 1], [-15.0, 0.0, 9.0, 0.0]),
    ([1, 0, 0, -2, 1], [-13.0, 0.0, 7.0, 0.0]),
    ([0, -1, 0, 0, 1], [-12.0, 0.0, 6.0, 0.0]),
    ([2, 0, -2, 0, 0], [11.0, 0.0, 0.0, 0.0]),
    ([-1, 0, 2, 2, 1], [-10.0, 0.0, 5.0, 0.0]),
    ([1, 0, 2, 2, 2], [-8.0, 0.0, 3.0, 0.0]),
    ([0, -1, 2, 0, 2], [-7.0, 0.0, 3.0, 0.0]),
    ([0, 0, 2, 2, 1], [-7.0, 0.0, 3.0, 0.0]),
    ([1, 1, 0, -2, 0], [-7.0, 0.0, 0.0, 0.0]),
    ([0, 1, 2, 0, 2], [7.0, 0.0, -3.0, 0.0]),
    ([-2, 0, 0, 2, 1], [-6.0, 0.0, 3.0, 0.0]),
    ([0, 0, 0, 2, 1], [-6.0, 0.0, 3.0, 0.0]),
    ([2, 0, 2, -2, 2], [6.0, 0.0, -3.0, 0.0]),
    ([1, 0, 0, 2, 0], [6.0, 0.0, 0.0, 0.0]),
    ([1, 0, 2, -2, 1], [6.0, 0.0, -3.0, 0.0]),
    ([0, 0, 0, -2, 1], [-5.0, 0.0, 3.0, 0.0]),
    ([0, -1, 2, -2, 1], [-5.0, 0.0, 3.0, 0.0]),
    ([2, 0, 2, 0, 1], [-5.0, 0.0, 3.0, 0.0]),
    ([1, -1, 0, 0, 0], [5.0, 0.0, 0.0, 0.0]),
    ([1, 0, 0, -1, 0], [-4.0, 0.0, 0.0, 0.0]),
    ([0, 0, 0, 1, 0], [-4.0, 0.0, 0.0, 0.0]),
    ([0, 1, 0, -2, 0], [-4.0, 0.0, 0.0, 0.0]),
    ([1, 0, -2, 0, 0], [4.0, 0.0, 0.0, 0.0]),
    ([2, 0, 0, -2, 1], [4.0, 0.0, -2.0, 0.0]),
    ([0, 1, 2, -2, 1], [4.0, 0.0, -2.0, 0.0]),
    ([1, 1, 0, 0, 0], [-3.0, 0.0, 0.0, 0.0]),
    ([1, -1, 0, -1, 0], [-3.0, 0.0, 0.0, 0.0]),
    ([-1, -1, 2, 2, 2], [-3.0, 0.0, 1.0, 0.0]),
    ([0, -1, 2, 2, 2], [-3.0, 0.0, 1.0, 0.0]),
    ([1, -1, 2, 0, 2], [-3.0, 0.0, 1.0, 0.0]),
    ([3, 0, 2, 0, 2], [-3.0, 0.0, 1.0, 0.0]),
    ([-2, 0, 2, 0, 2], [-3.0, 0.0, 1.0, 0.0]),
    ([1, 0, 2, 0, 0], [3.0, 0.0, 0.0, 0.0]),
    ([-1, 0, 2, 4, 2], [-2.0, 0.0, 1.0, 0.0]),
    ([1, 0, 0, 0, 2], [-2.0, 0.0, 1.0, 0.0]),
    ([-1, 0, 2, -2, 1], [-2.0, 0.0, 1.0, 0.0]),
    ([0, -2, 2, -2, 1], [-2.0, 0.0, 1.0, 0.0]),
    ([-2, 0, 0, 0, 1], [-2.0, 0.0, 1.0, 0.0]),
    ([2, 0, 0, 0, 1], [2.0, 0.0, -1.0, 0.0]),
    ([3, 0, 0, 0, 0], [2.0, 0.0, 0.0, 0.0]),
    ([1, 1, 2, 0, 2], [2.0, 0.0, -1.0, 0.0]),
    ([0, 0, 2, 1, 2], [2.0, 0.0, -1.0, 0.0]),
    ([1, 0, 0, 2, 1], [-1.0, 0.0, 0.0, 0.0]),
    ([1, 0, 2, 2, 1], [-1.0, 0.0, 1.0, 0.0]),
    ([1, 1, 0, -2, 1], [-1.0, 0.0, 0.0, 0.0]),
    ([0, 1, 0, 2, 0], [-1.0, 0.0, 0.0, 0.0]),
    ([0, 1, 2, -2, 0], [-1.0, 0.0, 0.0, 0.0]),
    ([0, 1, -2, 2, 0], [-1.0, 0.0, 0.0, 0.0]),
    ([1, 0, -2, 2, 0], [-1.0, 0.0, 0.0, 0.0]),
    ([1, 0, -2, -2, 0], [-1.0, 0.0, 0.0, 0.0]),
    ([1, 0, 2, -2, 0], [-1.0, 0.0, 0.0, 0.0]),
    ([1, 0, 0, -4, 0], [-1.0, 0.0, 0.0, 0.0]),
    ([2, 0, 0, -4, 0], [-1.0, 0.0, 0.0, 0.0]),
    ([0, 0, 2, 4, 2], [-1.0, 0.0, 0.0, 0.0]),
    ([0, 0, 2, -1, 2], [-1.0, 0.0, 0.0, 0.0]),
    ([-2, 0, 2, 4, 2], [-1.0, 0.0, 1.0, 0.0]),
    ([2, 0, 2, 2, 2], [-1.0, 0.0, 0.0, 0.0]),
    ([0, -1, 2, 0, 1], [-1.0, 0.0, 0.0, 0.0]),
    ([0, 0, -2, 0, 1], [-1.0, 0.0, 0.0, 0.0]),
    ([0, 0, 4, -2, 2], [1.0, 0.0, 0.0, 0.0]),
    ([0, 1, 0, 0, 2], [1.0, 0.0, 0.0, 0.0]),
    ([1, 1, 2, -2, 2], [1.0, 0.0, -1.0, 0.0]),
    ([3, 0, 2, -2, 2], [1.0, 0.0, 0.0, 0.0]),
    ([-2, 0, 2, 2, 2], [1.0, 0.0, -1.0, 0.0]),
    ([-1, 0, 0, 0, 2], [1.0, 0.0, -1.0, 0.0]),
    ([0, 0, -2, 2, 1], [1.0, 0.0, 0.0, 0.0]),
    ([0, 1, 2, 0, 1], [1.0, 0.0, 0.0, 0.0]),
    ([-1, 0, 4, 0, 2], [1.0, 0.0, 0.0, 0.0]),
    ([2, 1, 0, -2, 0], [1.0, 0.0, 0.0, 0.0]),
    ([2, 0, 0, 2, 0], [1.0, 0.0, 0.0, 0.0]),
    ([2, 0, 2, -2, 1], [1.0, 0.0, -1.0, 0.0]),
    ([2, 0, -2, 0, 1], [1.0, 0.0, 0.0, 0.0]),
    ([1, -1, 0, -2, 0], [1.0, 0.0, 0.0, 0.0]),
    ([-1, 0, 0, 1, 1], [1.0, 0.0, 0.0, 0.0]),
    ([-1, -1, 0, 2, 1], [1.0, 0.0, 0.0, 0.0]),
    ([0, 1, 0, 1, 0], [1.0, 0.0, 0.0, 0.0]),
];

/// Cosm stores the constants of the Earth, Sun and Moon, and provides the frame rotations and the Sun and Moon ephemerides.
///
/// Without kernels, the Earth orientation is the IAU 1976 precession, the IAU 1980 nutation and the IAU 1982 sidereal
/// time (UT1 approximated by UTC, no polar motion), and the Sun and Moon follow low precision analytical series.
/// When built with an [Almanac], the orientation of the Earth (ITRF93) and the Sun and Moon positions are read from its
/// kernels instead.
///
/// A single instance is built and shared as an `Arc<Cosm>`, it is never mutated.
#[derive(Clone)]
pub struct Cosm {
    pub earth_gm_km3_s2: f64,
    pub earth_equatorial_radius_km: f64,
    pub earth_flattening: f64,
    pub earth_angular_velocity_rad_s: f64,
    pub sun_gm_km3_s2: f64,
    pub moon_gm_km3_s2: f64,
    almanac: Option<Arc<Almanac>>,
}

impl Default for Cosm {
    fn default() -> Self {
        Self {
            earth_gm_km3_s2: EARTH_GM_KM3_S2,
            earth_equatorial_radius_km: EARTH_EQUATORIAL_RADIUS_KM,
            earth_flattening: EARTH_FLATTENING,
            earth_angular_velocity_rad_s: EARTH_ANGULAR_VELOCITY_RAD_S,
            sun_gm_km3_s2: SUN_GM_KM3_S2,
            moon_gm_km3_s2: MOON_GM_KM3_S2,
            almanac: None,
        }
    }
}

impl fmt::Debug for Cosm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cosm")
            .field("earth_gm_km3_s2", &self.earth_gm_km3_s2)
            .field("earth_equatorial_radius_km", &self.earth_equatorial_radius_km)
            .field("earth_flattening", &self.earth_flattening)
            .field("uses_kernels", &self.uses_kernels())
            .finish_non_exhaustive()
    }
}

impl Cosm {
    /// Builds the shared Cosm with the IERS 2010 Earth constants and the analytical Earth orientation and ephemerides
    pub fn iers2010() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Builds the shared Cosm reading the Earth orientation and the Sun and Moon ephemerides from the provided almanac.
    ///
    /// The almanac must provide the EARTH_ITRF93 orientation (e.g. a high precision Earth BPC) and the Sun and Moon
    /// ephemerides (e.g. de440s.bsp) over the epochs of the orbit determination.
    pub fn from_almanac(almanac: Almanac) -> Arc<Self> {
        Arc::new(Self {
            almanac: Some(Arc::new(almanac)),
            ..Default::default()
        })
    }

    /// Loads the provided kernel files (SPK, BPC, PCA) in a new almanac, cf. [Cosm::from_almanac].
    pub fn from_kernels<P: AsRef<str>>(paths: &[P]) -> Result<Arc<Self>, AstroError> {
        let mut almanac = Almanac::default();
        for path in paths {
            almanac = almanac
                .load(path.as_ref())
                .context(AstroAlmanacSnafu {
                    action: "loading kernels",
                })?;
            info!("loaded {}", path.as_ref());
        }
        Ok(Self::from_almanac(almanac))
    }

    /// Whether the orientation and ephemerides come from loaded kernels
    pub fn uses_kernels(&self) -> bool {
        self.almanac.is_some()
    }

    /// Earth centered inertial frame, used for integration
    pub fn earth_gcrf(&self) -> Frame {
        Frame {
            orientation: Orientation::GCRF,
            mu_km3_s2: self.earth_gm_km3_s2,
            equatorial_radius_km: self.earth_equatorial_radius_km,
            flattening: self.earth_flattening,
        }
    }

    /// Earth fixed frame, used for the gravity field and the ground stations
    pub fn earth_itrf(&self) -> Frame {
        self.earth_gcrf().with_orientation(Orientation::ITRF)
    }

    /// Greenwich mean sidereal time in radians, between 0 and 2π (IAU-82 model, UT1 approximated by UTC).
    ///
    /// Reference: Vallado, 4th Ed., Eq. 3-47
    pub fn gmst_rad(&self, epoch: Epoch) -> f64 {
        let t_ut1 = (epoch.to_mjd_utc_days() - MJD_J2000) / DAYS_PER_CENTURY;
        let gmst_s = 67_310.548_41
            + (876_600.0 * 3_600.0 + 8_640_184.812_866) * t_ut1
            + 0.093_104 * t_ut1.powi(2)
            - 6.2e-6 * t_ut1.powi(3);
        (gmst_s % 86_400.0 / 240.0).to_radians().rem_euclid(TAU)
    }

    /// Nutation in longitude and in obliquity (Δψ, Δε), in arcseconds, with the full IAU 1980 series.
    ///
    /// Reference: Vallado, 4th Ed., section 3.7.2 and appendix D.6
    pub fn nutation_arcsec(&self, epoch: Epoch) -> (f64, f64) {
        let t = centuries_tt(epoch);
        let (t2, t3) = (t * t, t * t * t);
        let arc = |c0: f64, revs: f64, c1: f64, c2: f64, c3: f64| {
            ((c0 + (revs * ARCSEC_PER_REVOLUTION + c1) * t + c2 * t2 + c3 * t3) % ARCSEC_PER_REVOLUTION)
                / ARCSEC_PER_DEG
        };
        // Delaunay arguments, in degrees
        let args = [
            arc(485_866.733, 1_325.0, 715_922.633, 31.310, 0.064),
            arc(1_287_099.804, 99.0, 1_292_581.224, -0.577, -0.012),
            arc(335_778.877, 1_342.0, 295_263.137, -13.257, 0.011),
            arc(1_072_261.307, 1_236.0, 1_105_601.328, -6.891, 0.019),
            arc(450_160.280, -5.0, -482_890.539, 7.455, 0.008),
        ];

        let (dpsi, deps) = NUTATION_IAU1980
            .iter()
            .fold((0.0, 0.0), |(dpsi, deps), (mult, coeffs)| {
                let (sin_arg, cos_arg) = mult
                    .iter()
                    .zip(args.iter())
                    .map(|(k, arg_deg)| f64::from(*k) * arg_deg)
                    .sum::<f64>()
                    .to_radians()
                    .sin_cos();
                (
                    dpsi + (coeffs[0] + coeffs[1] * t) * sin_arg,
                    deps + (coeffs[2] + coeffs[3] * t) * cos_arg,
                )
            });

        (dpsi * 1e-4, deps * 1e-4)
    }

    /// Greenwich apparent sidereal time in radians: the mean sidereal time and the IAU 1982 equation of the equinoxes.
    pub fn gast_rad(&self, epoch: Epoch) -> f64 {
        let (dpsi_arcsec, _) = self.nutation_arcsec(epoch);
        let mean_obliquity = mean_obliquity_rad(epoch);
        // Longitude of the ascending node of the Moon, in degrees
        let omega = (450_160.280 - 6_962_890.539 * centuries_tt(epoch)) / ARCSEC_PER_DEG;
        let eq_equinox_arcsec = dpsi_arcsec * mean_obliquity.cos()
            + 0.002_64 * omega.to_radians().sin()
            + 0.000_063 * (2.0 * omega).to_radians().sin();
        (self.gmst_rad(epoch) + (eq_equinox_arcsec / ARCSEC_PER_DEG).to_radians()).rem_euclid(TAU)
    }

    /// Direction cosine matrix rotating a vector from the inertial frame to the Earth fixed frame.
    ///
    /// With kernels, this is the J2000 to ITRF93 rotation of the almanac. Otherwise, this is the sidereal rotation
    /// applied after the IAU 1980 nutation and the IAU 1976 precession.
    pub fn dcm_gcrf_to_itrf(&self, epoch: Epoch) -> Result<Matrix3<f64>, AstroError> {
        match &self.almanac {
            Some(almanac) => Ok(almanac
                .rotate(EARTH_J2000, EARTH_ITRF93, epoch)
                .context(OrientationSnafu {
                    action: "rotating GCRF to ITRF",
                })
                .context(AstroAlmanacSnafu {
                    action: "computing the Earth orientation",
                })?
                .rot_mat),
            None => {
                let t = centuries_tt(epoch);
                let arcsec = |value: f64| (value / ARCSEC_PER_DEG).to_radians();
                // IAU 1976 precession, Vallado Eq. 3-88
                let zeta = arcsec(2_306.218_1 * t + 0.301_88 * t.powi(2) + 0.017_998 * t.powi(3));
                let theta = arcsec(2_004.310_9 * t - 0.426_65 * t.powi(2) - 0.041_833 * t.powi(3));
                let z = arcsec(2_306.218_1 * t + 1.094_68 * t.powi(2) + 0.018_203 * t.powi(3));
                let precession = r3(-z) * r2(theta) * r3(-zeta);

                let (dpsi_arcsec, deps_arcsec) = self.nutation_arcsec(epoch);
                let mean_obliquity = mean_obliquity_rad(epoch);
                let nutation = r1(-(mean_obliquity + arcsec(deps_arcsec)))
                    * r3(-arcsec(dpsi_arcsec))
                    * r1(mean_obliquity);

                Ok(r3(self.gast_rad(epoch)) * nutation * precession)
            }
        }
    }

    /// Earth fixed position of a point given its geodetic coordinates on the ellipsoid.
    ///
    /// **Units:** degrees, degrees, km
    /// Reference: G. Xu and Y. Xu, "GPS", DOI 10.1007/978-3-662-50367-6_2, 2016
    pub fn geodetic_to_itrf(&self, latitude_deg: f64, longitude_deg: f64, height_km: f64) -> Vector3<f64> {
        let flattening = self.earth_flattening;
        let semi_major_radius = self.earth_equatorial_radius_km;
        let e2 = 2.0 * flattening - flattening.powi(2);
        let (sin_long, cos_long) = longitude_deg.to_radians().sin_cos();
        let (sin_lat, cos_lat) = latitude_deg.to_radians().sin_cos();
        // page 144
        let c_body = semi_major_radius / ((1.0 - e2 * sin_lat.powi(2)).sqrt());
        let s_body = (semi_major_radius * (1.0 - flattening).powi(2))
            / ((1.0 - e2 * sin_lat.powi(2)).sqrt());
        Vector3::new(
            (c_body + height_km) * cos_lat * cos_long,
            (c_body + height_km) * cos_lat * sin_long,
            (s_body + height_km) * sin_lat,
        )
    }

    /// Geodetic latitude (deg), longitude (deg) and height (km) of an Earth fixed position.
    ///
    /// Reference: Vallado, 4th Ed., Algorithm 12 page 172.
    pub fn itrf_to_geodetic(&self, radius_km: &Vector3<f64>) -> (f64, f64, f64) {
        let eps = 1e-12;
        let max_attempts = 20;
        let semi_major_radius = self.earth_equatorial_radius_km;
        let e2 = self.earth_flattening * (2.0 - self.earth_flattening);
        let r_delta = (radius_km[0].powi(2) + radius_km[1].powi(2)).sqrt();

        let mut latitude = (radius_km[2] / radius_km.norm()).asin();
        for attempt_no in 1..=max_attempts {
            let c_earth = semi_major_radius / ((1.0 - e2 * latitude.sin().powi(2)).sqrt());
            let new_latitude = (radius_km[2] + c_earth * e2 * latitude.sin()).atan2(r_delta);
            let delta = (latitude - new_latitude).abs();
            latitude = new_latitude;
            if delta < eps {
                break;
            } else if attempt_no == max_attempts {
                warn!("geodetic latitude failed to converge -- error = {delta}");
            }
        }

        let (sin_lat, cos_lat) = latitude.sin_cos();
        let height_km = if cos_lat.abs() < 0.1 {
            // Near the poles
            let s_earth = (semi_major_radius * (1.0 - self.earth_flattening).powi(2))
                / ((1.0 - e2 * sin_lat.powi(2)).sqrt());
            radius_km[2] / sin_lat - s_earth
        } else {
            let c_earth = semi_major_radius / ((1.0 - e2 * sin_lat.powi(2)).sqrt());
            r_delta / cos_lat - c_earth
        };

        let longitude_deg = between_pm_180(radius_km[1].atan2(radius_km[0]).to_degrees());
        (latitude.to_degrees(), longitude_deg, height_km)
    }

    /// Geocentric position of the Sun in the inertial frame, in km.
    ///
    /// Without kernels, this is the low precision analytical model from Montenbruck & Gill, Satellite Orbits, section 3.3.2.
    pub fn sun_position_km(&self, epoch: Epoch) -> Result<Vector3<f64>, AstroError> {
        if let Some(almanac) = &self.almanac {
            return Ok(almanac
                .translate_geometric(SUN_J2000, EARTH_J2000, epoch)
                .context(EphemerisSnafu {
                    action: "computing the Sun position",
                })
                .context(AstroAlmanacSnafu {
                    action: "computing the Sun position",
                })?
                .radius_km);
        }

        let t = centuries_tt(epoch);
        let mean_anomaly = (357.525_6 + 35_999.049 * t).to_radians();
        let ecl_longitude = (282.940_0
            + mean_anomaly.to_degrees()
            + (6_892.0 * mean_anomaly.sin() + 72.0 * (2.0 * mean_anomaly).sin()) / ARCSEC_PER_DEG)
            .to_radians();
        let distance_km = (149.619 - 2.499 * mean_anomaly.cos()
            - 0.021 * (2.0 * mean_anomaly).cos())
            * 1e6;

        let r_ecl = Vector3::new(
            distance_km * ecl_longitude.cos(),
            distance_km * ecl_longitude.sin(),
            0.0,
        );
        Ok(ecliptic_to_equatorial() * r_ecl)
    }

    /// Geocentric position of the Moon in the inertial frame, in km.
    ///
    /// Without kernels, this is the low precision analytical model from Montenbruck & Gill, Satellite Orbits, section 3.3.2.
    pub fn moon_position_km(&self, epoch: Epoch) -> Result<Vector3<f64>, AstroError> {
        if let Some(almanac) = &self.almanac {
            return Ok(almanac
                .translate_geometric(MOON_J2000, EARTH_J2000, epoch)
                .context(EphemerisSnafu {
                    action: "computing the Moon position",
                })
                .context(AstroAlmanacSnafu {
                    action: "computing the Moon position",
                })?
                .radius_km);
        }

        let t = centuries_tt(epoch);
        // Mean arguments, in degrees
        let l0 = 218.316_17 + 481_267.880_88 * t - 1.397_2 * t;
        let l = (134.962_92 + 477_198.867_53 * t).to_radians();
        let lp = (357.525_43 + 35_999.049_44 * t).to_radians();
        let f = (93.272_83 + 483_202.018_73 * t).to_radians();
        let d = (297.850_27 + 445_267.111_35 * t).to_radians();

        let longitude_deg = l0
            + (22_640.0 * l.sin() + 769.0 * (2.0 * l).sin()
                - 4_586.0 * (l - 2.0 * d).sin()
                + 2_370.0 * (2.0 * d).sin()
                - 668.0 * lp.sin()
                - 412.0 * (2.0 * f).sin()
                - 212.0 * (2.0 * l - 2.0 * d).sin()
                - 206.0 * (l + lp - 2.0 * d).sin()
                + 192.0 * (l + 2.0 * d).sin()
                - 165.0 * (lp - 2.0 * d).sin()
                + 148.0 * (l - lp).sin()
                - 125.0 * d.sin()
                - 110.0 * (l + lp).sin()
                - 55.0 * (2.0 * f - 2.0 * d).sin())
                / ARCSEC_PER_DEG;

        let arg_lat = f
            + (longitude_deg - l0).to_radians()
            + ((412.0 * (2.0 * f).sin() + 541.0 * lp.sin()) / ARCSEC_PER_DEG).to_radians();
        let latitude_deg = (18_520.0 * arg_lat.sin() - 526.0 * (f - 2.0 * d).sin()
            + 44.0 * (l + f - 2.0 * d).sin()
            - 31.0 * (-l + f - 2.0 * d).sin()
            - 25.0 * (-2.0 * l + f).sin()
            - 23.0 * (lp + f - 2.0 * d).sin()
            + 21.0 * (-l + f).sin()
            + 11.0 * (-lp + f - 2.0 * d).sin())
            / ARCSEC_PER_DEG;

        let distance_km = 385_000.0 - 20_905.0 * l.cos() - 3_699.0 * (2.0 * d - l).cos()
            - 2_956.0 * (2.0 * d).cos()
            - 570.0 * (2.0 * l).cos()
            + 246.0 * (2.0 * l - 2.0 * d).cos()
            - 205.0 * (lp - 2.0 * d).cos()
            - 171.0 * (l + 2.0 * d).cos()
            - 152.0 * (l + lp - 2.0 * d).cos();

        let (sin_lon, cos_lon) = longitude_deg.to_radians().sin_cos();
        let (sin_lat, cos_lat) = latitude_deg.to_radians().sin_cos();
        let r_ecl = distance_km * Vector3::new(cos_lat * cos_lon, cos_lat * sin_lon, sin_lat);
        Ok(ecliptic_to_equatorial() * r_ecl)
    }
}

/// Julian centuries of TT past J2000
fn centuries_tt(epoch: Epoch) -> f64 {
    (epoch.to_mjd_tt_days() - MJD_J2000) / DAYS_PER_CENTURY
}

/// Mean obliquity of the ecliptic of date (IAU 1980), Vallado Eq. 3-81
fn mean_obliquity_rad(epoch: Epoch) -> f64 {
    let t = centuries_tt(epoch);
    ((84_381.448 - 46.815_0 * t - 0.000_59 * t.powi(2) + 0.001_813 * t.powi(3)) / ARCSEC_PER_DEG).to_radians()
}

/// Rotation from the mean ecliptic to the mean equator of J2000
fn ecliptic_to_equatorial() -> Matrix3<f64> {
    r1(-OBLIQUITY_J2000_DEG.to_radians())
}

#[cfg(test)]
mod ut_cosm {
    use super::*;
    use crate::cosmic::AU;
    use approx::assert_abs_diff_eq;

    #[test]
    fn geodetic_round_trip() {
        let cosm = Cosm::default();
        for (lat, lon, height) in [
            (0.465765, 73.2162, -0.0941783),
            (20.6924, -156.309, 2.11962),
            (30.476, -86.5857, -0.02124),
            (-89.5, 10.0, 0.5),
        ] {
            let r_itrf = cosm.geodetic_to_itrf(lat, lon, height);
            let (lat_c, lon_c, height_c) = cosm.itrf_to_geodetic(&r_itrf);
            assert_abs_diff_eq!(lat, lat_c, epsilon = 1e-9);
            assert_abs_diff_eq!(lon, lon_c, epsilon = 1e-9);
            assert_abs_diff_eq!(height, height_c, epsilon = 1e-6);
        }
    }

    #[test]
    fn gmst_and_dcm() {
        let cosm = Cosm::default();
        // Vallado example 3-5: 1992 August 20, 12:14 UT1, GMST = 152.578787886 deg
        let epoch = Epoch::from_gregorian_utc_hms(1992, 8, 20, 12, 14, 0);
        // UTC and UT1 differ by less than a second, i.e. 4.2e-3 deg
        assert_abs_diff_eq!(cosm.gmst_rad(epoch).to_degrees(), 152.578_787_886, epsilon = 5e-3);
        // The equation of the equinoxes is at most about 1.2 seconds of time
        let eq_equinox_deg = (cosm.gast_rad(epoch) - cosm.gmst_rad(epoch)).to_degrees();
        assert!(eq_equinox_deg.abs() < 5.5e-3, "{eq_equinox_deg}");

        let dcm = cosm.dcm_gcrf_to_itrf(epoch).unwrap();
        assert_abs_diff_eq!((dcm * dcm.transpose() - Matrix3::identity()).norm(), 0.0, epsilon = 1e-13);
        assert_abs_diff_eq!(dcm.determinant(), 1.0, epsilon = 1e-13);
    }

    #[test]
    fn nutation_at_j2000() {
        let cosm = Cosm::default();
        let epoch = Epoch::from_mjd_in_time_scale(MJD_J2000, crate::time::TimeScale::TT);
        let (dpsi, deps) = cosm.nutation_arcsec(epoch);
        assert_abs_diff_eq!(dpsi, -13.923_385_169_502_602, epsilon = 1e-8);
        assert_abs_diff_eq!(deps, -5.773_808_263_765_919, epsilon = 1e-8);
        assert_abs_diff_eq!(
            mean_obliquity_rad(epoch),
            OBLIQUITY_J2000_DEG.to_radians(),
            epsilon = 1e-9
        );
    }

    #[test]
    fn itrf_to_gcrf() {
        // Vallado example 3-15, 2004 April 6, 07:51:28.386009 UTC
        let cosm = Cosm::default();
        let epoch = Epoch::from_gregorian_utc(2004, 4, 6, 7, 51, 28, 386_009_000);
        let r_itrf = Vector3::new(-1_033.479_383_0, 7_901.295_275_4, 6_380.356_595_8);
        let r_gcrf = Vector3::new(5_102.508_958, 6_123.011_401, 6_378.136_928);

        // UT1 - UTC = -0.44 s and the polar motion are ignored, i.e. a few hundred meters
        let dcm = cosm.dcm_gcrf_to_itrf(epoch).unwrap();
        let err_km = (dcm.transpose() * r_itrf - r_gcrf).norm();
        assert!(err_km < 0.5, "ITRF to GCRF error of {err_km} km");
        assert!((dcm * r_gcrf - r_itrf).norm() < 0.5);

        // A sidereal rotation alone misses the precession and nutation of the equator
        let err_gmst_km = (r3(cosm.gmst_rad(epoch)).transpose() * r_itrf - r_gcrf).norm();
        assert!(err_gmst_km > 5.0, "{err_gmst_km}");
    }

    #[test]
    fn missing_kernels() {
        let cosm = Cosm::from_almanac(Almanac::default());
        assert!(cosm.uses_kernels());
        assert!(!Cosm::iers2010().uses_kernels());

        let epoch = Epoch::from_gregorian_utc_at_midnight(2023, 3, 18);
        assert!(matches!(
            cosm.dcm_gcrf_to_itrf(epoch),
            Err(AstroError::AstroAlmanac { .. })
        ));
        assert!(matches!(
            cosm.sun_position_km(epoch),
            Err(AstroError::AstroAlmanac { .. })
        ));
        assert!(cosm.moon_position_km(epoch).is_err());

        assert!(matches!(
            Cosm::from_kernels(&["this/kernel/does/not/exist.bsp"]),
            Err(AstroError::AstroAlmanac { .. })
        ));
    }

    #[test]
    fn sun_moon_positions() {
        let cosm = Cosm::default();
        let epoch = Epoch::from_gregorian_utc_at_midnight(2023, 3, 18);
        let sun = cosm.sun_position_km(epoch).unwrap();
        let moon = cosm.moon_position_km(epoch).unwrap();

        // Two days before the March equinox: Sun nearly on the equator, close to RA 0
        let sun_dec = (sun[2] / sun.norm()).asin().to_degrees();
        let sun_ra = sun[1].atan2(sun[0]).to_degrees();
        assert!(sun_dec.abs() < 2.0, "sun declination {sun_dec}");
        assert!(sun_ra < 0.0 && sun_ra > -5.0, "sun right ascension {sun_ra}");
        assert!((sun.norm() / AU - 1.0).abs() < 0.02);

        assert!(moon.norm() > 356_000.0 && moon.norm() < 407_000.0);
        // The lunar orbit is inclined at most ~28.6 deg on the equator
        assert!((moon[2] / moon.norm()).asin().to_degrees().abs() < 29.0);
    }
}
