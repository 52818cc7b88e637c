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

use crate::cosmic::{AstroError, Cosm, Orbit};
use crate::io::ConfigRepr;
use crate::linalg::{Matrix3, Vector3};
use crate::time::Epoch;
use crate::utils::dcm_itrf_to_enu;
use serde_derive::{Deserialize, Serialize};
use std::fmt;

pub mod builtin;

/// GroundStation defines an optical tracking site measuring the right ascension and declination of a spacecraft.
///
/// The station is a fixed point on the Earth ellipsoid: its Earth fixed position and its local East-North-Up frame
/// are derived from the geodetic coordinates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroundStation {
    pub name: String,
    /// in degrees
    pub latitude_deg: f64,
    /// in degrees
    pub longitude_deg: f64,
    /// in km
    pub height_km: f64,
    /// in degrees, observations below this elevation are not simulated (no masking if unset)
    #[serde(default)]
    pub elevation_mask_deg: Option<f64>,
}

impl GroundStation {
    /// Initializes a point on the surface of the Earth.
    pub fn from_point(name: String, latitude_deg: f64, longitude_deg: f64, height_km: f64) -> Self {
        Self {
            name,
            latitude_deg,
            longitude_deg,
            height_km,
            elevation_mask_deg: None,
        }
    }

    /// Initializes a ground station from its Earth fixed position, converted to geodetic coordinates on the ellipsoid.
    pub fn from_itrf_km(name: String, itrf_km: &Vector3<f64>, cosm: &Cosm) -> Self {
        let (latitude_deg, longitude_deg, height_km) = cosm.itrf_to_geodetic(itrf_km);
        Self::from_point(name, latitude_deg, longitude_deg, height_km)
    }

    /// Returns a copy of this ground station with the provided elevation mask
    pub fn with_elevation_mask(mut self, elevation_mask_deg: f64) -> Self {
        self.elevation_mask_deg = Some(elevation_mask_deg);
        self
    }

    /// Earth fixed position of this station, in km
    pub fn itrf_km(&self, cosm: &Cosm) -> Vector3<f64> {
        cosm.geodetic_to_itrf(self.latitude_deg, self.longitude_deg, self.height_km)
    }

    /// Rotation from the Earth fixed frame to the topocentric East-North-Up frame of this station
    pub fn dcm_itrf_to_enu(&self) -> Matrix3<f64> {
        dcm_itrf_to_enu(self.latitude_deg, self.longitude_deg)
    }

    /// Position of this station in the inertial frame at the provided epoch, in km
    pub fn position_gcrf_km(&self, epoch: Epoch, cosm: &Cosm) -> Result<Vector3<f64>, AstroError> {
        Ok(cosm.dcm_gcrf_to_itrf(epoch)?.transpose() * self.itrf_km(cosm))
    }

    /// Computes the elevation of the provided object seen from this ground station, in degrees.
    pub fn elevation_deg_of(&self, rx: &Orbit, cosm: &Cosm) -> Result<f64, AstroError> {
        let rx_itrf = if rx.frame.is_inertial() {
            cosm.dcm_gcrf_to_itrf(rx.epoch)? * rx.radius_km
        } else {
            rx.radius_km
        };
        let rho_enu = self.dcm_itrf_to_enu() * (rx_itrf - self.itrf_km(cosm));
        Ok((rho_enu[2] / rho_enu.norm()).asin().to_degrees())
    }
}

impl ConfigRepr for GroundStation {}

impl fmt::Display for GroundStation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} (lat.: {:.4} deg    long.: {:.4} deg    alt.: {:.3} m)",
            self.name,
            self.latitude_deg,
            self.longitude_deg,
            self.height_km * 1e3,
        )
    }
}

#[cfg(test)]
mod gs_ut {
    use crate::cosmic::{Cosm, Orbit};
    use crate::io::ConfigRepr;
    use crate::linalg::Vector3;
    use crate::od::prelude::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_load_many() {
        let yaml = r#"
- name: Diego Garcia
  latitude_deg: 0.465765
  longitude_deg: 73.2162
  height_km: -0.0941783
- name: Maui
  latitude_deg: 20.6924
  longitude_deg: -156.309
  height_km: 2.11962
  elevation_mask_deg: 10.0
"#;
        let stations = GroundStation::loads_many(yaml).unwrap();
        assert_eq!(stations.len(), 2);
        assert_eq!(stations[0], GroundStation::diego_garcia());
        assert_eq!(stations[1], GroundStation::maui().with_elevation_mask(10.0));

        let reloaded = GroundStation::loads(&stations[1].dumps().unwrap()).unwrap();
        assert_eq!(reloaded, stations[1]);
    }

    #[test]
    fn geodetic_round_trip() {
        let cosm = Cosm::iers2010();
        let gs = GroundStation::eglin();
        let itrf = gs.itrf_km(&cosm);
        let back = GroundStation::from_itrf_km(gs.name.clone(), &itrf, &cosm);
        assert_abs_diff_eq!(back.latitude_deg, gs.latitude_deg, epsilon = 1e-9);
        assert_abs_diff_eq!(back.longitude_deg, gs.longitude_deg, epsilon = 1e-9);
        assert_abs_diff_eq!(back.height_km, gs.height_km, epsilon = 1e-6);
    }

    #[test]
    fn zenith_and_nadir() {
        let cosm = Cosm::iers2010();
        let gs = GroundStation::maui();
        let epoch = Epoch::from_gregorian_utc_at_midnight(2023, 3, 18);
        let up = gs.dcm_itrf_to_enu().transpose() * Vector3::z();

        let zenith = Orbit::new(
            gs.itrf_km(&cosm) + 1_000.0 * up,
            Vector3::zeros(),
            epoch,
            cosm.earth_itrf(),
        );
        assert_abs_diff_eq!(gs.elevation_deg_of(&zenith, &cosm).unwrap(), 90.0, epsilon = 1e-5);

        // The same point expressed in the inertial frame has the same elevation
        let zenith_gcrf = Orbit::new(
            cosm.dcm_gcrf_to_itrf(epoch).unwrap().transpose() * zenith.radius_km,
            Vector3::zeros(),
            epoch,
            cosm.earth_gcrf(),
        );
        assert_abs_diff_eq!(
            gs.elevation_deg_of(&zenith_gcrf, &cosm).unwrap(),
            gs.elevation_deg_of(&zenith, &cosm).unwrap(),
            epsilon = 1e-5
        );

        let antipode = Orbit::new(-gs.itrf_km(&cosm), Vector3::zeros(), epoch, cosm.earth_itrf());
        assert!(gs.elevation_deg_of(&antipode, &cosm).unwrap() < -80.0);
    }
}
