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

use crate::linalg::{DMatrix, Matrix3};
use std::f64::consts::{PI, TAU};

/// Returns the provided angle bounded between 0.0 and 360.0
pub fn between_0_360(angle: f64) -> f64 {
    angle.rem_euclid(360.0)
}

/// Returns the provided angle bounded between -180.0 and +180.0
pub fn between_pm_180(angle: f64) -> f64 {
    let bounded = between_0_360(angle);
    if bounded > 180.0 {
        bounded - 360.0
    } else {
        bounded
    }
}

/// Returns the provided angle (in radians) bounded between 0 and 2π
pub fn between_0_tau(angle_rad: f64) -> f64 {
    angle_rad.rem_euclid(TAU)
}

/// Returns the provided angle (in radians) bounded between -π and +π, used for angular residuals
pub fn between_pm_pi(angle_rad: f64) -> f64 {
    let bounded = between_0_tau(angle_rad);
    if bounded > PI {
        bounded - TAU
    } else {
        bounded
    }
}

/// Rotation matrix about the X axis by the provided angle in radians (frame rotation)
pub fn r1(angle_rad: f64) -> Matrix3<f64> {
    let (s, c) = angle_rad.sin_cos();
    Matrix3::new(1.0, 0.0, 0.0, 0.0, c, s, 0.0, -s, c)
}

/// Rotation matrix about the Y axis by the provided angle in radians (frame rotation)
pub fn r2(angle_rad: f64) -> Matrix3<f64> {
    let (s, c) = angle_rad.sin_cos();
    Matrix3::new(c, 0.0, -s, 0.0, 1.0, 0.0, s, 0.0, c)
}

/// Rotation matrix about the Z axis by the provided angle in radians (frame rotation)
pub fn r3(angle_rad: f64) -> Matrix3<f64> {
    let (s, c) = angle_rad.sin_cos();
    Matrix3::new(c, s, 0.0, -s, c, 0.0, 0.0, 0.0, 1.0)
}

/// Direction cosine matrix from the Earth fixed frame to the local East-North-Up frame of a point at the provided geodetic coordinates.
pub fn dcm_itrf_to_enu(latitude_deg: f64, longitude_deg: f64) -> Matrix3<f64> {
    let (sin_lat, cos_lat) = latitude_deg.to_radians().sin_cos();
    let (sin_long, cos_long) = longitude_deg.to_radians().sin_cos();
    Matrix3::new(
        -sin_long,
        cos_long,
        0.0,
        -sin_lat * cos_long,
        -sin_lat * sin_long,
        cos_lat,
        cos_lat * cos_long,
        cos_lat * sin_long,
        sin_lat,
    )
}

/// Returns (M + Mᵀ)/2, removing the asymmetry introduced by floating point operations on a covariance.
pub fn symmetrize(mat: &DMatrix<f64>) -> DMatrix<f64> {
    (mat + mat.transpose()) * 0.5
}

#[cfg(test)]
mod ut_utils {
    use super::*;
    use crate::linalg::Vector3;
    use approx::assert_abs_diff_eq;

    #[test]
    fn angle_bounds() {
        assert_abs_diff_eq!(between_0_360(-30.0), 330.0);
        assert_abs_diff_eq!(between_0_360(725.0), 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(between_pm_180(270.0), -90.0);
        assert_abs_diff_eq!(between_pm_pi(TAU - 1e-3), -1e-3, epsilon = 1e-12);
        assert_abs_diff_eq!(between_pm_pi(-TAU + 1e-3), 1e-3, epsilon = 1e-12);
        assert_abs_diff_eq!(between_0_tau(-1e-3), TAU - 1e-3, epsilon = 1e-12);
    }

    #[test]
    fn frame_rotations() {
        let x = Vector3::new(1.0, 0.0, 0.0);
        // Rotating the frame by +90 deg about Z makes the old X axis appear along -Y
        let rotated = r3(PI / 2.0) * x;
        assert_abs_diff_eq!(rotated, Vector3::new(0.0, -1.0, 0.0), epsilon = 1e-15);
        let y = Vector3::new(0.0, 1.0, 0.0);
        assert_abs_diff_eq!(r1(PI / 2.0) * y, Vector3::new(0.0, 0.0, -1.0), epsilon = 1e-15);
        assert_abs_diff_eq!(r2(0.3) * r2(-0.3), Matrix3::identity(), epsilon = 1e-15);
    }

    #[test]
    fn enu_frame() {
        // On the equator at the prime meridian, up is +X, east is +Y and north is +Z
        let dcm = dcm_itrf_to_enu(0.0, 0.0);
        assert_abs_diff_eq!(dcm * Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 0.0, 1.0), epsilon = 1e-15);
        assert_abs_diff_eq!(dcm * Vector3::new(0.0, 1.0, 0.0), Vector3::new(1.0, 0.0, 0.0), epsilon = 1e-15);
        let dcm = dcm_itrf_to_enu(30.476, -86.5857);
        assert_abs_diff_eq!(dcm * dcm.transpose(), Matrix3::identity(), epsilon = 1e-15);

        let asym = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 4.0, 3.0]);
        let sym = symmetrize(&asym);
        assert_eq!(sym[(0, 1)], 3.0);
        assert_eq!(sym[(1, 0)], 3.0);
    }
}
