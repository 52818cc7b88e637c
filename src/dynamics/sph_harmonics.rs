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

use super::{AccelModel, DynamicsAstroSnafu, DynamicsError};
use crate::cosmic::{Cosm, Orbit};
use crate::io::gravity::HarmonicsMem;
use crate::linalg::{Const, DMatrix, Matrix3, Scalar, Vector3, U3};
use hyperdual::{extract_jacobian_and_result, hyperspace_from_vector, Float, OHyperdual};
use snafu::ResultExt;
use std::cmp::min;
use std::fmt;
use std::sync::Arc;

/// Spherical harmonics gravity of the Earth, computed in the Earth fixed frame with the Pines formulation.
///
/// The acceleration excludes the central (degree zero) term, which is provided by the orbital dynamics.
#[derive(Clone)]
pub struct Harmonics {
    cosm: Arc<Cosm>,
    stor: HarmonicsMem,
    a_nm: DMatrix<f64>,
    b_nm: DMatrix<f64>,
    c_nm: DMatrix<f64>,
    vr01: DMatrix<f64>,
    vr11: DMatrix<f64>,
}

impl Harmonics {
    /// Create a new Harmonics dynamical model from the provided gravity potential storage instance.
    pub fn from_stor(stor: HarmonicsMem, cosm: Arc<Cosm>) -> Arc<Self> {
        let degree_np2 = stor.max_degree_n() + 2;
        let mut a_nm = DMatrix::from_element(degree_np2 + 1, degree_np2 + 1, 0.0);
        let mut b_nm = DMatrix::from_element(degree_np2, degree_np2, 0.0);
        let mut c_nm = DMatrix::from_element(degree_np2, degree_np2, 0.0);
        let mut vr01 = DMatrix::from_element(degree_np2, degree_np2, 0.0);
        let mut vr11 = DMatrix::from_element(degree_np2, degree_np2, 0.0);

        // Initialize the diagonal elements (not a function of the input)
        a_nm[(0, 0)] = 1.0;
        a_nm[(1, 1)] = 3.0f64.sqrt();
        for n in 2..=degree_np2 {
            let nf64 = n as f64;
            a_nm[(n, n)] = (1.0 + 1.0 / (2.0 * nf64)).sqrt() * a_nm[(n - 1, n - 1)];
        }

        // Some entries of these are undefined (e.g. n = m) but they are never read.
        for n in 0..degree_np2 {
            for m in 0..degree_np2 {
                let nf64 = n as f64;
                let mf64 = m as f64;
                // c_nm is B_nm/B_(n-1,m) in Jones' dissertation
                c_nm[(n, m)] = (((2.0 * nf64 + 1.0) * (nf64 + mf64 - 1.0) * (nf64 - mf64 - 1.0))
                    / ((nf64 - mf64) * (nf64 + mf64) * (2.0 * nf64 - 3.0)))
                    .sqrt();

                b_nm[(n, m)] = (((2.0 * nf64 + 1.0) * (2.0 * nf64 - 1.0))
                    / ((nf64 + mf64) * (nf64 - mf64)))
                    .sqrt();

                vr01[(n, m)] = ((nf64 - mf64) * (nf64 + mf64 + 1.0)).sqrt();
                vr11[(n, m)] = (((2.0 * nf64 + 1.0) * (nf64 + mf64 + 2.0) * (nf64 + mf64 + 1.0))
                    / (2.0 * nf64 + 3.0))
                    .sqrt();

                if m == 0 {
                    vr01[(n, m)] /= 2.0_f64.sqrt();
                    vr11[(n, m)] /= 2.0_f64.sqrt();
                }
            }
        }

        Arc::new(Self {
            cosm,
            stor,
            a_nm,
            b_nm,
            c_nm,
            vr01,
            vr11,
        })
    }

    /// Rotation from the frame of the orbit to the Earth fixed frame
    fn dcm_to_fixed(&self, osc: &Orbit) -> Result<Matrix3<f64>, DynamicsError> {
        if osc.frame.is_inertial() {
            self.cosm
                .dcm_gcrf_to_itrf(osc.epoch)
                .context(DynamicsAstroSnafu {
                    model: "spherical harmonics",
                })
        } else {
            Ok(Matrix3::identity())
        }
    }

    /// Non spherical acceleration in the Earth fixed frame, valid for reals and for dual numbers.
    ///
    /// Uses the GMAT notation, with extra character for ease of highlight.
    fn pines<T>(&self, radius: &Vector3<T>) -> Vector3<T>
    where
        T: Float + From<f64> + Scalar,
    {
        let real = |x: f64| -> T { <T as From<f64>>::from(x) };

        let r_ = (radius[0] * radius[0] + radius[1] * radius[1] + radius[2] * radius[2]).sqrt();
        let s_ = radius[0] / r_;
        let t_ = radius[1] / r_;
        let u_ = radius[2] / r_;
        let max_degree = self.stor.max_degree_n();
        let max_order = self.stor.max_order_m();

        // Associated Legendre polynomials, with the diagonal precomputed
        let mut a_nm = self.a_nm.map(real);

        a_nm[(1, 0)] = u_ * real(3.0f64.sqrt());
        for n in 1..=max_degree + 1 {
            let nf64 = n as f64;
            // Off diagonal
            a_nm[(n + 1, n)] = real((2.0 * nf64 + 3.0).sqrt()) * u_ * a_nm[(n, n)];
        }

        for m in 0..=max_order + 1 {
            for n in (m + 2)..=max_degree + 1 {
                a_nm[(n, m)] = u_ * real(self.b_nm[(n, m)]) * a_nm[(n - 1, m)]
                    - real(self.c_nm[(n, m)]) * a_nm[(n - 2, m)];
            }
        }

        // Generate r_m and i_m
        let mut r_m = Vec::with_capacity(min(max_degree, max_order) + 1);
        let mut i_m = Vec::with_capacity(min(max_degree, max_order) + 1);

        r_m.push(real(1.0));
        i_m.push(real(0.0));

        for m in 1..=min(max_degree, max_order) {
            r_m.push(s_ * r_m[m - 1] - t_ * i_m[m - 1]);
            i_m.push(s_ * i_m[m - 1] + t_ * r_m[m - 1]);
        }

        let eq_radius = real(self.cosm.earth_equatorial_radius_km);
        let rho = eq_radius / r_;
        let mut a0 = real(0.0);
        let mut a1 = real(0.0);
        let mut a2 = real(0.0);
        let mut a3 = real(0.0);

        for n in 1..=max_degree {
            let mut sum0 = real(0.0);
            let mut sum1 = real(0.0);
            let mut sum2 = real(0.0);
            let mut sum3 = real(0.0);

            for m in 0..=min(n, max_order) {
                let (c_f64, s_f64) = self.stor.cs_nm(n, m);
                let c_val = real(c_f64);
                let s_val = real(s_f64);
                let d_ = c_val * r_m[m] + s_val * i_m[m];
                let (e_, f_) = if m == 0 {
                    (real(0.0), real(0.0))
                } else {
                    (
                        c_val * r_m[m - 1] + s_val * i_m[m - 1],
                        s_val * r_m[m - 1] - c_val * i_m[m - 1],
                    )
                };

                sum0 = sum0 + real(m as f64) * a_nm[(n, m)] * e_;
                sum1 = sum1 + real(m as f64) * a_nm[(n, m)] * f_;
                sum2 = sum2 + real(self.vr01[(n, m)]) * a_nm[(n, m + 1)] * d_;
                sum3 = sum3 + real(self.vr11[(n, m)]) * a_nm[(n + 1, m + 1)] * d_;
            }
            let rr = rho.powi(n as i32 + 1);
            a0 = a0 + rr * sum0;
            a1 = a1 + rr * sum1;
            a2 = a2 + rr * sum2;
            a3 = a3 + rr * sum3;
        }
        let mu_fact = real(self.cosm.earth_gm_km3_s2) / (eq_radius * r_);
        a0 = a0 * mu_fact;
        a1 = a1 * mu_fact;
        a2 = a2 * mu_fact;
        a3 = -a3 * mu_fact;

        Vector3::new(a0 + a3 * s_, a1 + a3 * t_, a2 + a3 * u_)
    }
}

impl fmt::Display for Harmonics {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}x{} gravity field",
            self.stor.max_degree_n(),
            self.stor.max_order_m()
        )
    }
}

impl AccelModel for Harmonics {
    fn eom(&self, osc: &Orbit) -> Result<Vector3<f64>, DynamicsError> {
        let dcm = self.dcm_to_fixed(osc)?;
        let accel = self.pines(&(dcm * osc.radius_km));
        // Convert back to integration frame
        Ok(dcm.transpose() * accel)
    }

    fn dual_eom(&self, osc: &Orbit) -> Result<(Vector3<f64>, Matrix3<f64>), DynamicsError> {
        // The rotation does not depend on the position, so its dual parts are zero.
        let dcm_d = self
            .dcm_to_fixed(osc)?
            .map(OHyperdual::<f64, Const<4>>::from_real);
        let radius: Vector3<OHyperdual<f64, Const<4>>> = hyperspace_from_vector(&osc.radius_km);

        let accel = dcm_d.transpose() * self.pines(&(dcm_d * radius));

        Ok(extract_jacobian_and_result::<_, U3, U3, _>(&accel))
    }
}

#[cfg(test)]
mod ut_harmonics {
    use super::*;
    use crate::time::Epoch;
    use approx::assert_relative_eq;

    #[test]
    fn j2_matches_analytical() {
        let cosm = Cosm::iers2010();
        let hh = Harmonics::from_stor(HarmonicsMem::j2_egm96(), cosm.clone());

        // Compute directly in the Earth fixed frame
        let orbit = Orbit::cartesian(
            7_000.0,
            1_000.0,
            3_000.0,
            0.0,
            7.0,
            1.0,
            Epoch::from_gregorian_utc_at_midnight(2023, 3, 18),
            cosm.earth_itrf(),
        );
        let acc = hh.eom(&orbit).unwrap();

        let j2 = 0.484_165_371_736e-3 * 5.0_f64.sqrt();
        let (x, y, z) = (orbit.radius_km[0], orbit.radius_km[1], orbit.radius_km[2]);
        let r = orbit.rmag_km();
        let k = -cosm.earth_gm_km3_s2 / r.powi(3)
            * 1.5
            * j2
            * (cosm.earth_equatorial_radius_km / r).powi(2);
        let z2 = 5.0 * z.powi(2) / r.powi(2);
        let expected = Vector3::new(k * x * (1.0 - z2), k * y * (1.0 - z2), k * z * (3.0 - z2));

        assert_relative_eq!(acc, expected, max_relative = 1e-10);
    }

    #[test]
    fn harmonics_partials() {
        let cosm = Cosm::iers2010();
        let hh = Harmonics::from_stor(HarmonicsMem::egm96(4, 4).unwrap(), cosm.clone());
        let orbit = Orbit::cartesian(
            -6_500.0,
            2_500.0,
            1_200.0,
            -2.0,
            -6.5,
            1.0,
            Epoch::from_gregorian_utc_hms(2023, 3, 18, 6, 0, 0),
            cosm.earth_gcrf(),
        );
        let (acc, grad) = hh.dual_eom(&orbit).unwrap();
        assert_relative_eq!(acc, hh.eom(&orbit).unwrap(), max_relative = 1e-10);

        let step_km = 1e-1;
        for j in 0..3 {
            let mut plus = orbit;
            plus.radius_km[j] += step_km;
            let mut minus = orbit;
            minus.radius_km[j] -= step_km;
            let col = (hh.eom(&plus).unwrap() - hh.eom(&minus).unwrap()) / (2.0 * step_km);
            for i in 0..3 {
                assert!(
                    (grad[(i, j)] - col[i]).abs() < 1e-12,
                    "({i}, {j}): {} vs {}",
                    grad[(i, j)],
                    col[i]
                );
            }
        }
    }

    #[test]
    fn inertial_orbit_needs_earth_orientation() {
        let cosm = Cosm::from_almanac(anise::prelude::Almanac::default());
        let hh = Harmonics::from_stor(HarmonicsMem::j2_egm96(), cosm.clone());
        let epoch = Epoch::from_gregorian_utc_at_midnight(2023, 3, 18);

        let inertial = Orbit::cartesian(7_000.0, 0.0, 0.0, 0.0, 7.5, 0.0, epoch, cosm.earth_gcrf());
        assert!(matches!(
            hh.eom(&inertial),
            Err(DynamicsError::DynamicsAstro { .. })
        ));
        // Earth fixed orbits need no rotation
        let fixed = Orbit::cartesian(7_000.0, 0.0, 0.0, 0.0, 7.5, 0.0, epoch, cosm.earth_itrf());
        assert!(hh.eom(&fixed).is_ok());
    }
}
