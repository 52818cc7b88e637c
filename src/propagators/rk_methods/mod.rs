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

mod dormand;
pub use self::dormand::*;

/// Butcher tableau of an explicit embedded Runge Kutta method.
#[allow(clippy::upper_case_acronyms)]
pub trait RK
where
    Self: Sized,
{
    /// Order of the higher order solution, used to adapt the step
    const ORDER: u8;
    const STAGES: usize;
    /// Lower triangle of the A matrix, row by row: `STAGES * (STAGES - 1) / 2` coefficients
    const A_COEFFS: &'static [f64];
    /// The b_i of the propagated solution, then the b*_i of the embedded one used for the error estimate
    const B_COEFFS: &'static [f64];
}

#[cfg(test)]
mod ut_butcher {
    use super::*;

    fn check_consistency<T: RK>() {
        assert_eq!(T::A_COEFFS.len(), T::STAGES * (T::STAGES - 1) / 2);
        assert_eq!(T::B_COEFFS.len(), 2 * T::STAGES);
        let (b, b_star) = T::B_COEFFS.split_at(T::STAGES);
        assert!((b.iter().sum::<f64>() - 1.0).abs() < 1e-14);
        assert!((b_star.iter().sum::<f64>() - 1.0).abs() < 1e-14);
    }

    #[test]
    fn dormand45_tableau() {
        check_consistency::<Dormand45>();
    }
}
