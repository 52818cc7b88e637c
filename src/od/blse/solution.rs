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

use crate::cosmic::Spacecraft;
use crate::linalg::{DMatrix, Matrix6};
use crate::od::drivers::ParameterDrivers;
use std::fmt;

/// The result of a batch least squares estimation.
#[derive(Clone, Debug)]
pub struct BatchSolution {
    /// Estimated spacecraft state at the reference epoch of the dynamics
    pub estimate: Spacecraft,
    /// Covariance of all of the selected drivers, in physical units, in the order of the drivers
    pub covariance: DMatrix<f64>,
    pub drivers: ParameterDrivers,
    pub iterations: usize,
    pub evaluations: usize,
    /// Root mean square of the weighted residuals of the last evaluation
    pub rms: f64,
    /// False if the iteration or evaluation limit was reached first
    pub converged: bool,
}

impl BatchSolution {
    /// Covariance of the Cartesian state, i.e. the top left block of the drivers covariance.
    ///
    /// Rows and columns of orbital drivers which were not estimated are zero.
    pub fn orbital_covariance(&self) -> Matrix6<f64> {
        let mut covar = Matrix6::zeros();
        let size = self.covariance.nrows().min(self.drivers.orbital.nb_selected()).min(6);
        for i in 0..size {
            for j in 0..size {
                covar[(i, j)] = self.covariance[(i, j)];
            }
        }
        covar
    }
}

impl fmt::Display for BatchSolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} after {} iterations and {} evaluations",
            if self.converged {
                "Converged"
            } else {
                "NOT converged"
            },
            self.iterations,
            self.evaluations
        )?;
        writeln!(f, "Final RMS: {:.6}", self.rms)?;
        writeln!(f, "Estimate: {}", self.estimate)?;
        for (name, value) in self
            .drivers
            .selected_names()
            .iter()
            .zip(self.drivers.selected_values())
            .skip(self.drivers.orbital.nb_selected())
        {
            writeln!(f, "{name}: {value:.9}")?;
        }
        write!(f, "Covariance:{:.3e}", self.covariance)
    }
}
