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

use super::{FileFormatSnafu, GravityFieldSizeSnafu, InputOutputError, StdIOSnafu};
use snafu::{ensure, ResultExt};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Fully normalized, tide free, EGM96 coefficients of the Earth up to degree and order 21, as `n m C_nm S_nm` lines.
const EGM96_21X21: &str = include_str!("../../data/egm96_21x21.txt");

/// Normalized C_20 of EGM96
const EGM96_C20: f64 = -0.484_165_371_736e-3;

/// Highest degree and order available in the embedded gravity field
pub const EMBEDDED_MAX_DEGREE: u16 = 21;

/// `HarmonicsMem` stores the normalized spherical harmonics coefficients in memory.
///
/// Any coefficient which is not stored, including those of degrees zero and one, is zero.
#[derive(Clone, Debug)]
pub struct HarmonicsMem {
    degree: u16,
    order: u16,
    // (degree, order) -> (C_nm, S_nm)
    data: HashMap<(u16, u16), (f64, f64)>,
}

impl HarmonicsMem {
    /// Initialize `HarmonicsMem` as an Earth J<sub>2</sub> only model (EGM96 value).
    pub fn j2_egm96() -> Self {
        let mut data = HashMap::new();
        data.insert((2, 0), (EGM96_C20, 0.0));
        Self {
            degree: 2,
            order: 0,
            data,
        }
    }

    /// Initialize `HarmonicsMem` from the embedded EGM96 field, truncated to the requested degree and order.
    ///
    /// Requests beyond degree or order 21 need a coefficients file, cf. [HarmonicsMem::from_file].
    pub fn egm96(degree: u16, order: u16) -> Result<Self, InputOutputError> {
        ensure!(
            degree <= EMBEDDED_MAX_DEGREE && order <= EMBEDDED_MAX_DEGREE,
            GravityFieldSizeSnafu {
                field: "embedded EGM96",
                degree,
                order,
                max_degree: EMBEDDED_MAX_DEGREE,
            }
        );
        Self::parse(EGM96_21X21, "embedded EGM96", degree, order.min(degree))
    }

    /// Loads the normalized coefficients from a text file where each line is `n m C_nm S_nm`.
    ///
    /// Additional columns (e.g. the standard deviations) are ignored, and `D` exponents are accepted.
    pub fn from_file<P: AsRef<Path>>(path: P, degree: u16, order: u16) -> Result<Self, InputOutputError> {
        let path_str = path.as_ref().display().to_string();
        let contents = fs::read_to_string(&path).context(StdIOSnafu {
            action: format!("reading gravity field {path_str}"),
        })?;
        Self::parse(&contents, &path_str, degree, order)
    }

    pub(crate) fn parse(
        contents: &str,
        path: &str,
        degree: u16,
        order: u16,
    ) -> Result<Self, InputOutputError> {
        let mut data = HashMap::new();
        let mut max_degree = 0;
        let mut max_order = 0;

        for (lno, line) in contents.lines().enumerate() {
            let items: Vec<&str> = line.split_whitespace().collect();
            if items.is_empty() || items[0].starts_with('#') {
                continue;
            }
            if items.len() < 4 {
                return Err(InputOutputError::FileFormat {
                    path: path.to_string(),
                    line: lno + 1,
                    details: format!("expected `n m C S` but found {} fields", items.len()),
                });
            }

            let n = parse_field::<u16>(items[0], path, lno, "degree")?;
            let m = parse_field::<u16>(items[1], path, lno, "order")?;
            let c_nm = parse_field::<f64>(&items[2].replace(['D', 'd'], "E"), path, lno, "C_nm")?;
            let s_nm = parse_field::<f64>(&items[3].replace(['D', 'd'], "E"), path, lno, "S_nm")?;

            if m > n {
                return FileFormatSnafu {
                    path: path.to_string(),
                    line: lno + 1,
                    details: format!("order {m} greater than degree {n}"),
                }
                .fail();
            }

            if n <= degree && m <= order {
                data.insert((n, m), (c_nm, s_nm));
                max_degree = max_degree.max(n);
                max_order = max_order.max(m);
            }
        }

        if max_degree < degree || max_order < order {
            warn!(
                "{path} only contained (degree, order) of ({max_degree}, {max_order}) instead of requested ({degree}, {order})"
            );
        } else {
            info!("{path} loaded with (degree, order) = ({degree}, {order})");
        }

        Ok(Self {
            degree: max_degree,
            order: max_order,
            data,
        })
    }

    /// Maximum degree of this gravity field
    pub fn max_degree_n(&self) -> usize {
        self.degree.into()
    }

    /// Maximum order of this gravity field
    pub fn max_order_m(&self) -> usize {
        self.order.into()
    }

    /// Returns the normalized C_nm and S_nm for the provided degree and order, zero if they are not stored.
    pub fn cs_nm(&self, degree: usize, order: usize) -> (f64, f64) {
        // Degrees above u16::MAX are never stored
        match (u16::try_from(degree), u16::try_from(order)) {
            (Ok(n), Ok(m)) => self.data.get(&(n, m)).copied().unwrap_or((0.0, 0.0)),
            _ => (0.0, 0.0),
        }
    }
}

fn parse_field<T: FromStr>(item: &str, path: &str, lno: usize, name: &str) -> Result<T, InputOutputError> {
    T::from_str(item).map_err(|_| InputOutputError::FileFormat {
        path: path.to_string(),
        line: lno + 1,
        details: format!("could not parse {name} from `{item}`"),
    })
}
