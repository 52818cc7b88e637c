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

use serde::de::DeserializeOwned;
use serde::Serialize;
use snafu::prelude::*;
use std::fmt::Debug;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Handles loading of spherical harmonics coefficients, from files or from the embedded EGM96 table.
pub mod gravity;
/// Reads the angles-only observation files, one file per object.
pub mod oif;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConfigError {
    #[snafu(display("failed to read configuration file: {source}"))]
    ReadError { source: std::io::Error },

    #[snafu(display("failed to parse YAML configuration file: {source}"))]
    ParseError { source: serde_yaml::Error },

    #[snafu(display("invalid configuration: {msg}"))]
    InvalidConfig { msg: String },
}

impl PartialEq for ConfigError {
    /// No two configuration errors match
    fn eq(&self, _other: &Self) -> bool {
        false
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum InputOutputError {
    #[snafu(display("{path}:{line}: {details}"))]
    FileFormat {
        path: String,
        line: usize,
        details: String,
    },
    #[snafu(display(
        "{field} gravity field stops at degree and order {max_degree} but {degree}x{order} was requested"
    ))]
    GravityFieldSize {
        field: &'static str,
        degree: u16,
        order: u16,
        max_degree: u16,
    },
    #[snafu(display("{action} encountered {source}"))]
    StdIOError {
        source: std::io::Error,
        action: String,
    },
}

impl PartialEq for InputOutputError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::FileFormat {
                    path: p1,
                    line: l1,
                    details: d1,
                },
                Self::FileFormat {
                    path: p2,
                    line: l2,
                    details: d2,
                },
            ) => p1 == p2 && l1 == l2 && d1 == d2,
            (
                Self::GravityFieldSize {
                    field: f1,
                    degree: n1,
                    order: m1,
                    max_degree: x1,
                },
                Self::GravityFieldSize {
                    field: f2,
                    degree: n2,
                    order: m2,
                    max_degree: x2,
                },
            ) => f1 == f2 && n1 == n2 && m1 == m2 && x1 == x2,
            _ => false,
        }
    }
}

pub trait ConfigRepr: Debug + Sized + Serialize + DeserializeOwned {
    /// Builds the configuration representation from the path to a yaml
    fn load<P>(path: P) -> Result<Self, ConfigError>
    where
        P: AsRef<Path>,
    {
        let file = File::open(path).context(ReadSnafu)?;
        let reader = BufReader::new(file);

        serde_yaml::from_reader(reader).context(ParseSnafu)
    }

    /// Builds a sequence of "Selves" from the provided path to a yaml
    fn load_many<P>(path: P) -> Result<Vec<Self>, ConfigError>
    where
        P: AsRef<Path>,
    {
        let file = File::open(path).context(ReadSnafu)?;
        let reader = BufReader::new(file);

        serde_yaml::from_reader(reader).context(ParseSnafu)
    }

    /// Builds "Self" from the provided string of a yaml
    fn loads(data: &str) -> Result<Self, ConfigError> {
        debug!("Loading YAML:\n{data}");
        serde_yaml::from_str(data).context(ParseSnafu)
    }

    /// Builds a sequence of "Selves" from the provided string of a yaml
    fn loads_many(data: &str) -> Result<Vec<Self>, ConfigError> {
        debug!("Loading YAML:\n{data}");
        serde_yaml::from_str(data).context(ParseSnafu)
    }

    /// Serializes this configuration as a YAML string
    fn dumps(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).context(ParseSnafu)
    }
}
