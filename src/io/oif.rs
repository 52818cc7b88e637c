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

use super::{FileFormatSnafu, InputOutputError, StdIOSnafu};
use crate::cosmic::Cosm;
use crate::linalg::{Vector2, Vector3};
use crate::od::msr::AngularRaDec;
use crate::od::GroundStation;
use crate::time::{Epoch, TimeScale, Unit};
use lazy_static::lazy_static;
use rayon::prelude::*;
use regex::Regex;
use snafu::ResultExt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// Number of lines before the first record: banner, reference epoch and column header
const HEADER_LINES: usize = 3;
/// Records whose first token starts with this marker (case insensitive) are gaps in the data
const SENTINEL: &str = "nan";

lazy_static! {
    static ref MJD_RE: Regex =
        Regex::new(r"MJD\s*=\s*(\d+(?:\.\d*)?)\s+(\d*\.?\d+(?:[eE][-+]?\d+)?)")
            .expect("MJD pattern is valid");
    static ref SENSOR_RE: Regex = Regex::new(r"Sensor\s+(\w+)").expect("sensor pattern is valid");
}

/// Loads the right ascension and declination observations of an OIF file.
///
/// The second line of the file provides the reference epoch as `MJD = <day> <day fraction>` in TT, and every record
/// has the whitespace separated fields `target, offset (s), RA (deg), Dec (deg), sensor X Y Z (km, GCRF)` followed by
/// the sensor velocity, the visual magnitude and the estimated range, which are ignored. The sensor of each record
/// becomes a ground station at the geodetic location of its Earth fixed position at the epoch of that record.
///
/// All observations share the provided sigmas (in radians) and unit weights.
pub fn load_oif<P: AsRef<Path>>(
    path: P,
    sigmas: Vector2<f64>,
    cosm: &Cosm,
) -> Result<Vec<AngularRaDec>, InputOutputError> {
    let path_str = path.as_ref().display().to_string();
    let contents = fs::read_to_string(&path).context(StdIOSnafu {
        action: format!("reading OIF {path_str}"),
    })?;
    let msrs = parse(&contents, &path_str, sigmas, cosm)?;
    info!("{path_str}: loaded {} observations", msrs.len());
    Ok(msrs)
}

/// Loads several OIF files in parallel. Each file succeeds or fails on its own.
pub fn load_many<P: AsRef<Path> + Sync>(
    paths: &[P],
    sigmas: Vector2<f64>,
    cosm: &Cosm,
) -> Vec<Result<Vec<AngularRaDec>, InputOutputError>> {
    paths
        .par_iter()
        .map(|path| load_oif(path, sigmas, cosm))
        .collect()
}

pub(crate) fn parse(
    contents: &str,
    path: &str,
    sigmas: Vector2<f64>,
    cosm: &Cosm,
) -> Result<Vec<AngularRaDec>, InputOutputError> {
    let lines: Vec<&str> = contents.lines().collect();
    let epoch_line = lines.get(1).copied().unwrap_or_default();

    let caps = match MJD_RE.captures(epoch_line) {
        Some(caps) => caps,
        None => {
            return FileFormatSnafu {
                path: path.to_string(),
                line: 2_usize,
                details: "no `MJD = <day> <fraction>` reference epoch",
            }
            .fail()
        }
    };
    let mjd_day = parse_field::<f64>(&caps[1], path, 1, "MJD day")?;
    let mjd_fraction = parse_field::<f64>(&caps[2], path, 1, "MJD fraction")?;
    let reference = Epoch::from_mjd_in_time_scale(mjd_day, TimeScale::TT) + mjd_fraction * Unit::Day;

    let sensor_name = SENSOR_RE
        .captures(epoch_line)
        .map(|caps| format!("Sensor {}", &caps[1]))
        .unwrap_or_else(|| {
            Path::new(path)
                .file_stem()
                .map(|stem| stem.to_string_lossy().to_string())
                .unwrap_or_else(|| path.to_string())
        });

    let mut msrs = Vec::with_capacity(lines.len().saturating_sub(HEADER_LINES));
    for (lno, line) in lines.iter().enumerate().skip(HEADER_LINES) {
        let items: Vec<&str> = line.split_whitespace().collect();
        if items.is_empty() {
            continue;
        }
        if items[0].to_lowercase().starts_with(SENTINEL) {
            debug!("{path}:{}: skipping gap marker", lno + 1);
            continue;
        }
        if items.len() < 7 {
            return FileFormatSnafu {
                path: path.to_string(),
                line: lno + 1,
                details: format!("expected at least 7 fields but found {}", items.len()),
            }
            .fail();
        }

        let target_id = parse_field::<u64>(items[0], path, lno, "target identifier")?;
        let offset_s = parse_field::<f64>(items[1], path, lno, "time offset")?;
        let ra_deg = parse_field::<f64>(items[2], path, lno, "right ascension")?;
        let dec_deg = parse_field::<f64>(items[3], path, lno, "declination")?;
        let mut sensor_gcrf_km = Vector3::zeros();
        for i in 0..3 {
            sensor_gcrf_km[i] = parse_field::<f64>(items[4 + i], path, lno, "sensor position")?;
        }

        let epoch = reference + offset_s * Unit::Second;
        let dcm = cosm
            .dcm_gcrf_to_itrf(epoch)
            .map_err(|e| InputOutputError::FileFormat {
                path: path.to_string(),
                line: lno + 1,
                details: format!("could not locate the sensor: {e}"),
            })?;
        let sensor_itrf_km = dcm * sensor_gcrf_km;
        let station = GroundStation::from_itrf_km(sensor_name.clone(), &sensor_itrf_km, cosm);

        msrs.push(AngularRaDec::new(
            Arc::new(station),
            epoch,
            ra_deg.to_radians(),
            dec_deg.to_radians(),
            sigmas,
            target_id.to_string(),
        ));
    }

    Ok(msrs)
}

fn parse_field<T: FromStr>(item: &str, path: &str, lno: usize, name: &str) -> Result<T, InputOutputError> {
    T::from_str(item).map_err(|_| InputOutputError::FileFormat {
        path: path.to_string(),
        line: lno + 1,
        details: format!("could not parse {name} from `{item}`"),
    })
}

#[cfg(test)]
mod ut_oif {
    use super::*;
    use std::path::PathBuf;

    fn data_dir() -> PathBuf {
        [env!("CARGO_MANIFEST_DIR"), "data", "oif"].iter().collect()
    }

    fn sigmas() -> Vector2<f64> {
        Vector2::new(0.005_f64.to_radians(), 0.005_f64.to_radians())
    }

    #[test]
    fn sample_file() {
        let _ = pretty_env_logger::try_init();
        let cosm = Cosm::iers2010();
        let msrs = load_oif(data_dir().join("sensor34_50008.oif"), sigmas(), &cosm).unwrap();

        // 12 lines: 3 header lines and one gap marker
        assert_eq!(msrs.len(), 8);

        let reference = Epoch::from_mjd_in_time_scale(60_021.0, TimeScale::TT)
            + 0.351_950_231_481_169 * Unit::Day;
        assert_eq!(msrs[0].epoch, reference);
        assert_eq!(msrs[1].epoch, reference + 6.2 * Unit::Second);
        assert_eq!(msrs[7].epoch, reference + 43.4 * Unit::Second);

        assert_eq!(msrs[0].observed[0], (-44.882_743_954_1_f64).to_radians());
        assert_eq!(msrs[0].observed[1], (-2.705_690_397_2_f64).to_radians());
        assert_eq!(msrs[0].target_id, "50008");
        assert_eq!(msrs[0].sigma, sigmas());
        assert_eq!(msrs[0].weight, Vector2::new(1.0, 1.0));

        let station = &msrs[0].station;
        assert_eq!(station.name, "Sensor 34");
        assert!(station.height_km.abs() < 1.0, "{station}");
        // Equatorial sensor, up to the tilt of the true equator of date
        assert!((0.1..0.6).contains(&station.latitude_deg), "{station}");

        // The Earth fixed sensor position maps back onto the GCRF position of the file
        let gcrf = station.position_gcrf_km(msrs[0].epoch, &cosm).unwrap();
        assert!((gcrf - Vector3::new(6152.814973, 1679.541697, 37.682399)).norm() < 1e-5);
    }

    #[test]
    fn malformed_files() {
        let cosm = Cosm::iers2010();
        let err = load_oif(data_dir().join("malformed.oif"), sigmas(), &cosm).unwrap_err();
        assert!(
            matches!(err, InputOutputError::FileFormat { line: 6, .. }),
            "{err}"
        );

        let no_epoch = "CLASSIFICATION: UNCLASSIFIED\nno reference epoch\nheader\n 1 0.0 1.0 2.0 6378.0 0.0 0.0\n";
        assert!(matches!(
            parse(no_epoch, "inline", sigmas(), &cosm),
            Err(InputOutputError::FileFormat { line: 2, .. })
        ));

        let short = "banner\nbase MJD = 60021 0.5\nheader\n 1 0.0 1.0 2.0\nNAN NAN\n";
        assert!(matches!(
            parse(short, "inline", sigmas(), &cosm),
            Err(InputOutputError::FileFormat { line: 4, .. })
        ));

        let bad_target = "banner\nbase MJD = 60021 0.5\nheader\n 50008 0.0 1.0 2.0 6378.0 0.0 0.0\n 5OO08 6.2 1.0 2.0 6378.0 0.0 0.0\n";
        assert_eq!(
            parse(bad_target, "inline", sigmas(), &cosm).unwrap_err(),
            InputOutputError::FileFormat {
                path: "inline".to_string(),
                line: 5,
                details: "could not parse target identifier from `5OO08`".to_string()
            }
        );

        // Only gap markers and blank lines
        let empty = "banner\nbase MJD = 60021 0.5\nheader\nnan\n\nNaN 1 2 3\n";
        assert!(parse(empty, "inline", sigmas(), &cosm).unwrap().is_empty());

        assert!(matches!(
            load_oif(data_dir().join("missing.oif"), sigmas(), &cosm),
            Err(InputOutputError::StdIOError { .. })
        ));
    }

    #[test]
    fn many_files_are_independent() {
        let cosm = Cosm::iers2010();
        let dir = data_dir();
        let paths = [
            dir.join("sensor34_50008.oif"),
            dir.join("malformed.oif"),
            dir.join("sensor34_50008.oif"),
        ];
        let results = load_many(&paths, sigmas(), &cosm);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().map(|msrs| msrs.len()), Ok(8));
        assert!(results[1].is_err());
        assert_eq!(results[0], results[2]);
    }
}
