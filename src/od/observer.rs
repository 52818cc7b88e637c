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

use crate::cosmic::Orbit;
use crate::od::drivers::ParameterDrivers;
use std::sync::mpsc::Receiver;

/// Column header of the convergence table, followed by the names of the selected drivers.
pub const TABLE_HEADER: &str =
    "iteration evaluations      ΔP(m)        ΔV(m/s)           RMS        nb Angular";

/// Width of the centered `active/total` count of measurements
const COUNT_WIDTH: usize = 8;

/// Everything the batch estimator knows after one evaluation of the measurements.
///
/// Events are copies: nothing sent to an observer can alter the estimation.
#[derive(Clone, Debug, PartialEq)]
pub struct EvaluationEvent {
    pub iteration: usize,
    pub evaluation: usize,
    /// Trial orbit at the reference epoch
    pub orbit: Orbit,
    pub drivers: ParameterDrivers,
    /// Number of angular measurements which were processed
    pub nb_processed: usize,
    pub nb_total: usize,
    /// Root mean square of the weighted residuals
    pub rms: f64,
}

/// Prints a convergence table of the batch estimator, one row per evaluation.
///
/// The position and velocity changes are relative to the trial orbit of the previous evaluation,
/// or to the initial guess for the first evaluation.
#[derive(Clone, Debug)]
pub struct ConvergenceObserver {
    previous: Orbit,
    rows: usize,
}

impl ConvergenceObserver {
    pub fn new(initial_guess: Orbit) -> Self {
        Self {
            previous: initial_guess,
            rows: 0,
        }
    }

    /// Number of evaluations observed so far
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn header(drivers: &ParameterDrivers) -> String {
        let mut header = TABLE_HEADER.to_string();
        for name in drivers.selected_names() {
            header.push_str(&format!("  {name:>22}"));
        }
        header
    }

    /// Formats the row of this event and remembers its orbit as the new previous orbit.
    pub fn row(&mut self, event: &EvaluationEvent) -> String {
        let (dp_km, dv_km_s) = event.orbit.rss(&self.previous);
        self.previous = event.orbit;
        self.rows += 1;

        let mut row = format!(
            "    {:2}         {:2}      {:13.6} {:12.9} {:16.12}     {}",
            event.iteration,
            event.evaluation,
            dp_km * 1e3,
            dv_km_s * 1e3,
            event.rms,
            format_count(event.nb_processed, event.nb_total, COUNT_WIDTH)
        );
        for value in event.drivers.selected_values() {
            row.push_str(&format!("  {value:22.9}"));
        }
        row
    }

    pub fn observe(&mut self, event: &EvaluationEvent) {
        if self.rows == 0 {
            info!("{}", Self::header(&event.drivers));
        }
        let row = self.row(event);
        info!("{row}");
    }

    /// Observes all events until every sender of the channel is dropped.
    pub fn listen(mut self, rx: Receiver<EvaluationEvent>) -> Self {
        for event in rx.iter() {
            self.observe(&event);
        }
        self
    }
}

/// Centers `active/total` in a field of the provided width, padding on the left first.
pub fn format_count(active: usize, total: usize, width: usize) -> String {
    let mut count = format!("{active}/{total}");
    while count.len() < width {
        if count.len() % 2 == 0 {
            count.insert(0, ' ');
        } else {
            count.push(' ');
        }
    }
    count
}
