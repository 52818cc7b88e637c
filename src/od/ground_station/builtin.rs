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

use super::*;

impl GroundStation {
    /// GEODSS site on Diego Garcia, British Indian Ocean Territory
    pub fn diego_garcia() -> Self {
        Self::from_point("Diego Garcia".to_string(), 0.465_765, 73.216_2, -0.094_178_3)
    }

    /// GEODSS site on Haleakala, Maui, Hawaii
    pub fn maui() -> Self {
        Self::from_point("Maui".to_string(), 20.692_4, -156.309, 2.119_62)
    }

    /// Optical site at Eglin Air Force Base, Florida
    pub fn eglin() -> Self {
        Self::from_point("Eglin".to_string(), 30.476, -86.585_7, -0.021_24)
    }
}
