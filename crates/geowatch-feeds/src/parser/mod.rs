// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Feed payload parsers.
//!
//! Each parser is a pure function from raw fetched bytes to a snapshot of
//! typed entities. A payload whose overall shape is wrong fails with
//! [`FeedError::Decode`](crate::FeedError::Decode); individual bad records
//! inside an otherwise good payload are dropped and the batch succeeds.

pub mod cameras;
pub mod flights;
pub mod geojson;
pub mod radar;
pub mod seismic;
pub mod tle;
pub mod weather;

pub use cameras::{merge_camera_directories, parse_builtin_cameras, parse_camera_page};
pub use flights::parse_flight_states;
pub use radar::parse_radar_stations;
pub use seismic::parse_earthquakes;
pub use tle::{parse_tle_catalog, parse_tle_set};
pub use weather::{category_for_event, parse_weather_alerts, severity_from_str};
