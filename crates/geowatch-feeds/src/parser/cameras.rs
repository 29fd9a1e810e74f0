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

//! Camera directory parsing.
//!
//! The camera layer is the union of a directory bundled with the crate and a
//! best-effort directory scraped from an HTML page. Stream URLs from either
//! side are hints only; nothing here checks that a stream is live.

use std::collections::HashMap;

use log::debug;
use scraper::{Html, Selector};
use serde::Deserialize;

use crate::entity::{valid_coordinate, CameraEntity, CameraOrigin, EntityId, SourceKind};
use crate::error::FeedError;

/// Directory bundled with the crate.
pub const BUILTIN_CAMERA_CSV: &str = include_str!("../../data/cameras.csv");

#[derive(Debug, Deserialize)]
struct CameraRow {
    key: String,
    name: String,
    latitude: f64,
    longitude: f64,
    stream_url: Option<String>,
}

/// Parse a camera directory in CSV form (`key,name,latitude,longitude,stream_url`).
pub fn parse_builtin_cameras(data: &str) -> Result<Vec<CameraEntity>, FeedError> {
    let mut csv_reader = csv::Reader::from_reader(data.as_bytes());

    let mut cameras = Vec::new();
    for result in csv_reader.deserialize() {
        let row: CameraRow = result.map_err(|e| FeedError::Decode(format!("camera directory: {e}")))?;
        let key = row.key.trim();
        if key.is_empty() || !valid_coordinate(row.latitude, row.longitude) {
            debug!("Skipping built-in camera row '{}'", row.key);
            continue;
        }
        cameras.push(camera(
            key,
            row.name.trim(),
            row.latitude,
            row.longitude,
            row.stream_url,
            CameraOrigin::BuiltIn,
        ));
    }
    Ok(cameras)
}

/// Extract cameras from an HTML directory page.
///
/// Any element carrying `data-camera-id`, `data-lat` and `data-lon` is a
/// camera; `data-name` and `data-stream` are optional.
pub fn parse_camera_page(html: &str) -> Result<Vec<CameraEntity>, FeedError> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("[data-camera-id]")
        .map_err(|e| FeedError::Decode(format!("invalid camera selector: {e:?}")))?;

    let mut cameras = Vec::new();
    for element in document.select(&selector) {
        let el = element.value();
        let Some(key) = el.attr("data-camera-id").map(str::trim).filter(|k| !k.is_empty()) else {
            continue;
        };
        let lat = el.attr("data-lat").and_then(|v| v.trim().parse::<f64>().ok());
        let lon = el.attr("data-lon").and_then(|v| v.trim().parse::<f64>().ok());
        let (Some(lat), Some(lon)) = (lat, lon) else {
            debug!("Scraped camera '{key}' has no usable position");
            continue;
        };
        if !valid_coordinate(lat, lon) {
            debug!("Scraped camera '{key}' is out of range: {lat}, {lon}");
            continue;
        }
        let name = el
            .attr("data-name")
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(key);
        let stream = el
            .attr("data-stream")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        cameras.push(camera(key, name, lat, lon, stream, CameraOrigin::Scraped));
    }
    Ok(cameras)
}

/// Union of two directories keyed by camera key.
///
/// A scraped entry replaces the built-in entry with the same key in place;
/// new scraped keys are appended in page order.
#[must_use]
pub fn merge_camera_directories(builtin: Vec<CameraEntity>, scraped: Vec<CameraEntity>) -> Vec<CameraEntity> {
    let mut merged = builtin;
    let mut index: HashMap<String, usize> = merged
        .iter()
        .enumerate()
        .map(|(i, cam)| (cam.key.clone(), i))
        .collect();

    for cam in scraped {
        match index.get(&cam.key) {
            Some(&i) => merged[i] = cam,
            None => {
                index.insert(cam.key.clone(), merged.len());
                merged.push(cam);
            }
        }
    }
    merged
}

fn camera(
    key: &str,
    name: &str,
    latitude: f64,
    longitude: f64,
    stream_url: Option<String>,
    origin: CameraOrigin,
) -> CameraEntity {
    CameraEntity {
        id: EntityId::new(SourceKind::Cameras, key),
        key: key.to_string(),
        name: name.to_string(),
        stream_url: stream_url.filter(|s| !s.trim().is_empty()),
        origin,
        latitude,
        longitude,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <ul class="cams">
            <li data-camera-id="sf-golden-gate" data-lat="37.82" data-lon="-122.48"
                data-name="Golden Gate (north tower)" data-stream="https://cams.example.net/ggb.m3u8">GGB</li>
            <li data-camera-id="bos-harbor" data-lat="42.36" data-lon="-71.05">Boston</li>
            <li data-camera-id="nowhere" data-lat="abc" data-lon="1.0">bad</li>
            <li data-camera-id="polar" data-lat="95.0" data-lon="1.0">bad</li>
            <li data-lat="10.0" data-lon="10.0">no id</li>
          </ul>
        </body></html>
    "#;

    #[test]
    fn test_builtin_directory_loads() {
        let cameras = parse_builtin_cameras(BUILTIN_CAMERA_CSV).unwrap();
        assert!(cameras.len() >= 10);
        assert!(cameras.iter().all(|c| c.origin == CameraOrigin::BuiltIn));
        let ggb = cameras.iter().find(|c| c.key == "sf-golden-gate").unwrap();
        assert_eq!(ggb.id.as_str(), "cameras:sf-golden-gate");
        assert_eq!(ggb.stream_url, None);
    }

    #[test]
    fn test_builtin_skips_bad_rows() {
        let data = "key,name,latitude,longitude,stream_url\n\
                    ok,Good,10.0,20.0,\n\
                    ,Nameless,10.0,20.0,\n\
                    far,Off map,10.0,200.0,\n";
        let cameras = parse_builtin_cameras(data).unwrap();
        assert_eq!(cameras.len(), 1);
        assert_eq!(cameras[0].key, "ok");
    }

    #[test]
    fn test_builtin_malformed_is_decode_error() {
        let data = "key,name,latitude,longitude,stream_url\nx,Y,north,20.0,\n";
        assert!(matches!(parse_builtin_cameras(data), Err(FeedError::Decode(_))));
    }

    #[test]
    fn test_parse_page() {
        let cameras = parse_camera_page(PAGE).unwrap();
        assert_eq!(cameras.len(), 2);
        assert_eq!(cameras[0].name, "Golden Gate (north tower)");
        assert_eq!(cameras[0].stream_url.as_deref(), Some("https://cams.example.net/ggb.m3u8"));
        assert_eq!(cameras[1].name, "bos-harbor");
        assert!(cameras.iter().all(|c| c.origin == CameraOrigin::Scraped));
    }

    #[test]
    fn test_merge_prefers_scraped() {
        let builtin = parse_builtin_cameras(BUILTIN_CAMERA_CSV).unwrap();
        let builtin_len = builtin.len();
        let scraped = parse_camera_page(PAGE).unwrap();

        let merged = merge_camera_directories(builtin, scraped);
        assert_eq!(merged.len(), builtin_len + 1);

        let ggb: Vec<_> = merged.iter().filter(|c| c.key == "sf-golden-gate").collect();
        assert_eq!(ggb.len(), 1);
        assert_eq!(ggb[0].origin, CameraOrigin::Scraped);
        assert_eq!(merged.last().map(|c| c.key.as_str()), Some("bos-harbor"));
    }
}
