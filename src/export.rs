// src/export.rs
//! Walk trace export to GPX, GeoJSON, and CSV

use crate::error::{Result, TrackerError};
use crate::walk::{format_timestamp, Walk};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WalkExportFormat {
    Gpx,
    GeoJson,
    Csv,
}

impl WalkExportFormat {
    pub fn extension(&self) -> &str {
        match self {
            WalkExportFormat::Gpx => "gpx",
            WalkExportFormat::GeoJson => "geojson",
            WalkExportFormat::Csv => "csv",
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            WalkExportFormat::Gpx => "GPX (GPS Exchange)",
            WalkExportFormat::GeoJson => "GeoJSON",
            WalkExportFormat::Csv => "CSV",
        }
    }
}

impl FromStr for WalkExportFormat {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "gpx" => Ok(WalkExportFormat::Gpx),
            "geojson" => Ok(WalkExportFormat::GeoJson),
            "csv" => Ok(WalkExportFormat::Csv),
            other => Err(TrackerError::Other(format!(
                "Unknown export format '{}' (expected gpx, geojson, or csv)",
                other
            ))),
        }
    }
}

/// Write a walk's trace to a file in the given format.
pub fn export_walk(walk: &Walk, path: &Path, format: WalkExportFormat) -> Result<()> {
    if walk.coordinates.is_empty() {
        return Err(TrackerError::Other(
            "Walk has no coordinates to export".to_string(),
        ));
    }

    let content = match format {
        WalkExportFormat::Gpx => to_gpx(walk),
        WalkExportFormat::GeoJson => to_geojson(walk)?,
        WalkExportFormat::Csv => to_csv(walk),
    };

    let mut file = File::create(path).map_err(TrackerError::Io)?;
    file.write_all(content.as_bytes()).map_err(TrackerError::Io)?;

    Ok(())
}

fn to_gpx(walk: &Walk) -> String {
    let mut gpx = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="Walk Tracker" xmlns="http://www.topografix.com/GPX/1/1">
"#,
    );

    if let Some(started_at) = walk.started_at() {
        gpx.push_str(&format!(
            "  <metadata>\n    <time>{}</time>\n  </metadata>\n",
            started_at.to_rfc3339()
        ));
    }

    gpx.push_str(&format!(
        "  <trk>\n    <name>{}</name>\n    <trkseg>\n",
        escape_xml(&format!("Walk on {}", format_timestamp(walk.start_time)))
    ));

    for coordinate in &walk.coordinates {
        gpx.push_str(&format!(
            "      <trkpt lat=\"{}\" lon=\"{}\"/>\n",
            coordinate.latitude, coordinate.longitude
        ));
    }

    gpx.push_str("    </trkseg>\n  </trk>\n</gpx>\n");
    gpx
}

fn to_geojson(walk: &Walk) -> Result<String> {
    let line: Vec<serde_json::Value> = walk
        .coordinates
        .iter()
        .map(|c| serde_json::json!([c.longitude, c.latitude]))
        .collect();

    let mut features = vec![serde_json::json!({
        "type": "Feature",
        "geometry": {
            "type": "LineString",
            "coordinates": line,
        },
        "properties": {
            "id": walk.id,
            "startTime": walk.start_time,
            "endTime": walk.end_time,
            "duration": walk.duration,
            "distanceKm": walk.distance_km(),
        }
    })];

    for (marker, coordinate) in [
        ("start", walk.coordinates.first()),
        ("end", walk.coordinates.last()),
    ] {
        if let Some(c) = coordinate {
            features.push(serde_json::json!({
                "type": "Feature",
                "geometry": {
                    "type": "Point",
                    "coordinates": [c.longitude, c.latitude],
                },
                "properties": { "marker": marker }
            }));
        }
    }

    let feature_collection = serde_json::json!({
        "type": "FeatureCollection",
        "features": features,
    });

    serde_json::to_string_pretty(&feature_collection).map_err(TrackerError::Json)
}

fn to_csv(walk: &Walk) -> String {
    let mut csv = String::from("index,latitude,longitude\n");

    for (index, coordinate) in walk.coordinates.iter().enumerate() {
        csv.push_str(&format!(
            "{},{},{}\n",
            index, coordinate.latitude, coordinate.longitude
        ));
    }

    csv
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::walk::Coordinate;

    fn sample_walk() -> Walk {
        let mut walk = Walk::begin(1_700_000_000_000);
        walk.coordinates.push(Coordinate::new(51.5074, -0.1278));
        walk.coordinates.push(Coordinate::new(51.5080, -0.1290));
        walk.finalize(1_700_000_300_000);
        walk
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("gpx".parse::<WalkExportFormat>().unwrap(), WalkExportFormat::Gpx);
        assert_eq!(
            "GeoJSON".parse::<WalkExportFormat>().unwrap(),
            WalkExportFormat::GeoJson
        );
        assert!("kml".parse::<WalkExportFormat>().is_err());
    }

    #[test]
    fn test_gpx_contains_trace_points() {
        let gpx = to_gpx(&sample_walk());
        assert!(gpx.contains("<gpx"));
        assert!(gpx.contains("<trkseg>"));
        assert!(gpx.contains("lat=\"51.5074\""));
        assert!(gpx.contains("lon=\"-0.129\""));
    }

    #[test]
    fn test_geojson_line_and_markers() {
        let geojson = to_geojson(&sample_walk()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&geojson).unwrap();

        let features = parsed["features"].as_array().unwrap();
        assert_eq!(features.len(), 3);
        assert_eq!(features[0]["geometry"]["type"], "LineString");
        assert_eq!(features[1]["properties"]["marker"], "start");
        assert_eq!(features[2]["properties"]["marker"], "end");
    }

    #[test]
    fn test_csv_rows() {
        let csv = to_csv(&sample_walk());
        assert!(csv.starts_with("index,latitude,longitude\n"));
        assert!(csv.contains("0,51.5074,-0.1278"));
        assert!(csv.contains("1,51.508,-0.129"));
    }
}
