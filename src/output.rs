//! Output documents.
//!
//! Every processing entry point returns a [`TrajectoryDocument`]: the
//! resulting trajectory plus a [`TrajectoryMeta`] describing what was done to
//! it. Documents render as a GeoJSON `FeatureCollection` (start point, end
//! point, trajectory line) with the metadata under a top-level `meta` member.
//!
//! Writing documents anywhere is left to a [`TrajectorySink`].

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::denoise::NoiseReport;
use crate::gap_fill::GapFillReport;
use crate::geo_utils::TrajectorySummary;
use crate::simplify::SimplifyReport;
use crate::{CoordinateSystem, Result, Trajectory, TrajectoryPoint};

/// Processing metadata, keyed the way downstream consumers expect.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryMeta {
    pub coord_type: CoordinateSystem,

    /// Statistics of the input trajectory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traj_info: Option<TrajectorySummary>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noise_info: Option<NoiseReport>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simplify_info: Option<SimplifyReport>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_supplement_info: Option<GapFillReport>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_point: Option<TrajectoryPoint>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_point: Option<TrajectoryPoint>,
}

/// A processed trajectory with its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryDocument {
    pub trajectory: Trajectory,
    pub meta: TrajectoryMeta,
}

impl TrajectoryDocument {
    /// Wrap a trajectory, filling the coordinate system and start/end points
    /// of `meta` from it.
    pub fn new(trajectory: Trajectory, mut meta: TrajectoryMeta) -> Self {
        meta.coord_type = trajectory.coord_system;
        meta.start_point = trajectory.points.first().copied();
        meta.end_point = trajectory.points.last().copied();
        Self { trajectory, meta }
    }

    /// GeoJSON `FeatureCollection` with start, end and line features.
    pub fn to_geojson(&self) -> Result<Value> {
        let points = &self.trajectory.points;
        let mut features = Vec::with_capacity(3);

        if let (Some(start), Some(end)) = (points.first(), points.last()) {
            features.push(endpoint_feature(start, "start", "green"));
            features.push(endpoint_feature(end, "end", "red"));
        }

        let coordinates: Vec<[f64; 2]> = points.iter().map(|p| [p.lng, p.lat]).collect();
        features.push(json!({
            "type": "Feature",
            "geometry": { "type": "LineString", "coordinates": coordinates },
            "properties": {
                "start_time": points.first().and_then(|p| p.timestamp),
                "end_time": points.last().and_then(|p| p.timestamp),
                "timestamps": points.iter().map(|p| p.timestamp).collect::<Vec<_>>(),
                "speeds": points.iter().map(|p| p.speed).collect::<Vec<_>>(),
                "directions": points.iter().map(|p| p.direction).collect::<Vec<_>>(),
            }
        }));

        Ok(json!({
            "type": "FeatureCollection",
            "features": features,
            "meta": serde_json::to_value(&self.meta)?,
        }))
    }
}

fn endpoint_feature(point: &TrajectoryPoint, role: &str, color: &str) -> Value {
    json!({
        "type": "Feature",
        "geometry": { "type": "Point", "coordinates": [point.lng, point.lat] },
        "properties": {
            "role": role,
            "color": color,
            "time": point.timestamp,
            "point": point,
        }
    })
}

/// Persistence collaborator for finished documents.
pub trait TrajectorySink {
    fn write(&mut self, document: &TrajectoryDocument) -> Result<()>;
}

/// Keeps every written document in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub documents: Vec<TrajectoryDocument>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TrajectorySink for MemorySink {
    fn write(&mut self, document: &TrajectoryDocument) -> Result<()> {
        self.documents.push(document.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document() -> TrajectoryDocument {
        let trajectory = Trajectory::new(
            CoordinateSystem::Wgs84,
            vec![
                TrajectoryPoint::with_timestamp(104.0, 30.6, 1_000),
                TrajectoryPoint::with_timestamp(104.001, 30.6, 6_000),
                TrajectoryPoint::with_timestamp(104.002, 30.6, 11_000),
            ],
        );
        let meta = TrajectoryMeta {
            traj_info: Some(TrajectorySummary::from_trajectory(&trajectory)),
            noise_info: Some(NoiseReport::default()),
            ..TrajectoryMeta::default()
        };
        TrajectoryDocument::new(trajectory, meta)
    }

    #[test]
    fn test_new_fills_endpoints() {
        let doc = document();
        assert_eq!(doc.meta.start_point.unwrap().timestamp, Some(1_000));
        assert_eq!(doc.meta.end_point.unwrap().timestamp, Some(11_000));
    }

    #[test]
    fn test_geojson_shape() {
        let value = document().to_geojson().unwrap();
        assert_eq!(value["type"], "FeatureCollection");

        let features = value["features"].as_array().unwrap();
        assert_eq!(features.len(), 3);
        assert_eq!(features[0]["geometry"]["type"], "Point");
        assert_eq!(features[1]["properties"]["time"], 11_000);

        let line = &features[2];
        assert_eq!(line["geometry"]["type"], "LineString");
        assert_eq!(line["geometry"]["coordinates"].as_array().unwrap().len(), 3);
        assert_eq!(line["properties"]["timestamps"][1], 6_000);
        assert!(line["properties"]["speeds"][0].is_null());

        let meta = &value["meta"];
        assert_eq!(meta["coord_type"], "wgs84");
        assert!(meta["traj_info"].is_object());
        assert_eq!(meta["noise_info"]["noise_count"], 0);
        assert!(meta.get("simplify_info").is_none());
    }

    #[test]
    fn test_memory_sink() {
        let mut sink = MemorySink::new();
        sink.write(&document()).unwrap();
        sink.write(&document()).unwrap();
        assert_eq!(sink.documents.len(), 2);
    }
}
