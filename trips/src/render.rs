//! GeoJSON layers for eyeballing the results on a map.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::Result;
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, Value};
use geom::GPSBounds;

use crate::{PositionSample, RawInput, RegionClassifier, TripTable, VehicleName};

const PALETTE: [&str; 12] = [
    "#e6194b", "#3cb44b", "#4363d8", "#f58231", "#911eb4", "#42d4f4", "#f032e6", "#bfef45",
    "#469990", "#9a6324", "#800000", "#000075",
];

// Colors cycle through the palette in vehicle order
struct VehicleColors(BTreeMap<VehicleName, &'static str>);

impl VehicleColors {
    fn new<'a, I: Iterator<Item = &'a VehicleName>>(vehicles: I) -> Self {
        Self(
            vehicles
                .zip(PALETTE.iter().cycle())
                .map(|(name, color)| (name.clone(), *color))
                .collect(),
        )
    }

    fn get(&self, vehicle: &VehicleName) -> &'static str {
        self.0.get(vehicle).copied().unwrap_or(PALETTE[0])
    }
}

fn feature(value: Value) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(value)),
        id: None,
        properties: None,
        foreign_members: None,
    }
}

fn point(sample: &PositionSample) -> Value {
    Value::Point(vec![sample.lon, sample.lat])
}

fn line(from: &PositionSample, to: &PositionSample) -> Value {
    Value::LineString(vec![vec![from.lon, from.lat], vec![to.lon, to.lat]])
}

fn timestamp(sample: &PositionSample) -> String {
    sample.time.format(crate::avl::TIMESTAMP_FORMAT).to_string()
}

/// A start point, an end point, and a straight line between them for every trip.
pub fn trip_endpoints(table: &TripTable) -> Vec<Feature> {
    let vehicles: BTreeSet<&VehicleName> =
        table.rows.iter().map(|row| &row.sample.vehicle).collect();
    let colors = VehicleColors::new(vehicles.into_iter());

    let mut features = Vec::new();
    for rows in table.trips() {
        let first = rows[0].sample;
        let last = rows[rows.len() - 1].sample;
        let color = colors.get(&first.vehicle);

        for (kind, value, sample) in [
            ("start", point(first), first),
            ("end", point(last), last),
            ("link", line(first, last), first),
        ] {
            let mut f = feature(value);
            f.set_property("kind", kind);
            f.set_property("trip_id", rows[0].trip.0);
            f.set_property("trip_type", rows[0].trip_type.label());
            f.set_property("vehicle", first.vehicle.0.clone());
            f.set_property("timestamp", timestamp(sample));
            f.set_property("marker-color", color);
            f.set_property("stroke", color);
            features.push(f);
        }
    }
    features
}

/// Every sample of the first `max_vehicles` vehicles.
pub fn raw_positions(input: &RawInput, max_vehicles: usize) -> Vec<Feature> {
    let colors = VehicleColors::new(input.vehicles.keys());
    let mut features = Vec::new();
    for (vehicle, samples) in input.vehicles.iter().take(max_vehicles) {
        for sample in samples {
            let mut f = feature(point(sample));
            f.set_property("vehicle", vehicle.0.clone());
            f.set_property("timestamp", timestamp(sample));
            f.set_property("marker-color", colors.get(vehicle));
            features.push(f);
        }
    }
    features
}

/// The first and last sample of each vehicle's whole day, ignoring trips.
pub fn vehicle_endpoints(input: &RawInput, max_vehicles: usize) -> Vec<Feature> {
    let colors = VehicleColors::new(input.vehicles.keys());
    let mut features = Vec::new();
    for (vehicle, samples) in input.vehicles.iter().take(max_vehicles) {
        let (first, last) = match (samples.first(), samples.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => continue,
        };
        let color = colors.get(vehicle);
        for (kind, value, sample) in [
            ("start", point(first), first),
            ("end", point(last), last),
            ("link", line(first, last), first),
        ] {
            let mut f = feature(value);
            f.set_property("kind", kind);
            f.set_property("vehicle", vehicle.0.clone());
            f.set_property("timestamp", timestamp(sample));
            f.set_property("marker-color", color);
            f.set_property("stroke", color);
            features.push(f);
        }
    }
    features
}

/// The observed extent and the core rectangle inside it.
pub fn core_region(classifier: &RegionClassifier) -> Vec<Feature> {
    let mut features = Vec::new();
    for (kind, bounds) in [
        ("extent", classifier.extent().clone()),
        ("core", classifier.core()),
    ] {
        let mut f = feature(rectangle(&bounds));
        f.set_property("kind", kind);
        f.set_property("border_fraction", classifier.border_fraction());
        features.push(f);
    }
    features
}

fn rectangle(bounds: &GPSBounds) -> Value {
    Value::Polygon(vec![vec![
        vec![bounds.min_lon, bounds.min_lat],
        vec![bounds.max_lon, bounds.min_lat],
        vec![bounds.max_lon, bounds.max_lat],
        vec![bounds.min_lon, bounds.max_lat],
        vec![bounds.min_lon, bounds.min_lat],
    ]])
}

pub fn to_geojson(features: Vec<Feature>) -> GeoJson {
    GeoJson::FeatureCollection(FeatureCollection {
        features,
        bbox: None,
        foreign_members: None,
    })
}

pub fn save<P: AsRef<Path>>(path: P, features: Vec<Feature>) -> Result<()> {
    let gj = to_geojson(features);
    fs_err::write(path.as_ref(), serde_json::to_string_pretty(&gj)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use abstutil::Timer;
    use serde_json::json;

    use super::*;
    use crate::Config;

    const CSV: &str = "id,timestamp,lat,lon,heading,speed\n\
                       a,2024-03-01T10:00:00.000Z,50.0,8.0,0,0\n\
                       a,2024-03-01T10:01:00.000Z,50.5,8.5,0,0\n\
                       a,2024-03-01T10:02:00.000Z,51.0,9.0,0,0\n\
                       b,2024-03-01T10:00:00.000Z,50.2,8.2,0,0\n\
                       b,2024-03-01T10:01:00.000Z,50.3,8.3,0,0\n";

    fn prop(f: &Feature, key: &str) -> serde_json::Value {
        f.property(key).cloned().unwrap()
    }

    #[test]
    fn endpoints_per_trip() {
        let input = crate::avl::load(CSV.as_bytes()).unwrap();
        let (table, _) = crate::run(&input, &Config::new(300, 0), &mut Timer::throwaway()).unwrap();
        let features = trip_endpoints(&table);
        assert_eq!(features.len(), 3 * table.num_trips());
        assert_eq!(prop(&features[0], "kind"), json!("start"));
        assert_eq!(prop(&features[0], "trip_id"), json!(0));
        assert_eq!(prop(&features[0], "vehicle"), json!("a"));
        assert_eq!(
            features[0].geometry.as_ref().unwrap().value,
            Value::Point(vec![8.0, 50.0])
        );
        // a and b get different colors
        assert_ne!(
            prop(&features[0], "marker-color"),
            prop(&features[3], "marker-color")
        );
    }

    #[test]
    fn raw_positions_respect_the_vehicle_limit() {
        let input = crate::avl::load(CSV.as_bytes()).unwrap();
        assert_eq!(raw_positions(&input, 1).len(), 3);
        assert_eq!(raw_positions(&input, 10).len(), 5);
        assert_eq!(vehicle_endpoints(&input, 10).len(), 6);
    }

    #[test]
    fn core_inside_extent() {
        let input = crate::avl::load(CSV.as_bytes()).unwrap();
        let classifier = RegionClassifier::new(&input.extent().unwrap(), 0.25).unwrap();
        let features = core_region(&classifier);
        assert_eq!(features.len(), 2);
        match &features[1].geometry.as_ref().unwrap().value {
            Value::Polygon(rings) => {
                assert_eq!(rings[0][0], vec![8.25, 50.25]);
                assert_eq!(rings[0][2], vec![8.75, 50.75]);
            }
            x => panic!("unexpected geometry {:?}", x),
        }
        let gj = to_geojson(features).to_string();
        assert!(gj.contains("FeatureCollection"));
    }
}
