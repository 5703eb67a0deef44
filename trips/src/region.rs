use std::fmt;

use anyhow::Result;
use geom::{GPSBounds, LonLat};
use serde::{Deserialize, Serialize};

/// How a trip relates to the core region, judged only by its first and last points.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TripType {
    Inside,
    Through,
    Entering,
    Exiting,
}

impl TripType {
    pub const ALL: [TripType; 4] = [
        TripType::Inside,
        TripType::Through,
        TripType::Entering,
        TripType::Exiting,
    ];

    // Only reachable through RegionClassifier::classify_trip
    fn from_endpoints(start_in_core: bool, end_in_core: bool) -> Self {
        match (start_in_core, end_in_core) {
            (true, true) => TripType::Inside,
            (true, false) => TripType::Exiting,
            (false, true) => TripType::Entering,
            (false, false) => TripType::Through,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TripType::Inside => "inside",
            TripType::Through => "through",
            TripType::Entering => "entering",
            TripType::Exiting => "exiting",
        }
    }
}

impl fmt::Display for TripType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Splits the observed extent into a core rectangle and a border margin. The margin is
/// `border_fraction` of the span on each side.
#[derive(Clone)]
pub struct RegionClassifier {
    extent: GPSBounds,
    border_fraction: f64,

    north: f64,
    south: f64,
    east: f64,
    west: f64,
    // When every point shares a latitude (or longitude), that axis can't exclude anything
    flat_lat: bool,
    flat_lon: bool,
}

impl RegionClassifier {
    pub fn new(extent: &GPSBounds, border_fraction: f64) -> Result<Self> {
        // Also rejects NaN
        if !(0.0..0.5).contains(&border_fraction) {
            bail!("border_fraction must be in [0, 0.5), not {}", border_fraction);
        }
        if !(extent.min_lat <= extent.max_lat && extent.min_lon <= extent.max_lon) {
            bail!(
                "Can't classify against an empty extent (lat {} to {}, lon {} to {})",
                extent.min_lat,
                extent.max_lat,
                extent.min_lon,
                extent.max_lon
            );
        }

        let lat_inset = border_fraction * (extent.max_lat - extent.min_lat);
        let lon_inset = border_fraction * (extent.max_lon - extent.min_lon);
        // Clamp so rounding never pushes a threshold past the opposite edge
        let north = (extent.max_lat - lat_inset).max(extent.min_lat);
        let south = (extent.min_lat + lat_inset).min(north);
        let east = (extent.max_lon - lon_inset).max(extent.min_lon);
        let west = (extent.min_lon + lon_inset).min(east);

        Ok(Self {
            extent: extent.clone(),
            border_fraction,
            north,
            south,
            east,
            west,
            flat_lat: extent.max_lat == extent.min_lat,
            flat_lon: extent.max_lon == extent.min_lon,
        })
    }

    /// Closed bounds on all four sides.
    pub fn in_core(&self, lat: f64, lon: f64) -> bool {
        let lat_ok = self.flat_lat || (self.south <= lat && lat <= self.north);
        let lon_ok = self.flat_lon || (self.west <= lon && lon <= self.east);
        lat_ok && lon_ok
    }

    pub fn classify_trip(&self, start: LonLat, end: LonLat) -> TripType {
        TripType::from_endpoints(
            self.in_core(start.y(), start.x()),
            self.in_core(end.y(), end.x()),
        )
    }

    pub fn extent(&self) -> &GPSBounds {
        &self.extent
    }

    pub fn border_fraction(&self) -> f64 {
        self.border_fraction
    }

    /// The core rectangle, as bounds.
    pub fn core(&self) -> GPSBounds {
        let mut core = GPSBounds::new();
        core.update(LonLat::new(self.west, self.south));
        core.update(LonLat::new(self.east, self.north));
        core
    }
}
