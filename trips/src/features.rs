//! Turns the trip table into fixed-size samples for a through-traffic classifier. Only the inputs
//! are derived here; the network lives elsewhere.

use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use crate::{OutputRow, TripTable, TripType};

/// normalized latitude, normalized longitude, heading, speed
pub const FEATURES_PER_ROW: usize = 4;

#[derive(Serialize)]
pub struct TrainingSet {
    pub window: usize,
    // Each input has `window - 1` rows
    pub inputs: Vec<Vec<[f64; FEATURES_PER_ROW]>>,
    // 1.0 for through traffic, otherwise 0.0
    pub outputs: Vec<f64>,
}

impl TrainingSet {
    /// Cuts every trip into non-overlapping windows. A trailing partial window is dropped, so
    /// trips shorter than `window` contribute nothing. Each window keeps all but its last row.
    pub fn from_table(table: &TripTable, window: usize) -> Result<Self> {
        if window < 2 {
            bail!("Windows need at least 2 rows, not {}", window);
        }
        let normalize = Normalizer::new(&table.rows);

        let mut inputs = Vec::new();
        let mut outputs = Vec::new();
        for rows in table.trips() {
            let label = if rows[0].trip_type == TripType::Through {
                1.0
            } else {
                0.0
            };
            let mut start = 0;
            while start + window <= rows.len() {
                inputs.push(
                    rows[start..start + window - 1]
                        .iter()
                        .map(|row| normalize.features(row))
                        .collect(),
                );
                outputs.push(label);
                start += window;
            }
        }

        Ok(Self {
            window,
            inputs,
            outputs,
        })
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs_err::write(path.as_ref(), serde_json::to_string(self)?)?;
        Ok(())
    }
}

// Scales positions against the extent of the trip table itself, not the raw input
struct Normalizer {
    min_lat: f64,
    lat_span: f64,
    min_lon: f64,
    lon_span: f64,
}

impl Normalizer {
    fn new(rows: &[OutputRow]) -> Self {
        let mut min_lat = f64::MAX;
        let mut max_lat = f64::MIN;
        let mut min_lon = f64::MAX;
        let mut max_lon = f64::MIN;
        for row in rows {
            min_lat = min_lat.min(row.sample.lat);
            max_lat = max_lat.max(row.sample.lat);
            min_lon = min_lon.min(row.sample.lon);
            max_lon = max_lon.max(row.sample.lon);
        }
        Self {
            min_lat,
            lat_span: max_lat - min_lat,
            min_lon,
            lon_span: max_lon - min_lon,
        }
    }

    fn features(&self, row: &OutputRow) -> [f64; FEATURES_PER_ROW] {
        [
            scale(row.sample.lat, self.min_lat, self.lat_span),
            scale(row.sample.lon, self.min_lon, self.lon_span),
            row.sample.heading,
            row.sample.speed,
        ]
    }
}

fn scale(value: f64, min: f64, span: f64) -> f64 {
    if span > 0.0 {
        (value - min) / span
    } else {
        0.0
    }
}
