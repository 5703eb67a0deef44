//! Loads raw AVL (automatic vehicle location) records: one row per GPS fix.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{Cursor, Read, Seek};

use anyhow::Result;
use chrono::NaiveDateTime;
use csv::StringRecord;
use geom::{GPSBounds, LonLat};
use serde::Deserialize;
use zip::ZipArchive;

use crate::VehicleName;

/// UTC, with the milliseconds always zero.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S.000Z";

pub const REQUIRED_COLUMNS: [&str; 6] = ["id", "timestamp", "lat", "lon", "heading", "speed"];

#[derive(Clone, Debug)]
pub struct PositionSample {
    pub vehicle: VehicleName,
    pub time: NaiveDateTime,
    pub lat: f64,
    pub lon: f64,
    pub heading: f64,
    pub speed: f64,
    // Every input column as it was read, so the output can reproduce them untouched
    pub record: StringRecord,
}

impl PositionSample {
    pub fn pos(&self) -> LonLat {
        LonLat::new(self.lon, self.lat)
    }
}

/// Something wrong with one input row. `line` is 1-based and counts the header.
#[derive(Clone, Debug)]
pub struct RowProblem {
    pub vehicle: Option<VehicleName>,
    pub line: Option<u64>,
    pub message: String,
}

pub struct RawInput {
    pub headers: StringRecord,
    // Each list is sorted by time. Vehicles with any malformed row are left out entirely.
    pub vehicles: BTreeMap<VehicleName, Vec<PositionSample>>,
    pub problems: Vec<RowProblem>,
    pub abandoned_vehicles: BTreeSet<VehicleName>,
    // Malformed rows, plus the otherwise fine rows of abandoned vehicles
    pub skipped_rows: usize,
}

impl RawInput {
    pub fn num_samples(&self) -> usize {
        self.vehicles.values().map(|list| list.len()).sum()
    }

    /// None when there are no valid samples at all.
    pub fn extent(&self) -> Option<GPSBounds> {
        let mut bounds = GPSBounds::new();
        let mut any = false;
        for sample in self.vehicles.values().flatten() {
            bounds.update(sample.pos());
            any = true;
        }
        any.then_some(bounds)
    }
}

pub fn load<R: Read>(reader: R) -> Result<RawInput> {
    // Flexible, so a ragged row still yields its id and abandons that vehicle
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(reader);
    let headers = reader.headers()?.clone();
    let id_column = check_columns(&headers)?;

    let mut vehicles: BTreeMap<VehicleName, Vec<PositionSample>> = BTreeMap::new();
    let mut problems = Vec::new();
    let mut abandoned_vehicles = BTreeSet::new();

    for rec in reader.records() {
        let record = match rec {
            Ok(record) => record,
            Err(err) => {
                problems.push(RowProblem {
                    vehicle: None,
                    line: err.position().map(|pos| pos.line()),
                    message: err.to_string(),
                });
                continue;
            }
        };

        match parse_sample(&record, &headers) {
            Ok(sample) => {
                vehicles
                    .entry(sample.vehicle.clone())
                    .or_insert_with(Vec::new)
                    .push(sample);
            }
            Err(err) => {
                let vehicle = record
                    .get(id_column)
                    .filter(|id| !id.is_empty())
                    .map(|id| VehicleName(id.to_string()));
                let line = record.position().map(|pos| pos.line());
                match vehicle {
                    Some(ref name) => {
                        warn!(
                            "Abandoning vehicle {} because of line {:?}: {}",
                            name, line, err
                        );
                        abandoned_vehicles.insert(name.clone());
                    }
                    None => {
                        warn!("Skipping line {:?} with no vehicle: {}", line, err);
                    }
                }
                problems.push(RowProblem {
                    vehicle,
                    line,
                    message: err.to_string(),
                });
            }
        }
    }

    let mut skipped_rows = problems.len();
    for name in &abandoned_vehicles {
        if let Some(list) = vehicles.remove(name) {
            skipped_rows += list.len();
        }
    }

    // The one place the (vehicle, time) order gets established. The sort is stable, so samples
    // with equal times keep their input order.
    for list in vehicles.values_mut() {
        list.sort_by_key(|sample| sample.time);
    }

    Ok(RawInput {
        headers,
        vehicles,
        problems,
        abandoned_vehicles,
        skipped_rows,
    })
}

/// Reads the CSV out of a zip archive. Without an explicit `member`, the archive must contain
/// exactly one `.csv` file.
pub fn load_from_zip(bytes: Vec<u8>, member: Option<&str>) -> Result<RawInput> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let name = match member {
        Some(name) => name.to_string(),
        None => single_csv_member(&archive)?,
    };
    let file = archive
        .by_name(&name)
        .map_err(|err| anyhow!("{name}: {err}"))?;
    load(file)
}

fn single_csv_member<R: Read + Seek>(archive: &ZipArchive<R>) -> Result<String> {
    let mut candidates: Vec<&str> = archive
        .file_names()
        .filter(|name| name.to_lowercase().ends_with(".csv"))
        .collect();
    if candidates.len() != 1 {
        bail!(
            "Expected exactly one .csv file in the archive, found {:?}",
            candidates
        );
    }
    Ok(candidates.remove(0).to_string())
}

// Returns the index of the id column
fn check_columns(headers: &StringRecord) -> Result<usize> {
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .into_iter()
        .filter(|col| !headers.iter().any(|h| h == *col))
        .collect();
    if !missing.is_empty() {
        bail!("Input is missing required columns {:?}", missing);
    }
    headers
        .iter()
        .position(|h| h == "id")
        .ok_or_else(|| anyhow!("Input has no id column"))
}

fn parse_sample(record: &StringRecord, headers: &StringRecord) -> Result<PositionSample> {
    if record.len() != headers.len() {
        bail!("Expected {} fields, found {}", headers.len(), record.len());
    }
    let rec: Record = record.deserialize(Some(headers))?;
    if rec.id.0.is_empty() {
        bail!("Empty vehicle id");
    }
    let time = parse_timestamp(&rec.timestamp)?;
    if !(rec.lat.is_finite() && (-90.0..=90.0).contains(&rec.lat)) {
        bail!("Bad latitude {}", rec.lat);
    }
    if !(rec.lon.is_finite() && (-180.0..=180.0).contains(&rec.lon)) {
        bail!("Bad longitude {}", rec.lon);
    }
    Ok(PositionSample {
        vehicle: rec.id,
        time,
        lat: rec.lat,
        lon: rec.lon,
        heading: rec.heading,
        speed: rec.speed,
        record: record.clone(),
    })
}

pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .map_err(|err| anyhow!("Unparsable timestamp {:?}: {}", raw, err))
}

#[derive(Deserialize)]
struct Record {
    id: VehicleName,
    timestamp: String,
    lat: f64,
    lon: f64,
    heading: f64,
    speed: f64,
}
