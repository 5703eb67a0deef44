use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use csv::StringRecord;

use crate::{PositionSample, Trip, TripID, TripType};

pub const TRIP_ID_COLUMN: &str = "Fahrtnummer";
pub const TRIP_TYPE_COLUMN: &str = "Typ";

/// One input row, tagged with the trip it belongs to.
#[derive(Clone, Copy)]
pub struct OutputRow<'a> {
    pub trip: TripID,
    pub trip_type: TripType,
    pub sample: &'a PositionSample,
}

/// Collects trips as they're assembled. Rows just borrow the loaded samples, and the final order
/// is established once in `finish`.
pub struct TripTableBuilder<'a> {
    headers: StringRecord,
    rows: Vec<OutputRow<'a>>,
    num_trips: usize,
}

impl<'a> TripTableBuilder<'a> {
    pub fn new(input_headers: &StringRecord) -> Self {
        Self {
            headers: input_headers.clone(),
            rows: Vec::new(),
            num_trips: 0,
        }
    }

    pub fn add_trip(&mut self, trip: &Trip<'a>) {
        self.rows.extend(trip.samples.iter().map(|sample| OutputRow {
            trip: trip.id,
            trip_type: trip.trip_type,
            sample,
        }));
        self.num_trips += 1;
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn finish(mut self) -> TripTable<'a> {
        // Stable, so ties in time keep their input order
        self.rows.sort_by_key(|row| (row.trip, row.sample.time));
        TripTable {
            input_headers: self.headers,
            rows: self.rows,
            num_trips: self.num_trips,
        }
    }
}

/// Every accepted trip's rows, sorted by (trip ID, time).
pub struct TripTable<'a> {
    pub input_headers: StringRecord,
    pub rows: Vec<OutputRow<'a>>,
    num_trips: usize,
}

impl<'a> TripTable<'a> {
    pub fn num_trips(&self) -> usize {
        self.num_trips
    }

    /// The rows of each trip, in trip order.
    pub fn trips(&self) -> Vec<&[OutputRow<'a>]> {
        let mut result = Vec::new();
        let mut start = 0;
        for idx in 1..=self.rows.len() {
            if idx == self.rows.len() || self.rows[idx].trip != self.rows[start].trip {
                result.push(&self.rows[start..idx]);
                start = idx;
            }
        }
        result
    }

    pub fn headers(&self) -> StringRecord {
        let mut headers = self.input_headers.clone();
        headers.push_field(TRIP_ID_COLUMN);
        headers.push_field(TRIP_TYPE_COLUMN);
        headers
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(&self.headers())?;
        for row in &self.rows {
            let mut record = row.sample.record.clone();
            record.push_field(&row.trip.0.to_string());
            record.push_field(row.trip_type.label());
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn to_csv_string(&self) -> Result<String> {
        let mut out = Vec::new();
        self.write_csv(&mut out)?;
        Ok(String::from_utf8(out)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = fs_err::File::create(path)?;
        self.write_csv(std::io::BufWriter::new(file))
            .with_context(|| format!("Couldn't write trip table to {}", path.display()))
    }
}
