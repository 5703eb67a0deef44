use anyhow::Result;
use chrono::{Duration, NaiveDateTime};

use crate::{PositionSample, RegionClassifier, TripID, TripSpan, TripType, VehicleName};

/// One labeled trip, borrowing its samples from the vehicle's sorted list.
pub struct Trip<'a> {
    pub id: TripID,
    pub trip_type: TripType,
    // Never empty
    pub samples: &'a [PositionSample],
}

impl<'a> Trip<'a> {
    pub fn vehicle(&self) -> &'a VehicleName {
        &self.samples[0].vehicle
    }

    pub fn first(&self) -> &'a PositionSample {
        &self.samples[0]
    }

    pub fn last(&self) -> &'a PositionSample {
        &self.samples[self.samples.len() - 1]
    }

    pub fn start_time(&self) -> NaiveDateTime {
        self.first().time
    }

    pub fn end_time(&self) -> NaiveDateTime {
        self.last().time
    }

    pub fn duration(&self) -> Duration {
        self.end_time() - self.start_time()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Cuts one span out of a vehicle's samples and labels it by its first and last sample. Doesn't
/// touch any counters; the caller owns the running trip ID.
pub fn assemble<'a>(
    vehicle_samples: &'a [PositionSample],
    span: TripSpan,
    id: TripID,
    classifier: &RegionClassifier,
) -> Result<Trip<'a>> {
    let samples = match vehicle_samples.get(span.start..span.end) {
        Some(samples) if !samples.is_empty() => samples,
        _ => bail!(
            "{:?} doesn't select any of the {} samples",
            span,
            vehicle_samples.len()
        ),
    };
    let trip_type = classifier.classify_trip(
        samples[0].pos(),
        samples[samples.len() - 1].pos(),
    );
    Ok(Trip {
        id,
        trip_type,
        samples,
    })
}
