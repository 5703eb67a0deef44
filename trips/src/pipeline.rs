use abstutil::{prettyprint_usize, Counter, Timer};
use anyhow::Result;
use serde::Serialize;

use crate::{
    assemble, segment, Config, RawInput, RegionClassifier, Trip, TripID, TripTable,
    TripTableBuilder, TripType,
};

/// Summary of one run.
pub struct Stats {
    pub trips_per_type: Counter<TripType>,
    /// Vehicles with at least one valid sample
    pub vehicles: usize,
    pub vehicles_with_trips: usize,
    pub abandoned_vehicles: usize,
    pub skipped_rows: usize,
    pub samples_in_trips: usize,
}

impl Stats {
    fn new(input: &RawInput) -> Self {
        Self {
            trips_per_type: Counter::new(),
            vehicles: input.vehicles.len(),
            vehicles_with_trips: 0,
            abandoned_vehicles: input.abandoned_vehicles.len(),
            skipped_rows: input.skipped_rows,
            samples_in_trips: 0,
        }
    }

    fn record(&mut self, trip: &Trip) {
        self.trips_per_type.inc(trip.trip_type);
        self.samples_in_trips += trip.len();
    }

    pub fn count(&self, trip_type: TripType) -> usize {
        self.trips_per_type.get(trip_type)
    }

    pub fn total_trips(&self) -> usize {
        TripType::ALL.into_iter().map(|t| self.count(t)).sum()
    }

    pub fn describe(&self) -> String {
        format!(
            "{} trips from {} / {} vehicles (inside: {}, through: {}, entering: {}, exiting: {}). \
             {} samples in trips, {} rows skipped, {} vehicles abandoned",
            prettyprint_usize(self.total_trips()),
            prettyprint_usize(self.vehicles_with_trips),
            prettyprint_usize(self.vehicles),
            prettyprint_usize(self.count(TripType::Inside)),
            prettyprint_usize(self.count(TripType::Through)),
            prettyprint_usize(self.count(TripType::Entering)),
            prettyprint_usize(self.count(TripType::Exiting)),
            prettyprint_usize(self.samples_in_trips),
            prettyprint_usize(self.skipped_rows),
            prettyprint_usize(self.abandoned_vehicles),
        )
    }

    pub fn to_json(&self) -> Result<String> {
        let summary = StatsSummary {
            trips: self.total_trips(),
            inside: self.count(TripType::Inside),
            through: self.count(TripType::Through),
            entering: self.count(TripType::Entering),
            exiting: self.count(TripType::Exiting),
            vehicles: self.vehicles,
            vehicles_with_trips: self.vehicles_with_trips,
            abandoned_vehicles: self.abandoned_vehicles,
            skipped_rows: self.skipped_rows,
            samples_in_trips: self.samples_in_trips,
        };
        Ok(serde_json::to_string_pretty(&summary)?)
    }
}

#[derive(Serialize)]
struct StatsSummary {
    trips: usize,
    inside: usize,
    through: usize,
    entering: usize,
    exiting: usize,
    vehicles: usize,
    vehicles_with_trips: usize,
    abandoned_vehicles: usize,
    skipped_rows: usize,
    samples_in_trips: usize,
}

/// The classifier for the extent of every valid sample, or None if there aren't any.
pub fn build_classifier(input: &RawInput, config: &Config) -> Result<Option<RegionClassifier>> {
    match input.extent() {
        Some(extent) => Ok(Some(RegionClassifier::new(&extent, config.border_fraction)?)),
        None => Ok(None),
    }
}

/// Splits every vehicle into trips and labels them. Trip IDs are assigned in vehicle order, then
/// time order, so the same input always produces the same table.
pub fn run<'a>(
    input: &'a RawInput,
    config: &Config,
    timer: &mut Timer,
) -> Result<(TripTable<'a>, Stats)> {
    config.validate()?;

    let mut stats = Stats::new(input);
    let mut builder = TripTableBuilder::new(&input.headers);

    // The whole extent has to be known before anything gets labeled
    let classifier = match build_classifier(input, config)? {
        Some(classifier) => classifier,
        None => {
            warn!("No valid samples in the input, so there are no trips");
            return Ok((builder.finish(), stats));
        }
    };

    let idle_threshold = config.idle_threshold();
    let mut next_id = 0;
    timer.start_iter("split vehicles into trips", input.vehicles.len());
    for (vehicle, samples) in &input.vehicles {
        timer.next();
        let mut found_any = false;
        for span in segment(samples, idle_threshold, config.min_data_points) {
            let trip = assemble(samples, span, TripID(next_id), &classifier)?;
            next_id += 1;
            debug!(
                "{} trip {} is {}: {} samples from {} to {} ({})",
                trip.vehicle(),
                trip.id.0,
                trip.trip_type,
                trip.len(),
                trip.start_time(),
                trip.end_time(),
                trip.duration()
            );
            stats.record(&trip);
            builder.add_trip(&trip);
            found_any = true;
        }
        if found_any {
            stats.vehicles_with_trips += 1;
        } else {
            debug!("{} has no trips from {} samples", vehicle, samples.len());
        }
    }

    debug!("Sorting {} rows", prettyprint_usize(builder.num_rows()));
    timer.start("sort trip table");
    let table = builder.finish();
    timer.stop("sort trip table");

    info!("{}", stats.describe());
    Ok((table, stats))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "id,timestamp,lat,lon,heading,speed\n";

    fn load(body: &str) -> RawInput {
        crate::avl::load(format!("{HEADER}{body}").as_bytes()).unwrap()
    }

    fn run_csv(body: &str, config: &Config) -> (String, Stats) {
        let input = load(body);
        let (table, stats) = run(&input, config, &mut Timer::throwaway()).unwrap();
        (table.to_csv_string().unwrap(), stats)
    }

    #[test]
    fn boundary_sample_opens_next_trip() {
        let (csv, stats) = run_csv(
            "a,2024-03-01T10:00:00.000Z,52.0,13.0,0,0\n\
             a,2024-03-01T10:10:00.000Z,52.1,13.1,0,0\n",
            &Config::new(300, 0),
        );
        assert_eq!(stats.total_trips(), 1);
        // The boundary sample opens the next trip, so only the first one is in this trip
        assert_eq!(
            csv,
            "id,timestamp,lat,lon,heading,speed,Fahrtnummer,Typ\n\
             a,2024-03-01T10:00:00.000Z,52.0,13.0,0,0,0,through\n"
        );
    }

    #[test]
    fn min_points_filter() {
        let body = "a,2024-03-01T10:00:00.000Z,52.0,13.0,0,0\n\
                    a,2024-03-01T10:06:40.000Z,52.1,13.1,0,0\n\
                    a,2024-03-01T10:07:30.000Z,52.2,13.2,0,0\n";
        let (_, stats) = run_csv(body, &Config::new(300, 0));
        assert_eq!(stats.total_trips(), 2);
        let (csv, stats) = run_csv(body, &Config::new(300, 1));
        assert_eq!(stats.total_trips(), 0);
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn trip_ids_are_dense_across_vehicles() {
        let mut body = String::new();
        for vehicle in ["c", "a", "b"] {
            for minute in [0, 1, 2, 20, 21, 22, 40] {
                body.push_str(&format!(
                    "{vehicle},2024-03-01T10:{minute:02}:00.000Z,52.{minute},13.{minute},0,0\n"
                ));
            }
        }
        let input = load(&body);
        let (table, stats) = run(&input, &Config::new(300, 0), &mut Timer::throwaway()).unwrap();
        assert_eq!(stats.total_trips(), 6);
        assert_eq!(table.num_trips(), 6);
        let ids: Vec<usize> = table.trips().iter().map(|rows| rows[0].trip.0).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4, 5]);
        // Vehicles are visited in id order
        assert_eq!(table.trips()[0][0].sample.vehicle.0, "a");
        assert_eq!(table.trips()[5][0].sample.vehicle.0, "c");
        assert_eq!(stats.vehicles_with_trips, 3);
        assert_eq!(stats.samples_in_trips, table.rows.len());
    }

    #[test]
    fn one_trip_of_each_type() {
        // The corners are border, the middle is core
        let body = "a,2024-03-01T10:00:00.000Z,0.0,0.0,0,0\n\
                    a,2024-03-01T10:01:00.000Z,5.0,5.0,0,0\n\
                    a,2024-03-01T10:02:00.000Z,5.0,5.0,0,0\n\
                    a,2024-03-01T11:00:00.000Z,5.0,5.0,0,0\n\
                    a,2024-03-01T11:01:00.000Z,5.0,5.0,0,0\n\
                    a,2024-03-01T11:02:00.000Z,5.0,5.0,0,0\n\
                    a,2024-03-01T12:00:00.000Z,5.0,5.0,0,0\n\
                    a,2024-03-01T12:01:00.000Z,5.0,5.0,0,0\n\
                    a,2024-03-01T12:02:00.000Z,10.0,10.0,0,0\n\
                    a,2024-03-01T13:00:00.000Z,0.0,0.0,0,0\n\
                    a,2024-03-01T13:01:00.000Z,5.0,5.0,0,0\n\
                    a,2024-03-01T13:02:00.000Z,10.0,10.0,0,0\n\
                    a,2024-03-01T14:00:00.000Z,5.0,5.0,0,0\n";
        let (csv, stats) = run_csv(body, &Config::new(300, 1));
        for trip_type in TripType::ALL {
            assert_eq!(stats.count(trip_type), 1, "{trip_type}");
        }
        assert_eq!(stats.total_trips(), 4);
        assert!(csv.contains(",0,entering\n"));
        assert!(csv.contains(",1,inside\n"));
        assert!(csv.contains(",2,exiting\n"));
        assert!(csv.contains(",3,through\n"));
        // The final sample only closes the last trip
        assert_eq!(csv.lines().count(), 1 + 12);
    }

    #[test]
    fn bad_vehicle_doesnt_stop_the_others() {
        let body = "a,2024-03-01T10:00:00.000Z,52.0,13.0,0,0\n\
                    a,2024-03-01 10:01:00,52.0,13.0,0,0\n\
                    a,2024-03-01T10:02:00.000Z,52.0,13.0,0,0\n\
                    b,2024-03-01T10:00:00.000Z,52.0,13.0,0,0\n\
                    b,2024-03-01T10:01:00.000Z,52.1,13.1,0,0\n\
                    b,2024-03-01T10:02:00.000Z,52.2,13.2,0,0\n";
        let (csv, stats) = run_csv(body, &Config::new(300, 0));
        assert_eq!(stats.total_trips(), 1);
        assert_eq!(stats.abandoned_vehicles, 1);
        assert_eq!(stats.skipped_rows, 3);
        assert!(csv.lines().skip(1).all(|line| line.starts_with("b,")));
    }

    #[test]
    fn empty_input() {
        let (csv, stats) = run_csv("", &Config::new(300, 0));
        assert_eq!(stats.total_trips(), 0);
        assert_eq!(csv, "id,timestamp,lat,lon,heading,speed,Fahrtnummer,Typ\n");
    }

    #[test]
    fn same_input_same_output() {
        let body = "b,2024-03-01T10:00:00.000Z,52.0,13.0,1,2\n\
                    a,2024-03-01T10:00:00.000Z,52.3,13.3,1,2\n\
                    a,2024-03-01T10:00:30.000Z,52.2,13.2,1,2\n\
                    b,2024-03-01T10:00:30.000Z,52.1,13.1,1,2\n\
                    a,2024-03-01T10:01:00.000Z,52.1,13.1,1,2\n\
                    b,2024-03-01T10:01:00.000Z,52.2,13.2,1,2\n";
        let (csv1, stats1) = run_csv(body, &Config::new(300, 0));
        let (csv2, stats2) = run_csv(body, &Config::new(300, 0));
        assert_eq!(csv1, csv2);
        assert_eq!(stats1.to_json().unwrap(), stats2.to_json().unwrap());
    }

    #[test]
    fn invalid_config_fails_before_anything_runs() {
        let input = load("a,2024-03-01T10:00:00.000Z,52.0,13.0,0,0\n");
        let mut config = Config::new(300, 0);
        config.border_fraction = 0.7;
        assert!(run(&input, &config, &mut Timer::throwaway()).is_err());
    }
}
