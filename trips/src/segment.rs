use chrono::{Duration, NaiveDateTime};

use crate::PositionSample;

/// Indices `[start, end)` into one vehicle's time-sorted samples.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TripSpan {
    pub start: usize,
    pub end: usize,
}

impl TripSpan {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Lazily splits one vehicle's samples (sorted by time) into trips wherever consecutive samples
/// are more than `idle_threshold` apart. The last sample always closes the final trip. Spans are
/// end-exclusive, so the sample at a boundary starts the next trip. Only spans with more than
/// `min_points` samples are yielded.
pub fn segment(
    samples: &[PositionSample],
    idle_threshold: Duration,
    min_points: usize,
) -> Spans<'_> {
    Spans {
        samples,
        idle_threshold,
        min_points,
        state: samples.first().map(|first| ScanState {
            trip_start: 0,
            prev_time: first.time,
            next: 1,
        }),
    }
}

pub struct Spans<'a> {
    samples: &'a [PositionSample],
    idle_threshold: Duration,
    min_points: usize,
    state: Option<ScanState>,
}

struct ScanState {
    trip_start: usize,
    prev_time: NaiveDateTime,
    next: usize,
}

impl<'a> Iterator for Spans<'a> {
    type Item = TripSpan;

    fn next(&mut self) -> Option<TripSpan> {
        let last = self.samples.len().checked_sub(1)?;
        let state = self.state.as_mut()?;
        while state.next <= last {
            let i = state.next;
            state.next += 1;

            let time = self.samples[i].time;
            let gap = time - state.prev_time;
            state.prev_time = time;

            if gap > self.idle_threshold || i == last {
                let span = TripSpan {
                    start: state.trip_start,
                    end: i,
                };
                state.trip_start = i;
                if span.len() > self.min_points {
                    return Some(span);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VehicleName;

    // Offsets in seconds from an arbitrary start
    fn samples(offsets: &[i64]) -> Vec<PositionSample> {
        let start = crate::avl::parse_timestamp("2024-03-01T08:00:00.000Z").unwrap();
        offsets
            .iter()
            .map(|secs| PositionSample {
                vehicle: VehicleName("car".to_string()),
                time: start + Duration::seconds(*secs),
                lat: 0.0,
                lon: 0.0,
                heading: 0.0,
                speed: 0.0,
                record: csv::StringRecord::new(),
            })
            .collect()
    }

    fn spans(offsets: &[i64], threshold: i64, min_points: usize) -> Vec<(usize, usize)> {
        segment(&samples(offsets), Duration::seconds(threshold), min_points)
            .map(|span| (span.start, span.end))
            .collect()
    }

    #[test]
    fn fewer_than_two_samples() {
        assert!(spans(&[], 300, 0).is_empty());
        assert!(spans(&[0], 300, 0).is_empty());
    }

    #[test]
    fn two_samples_far_apart() {
        assert_eq!(spans(&[0, 600], 300, 0), vec![(0, 1)]);
        assert!(spans(&[0, 600], 300, 1).is_empty());
    }

    #[test]
    fn gap_then_short_tail() {
        // 400s gap, then 50s: two spans of one sample each
        assert_eq!(spans(&[0, 400, 450], 300, 0), vec![(0, 1), (1, 2)]);
        assert!(spans(&[0, 400, 450], 300, 1).is_empty());
    }

    #[test]
    fn no_gap_is_one_trip_closed_by_the_last_sample() {
        let offsets: Vec<i64> = (0..10).map(|i| i * 30).collect();
        assert_eq!(spans(&offsets, 300, 3), vec![(0, 9)]);
        assert_eq!(spans(&offsets, 300, 8), vec![(0, 9)]);
        assert!(spans(&offsets, 300, 9).is_empty());
    }

    #[test]
    fn gap_must_exceed_threshold() {
        // Exactly the threshold doesn't split
        assert_eq!(spans(&[0, 300, 600, 660], 300, 0), vec![(0, 3)]);
        // Zero gaps never split
        assert_eq!(spans(&[0, 0, 0, 0], 0, 0), vec![(0, 3)]);
    }

    #[test]
    fn short_trips_are_dropped_but_still_reset_the_start() {
        let offsets = [0, 10, 1000, 1010, 1020, 1030, 5000, 5010];
        assert_eq!(spans(&offsets, 300, 0), vec![(0, 2), (2, 6), (6, 7)]);
        assert_eq!(spans(&offsets, 300, 2), vec![(2, 6)]);
    }

    #[test]
    fn spans_are_ordered_and_disjoint() {
        let offsets = [0, 5, 700, 710, 720, 2000, 2001, 2002, 2003, 9000];
        let result = spans(&offsets, 60, 0);
        for pair in result.windows(2) {
            assert!(pair[0].1 <= pair[1].0);
        }
        for (start, end) in result {
            assert!(start < end);
        }
    }
}
