#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

mod assemble;
pub mod avl;
mod config;
mod features;
mod output;
mod pipeline;
mod region;
pub mod render;
mod segment;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use self::assemble::{assemble, Trip};
pub use self::avl::{PositionSample, RawInput, RowProblem};
pub use self::config::Config;
pub use self::features::{TrainingSet, FEATURES_PER_ROW};
pub use self::output::{OutputRow, TripTable, TripTableBuilder};
pub use self::pipeline::{build_classifier, run, Stats};
pub use self::region::{RegionClassifier, TripType};
pub use self::segment::{segment, TripSpan};

/// The opaque vehicle identifier from the `id` column.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VehicleName(pub String);

impl fmt::Display for VehicleName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Dense, run-wide trip number, starting at 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TripID(pub usize);
