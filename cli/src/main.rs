#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

use std::path::{Path, PathBuf};

use abstutil::{prettyprint_usize, Timer};
use anyhow::Result;
use structopt::StructOpt;

use trips::{Config, RawInput, TrainingSet};

#[derive(StructOpt)]
#[structopt(about = "Splits raw vehicle positions into labeled trips")]
struct Args {
    /// A JSON file with time_threshold, min_data_points, and optionally border_fraction and
    /// feature_window
    #[structopt(long)]
    config: PathBuf,
    /// The raw positions, as a CSV file or a .zip containing one
    #[structopt(long)]
    input: PathBuf,
    /// If the input is a .zip with more than one CSV file, which one to use
    #[structopt(long)]
    zip_member: Option<String>,
    /// Where to write everything
    #[structopt(long, default_value = "data/output")]
    output_dir: PathBuf,

    /// Overrides time_threshold from the config (seconds)
    #[structopt(long)]
    time_threshold: Option<i64>,
    /// Overrides min_data_points from the config
    #[structopt(long)]
    min_data_points: Option<usize>,
    /// Overrides border_fraction from the config
    #[structopt(long)]
    border_fraction: Option<f64>,

    /// Also write windows of trip features for training a through-traffic classifier
    #[structopt(long)]
    training_set: bool,
    /// Also write GeoJSON layers for checking the results on a map
    #[structopt(long)]
    geojson: bool,
    /// How many vehicles to include in the raw position layers
    #[structopt(long, default_value = "7")]
    map_vehicles: usize,
}

impl Args {
    fn config(&self) -> Result<Config> {
        let mut config = Config::load(&self.config)?;
        if let Some(x) = self.time_threshold {
            config.time_threshold = x;
        }
        if let Some(x) = self.min_data_points {
            config.min_data_points = x;
        }
        if let Some(x) = self.border_fraction {
            config.border_fraction = x;
        }
        config.validate()?;
        Ok(config)
    }

    fn load_input(&self, timer: &mut Timer) -> Result<RawInput> {
        timer.start("load input");
        let is_zip = self
            .input
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("zip"))
            .unwrap_or(false);
        let input = if is_zip {
            trips::avl::load_from_zip(fs_err::read(&self.input)?, self.zip_member.as_deref())?
        } else {
            if self.zip_member.is_some() {
                bail!("--zip-member only makes sense with a .zip input");
            }
            trips::avl::load(fs_err::File::open(&self.input)?)?
        };
        timer.stop("load input");

        info!(
            "Loaded {} samples from {} vehicles",
            prettyprint_usize(input.num_samples()),
            prettyprint_usize(input.vehicles.len())
        );
        if !input.problems.is_empty() {
            warn!(
                "{} malformed rows; abandoned {} vehicles ({} rows skipped in total)",
                prettyprint_usize(input.problems.len()),
                prettyprint_usize(input.abandoned_vehicles.len()),
                prettyprint_usize(input.skipped_rows)
            );
        }
        Ok(input)
    }
}

fn main() -> Result<()> {
    abstutil::logger::setup();
    let args = Args::from_args();

    // Settle the config before touching any data
    let config = args.config()?;
    let mut timer = Timer::new("split trips");
    let input = args.load_input(&mut timer)?;

    let (table, stats) = trips::run(&input, &config, &mut timer)?;

    fs_err::create_dir_all(&args.output_dir)?;
    let out = |name: &str| args.output_dir.join(name);

    table.save(out("single_data.csv"))?;
    fs_err::write(out("stats.json"), stats.to_json()?)?;
    println!("{}", stats.describe());

    if args.training_set {
        let set = TrainingSet::from_table(&table, config.feature_window)?;
        set.save(out("training_set.json"))?;
        info!("Wrote {} training windows", prettyprint_usize(set.len()));
    }

    if args.geojson {
        write_maps(&args.output_dir, &input, &table, &config, args.map_vehicles)?;
    }

    Ok(())
}

fn write_maps(
    dir: &Path,
    input: &RawInput,
    table: &trips::TripTable,
    config: &Config,
    map_vehicles: usize,
) -> Result<()> {
    use trips::render;

    render::save(
        dir.join("trip_endpoints.geojson"),
        render::trip_endpoints(table),
    )?;
    render::save(
        dir.join("car_positions.geojson"),
        render::raw_positions(input, map_vehicles),
    )?;
    render::save(
        dir.join("car_start_and_end.geojson"),
        render::vehicle_endpoints(input, map_vehicles),
    )?;
    if let Some(classifier) = trips::build_classifier(input, config)? {
        render::save(
            dir.join("core_region.geojson"),
            render::core_region(&classifier),
        )?;
    }
    Ok(())
}
