use anyhow::{Context, Result};
use clap::Parser;
use delayscope::cli::{Cli, Command, OutputFormat, Selection, WeightArg};
use delayscope::config::AnalysisConfig;
use delayscope::estimator::{get_delay_statistics, get_delays, EstimatorConfig};
use delayscope::flights::{AirportRole, DelayMetric, FlightTable};
use delayscope::influence::RouteWeightMatrix;
use delayscope::path::{calculate_expected_delay, distribution_delay, summarize, InitialState, Path};
use delayscope::route_table::RouteStatsTable;
use delayscope::sampler::{ground_delay_generators, GeneratorTable};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::path::Path as FsPath;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

fn load_flights(path: &FsPath) -> Result<FlightTable> {
    let flights = FlightTable::from_csv_path(path)
        .with_context(|| format!("Failed to load flights from {}", path.display()))?;
    if flights.is_empty() {
        anyhow::bail!("No flight records in {}", path.display());
    }
    Ok(flights)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Resolve the requested airport lists, defaulting to every airport in the data
fn airport_lists(selection: &Selection, flights: &FlightTable) -> (Vec<String>, Vec<String>) {
    let all = || flights.airports();
    let destinations = if selection.destinations.is_empty() {
        all()
    } else {
        selection.destinations.clone()
    };
    let origins = if selection.origins.is_empty() {
        all()
    } else {
        selection.origins.clone()
    };
    (destinations, origins)
}

fn estimator_config(config: &AnalysisConfig, confidence: Option<f64>) -> EstimatorConfig {
    confidence
        .map(EstimatorConfig::new)
        .unwrap_or_else(|| config.estimator.clone())
}

fn run_routes(
    selection: &Selection,
    metric: DelayMetric,
    config: &AnalysisConfig,
    format: OutputFormat,
) -> Result<()> {
    let flights = load_flights(&selection.flights)?;
    let (destinations, origins) = airport_lists(selection, &flights);
    let estimator = estimator_config(config, selection.confidence);

    let delays = get_delays(&flights, &destinations, &origins, &estimator, metric)?;

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "metric": metric.column_name(),
            "confidence": estimator.confidence,
            "baseline": {
                "mean": delays.baseline.mean,
                "std": delays.baseline.std_dev,
                "count": delays.baseline.count,
            },
            "mean": delays.mean,
            "std": delays.std_dev,
        })),
        OutputFormat::Text => {
            println!(
                "Baseline {}: mean={:.3} std={:.3} (n={})\n",
                metric.column_name(),
                delays.baseline.mean,
                delays.baseline.std_dev,
                delays.baseline.count
            );
            print!("{}", delays.mean.to_report_string("Mean"));
            println!();
            print!("{}", delays.std_dev.to_report_string("Std"));
            Ok(())
        }
    }
}

fn run_delay_diff(selection: &Selection, config: &AnalysisConfig, format: OutputFormat) -> Result<()> {
    let flights = load_flights(&selection.flights)?;
    let (destinations, origins) = airport_lists(selection, &flights);
    let estimator = estimator_config(config, selection.confidence);

    let std_diff = get_delay_statistics(&flights, &destinations, &origins, &estimator)?;

    match format {
        OutputFormat::Json => print_json(&std_diff),
        OutputFormat::Text => {
            print!("{}", std_diff.to_report_string("Std of ARR_DELAY - DEP_DELAY"));
            Ok(())
        }
    }
}

/// Arrival and in-flight statistics over the airports of `path`
struct PathTables {
    arrival_mean: RouteStatsTable,
    arrival_std: RouteStatsTable,
    in_flight_mean: RouteStatsTable,
    in_flight_std: RouteStatsTable,
}

fn path_tables(flights: &FlightTable, path: &Path, config: &EstimatorConfig) -> Result<PathTables> {
    let airports = path.airports();
    let arrival = get_delays(flights, airports, airports, config, DelayMetric::ArrivalDelay)?;
    let in_flight = get_delays(
        flights,
        airports,
        airports,
        config,
        DelayMetric::DelayDifferential,
    )?;
    let in_flight_std = get_delay_statistics(flights, airports, airports, config)?;

    Ok(PathTables {
        arrival_mean: arrival.mean,
        arrival_std: arrival.std_dev,
        in_flight_mean: in_flight.mean,
        in_flight_std,
    })
}

fn run_expected(
    flights_path: &FsPath,
    path_spec: &str,
    config: &AnalysisConfig,
    format: OutputFormat,
) -> Result<()> {
    let flights = load_flights(flights_path)?;
    let path = Path::parse(path_spec)?;
    let tables = path_tables(&flights, &path, &config.estimator)?;
    let ground = flights.mean_delay_by_airport(DelayMetric::DepartureDelay, AirportRole::Origin);

    let expected = calculate_expected_delay(
        &path,
        &ground,
        &tables.arrival_mean,
        &tables.in_flight_mean,
    )?;

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "path": path.airports(),
            "expected_delay": expected,
        })),
        OutputFormat::Text => {
            println!("Expected delay for {}: {:.2} min", path, expected);
            Ok(())
        }
    }
}

fn run_simulate(
    flights_path: &FsPath,
    path_spec: &str,
    samples: usize,
    seed: Option<u64>,
    initial_delay: Option<f64>,
    config: &AnalysisConfig,
    format: OutputFormat,
) -> Result<()> {
    if samples == 0 {
        anyhow::bail!("--samples must be > 0");
    }
    let flights = load_flights(flights_path)?;
    let path = Path::parse(path_spec)?;
    let tables = path_tables(&flights, &path, &config.estimator)?;

    let first_leg = GeneratorTable::from_route_stats(&tables.arrival_mean, &tables.arrival_std);
    let in_flight = GeneratorTable::from_route_stats(&tables.in_flight_mean, &tables.in_flight_std);
    let ground = ground_delay_generators(&flights, DelayMetric::DepartureDelay);

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let delays = distribution_delay(
        &mut rng,
        &path,
        &first_leg,
        &in_flight,
        &ground,
        samples,
        initial_delay.map(InitialState::Constant),
    )?;
    let summary =
        summarize(&delays).context("Simulation produced no finite delay samples")?;

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "path": path.airports(),
            "summary": summary,
        })),
        OutputFormat::Text => {
            println!("Simulated delay for {} ({} samples)", path, summary.samples);
            println!("  Mean:         {:>10.2} min", summary.mean);
            println!("  Std Dev:      {:>10.2} min", summary.std_dev);
            println!("  P5:           {:>10.2} min", summary.p05);
            println!("  Median (P50): {:>10.2} min", summary.median);
            println!("  P95:          {:>10.2} min", summary.p95);
            Ok(())
        }
    }
}

fn run_influence(
    flights_path: &FsPath,
    weight: WeightArg,
    top: usize,
    format: OutputFormat,
) -> Result<()> {
    let flights = load_flights(flights_path)?;
    let airports = flights.airports();

    let matrix = match weight {
        WeightArg::Counts => RouteWeightMatrix::flight_counts(&flights, &airports),
        WeightArg::MeanDelay => {
            RouteWeightMatrix::mean_delays(&flights, &airports, DelayMetric::ArrivalDelay)
        }
    };
    let scores = matrix.rank()?;

    match format {
        OutputFormat::Json => print_json(&scores),
        OutputFormat::Text => {
            println!("Top origins by impact:");
            for (airport, score) in scores.top_origins(top) {
                println!("  {:<8} {:>12.4}", airport, score);
            }
            println!("\nTop destinations by impact:");
            for (airport, score) in scores.top_destinations(top) {
                println!("  {:<8} {:>12.4}", airport, score);
            }
            Ok(())
        }
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();

    // Initialize tracing if --debug flag is set
    init_tracing(args.debug);

    let config = match &args.config {
        Some(path) => AnalysisConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => AnalysisConfig::default(),
    };

    match args.command {
        Command::Routes { selection, metric } => {
            run_routes(&selection, metric.into(), &config, args.format)
        }
        Command::DelayDiff { selection } => run_delay_diff(&selection, &config, args.format),
        Command::Expected { flights, path } => run_expected(&flights, &path, &config, args.format),
        Command::Simulate {
            flights,
            path,
            samples,
            seed,
            initial_delay,
        } => run_simulate(
            &flights,
            &path,
            samples.unwrap_or(config.simulation.sample_size),
            seed.or(config.simulation.seed),
            initial_delay,
            &config,
            args.format,
        ),
        Command::Influence {
            flights,
            weight,
            top,
        } => run_influence(&flights, weight, top, args.format),
    }
}
