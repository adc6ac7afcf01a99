//! CLI argument parsing for Delayscope

use crate::flights::DelayMetric;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for computed tables and scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    Text,
    /// JSON format for machine parsing
    Json,
}

/// Delay column summarized by `routes`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MetricArg {
    /// ARR_DELAY
    Arrival,
    /// DEP_DELAY
    Departure,
    /// ARR_DELAY - DEP_DELAY
    Diff,
}

impl From<MetricArg> for DelayMetric {
    fn from(metric: MetricArg) -> Self {
        match metric {
            MetricArg::Arrival => DelayMetric::ArrivalDelay,
            MetricArg::Departure => DelayMetric::DepartureDelay,
            MetricArg::Diff => DelayMetric::DelayDifferential,
        }
    }
}

/// Route weights used for influence ranking
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WeightArg {
    /// Number of flights per route
    Counts,
    /// Mean arrival delay per route
    MeanDelay,
}

#[derive(Parser, Debug)]
#[command(name = "delayscope")]
#[command(version)]
#[command(about = "Robust route delay statistics, path delay propagation and airport influence", long_about = None)]
pub struct Cli {
    /// Enable debug tracing on stderr
    #[arg(long, global = true)]
    pub debug: bool,

    /// TOML analysis configuration
    #[arg(long = "config", value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long = "format", value_enum, default_value = "text", global = true)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

/// Flight data and airport selection shared by the table commands
#[derive(Args, Debug, Clone)]
pub struct Selection {
    /// Flight CSV with ORIGIN, DEST, ARR_DELAY and DEP_DELAY columns
    #[arg(short = 'f', long = "flights", value_name = "CSV")]
    pub flights: PathBuf,

    /// Destination airports (comma separated, default: all)
    #[arg(short = 'd', long = "destinations", value_delimiter = ',')]
    pub destinations: Vec<String>,

    /// Origin airports (comma separated, default: all)
    #[arg(short = 'o', long = "origins", value_delimiter = ',')]
    pub origins: Vec<String>,

    /// Confidence level in percent (overrides the config file)
    #[arg(long = "confidence", value_name = "PERCENT")]
    pub confidence: Option<f64>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Robust per-route mean and std of a delay metric
    Routes {
        #[command(flatten)]
        selection: Selection,

        /// Delay metric to summarize
        #[arg(long = "metric", value_enum, default_value = "arrival")]
        metric: MetricArg,
    },

    /// Robust per-route std of the arrival-minus-departure differential
    DelayDiff {
        #[command(flatten)]
        selection: Selection,
    },

    /// Expected total delay along a path (e.g. JFK-ORD-LAX)
    Expected {
        #[arg(short = 'f', long = "flights", value_name = "CSV")]
        flights: PathBuf,

        /// Airports in flying order
        #[arg(long = "path", value_name = "PATH")]
        path: String,
    },

    /// Monte Carlo distribution of total delay along a path
    Simulate {
        #[arg(short = 'f', long = "flights", value_name = "CSV")]
        flights: PathBuf,

        /// Airports in flying order
        #[arg(long = "path", value_name = "PATH")]
        path: String,

        /// Samples to draw (overrides the config file)
        #[arg(long = "samples", value_name = "N")]
        samples: Option<usize>,

        /// RNG seed (overrides the config file)
        #[arg(long = "seed", value_name = "SEED")]
        seed: Option<u64>,

        /// Delay already accrued before the first leg, replaces the first-leg draw
        #[arg(long = "initial-delay", value_name = "MINUTES")]
        initial_delay: Option<f64>,
    },

    /// Rank airports by influence on the route graph
    Influence {
        #[arg(short = 'f', long = "flights", value_name = "CSV")]
        flights: PathBuf,

        /// Route weights to decompose
        #[arg(long = "weight", value_enum, default_value = "counts")]
        weight: WeightArg,

        /// Airports to show per ranking
        #[arg(long = "top", value_name = "N", default_value = "10")]
        top: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_routes() {
        let cli = Cli::parse_from([
            "delayscope",
            "routes",
            "-f",
            "flights.csv",
            "-d",
            "LAX,SFO",
            "--metric",
            "diff",
        ]);
        match cli.command {
            Command::Routes { selection, metric } => {
                assert_eq!(selection.flights, PathBuf::from("flights.csv"));
                assert_eq!(selection.destinations, vec!["LAX", "SFO"]);
                assert!(selection.origins.is_empty());
                assert_eq!(DelayMetric::from(metric), DelayMetric::DelayDifferential);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "delayscope",
            "influence",
            "-f",
            "flights.csv",
            "--format",
            "json",
            "--debug",
        ]);
        assert!(cli.debug);
        assert_eq!(cli.format, OutputFormat::Json);
    }

    #[test]
    fn test_cli_format_default_text() {
        let cli = Cli::parse_from(["delayscope", "expected", "-f", "x.csv", "--path", "A-B"]);
        assert_eq!(cli.format, OutputFormat::Text);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_cli_simulate_overrides() {
        let cli = Cli::parse_from([
            "delayscope",
            "simulate",
            "-f",
            "x.csv",
            "--path",
            "A-B-C",
            "--samples",
            "500",
            "--seed",
            "7",
        ]);
        match cli.command {
            Command::Simulate {
                samples,
                seed,
                initial_delay,
                ..
            } => {
                assert_eq!(samples, Some(500));
                assert_eq!(seed, Some(7));
                assert!(initial_delay.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["delayscope"]).is_err());
    }
}
