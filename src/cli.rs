//! CLI argument parsing for the rideshare-worker binary.

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "rideshare-worker", about = "Ride dispatch and fare worker")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the worker server (default if no subcommand given)
    Serve,
    /// Run database migrations and exit
    Migrate,
    /// Insert the default pricing rates if none exist
    SeedPricing,
    /// Run a single allocation pass and print the report
    Pass,
    /// Print the dispatch metrics summary
    Summary,
    /// Generate riders, drivers and rides and run them through dispatch
    Simulate(SimulateArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    /// Use an in-memory store instead of PostgreSQL
    #[arg(long)]
    pub in_memory: bool,
    /// Random seed
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
    /// Number of simulated days
    #[arg(long, default_value_t = 2)]
    pub days: u32,
    #[arg(long, default_value_t = 10)]
    pub riders: usize,
    #[arg(long, default_value_t = 15)]
    pub drivers: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_no_command_defaults_to_none() {
        let cli = Cli::parse_from(["rideshare-worker"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_seed_pricing_parses() {
        let cli = Cli::parse_from(["rideshare-worker", "seed-pricing"]);
        assert!(matches!(cli.command, Some(Command::SeedPricing)));
    }

    #[test]
    fn test_cli_simulate_defaults() {
        let cli = Cli::parse_from(["rideshare-worker", "simulate"]);
        match cli.command {
            Some(Command::Simulate(args)) => {
                assert!(!args.in_memory);
                assert_eq!(args.seed, 42);
                assert_eq!(args.days, 2);
                assert_eq!(args.riders, 10);
                assert_eq!(args.drivers, 15);
            }
            _ => panic!("expected simulate"),
        }
    }

    #[test]
    fn test_cli_simulate_overrides() {
        let cli = Cli::parse_from([
            "rideshare-worker", "simulate", "--in-memory", "--seed", "9", "--days", "1", "--drivers", "3",
        ]);
        match cli.command {
            Some(Command::Simulate(args)) => {
                assert!(args.in_memory);
                assert_eq!(args.seed, 9);
                assert_eq!(args.days, 1);
                assert_eq!(args.drivers, 3);
            }
            _ => panic!("expected simulate"),
        }
    }
}
