//! Ember CLI, the command-line interface for Ember hardware designs.
//!
//! Designs are read as JSON-serialized [`ember_ir::Design`] files. `ember check`
//! validates and analyzes a design, `ember sim` runs it cycle by cycle,
//! `ember lower` emits Verilog, and `ember equiv` runs the native simulator and
//! the lowered module side by side.

#![warn(missing_docs)]

mod check;
mod equiv;
mod lower;
mod pipeline;
mod sim;

use std::io::IsTerminal;
use std::process;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

/// Ember: rule-based hardware modeling, simulation, and lowering.
#[derive(Parser, Debug)]
#[command(name = "ember", version, about = "Ember hardware modeling toolkit")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase logging verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Control colored output.
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Path to an `ember.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate and analyze a design, printing diagnostics.
    Check(CheckArgs),
    /// Simulate a design for a number of cycles.
    Sim(SimArgs),
    /// Lower a design to Verilog.
    Lower(LowerArgs),
    /// Compare the native simulation against the lowered Verilog.
    Equiv(EquivArgs),
}

/// Arguments for the `ember check` subcommand.
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Path to the design JSON file.
    pub design: String,
}

/// Arguments for the `ember sim` subcommand.
#[derive(Parser, Debug)]
pub struct SimArgs {
    /// Path to the design JSON file.
    pub design: String,

    /// JSON stimulus file: an array of `{ "port": value }` objects, one per cycle.
    #[arg(long)]
    pub stimulus: Option<String>,

    /// Number of cycles to run (defaults to the stimulus length, or 16).
    #[arg(long)]
    pub cycles: Option<u64>,

    /// Seed for random input values when no stimulus is given.
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Print the line trace after every cycle.
    #[arg(long)]
    pub trace: bool,
}

/// Arguments for the `ember lower` subcommand.
#[derive(Parser, Debug)]
pub struct LowerArgs {
    /// Path to the design JSON file.
    pub design: String,

    /// Output file (stdout if omitted).
    #[arg(short, long)]
    pub output: Option<String>,
}

/// Arguments for the `ember equiv` subcommand.
#[derive(Parser, Debug)]
pub struct EquivArgs {
    /// Path to the design JSON file.
    pub design: String,

    /// Number of random cycles to compare.
    #[arg(long, default_value_t = 1000)]
    pub cycles: u64,

    /// Seed for the random input values.
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
}

/// Controls whether colored output is produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    /// Detect from terminal capabilities.
    Auto,
    /// Always produce colored output.
    Always,
    /// Never produce colored output.
    Never,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Number of `-v` flags given.
    pub verbose: u8,
    /// Whether to use colored output.
    pub color: bool,
    /// Optional path to a custom config file.
    pub config: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let color = match cli.color {
        ColorChoice::Auto => std::io::stderr().is_terminal(),
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    };

    init_logging(cli.verbose, cli.quiet);

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        color,
        config: cli.config,
    };

    let result = match cli.command {
        Command::Check(ref args) => check::run(args, &global),
        Command::Sim(ref args) => sim::run(args, &global),
        Command::Lower(ref args) => lower::run(args, &global),
        Command::Equiv(ref args) => equiv::run(args, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

/// Maps the verbosity flags to a default log filter; `RUST_LOG` overrides it.
fn log_level(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level(verbose, quiet)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parse_check() {
        let cli = Cli::parse_from(["ember", "check", "top.json"]);
        match cli.command {
            Command::Check(ref args) => assert_eq!(args.design, "top.json"),
            _ => panic!("expected Check command"),
        }
        assert_eq!(cli.verbose, 0);
        assert!(!cli.quiet);
    }

    #[test]
    fn parse_sim_defaults() {
        let cli = Cli::parse_from(["ember", "sim", "top.json"]);
        match cli.command {
            Command::Sim(ref args) => {
                assert_eq!(args.design, "top.json");
                assert!(args.stimulus.is_none());
                assert!(args.cycles.is_none());
                assert_eq!(args.seed, 0);
                assert!(!args.trace);
            }
            _ => panic!("expected Sim command"),
        }
    }

    #[test]
    fn parse_sim_with_args() {
        let cli = Cli::parse_from([
            "ember",
            "sim",
            "top.json",
            "--stimulus",
            "stim.json",
            "--cycles",
            "40",
            "--seed",
            "7",
            "--trace",
        ]);
        match cli.command {
            Command::Sim(ref args) => {
                assert_eq!(args.stimulus.as_deref(), Some("stim.json"));
                assert_eq!(args.cycles, Some(40));
                assert_eq!(args.seed, 7);
                assert!(args.trace);
            }
            _ => panic!("expected Sim command"),
        }
    }

    #[test]
    fn parse_lower_output() {
        let cli = Cli::parse_from(["ember", "lower", "top.json", "-o", "top.v"]);
        match cli.command {
            Command::Lower(ref args) => assert_eq!(args.output.as_deref(), Some("top.v")),
            _ => panic!("expected Lower command"),
        }
    }

    #[test]
    fn parse_equiv_defaults() {
        let cli = Cli::parse_from(["ember", "equiv", "top.json"]);
        match cli.command {
            Command::Equiv(ref args) => {
                assert_eq!(args.cycles, 1000);
                assert_eq!(args.seed, 0);
            }
            _ => panic!("expected Equiv command"),
        }
    }

    #[test]
    fn verbose_flag_counts() {
        let cli = Cli::parse_from(["ember", "-vv", "check", "top.json"]);
        assert_eq!(cli.verbose, 2);
        let cli = Cli::parse_from(["ember", "check", "top.json", "-v", "-v", "-v"]);
        assert_eq!(cli.verbose, 3);
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::parse_from([
            "ember",
            "--quiet",
            "--color",
            "never",
            "--config",
            "/tmp/ember.toml",
            "lower",
            "top.json",
        ]);
        assert!(cli.quiet);
        assert_eq!(cli.color, ColorChoice::Never);
        assert_eq!(cli.config.as_deref(), Some("/tmp/ember.toml"));
    }

    #[test]
    fn log_levels_follow_verbosity() {
        assert_eq!(log_level(0, false), "warn");
        assert_eq!(log_level(1, false), "info");
        assert_eq!(log_level(2, false), "debug");
        assert_eq!(log_level(5, false), "trace");
        assert_eq!(log_level(3, true), "error");
    }

    #[test]
    fn design_argument_is_required() {
        assert!(Cli::try_parse_from(["ember", "sim"]).is_err());
    }
}
