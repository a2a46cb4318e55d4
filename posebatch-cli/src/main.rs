//! posebatch CLI - batch pose-alignment preparation for gait datasets.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;

mod commands;
mod exit_codes;
mod utils;

use commands::{CommonArgs, DispatchArgs};
use exit_codes::ExitCode;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success (individual job failures are logged, not fatal)
  1   General error
  64  Usage error (invalid option values)
  65  One or more jobs failed (with --fail-on-error)
  66  Input directory or video map missing
  74  I/O error (manifest or result directory not writable)";

#[derive(Parser)]
#[command(name = "posebatch")]
#[command(author, version, about = "Batch pose-alignment preparation for gait datasets", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Only log warnings and errors; skip the summary
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Log per-item progress
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Align each source against a randomly sampled target of the same view
    Sample {
        #[command(flatten)]
        common: CommonArgs,

        #[command(flatten)]
        dispatch: DispatchArgs,

        /// Seed for target selection
        #[arg(
            long,
            value_name = "SEED",
            env = "POSEBATCH_RANDOM_SEED",
            default_value_t = posebatch_core::DEFAULT_SEED
        )]
        random_seed: u64,
    },

    /// Align each source against the target named in a JSON video map
    Map {
        #[command(flatten)]
        common: CommonArgs,

        #[command(flatten)]
        dispatch: DispatchArgs,

        /// JSON object mapping source stems to `{"max_distance": "<target stem>"}`
        #[arg(long, value_name = "FILE", env = "POSEBATCH_VIDEO_MAP_FILE")]
        video_map_file: PathBuf,
    },

    /// Record outputs already present under the result directory
    Collect {
        #[command(flatten)]
        common: CommonArgs,
    },
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // Help and version requests are not errors
            let code = if err.use_stderr() {
                exit_codes::USAGE_ERROR
            } else {
                exit_codes::SUCCESS
            };
            let _ = err.print();
            return ExitCode {
                code,
                message: None,
            }
            .into();
        }
    };
    utils::init_tracing(cli.quiet, cli.verbose);

    let quiet = cli.quiet;
    let result = match cli.command {
        Commands::Sample {
            common,
            dispatch,
            random_seed,
        } => commands::sample::execute(common, dispatch, random_seed, quiet).await,
        Commands::Map {
            common,
            dispatch,
            video_map_file,
        } => commands::map::execute(common, dispatch, video_map_file, quiet).await,
        Commands::Collect { common } => commands::collect::execute(common, quiet).await,
    };

    let exit = result.unwrap_or_else(|err| ExitCode::from_anyhow(&err));
    if let Some(message) = &exit.message {
        eprintln!("{} {}", "error:".red().bold(), message);
    }
    exit.into()
}
