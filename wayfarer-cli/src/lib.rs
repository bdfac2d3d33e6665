//! Administrative command-line interface for a Wayfarer map store.
//!
//! Every subcommand opens the configured SQLite database, runs one query
//! through the [`wayfarer_core::QueryFacade`] and prints the result as JSON.
#![forbid(unsafe_code)]

use std::io::Write;

use clap::{Parser, Subcommand};

mod commands;
mod error;

use commands::{BboxArgs, ClearArgs, NearArgs, SpeedLimitsArgs, SummariseArgs};
pub use error::CliError;

const ARG_DATABASE: &str = "database";
const ARG_LON: &str = "lon";
const ARG_LAT: &str = "lat";
const ARG_DISTANCE: &str = "distance";
const ARG_MIN_LON: &str = "min-lon";
const ARG_MIN_LAT: &str = "min-lat";
const ARG_MAX_LON: &str = "max-lon";
const ARG_MAX_LAT: &str = "max-lat";
const ARG_KIND: &str = "kind";
const ENV_NEAR_LON: &str = "WAYFARER_CMDS_NEAR_LON";
const ENV_NEAR_LAT: &str = "WAYFARER_CMDS_NEAR_LAT";
const ENV_BBOX_MIN_LON: &str = "WAYFARER_CMDS_BBOX_MIN_LON";
const ENV_BBOX_MIN_LAT: &str = "WAYFARER_CMDS_BBOX_MIN_LAT";
const ENV_BBOX_MAX_LON: &str = "WAYFARER_CMDS_BBOX_MAX_LON";
const ENV_BBOX_MAX_LAT: &str = "WAYFARER_CMDS_BBOX_MAX_LAT";
const ENV_CLEAR_KIND: &str = "WAYFARER_CMDS_CLEAR_KIND";

/// Run the Wayfarer CLI with the current process arguments and environment.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    let mut stdout = std::io::stdout().lock();
    dispatch(cli.command, &mut stdout)
}

fn dispatch(command: Command, writer: &mut dyn Write) -> Result<(), CliError> {
    match command {
        Command::Summarise(args) => commands::run_summarise(args, writer),
        Command::Near(args) => commands::run_near(args, writer),
        Command::Bbox(args) => commands::run_bbox(args, writer),
        Command::SpeedLimits(args) => commands::run_speed_limits(args, writer),
        Command::Clear(args) => commands::run_clear(args, writer),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "wayfarer",
    about = "Inspect and maintain a Wayfarer map store",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Count the stored nodes, ways and relations.
    Summarise(SummariseArgs),
    /// Find nodes near a point.
    Near(NearArgs),
    /// Find nodes inside a bounding box.
    Bbox(BboxArgs),
    /// Group ways by their tag maps.
    SpeedLimits(SpeedLimitsArgs),
    /// Empty one entity collection.
    Clear(ClearArgs),
}

#[cfg(test)]
mod tests;
