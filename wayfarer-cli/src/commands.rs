//! Query and maintenance commands run against a Wayfarer database.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use geo::Coord;
use log::info;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use wayfarer_core::{
    DEFAULT_NEAR_DISTANCE_KM, EntityKind, Node, QueryFacade, Session, Summary, Tags,
};

use crate::{
    ARG_DATABASE, ARG_DISTANCE, ARG_KIND, ARG_LAT, ARG_LON, ARG_MAX_LAT, ARG_MAX_LON,
    ARG_MIN_LAT, ARG_MIN_LON, CliError, ENV_BBOX_MAX_LAT, ENV_BBOX_MAX_LON, ENV_BBOX_MIN_LAT,
    ENV_BBOX_MIN_LON, ENV_CLEAR_KIND, ENV_NEAR_LAT, ENV_NEAR_LON,
};

/// Database used when no path is configured.
pub(crate) const DEFAULT_DATABASE: &str = "wayfarer.db";

/// Location of the SQLite database every command opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StoreConfig {
    pub(crate) database: Utf8PathBuf,
}

impl StoreConfig {
    fn from_option(database: Option<Utf8PathBuf>) -> Self {
        Self {
            database: database.unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_DATABASE)),
        }
    }

    /// Open the database and load its geo index.
    pub(crate) fn open(&self) -> Result<QueryFacade, CliError> {
        let session = Session::open(self.database.as_std_path())?;
        Ok(QueryFacade::open(session)?)
    }
}

fn require<T>(value: Option<T>, field: &'static str, env: &'static str) -> Result<T, CliError> {
    value.ok_or(CliError::MissingArgument { field, env })
}

/// CLI arguments for the `summarise` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(about = "Count the nodes, ways and relations in the store")]
#[ortho_config(prefix = "WAYFARER")]
pub(crate) struct SummariseArgs {
    /// Path to the SQLite database.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
}

impl SummariseArgs {
    pub(crate) fn into_config(self) -> Result<StoreConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        Ok(StoreConfig::from_option(merged.database))
    }
}

/// CLI arguments for the `near` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "List the nodes within a great-circle distance of a point, \
                 nearest first. The radius falls back to the configured \
                 default and then to 100 km.",
    about = "Find nodes near a point"
)]
#[ortho_config(prefix = "WAYFARER")]
pub(crate) struct NearArgs {
    /// Path to the SQLite database.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Longitude of the search centre in degrees.
    #[arg(long = ARG_LON, value_name = "degrees", allow_negative_numbers = true)]
    #[serde(default)]
    pub(crate) lon: Option<f64>,
    /// Latitude of the search centre in degrees.
    #[arg(long = ARG_LAT, value_name = "degrees", allow_negative_numbers = true)]
    #[serde(default)]
    pub(crate) lat: Option<f64>,
    /// Search radius in kilometres.
    #[arg(long = ARG_DISTANCE, value_name = "km")]
    #[serde(default)]
    pub(crate) distance: Option<f64>,
}

impl NearArgs {
    pub(crate) fn into_config(self) -> Result<NearConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        NearConfig::try_from(merged)
    }
}

/// Resolved `near` command configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct NearConfig {
    pub(crate) store: StoreConfig,
    pub(crate) centre: Coord<f64>,
    pub(crate) distance_km: f64,
}

impl NearConfig {
    pub(crate) fn execute(&self, facade: &QueryFacade) -> Result<Vec<Node>, CliError> {
        Ok(facade.find_near(self.centre.x, self.centre.y, Some(self.distance_km))?)
    }
}

impl TryFrom<NearArgs> for NearConfig {
    type Error = CliError;

    fn try_from(args: NearArgs) -> Result<Self, Self::Error> {
        let x = require(args.lon, ARG_LON, ENV_NEAR_LON)?;
        let y = require(args.lat, ARG_LAT, ENV_NEAR_LAT)?;
        Ok(Self {
            store: StoreConfig::from_option(args.database),
            centre: Coord { x, y },
            distance_km: args.distance.unwrap_or(DEFAULT_NEAR_DISTANCE_KM),
        })
    }
}

/// CLI arguments for the `bbox` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "List the nodes inside a longitude/latitude box, edges \
                 included. Boxes crossing the anti-meridian are rejected; \
                 query each side separately.",
    about = "Find nodes inside a bounding box"
)]
#[ortho_config(prefix = "WAYFARER")]
pub(crate) struct BboxArgs {
    /// Path to the SQLite database.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Western edge of the box.
    #[arg(long = ARG_MIN_LON, value_name = "degrees", allow_negative_numbers = true)]
    #[serde(default)]
    pub(crate) min_lon: Option<f64>,
    /// Southern edge of the box.
    #[arg(long = ARG_MIN_LAT, value_name = "degrees", allow_negative_numbers = true)]
    #[serde(default)]
    pub(crate) min_lat: Option<f64>,
    /// Eastern edge of the box.
    #[arg(long = ARG_MAX_LON, value_name = "degrees", allow_negative_numbers = true)]
    #[serde(default)]
    pub(crate) max_lon: Option<f64>,
    /// Northern edge of the box.
    #[arg(long = ARG_MAX_LAT, value_name = "degrees", allow_negative_numbers = true)]
    #[serde(default)]
    pub(crate) max_lat: Option<f64>,
}

impl BboxArgs {
    pub(crate) fn into_config(self) -> Result<BboxConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        BboxConfig::try_from(merged)
    }
}

/// Resolved `bbox` command configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct BboxConfig {
    pub(crate) store: StoreConfig,
    pub(crate) bottom_left: Coord<f64>,
    pub(crate) top_right: Coord<f64>,
}

impl BboxConfig {
    pub(crate) fn execute(&self, facade: &QueryFacade) -> Result<Vec<Node>, CliError> {
        Ok(facade.find_within_bounding_box(self.bottom_left, self.top_right)?)
    }
}

impl TryFrom<BboxArgs> for BboxConfig {
    type Error = CliError;

    fn try_from(args: BboxArgs) -> Result<Self, Self::Error> {
        let bottom_left = Coord {
            x: require(args.min_lon, ARG_MIN_LON, ENV_BBOX_MIN_LON)?,
            y: require(args.min_lat, ARG_MIN_LAT, ENV_BBOX_MIN_LAT)?,
        };
        let top_right = Coord {
            x: require(args.max_lon, ARG_MAX_LON, ENV_BBOX_MAX_LON)?,
            y: require(args.max_lat, ARG_MAX_LAT, ENV_BBOX_MAX_LAT)?,
        };
        Ok(Self {
            store: StoreConfig::from_option(args.database),
            bottom_left,
            top_right,
        })
    }
}

/// CLI arguments for the `speed-limits` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(about = "Group ways by their complete tag map")]
#[ortho_config(prefix = "WAYFARER")]
pub(crate) struct SpeedLimitsArgs {
    /// Path to the SQLite database.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
}

impl SpeedLimitsArgs {
    pub(crate) fn into_config(self) -> Result<StoreConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        Ok(StoreConfig::from_option(merged.database))
    }
}

/// One group of ways sharing a tag map.
///
/// Tag maps cannot be JSON object keys, so groups are emitted as a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct TagGroup {
    pub(crate) tags: Tags,
    pub(crate) count: u64,
}

pub(crate) fn speed_limit_groups(facade: &QueryFacade) -> Result<Vec<TagGroup>, CliError> {
    Ok(facade
        .speed_limits()?
        .into_iter()
        .map(|(tags, count)| TagGroup { tags, count })
        .collect())
}

/// CLI arguments for the `clear` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Delete every entity of one kind. Intended for bootstrap \
                 and test databases; references held by other kinds are \
                 left dangling.",
    about = "Empty one entity collection"
)]
#[ortho_config(prefix = "WAYFARER")]
pub(crate) struct ClearArgs {
    /// Path to the SQLite database.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Collection to empty: node, way or relation.
    #[arg(long = ARG_KIND, value_name = "kind")]
    #[serde(default)]
    pub(crate) kind: Option<EntityKind>,
}

impl ClearArgs {
    pub(crate) fn into_config(self) -> Result<ClearConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ClearConfig::try_from(merged)
    }
}

/// Resolved `clear` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ClearConfig {
    pub(crate) store: StoreConfig,
    pub(crate) kind: EntityKind,
}

impl TryFrom<ClearArgs> for ClearConfig {
    type Error = CliError;

    fn try_from(args: ClearArgs) -> Result<Self, Self::Error> {
        Ok(Self {
            store: StoreConfig::from_option(args.database),
            kind: require(args.kind, ARG_KIND, ENV_CLEAR_KIND)?,
        })
    }
}

/// Report written after a collection has been emptied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ClearReport {
    pub(crate) cleared: EntityKind,
    pub(crate) remaining: Summary,
}

impl ClearConfig {
    pub(crate) fn execute(&self, facade: &QueryFacade) -> Result<ClearReport, CliError> {
        facade.clear(self.kind)?;
        info!("cleared {} collection in {}", self.kind, self.store.database);
        Ok(ClearReport {
            cleared: self.kind,
            remaining: facade.summarize()?,
        })
    }
}

pub(crate) fn run_summarise(args: SummariseArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let facade = args.into_config()?.open()?;
    write_json(writer, &facade.summarize()?)
}

pub(crate) fn run_near(args: NearArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    let facade = config.store.open()?;
    write_json(writer, &config.execute(&facade)?)
}

pub(crate) fn run_bbox(args: BboxArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    let facade = config.store.open()?;
    write_json(writer, &config.execute(&facade)?)
}

pub(crate) fn run_speed_limits(
    args: SpeedLimitsArgs,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let facade = args.into_config()?.open()?;
    write_json(writer, &speed_limit_groups(&facade)?)
}

pub(crate) fn run_clear(args: ClearArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    let facade = config.store.open()?;
    write_json(writer, &config.execute(&facade)?)
}

/// Write `value` as pretty-printed JSON followed by a newline.
pub(crate) fn write_json<T: Serialize + ?Sized>(
    writer: &mut dyn Write,
    value: &T,
) -> Result<(), CliError> {
    let payload = serde_json::to_string_pretty(value).map_err(CliError::SerialiseOutput)?;
    writer
        .write_all(payload.as_bytes())
        .map_err(CliError::WriteOutput)?;
    writer.write_all(b"\n").map_err(CliError::WriteOutput)?;
    Ok(())
}

#[cfg(test)]
pub(crate) fn near_config_from_layers(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<NearConfig, CliError> {
    let merged = NearArgs::merge_from_layers(layers).map_err(CliError::from)?;
    NearConfig::try_from(merged)
}
