//! Command-line interface for the trips engine.
//!
//! The `trips` binary initialises the store, loads a CSV file and prints the
//! weekly-average aggregate, in that order, depending on the flags given.
#![forbid(unsafe_code)]

use std::{
    ffi::OsString,
    io::{self, Write},
};

use camino::Utf8PathBuf;
use clap::Parser;
use log::{debug, info, warn};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{
    Deserialize, Serialize,
    ser::{SerializeSeq, Serializer as _},
};
use trips_core::{AggregateFilter, BoundingBox, DEFAULT_STORE_FILE, PointColumn, TripStore};
use trips_data::{LogProgress, load_trips_file};

mod error;
mod paths;

pub use error::CliError;

const ARG_INIT: &str = "init";
const ARG_FILE: &str = "file";
const ARG_AW: &str = "aw";
const ARG_REGION: &str = "region";
const ARG_BBOX: &str = "bbox";
const ARG_COLUMN: &str = "column";
const ARG_DATABASE: &str = "database";

/// Single-dash spellings accepted for backwards compatibility.
const LEGACY_FLAGS: [(&str, &str); 3] = [("-init", "--init"), ("-aw", "--aw"), ("-bbox", "--bbox")];

/// Flags whose following token is a value and must not be rewritten.
const VALUE_FLAGS: [&str; 8] = [
    "-f", "--file", "-r", "--region", "-bbox", "--bbox", "--column", "--database",
];

/// Run the trips CLI with the current process arguments and environment.
pub fn run() -> Result<(), CliError> {
    let args = parse_args(std::env::args_os())?;
    debug!("arguments: {args:?}");
    let config = args.into_config()?;
    let mut stdout = io::stdout().lock();
    execute(&config, &mut stdout)?;
    stdout.flush().map_err(CliError::WriteOutput)
}

/// Parse `args` (including the program name), accepting the legacy
/// single-dash spellings `-init`, `-aw` and `-bbox`.
pub fn parse_args<I, T>(args: I) -> Result<TripsArgs, CliError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    TripsArgs::try_parse_from(normalise_legacy_flags(args)).map_err(CliError::ArgumentParsing)
}

fn normalise_legacy_flags<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut expects_value = false;
    args.into_iter()
        .map(|arg| {
            let arg: OsString = arg.into();
            let text = arg.to_str();
            let rewritten = if expects_value {
                None
            } else {
                text.and_then(|flag| {
                    LEGACY_FLAGS
                        .iter()
                        .find(|(legacy, _)| *legacy == flag)
                        .map(|(_, modern)| OsString::from(*modern))
                })
            };
            expects_value = !expects_value && text.is_some_and(|flag| VALUE_FLAGS.contains(&flag));
            rewritten.unwrap_or(arg)
        })
        .collect()
}

/// Command-line arguments for the `trips` binary.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "trips",
    about = "Load trip CSV files into a spatial SQLite store and report weekly averages",
    long_about = "Load trip CSV files into a spatial SQLite store and report the \
                  average number of trips per week, optionally filtered by region \
                  and bounding box. The legacy spellings -init, -aw and -bbox are \
                  accepted.",
    version
)]
#[ortho_config(prefix = "TRIPS")]
pub struct TripsArgs {
    /// Create the store schema (safe to repeat).
    #[arg(long = ARG_INIT)]
    #[serde(default)]
    pub init: bool,
    /// CSV file of trips to load.
    #[arg(short = 'f', long = ARG_FILE, value_name = "path")]
    #[serde(default)]
    pub file: Option<Utf8PathBuf>,
    /// Print the average number of trips per week for each region.
    #[arg(long = ARG_AW)]
    #[serde(default)]
    pub aw: bool,
    /// Only count trips from this region (case-sensitive).
    #[arg(short = 'r', long = ARG_REGION, value_name = "region")]
    #[serde(default)]
    pub region: Option<String>,
    /// Only count trips whose point lies in `x1,y1,x2,y2`.
    #[arg(long = ARG_BBOX, value_name = "x1,y1,x2,y2", allow_hyphen_values = true)]
    #[serde(default)]
    pub bbox: Option<String>,
    /// Point tested against the bounding box; both are reported when omitted.
    #[arg(long = ARG_COLUMN, value_name = "point_origin|point_dest")]
    #[serde(default)]
    pub column: Option<String>,
    /// Store file to open or create.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub database: Option<Utf8PathBuf>,
}

impl TripsArgs {
    /// Layer configuration files and environment under the CLI values and
    /// resolve the result.
    pub fn into_config(self) -> Result<TripsConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        TripsConfig::try_from(merged)
    }
}

/// Resolved run configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TripsConfig {
    /// Store file location.
    pub database: Utf8PathBuf,
    /// Whether to create the schema.
    pub init: bool,
    /// CSV file to load, if any.
    pub file: Option<Utf8PathBuf>,
    /// Aggregates to print, in order.
    pub queries: Vec<AggregateFilter>,
}

impl TryFrom<TripsArgs> for TripsConfig {
    type Error = CliError;

    fn try_from(args: TripsArgs) -> Result<Self, Self::Error> {
        let bbox = args
            .bbox
            .as_deref()
            .map(|value| {
                value
                    .parse::<BoundingBox>()
                    .map_err(|source| CliError::InvalidBoundingBox {
                        value: value.to_owned(),
                        source,
                    })
            })
            .transpose()?;
        let column = args
            .column
            .as_deref()
            .map(str::parse::<PointColumn>)
            .transpose()?;

        let queries = if args.aw {
            if column.is_some() && bbox.is_none() {
                warn!("--{ARG_COLUMN} has no effect without --{ARG_BBOX}");
            }
            plan_queries(args.region, bbox, column)
        } else {
            if args.region.is_some() || bbox.is_some() {
                warn!("--{ARG_REGION} and --{ARG_BBOX} only apply with --{ARG_AW}; ignoring");
            }
            Vec::new()
        };

        Ok(Self {
            database: args
                .database
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_STORE_FILE)),
            init: args.init,
            file: args.file,
            queries,
        })
    }
}

/// A bounding box without an explicit column is tested against both points,
/// origin first.
fn plan_queries(
    region: Option<String>,
    bbox: Option<BoundingBox>,
    column: Option<PointColumn>,
) -> Vec<AggregateFilter> {
    let base = AggregateFilter {
        region,
        ..AggregateFilter::default()
    };
    match (bbox, column) {
        (Some(bbox), Some(column)) => vec![base.with_bbox(bbox, column)],
        (Some(bbox), None) => PointColumn::ALL
            .into_iter()
            .map(|column| base.clone().with_bbox(bbox, column))
            .collect(),
        (None, _) => vec![base],
    }
}

/// Open the store, then load and query as `config` asks, writing one JSON
/// array per query to `out`.
pub fn execute(config: &TripsConfig, out: &mut dyn Write) -> Result<(), CliError> {
    paths::ensure_parent_dir(&config.database).map_err(|source| {
        CliError::CreateStoreDirectory {
            path: config.database.clone(),
            source,
        }
    })?;
    let mut store = TripStore::open(config.database.as_std_path(), config.init)?;

    if let Some(file) = &config.file {
        paths::require_existing(file, ARG_FILE)?;
        let summary = load_trips_file(&mut store, file, &mut LogProgress)?;
        info!(
            "inserted {} of {} expected rows into {}",
            summary.rows_inserted, summary.rows_expected, config.database
        );
    }

    for filter in &config.queries {
        write_weekly_averages(&store, filter, out)?;
    }
    Ok(())
}

fn write_weekly_averages(
    store: &TripStore,
    filter: &AggregateFilter,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    let mut query = store.prepare_average_weekly_trips(filter)?;
    let mut serializer = serde_json::Serializer::new(&mut *out);
    let mut rows = serializer
        .serialize_seq(None)
        .map_err(CliError::SerialiseResults)?;
    for row in query.rows()? {
        rows.serialize_element(&row?)
            .map_err(CliError::SerialiseResults)?;
    }
    rows.end().map_err(CliError::SerialiseResults)?;
    out.write_all(b"\n").map_err(CliError::WriteOutput)
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<TripsConfig, CliError> {
    let merged = TripsArgs::merge_from_layers(layers).map_err(CliError::from)?;
    TripsConfig::try_from(merged)
}

#[cfg(test)]
mod tests;
