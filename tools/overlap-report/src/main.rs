use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use geojson::JsonObject;
use sg_overlap::prelude::*;
use std::path::PathBuf;

mod load;
mod output;

use load::{read_bus_routes, read_stations};
use output::{
    print_alternatives_table, print_json, print_overlap_table, print_proximity_table, print_stop_table,
    LayerBuilder,
};

#[derive(Parser, Debug)]
#[command(
    name = "overlap-report",
    author,
    version,
    about = "Rank Singapore bus services by how closely they shadow MRT lines",
    long_about = "Loads the LTA bus route table and the MRT station table, rebuilds every \
                  route and line as a path in UTM zone 48N, and reports one analysis view: \
                  corridor overlap, stop proximity to stations, or alternative services.\n\n\
                  Every view can also write its geometry as GeoJSON for a map renderer."
)]
struct Args {
    /// Bus route CSV (ServiceNo, Direction, StopSequence, ..., Latitude, Longitude)
    #[arg(short, long, global = true, default_value = "data/bus_routes.csv")]
    bus_routes: PathBuf,

    /// MRT station CSV (STN_NO, Latitude, Longitude)
    #[arg(short, long, global = true, default_value = "data/mrt_stations.csv")]
    stations: PathBuf,

    /// Output format for result tables
    #[arg(short, long, global = true, value_enum, default_value_t = Format::Table)]
    format: Format,

    /// Verbose output (show debug messages)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List rail lines and their stations
    Lines,

    /// Rank bus routes by overlap with one or more rail corridors
    Overlap {
        /// Line codes to buffer (e.g. TE, NS); repeat for several
        #[arg(short, long = "line", required = true, num_args = 1..)]
        lines: Vec<String>,

        /// Corridor radius in metres [default: 400, or 500 for a single line]
        #[arg(long)]
        radius: Option<f64>,

        /// Rows to keep after ranking [default: 10, or 5 for a single line]
        #[arg(long)]
        top_n: Option<usize>,

        /// Ranking key [default: length, or percentage for a single line]
        #[arg(long, value_enum)]
        rank_by: Option<RankArg>,

        /// Keep only these services from the ranked table (comma separated)
        #[arg(long, value_delimiter = ',')]
        services: Vec<String>,

        /// Include lettered variants such as 36A
        #[arg(long)]
        all_services: bool,

        /// Write corridors and ranked routes as GeoJSON
        #[arg(long)]
        geojson: Option<PathBuf>,
    },

    /// Count bus stops within a radius of any MRT station
    Proximity {
        /// Single service to report stop by stop; all routes when omitted
        #[arg(long)]
        service: Option<String>,

        /// Direction of the service (1 or 2)
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=2))]
        direction: u8,

        /// Station buffer radius in metres
        #[arg(long, default_value_t = DEFAULT_BUFFER_RADIUS_M)]
        radius: f64,

        /// Include lettered variants such as 36A
        #[arg(long)]
        all_services: bool,

        /// Write stops and station buffers as GeoJSON (single service only)
        #[arg(long)]
        geojson: Option<PathBuf>,
    },

    /// Find services sharing a large part of a route's path
    Alternatives {
        /// Reference service
        #[arg(long)]
        service: String,

        /// Direction of the reference service (1 or 2)
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=2))]
        direction: u8,

        /// Share of the reference path, in percent, a candidate must cover
        #[arg(long, default_value_t = DEFAULT_THRESHOLD_PERCENT)]
        threshold: f64,

        /// Include lettered variants such as 36A
        #[arg(long)]
        all_services: bool,

        /// Write the reference and overlapping routes as GeoJSON
        #[arg(long)]
        geojson: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Table,
    Json,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RankArg {
    Length,
    Percentage,
}

impl From<RankArg> for RankBy {
    fn from(arg: RankArg) -> Self {
        match arg {
            RankArg::Length => RankBy::Length,
            RankArg::Percentage => RankBy::Percentage,
        }
    }
}

fn route_filter(all_services: bool, default: RouteFilter) -> RouteFilter {
    if all_services {
        RouteFilter::All
    } else {
        default
    }
}

fn direction(code: u8) -> Result<Direction> {
    match Direction::from_code(code) {
        Some(direction) => Ok(direction),
        None => bail!("Direction must be 1 or 2, got {}", code),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if args.verbose { "debug" } else { "info" }),
    )
    .format_timestamp(None)
    .init();

    for path in [&args.bus_routes, &args.stations] {
        if !path.exists() {
            bail!("Input file does not exist: {}", path.display());
        }
    }

    let stops = read_bus_routes(&args.bus_routes).context("Failed to load bus routes")?;
    let stations = read_stations(&args.stations).context("Failed to load MRT stations")?;

    let dataset = Dataset::from_records(stops, stations);
    log::info!(
        "Dataset: {} routes, {} lines, {} stations",
        dataset.routes().len(),
        dataset.lines().count(),
        dataset.stations().len()
    );

    let unplottable: Vec<String> = dataset.unplottable_routes().map(|r| r.key.to_string()).collect();
    if !unplottable.is_empty() {
        log::warn!("{} routes have fewer than two stops and are skipped", unplottable.len());
        log::debug!("  {}", unplottable.join(", "));
    }

    match args.command {
        Command::Lines => run_lines(&dataset, args.format),
        Command::Overlap {
            lines,
            radius,
            top_n,
            rank_by,
            services,
            all_services,
            geojson,
        } => {
            let lines: Vec<LineCode> = lines.iter().map(LineCode::new).collect();

            // A single line uses the historical single-line defaults
            let defaults = if lines.len() == 1 {
                AnalysisParams::single_line()
            } else {
                AnalysisParams::default()
            };
            let params = AnalysisParams {
                buffer_radius_m: radius.unwrap_or(defaults.buffer_radius_m),
                top_n: top_n.unwrap_or(defaults.top_n),
                rank_by: rank_by.map(Into::into).unwrap_or(defaults.rank_by),
                route_filter: route_filter(all_services, defaults.route_filter),
                ..defaults
            };
            params.validate()?;

            let services: Vec<ServiceIdentifier> = services.iter().map(ServiceIdentifier::new).collect();
            run_overlap(&dataset, &lines, &params, &services, geojson, args.format)
        }
        Command::Proximity {
            service,
            direction: code,
            radius,
            all_services,
            geojson,
        } => {
            let filter = route_filter(all_services, RouteFilter::TrunkOnly);
            match service {
                Some(service) => {
                    let key = RouteKey::new(service, direction(code)?);
                    run_route_proximity(&dataset, &key, radius, geojson, args.format)
                }
                None => {
                    if geojson.is_some() {
                        bail!("--geojson needs --service for the proximity view");
                    }
                    let summaries = network_proximity(&dataset, radius, filter)?;
                    match args.format {
                        Format::Table => print_proximity_table(&summaries),
                        Format::Json => print_json(&summaries)?,
                    }
                    Ok(())
                }
            }
        }
        Command::Alternatives {
            service,
            direction: code,
            threshold,
            all_services,
            geojson,
        } => {
            let key = RouteKey::new(service, direction(code)?);
            let filter = route_filter(all_services, RouteFilter::TrunkOnly);
            run_alternatives(&dataset, &key, threshold, filter, geojson, args.format)
        }
    }
}

fn run_lines(dataset: &Dataset, format: Format) -> Result<()> {
    match format {
        Format::Json => {
            let rows: Vec<serde_json::Value> = dataset
                .lines()
                .map(|line| {
                    let stations: Vec<&str> = line.stations.iter().map(|s| &*s.record.code).collect();
                    serde_json::json!({
                        "line": line.code.as_str(),
                        "stations": stations,
                        "length_m": line.path.as_ref().map(|p| p.length_m()),
                    })
                })
                .collect();
            print_json(&rows)?;
        }
        Format::Table => {
            println!("{:<6} {:>9} {:>12}", "Line", "Stations", "Length (m)");
            for line in dataset.lines() {
                let length = match &line.path {
                    Some(path) => format!("{:.0}", path.length_m()),
                    None => "-".to_string(),
                };
                println!("{:<6} {:>9} {:>12}", line.code.as_str(), line.stations.len(), length);
            }
        }
    }

    Ok(())
}

fn run_overlap(
    dataset: &Dataset,
    lines: &[LineCode],
    params: &AnalysisParams,
    services: &[ServiceIdentifier],
    geojson: Option<PathBuf>,
    format: Format,
) -> Result<()> {
    log::info!(
        "Overlap of {} with {} m corridors, top {} by {:?}",
        lines.iter().map(|l| l.as_str()).collect::<Vec<_>>().join(", "),
        params.buffer_radius_m,
        params.top_n,
        params.rank_by
    );

    let report = line_overlaps(dataset, lines, params.buffer_radius_m, params.route_filter)?;

    for service in services {
        if dataset.service_routes(service).is_err() {
            log::warn!("Service {} is not in the bus route table", service);
        }
    }

    let rows = report.selected(params.top_n, params.rank_by, services);

    match format {
        Format::Table => print_overlap_table(&rows),
        Format::Json => print_json(&rows)?,
    }

    if let Some(path) = geojson {
        let mut layers = LayerBuilder::new();
        for corridor in &report.corridors {
            layers.add_corridor(corridor);
        }
        for row in &rows {
            let route = dataset.route(&row.route)?;
            let mut extra = JsonObject::new();
            extra.insert("line".to_string(), serde_json::json!(row.line.as_str()));
            extra.insert("overlap_m".to_string(), serde_json::json!(row.length_m));
            extra.insert("overlap_percent".to_string(), serde_json::json!(row.percentage));
            layers.add_route(
                &route.projected_path()?.geographic,
                row.route.service.as_str(),
                row.route.direction.code(),
                extra,
            );
        }
        layers.write(&path)?;
    }

    Ok(())
}

fn run_route_proximity(
    dataset: &Dataset,
    key: &RouteKey,
    radius_m: f64,
    geojson: Option<PathBuf>,
    format: Format,
) -> Result<()> {
    let summary = route_proximity(dataset, key, radius_m)?;

    match format {
        Format::Table => print_stop_table(&summary),
        Format::Json => print_json(&summary)?,
    }

    if let Some(path) = geojson {
        let buffers = StationBuffers::from_dataset(dataset, radius_m)?;
        let mut layers = LayerBuilder::new();
        layers.add_buffers(&buffers.to_geographic(dataset.projection()), buffers.radius_m());
        if let Ok(route_path) = dataset.route(key)?.projected_path() {
            layers.add_route(&route_path.geographic, key.service.as_str(), key.direction.code(), JsonObject::new());
        }
        layers.add_stops(&summary);
        layers.write(&path)?;
    }

    Ok(())
}

fn run_alternatives(
    dataset: &Dataset,
    key: &RouteKey,
    threshold: f64,
    filter: RouteFilter,
    geojson: Option<PathBuf>,
    format: Format,
) -> Result<()> {
    let result = route_alternatives(dataset, key, threshold, filter)?;

    match format {
        Format::Table => print_alternatives_table(&result),
        Format::Json => print_json(&result)?,
    }

    if let Some(path) = geojson {
        let mut layers = LayerBuilder::new();

        let mut extra = JsonObject::new();
        extra.insert("role".to_string(), serde_json::json!("reference"));
        let reference = dataset.route(key)?.projected_path()?;
        layers.add_route(&reference.geographic, key.service.as_str(), key.direction.code(), extra);

        for candidate in result.candidates.iter().filter(|c| c.exceeds_threshold) {
            let path = dataset.route(&candidate.route)?.projected_path()?;
            let mut extra = JsonObject::new();
            extra.insert("role".to_string(), serde_json::json!("alternative"));
            extra.insert("shared_m".to_string(), serde_json::json!(candidate.shared_length_m));
            extra.insert("shared_percent".to_string(), serde_json::json!(candidate.percentage));
            layers.add_route(
                &path.geographic,
                candidate.route.service.as_str(),
                candidate.route.direction.code(),
                extra,
            );
        }

        layers.write(&path)?;
    }

    Ok(())
}
