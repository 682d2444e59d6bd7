//! `prtg-query`: command-line front end over the datasource operations.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use prtg_datasource::datemath::parse_range;
use prtg_datasource::export::{
    annotations_to_csv, export_to_json, find_values_to_csv, series_to_csv, OutputFormat,
};
use prtg_datasource::prtg::{ApiMetrics, Row};
use prtg_datasource::{AnnotationSpec, ObjectId, PrtgDataSource, Settings, Target, TemplateVars};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "prtg-query")]
#[command(version, about = "Query a PRTG server: connection test, historic data, messages and lookups")]
struct Args {
    /// TOML settings file; PRTG_* environment variables override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// PRTG base URL (e.g. https://prtg.example.com)
    #[arg(long, global = true)]
    url: Option<String>,

    #[arg(long, global = true)]
    username: Option<String>,

    #[arg(long, global = true)]
    passhash: Option<String>,

    /// Send every request to the server
    #[arg(long, global = true)]
    no_cache: bool,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[arg(short, long, value_enum, default_value_t = Output::Json, global = true)]
    output: Output,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Output {
    Json,
    Csv,
}

impl From<Output> for OutputFormat {
    fn from(output: Output) -> Self {
        match output {
            Output::Json => OutputFormat::Json,
            Output::Csv => OutputFormat::Csv,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check the server version and credentials
    Test,

    /// Historic values of one channel
    Query {
        #[arg(long)]
        group: String,
        #[arg(long)]
        device: String,
        #[arg(long)]
        sensor: String,
        /// Channel name, or `!` for the latest reading
        #[arg(long)]
        channel: String,
        #[arg(long)]
        alias: Option<String>,
        #[arg(long, default_value = "now-6h")]
        from: String,
        #[arg(long, default_value = "now")]
        to: String,
        /// Template variable, `name=value`
        #[arg(long = "var")]
        vars: Vec<String>,
    },

    /// Sensor messages as annotations
    Annotations {
        #[arg(long)]
        sensor_id: ObjectId,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, default_value = "now-6h")]
        from: String,
        #[arg(long, default_value = "now")]
        to: String,
    },

    /// Variable query, e.g. `device:group=Servers` or `channel:sensor=1234`
    Find {
        query: String,
        #[arg(long = "var")]
        vars: Vec<String>,
    },

    /// List objects
    List {
        #[command(subcommand)]
        kind: ListKind,
    },
}

#[derive(Subcommand, Debug)]
enum ListKind {
    Groups,
    Devices {
        #[arg(long)]
        group: Option<String>,
    },
    Sensors {
        #[arg(long)]
        device_id: ObjectId,
    },
    /// Channels of a sensor, by ID or by device and sensor name
    Channels {
        #[arg(
            long,
            required_unless_present_all = ["device", "sensor"],
            conflicts_with_all = ["device", "sensor"]
        )]
        sensor_id: Option<ObjectId>,
        #[arg(long, requires = "sensor")]
        device: Option<String>,
        #[arg(long, requires = "device")]
        sensor: Option<String>,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_settings(args: &Args) -> Result<Settings> {
    let mut settings = Settings::load(args.config.as_deref()).context("Failed to load settings")?;

    if let Some(url) = &args.url {
        settings.url = url.clone();
    }
    if let Some(username) = &args.username {
        settings.username = username.clone();
    }
    if let Some(passhash) = &args.passhash {
        settings.passhash = passhash.clone();
    }
    if args.no_cache {
        settings.use_cache = false;
    }

    settings.validate().context("Invalid settings")?;
    Ok(settings)
}

fn render<T: Serialize + ?Sized>(
    data: &T,
    format: OutputFormat,
    to_csv: impl FnOnce(&T) -> Result<String, String>,
) -> Result<String> {
    let rendered = match format {
        OutputFormat::Json => export_to_json(data),
        OutputFormat::Csv => to_csv(data),
    };
    rendered.map_err(anyhow::Error::msg)
}

fn rows_to_csv(rows: &[Row]) -> Result<String, String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    let header: Vec<&String> = rows.first().map(|row| row.0.keys().collect()).unwrap_or_default();
    wtr.write_record(&header).map_err(|e| e.to_string())?;

    for row in rows {
        let record: Vec<String> = header
            .iter()
            .map(|key| row.text(key).unwrap_or_default())
            .collect();
        wtr.write_record(&record).map_err(|e| e.to_string())?;
    }

    String::from_utf8(wtr.into_inner().map_err(|e| e.to_string())?).map_err(|e| e.to_string())
}

fn log_metrics(metrics: &Arc<ApiMetrics>) {
    let snapshot = metrics.snapshot();
    debug!(
        requests = snapshot.total_requests,
        failed = snapshot.failed_requests,
        retries = snapshot.retries,
        cache_hits = snapshot.cache_hits,
        cache_misses = snapshot.cache_misses,
        avg_latency_ms = snapshot.average_latency,
        p95_latency_ms = snapshot.p95_response_time,
        "API metrics"
    );
}

async fn run(args: Args) -> Result<()> {
    let settings = load_settings(&args)?;
    let format = OutputFormat::from(args.output);
    let datasource = PrtgDataSource::new(settings)?;

    let output = match args.command {
        Command::Test => {
            let status = datasource.test_connection().await;
            let rendered = export_to_json(&status).map_err(anyhow::Error::msg)?;
            if !status.is_success() {
                println!("{}", rendered);
                log_metrics(&datasource.metrics());
                anyhow::bail!("{}: {}", status.title, status.message);
            }
            rendered
        }
        Command::Query {
            group,
            device,
            sensor,
            channel,
            alias,
            from,
            to,
            vars,
        } => {
            let range = parse_range(&from, &to, Utc::now())?;
            let vars = TemplateVars::from_assignments(&vars)?;
            let target = Target {
                group: Some(group),
                device: Some(device),
                sensor: Some(sensor),
                channel: Some(channel),
                alias,
                hide: false,
            };
            let series = datasource.query(&range, &[target], &vars).await?;
            render(series.as_slice(), format, series_to_csv)?
        }
        Command::Annotations {
            sensor_id,
            name,
            from,
            to,
        } => {
            let range = parse_range(&from, &to, Utc::now())?;
            let spec = AnnotationSpec { name, sensor_id };
            let annotations = datasource.annotation_query(&range, &spec).await?;
            render(annotations.as_slice(), format, annotations_to_csv)?
        }
        Command::Find { query, vars } => {
            let vars = TemplateVars::from_assignments(&vars)?;
            let values = datasource.metric_find_query(&query, &vars).await?;
            render(values.as_slice(), format, find_values_to_csv)?
        }
        Command::List { kind } => {
            let api = datasource.api();
            let rows = match kind {
                ListKind::Groups => api.list_groups().await?,
                ListKind::Devices { group } => api.list_devices(group.as_deref()).await?,
                ListKind::Sensors { device_id } => api.list_sensors(device_id).await?,
                ListKind::Channels {
                    sensor_id: Some(sensor_id),
                    ..
                } => api.list_channels(sensor_id).await?,
                ListKind::Channels {
                    device: Some(device),
                    sensor: Some(sensor),
                    ..
                } => api.list_channels_for(&device, &sensor).await?,
                ListKind::Channels { .. } => {
                    anyhow::bail!("list channels needs --sensor-id, or --device with --sensor")
                }
            };
            render(rows.as_slice(), format, rows_to_csv)?
        }
    };

    println!("{}", output);
    log_metrics(&datasource.metrics());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    run(args).await
}
