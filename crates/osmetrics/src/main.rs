use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use chrono::SecondsFormat;
use clap::Parser;
use tracing::{Level, debug, error, info};
use tracing_subscriber::EnvFilter;

use osmetrics_core::units::format_bytes;
use osmetrics_core::{
    Address, MeasureUnit, MetricDefinition, MetricError, OsType, Property, Registry, Sample,
    SourceConfig, Value, registry, source,
};

#[derive(Parser, Debug)]
#[command(name = "osmetrics", about = "Collect host metrics from top and /proc", version)]
struct Args {
    /// Metric ids to collect. Defaults to every known metric.
    #[arg(value_name = "METRIC_ID")]
    metrics: Vec<String>,

    /// Where to collect from: `local` or `ssh://[user@]host[:port]`.
    #[arg(short, long, default_value = "local", env = "OSMETRICS_SOURCE")]
    source: Address,

    /// Number of samples to take; 0 runs until interrupted.
    #[arg(short = 'n', long, default_value = "1")]
    count: u64,

    /// Seconds between samples.
    #[arg(short, long, default_value = "5")]
    interval: u64,

    /// Per-fetch timeout in seconds.
    #[arg(long, default_value = "10")]
    timeout: u64,

    /// Force the OS family instead of detecting it (linux, mac).
    #[arg(long)]
    os: Option<OsType>,

    /// Run fetches one after another instead of concurrently.
    #[arg(long)]
    sequential: bool,

    /// Print one JSON object per sample.
    #[arg(long)]
    json: bool,

    /// List known metric ids and exit.
    #[arg(long)]
    list: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is warn level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn source_config(&self) -> SourceConfig {
        SourceConfig {
            timeout_ms: self.timeout.saturating_mul(1000),
            os_type: self.os,
            parallel_fetch: !self.sequential,
            ..SourceConfig::default()
        }
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::WARN,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    for target in ["osmetrics", "osmetrics_core"] {
        if let Ok(directive) = format!("{target}={level}").parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Resolves `ids` (or every known id) against `address`.
fn resolve_definitions(
    registry: &Registry,
    ids: &[String],
    address: &Address,
) -> Result<Vec<Arc<dyn MetricDefinition>>, MetricError> {
    if ids.is_empty() {
        return registry
            .known_ids()
            .into_iter()
            .map(|id| registry.parse_for(id, address))
            .collect();
    }
    ids.iter()
        .map(|id| registry.parse_for(id, address))
        .collect()
}

/// `name=value unit`, with byte counts in the largest exact unit.
fn render_property(property: &Property) -> String {
    match (property.value(), property.unit()) {
        (Some(Value::Long(bytes)), Some(MeasureUnit::Byte)) => {
            let (value, unit) = format_bytes(*bytes);
            format!("{}={} {}", property.name(), value, unit)
        }
        _ => property.to_string(),
    }
}

fn print_sample(sample: &Sample, json: bool) -> Result<(), serde_json::Error> {
    if json {
        println!("{}", serde_json::to_string(sample)?);
        return Ok(());
    }
    let timestamp = sample.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true);
    for property in &sample.properties {
        println!("{} {}", timestamp, render_property(property));
    }
    Ok(())
}

fn print_known_metrics(registry: &Registry) -> Result<(), MetricError> {
    for id in registry.known_ids() {
        let definition = registry.parse(id)?;
        let unit = definition.base_unit().map_or("-", |u| u.symbol());
        println!("{:<32} {:<4} {}", id, unit, definition.label());
    }
    Ok(())
}

async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let registry = registry::global();
    if args.list {
        print_known_metrics(registry)?;
        return Ok(());
    }

    let definitions = resolve_definitions(registry, &args.metrics, &args.source)?;
    let source = source::for_address(args.source.clone(), args.source_config())?;
    source.start().await?;
    info!(source = %args.source, metrics = definitions.len(), "collecting");

    let interval = Duration::from_secs(args.interval);
    let mut taken: u64 = 0;
    let result = loop {
        let sample = match source.collect_sample(&definitions).await {
            Ok(sample) => sample,
            Err(e) => break Err(e.into()),
        };
        if let Err(e) = print_sample(&sample, args.json) {
            break Err(e.into());
        }
        taken += 1;
        if args.count != 0 && taken >= args.count {
            break Ok(());
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => {
                debug!("interrupted");
                break Ok(());
            }
        }
    };

    source.stop().await;
    result
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("osmetrics: {e}");
            ExitCode::FAILURE
        }
    }
}
