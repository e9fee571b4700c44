use anyhow::{Context as _, Result};
use clap::{Parser, ValueEnum};
use lantern::{
    ComputeCache, CpuSlowdown, Latency, PageCapture, Settings, ThrottlingMethod, ThrottlingProfile,
    Throughput, report,
};
use std::{fs, path::PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, ValueEnum)]
enum Preset {
    Mobile,
    Desktop,
}

/// Estimate the metrics of a captured page load under other conditions.
#[derive(Parser)]
struct Command {
    /// capture to measure: `traceEvents` and `networkEvents`
    capture: PathBuf,

    #[arg(long, value_enum, default_value = "mobile")]
    preset: Preset,

    /// round trip time, e.g. `150ms`
    #[arg(long)]
    rtt: Option<Latency>,

    /// e.g. `1638kbps`
    #[arg(long)]
    throughput: Option<Throughput>,

    /// e.g. `4x`
    #[arg(long)]
    cpu_slowdown: Option<CpuSlowdown>,

    #[arg(long)]
    max_connections_per_origin: Option<usize>,

    /// report the observed metrics instead of simulating them
    #[arg(long)]
    provided: bool,

    /// print the whole report as JSON
    #[arg(long)]
    json: bool,
}

impl Command {
    fn settings(&self) -> Settings {
        let mut throttling = match self.preset {
            Preset::Mobile => ThrottlingProfile::mobile_slow_4g(),
            Preset::Desktop => ThrottlingProfile::desktop_dense_4g(),
        };
        if let Some(rtt) = self.rtt {
            throttling.rtt = rtt;
        }
        if let Some(throughput) = self.throughput {
            throttling.throughput = throughput;
        }
        if let Some(cpu_slowdown) = self.cpu_slowdown {
            throttling.cpu_slowdown = cpu_slowdown;
        }

        let mut settings = Settings {
            throttling,
            ..Settings::default()
        };
        if let Some(max) = self.max_connections_per_origin {
            settings = settings.set_max_connections_per_origin(max);
        }
        if self.provided {
            settings = settings.set_throttling_method(ThrottlingMethod::Provided);
        }
        settings
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cmd = Command::parse();
    let settings = cmd.settings();

    let json = fs::read_to_string(&cmd.capture)
        .with_context(|| format!("Failed to read {}", cmd.capture.display()))?;
    let capture = PageCapture::from_json(&json)?;

    let cache = ComputeCache::new();
    let report = report(&capture, &settings, &cache)?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", settings.throttling);
    for (name, outcome) in [
        ("First Contentful Paint", &report.first_contentful_paint),
        ("Largest Contentful Paint", &report.largest_contentful_paint),
        ("Interactive", &report.interactive),
        ("Speed Index", &report.speed_index),
    ] {
        match outcome.timing_ms() {
            Some(timing_ms) => println!("{name:<26}{timing_ms:>10.0}ms"),
            None => println!("{name:<26}{:>12}", "n/a"),
        }
    }

    let stats = cache.stats();
    println!("cache: {} hits, {} misses", stats.hits, stats.misses);
    Ok(())
}
