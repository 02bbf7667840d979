#![forbid(unsafe_code)]

//! Demonstration harness for `retina_core`: loads a `CoreConfig`, replays
//! either a captured `.pcap` file or a small built-in synthetic exchange
//! through `RetinaCore::process_packet`, emits records through the
//! library's own bounded `Emitter`, logs them as they drain, and serves the
//! resulting counters over a minimal Prometheus endpoint.
//!
//! CLI and tracing setup mirror `huginn-proxy`'s binary: `clap::Parser` for
//! arguments, `tracing_subscriber::fmt` with an `EnvFilter` for logging.

mod http;
mod metrics;
mod pcap;
mod sink;

use clap::Parser;
use retina_core::emitter::DEFAULT_CHANNEL_CAPACITY;
use retina_core::{BypassFilter, CoreConfig, IpFilter, LpmFilter, MonotonicClock, RetinaCore};
use retina_wire::ObservationPoint;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "retina-core demonstration agent")]
struct Cli {
    /// Path to a configuration TOML file; falls back to defaults if absent.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Path to a libpcap capture to replay. Without this, a small built-in
    /// synthetic TCP exchange is processed instead.
    #[arg(short, long, value_name = "FILE")]
    pcap: Option<PathBuf>,

    /// Port the `/metrics` endpoint listens on.
    #[arg(long, default_value_t = 9090)]
    metrics_port: u16,

    /// CIDR prefixes of interest (repeatable). Omit to process every address.
    #[arg(long = "allow", value_name = "CIDR")]
    allow: Vec<String>,
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match retina_core::config::load_from_path(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                tracing::error!(%err, "failed to load configuration");
                std::process::exit(1);
            }
        },
        None => CoreConfig::default(),
    };
    info!(ct_map_size = config.ct_map_size, sampling_rate = config.sampling_rate, "configuration loaded");

    let filter: Arc<dyn IpFilter> = if config.bypass_filter || cli.allow.is_empty() {
        Arc::new(BypassFilter)
    } else {
        let lpm = LpmFilter::new();
        for cidr in &cli.allow {
            match parse_cidr(cidr) {
                Some((prefix, len)) => lpm.insert(prefix, len),
                None => warn!(cidr, "ignoring malformed --allow CIDR"),
            }
        }
        Arc::new(lpm)
    };

    let prom_metrics = Arc::new(metrics::PrometheusMetrics::new());
    let registry = prom_metrics.registry();

    let (emitting_sink, rx) = sink::EmittingSink::new(DEFAULT_CHANNEL_CAPACITY, prom_metrics.clone());
    let drain_task = sink::spawn_drain(rx);

    let core = RetinaCore::new(config, Arc::new(MonotonicClock::new()), filter, Arc::new(emitting_sink), prom_metrics.clone());

    let metrics_task = tokio::spawn(http::serve_metrics(cli.metrics_port, registry));

    replay(&core, cli.pcap.as_deref());

    // Dropping the core drops its `Emitter`'s sender, closing the channel so
    // the drain task flushes whatever is queued and then exits.
    drop(core);
    if let Err(err) = drain_task.await {
        warn!(%err, "emitter drain task panicked");
    }

    if let Err(err) = metrics_task.await {
        warn!(%err, "metrics endpoint task panicked");
    }
}

fn replay(core: &RetinaCore, pcap_path: Option<&std::path::Path>) {
    let frames = match pcap_path {
        Some(path) => match pcap::read_frames(path) {
            Ok(frames) => frames,
            Err(err) => {
                tracing::error!(%err, ?path, "failed to read pcap capture");
                std::process::exit(1);
            }
        },
        None => pcap::synthetic_capture(),
    };
    info!(count = frames.len(), "replaying captured frames");
    for frame in &frames {
        core.process_packet(frame, ObservationPoint::FromEndpoint);
    }
}

fn parse_cidr(s: &str) -> Option<(Ipv4Addr, u8)> {
    let (addr, len) = s.split_once('/')?;
    let addr = Ipv4Addr::from_str(addr).ok()?;
    let len: u8 = len.parse().ok()?;
    Some((addr, len))
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).with_target(false).init();
}
