//! Band scan against a real device.
//!
//! Demonstrates:
//! - Building a link with an operator override and config file
//! - Reading device info
//! - Running a band scan while printing progress and hits
//!
//! Usage:
//!   cargo run --example band_scan
//!   cargo run --example band_scan -- --host 192.168.4.1
//!   cargo run --example band_scan -- --config link.toml --debug

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use device_link::scan::format_mhz;
use device_link::{DeviceLink, HitLog, LinkEvent, LinkOptions, Result, ScanEvent, ScanParams};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Args
// ============================================================================

/// Command-line arguments.
#[derive(Debug, Clone, Default)]
struct Args {
    debug: bool,
    host: Option<String>,
    config: Option<String>,
}

impl Args {
    fn parse() -> Self {
        let mut args = Self::default();
        let mut iter = std::env::args().skip(1);

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--debug" => args.debug = true,
                "--host" => args.host = iter.next(),
                "--config" => args.config = iter.next(),
                _ => {}
            }
        }

        args
    }
}

/// Initialize tracing/logging.
fn init_logging(debug: bool) {
    let filter = if debug {
        "device_link=debug"
    } else {
        "device_link=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    println!("=== Band Scan ===\n");

    let options = match &args.config {
        Some(path) => LinkOptions::from_toml_file(path)?,
        None => LinkOptions::default(),
    };

    let mut builder = DeviceLink::builder().options(options);
    if let Some(host) = &args.host {
        builder = builder.endpoint_override(host.clone());
    }

    let link = builder.connect()?;
    println!("[Connect] Candidates:");
    for endpoint in link.endpoints() {
        println!("          {endpoint}");
    }

    link.wait_connected(Duration::from_secs(15)).await?;
    println!("          ✓ Connected\n");

    let info = link.read_device_info().await?;
    println!(
        "[Device]  {} {} ({}), firmware {}\n",
        info.manufacturer, info.device_name, info.model_number, info.firmware_version
    );

    let params = link.read_scan_config().await.unwrap_or_default();
    println!(
        "[Scan]    {} - {} MHz, step {} MHz, dwell {} ms",
        format_mhz(Some(params.start_mhz)),
        format_mhz(Some(params.end_mhz)),
        format_mhz(Some(params.step_mhz)),
        params.dwell_ms
    );

    let mut events = link.subscribe();
    let printer = tokio::spawn(async move {
        let mut hits = HitLog::default();

        while let Ok(event) = events.recv().await {
            match event {
                LinkEvent::Scan(ScanEvent::Progress(progress)) => {
                    println!(
                        "          {:>3}%  {} MHz  {}",
                        progress.percent,
                        progress.frequency_label(),
                        progress.segment_label()
                    );
                }
                LinkEvent::Scan(ScanEvent::Hit(hit)) => {
                    println!(
                        "          hit at {} MHz, rssi {:?}",
                        format_mhz(hit.frequency_mhz),
                        hit.rssi
                    );
                    hits.push(hit);
                }
                LinkEvent::Scan(ScanEvent::BusyRetry) => println!("          device busy, retrying"),
                LinkEvent::Scan(ScanEvent::Completed(_) | ScanEvent::Failed(_) | ScanEvent::Aborted) => {
                    break;
                }
                _ => {}
            }
        }

        hits
    });

    let summary = link.start_scan(params).await?;
    let hits = printer.await.unwrap_or_default();

    println!(
        "\n[Done]    {} hits, {} found, {} progress updates",
        summary.hits, summary.found, summary.progress_updates
    );
    if let Some(latest) = hits.latest() {
        println!("          latest hit {} MHz", format_mhz(latest.frequency_mhz));
    }

    link.close().await
}
