//! geo-gateway command line.
//!
//! Every command builds a [`GeoGateway`] from the configuration file (or
//! defaults), runs one operation and prints the result as JSON on stdout.
//! `monitor` keeps the connectivity probe and cache sweeper running until
//! SIGINT/SIGTERM.

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

use geo_gateway::config::loader::apply_env_overrides;
use geo_gateway::config::{load_config, GatewayConfig};
use geo_gateway::lifecycle::signals::shutdown_signal;
use geo_gateway::observability::{logging, metrics};
use geo_gateway::types::{Coordinate, LocationBias, Route, RouteRequest, RouteSource, TileCoord};
use geo_gateway::{GeoGateway, Shutdown};

#[derive(Parser)]
#[command(name = "geo-gateway")]
#[command(version, about = "Resilient geocoding, routing and tile access", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = "GEO_GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Skip the network and answer from cache only
    #[arg(long)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Forward geocode a free-text query
    Geocode {
        query: String,
        /// Bias results towards "lat,lon"
        #[arg(long)]
        near: Option<Coordinate>,
    },
    /// Nearest address to "lat,lon"
    Reverse { coordinate: Coordinate },
    /// Route between two or more "lat,lon" points
    Route {
        from: Coordinate,
        to: Coordinate,
        /// Intermediate stops, in order
        #[arg(long)]
        via: Vec<Coordinate>,
        #[arg(long)]
        optimize: bool,
    },
    /// Fetch one map tile
    Tile {
        z: u8,
        x: u32,
        y: u32,
        /// Write the image here instead of only reporting its size
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Fare for a trip, or for a known distance and duration
    Fare {
        from: Option<Coordinate>,
        to: Option<Coordinate>,
        #[arg(long, conflicts_with_all = ["from", "to"], requires = "minutes")]
        km: Option<f64>,
        #[arg(long, requires = "km")]
        minutes: Option<f64>,
    },
    /// Probe connectivity
    Probe,
    /// Cache statistics and provider analytics
    Stats,
    /// Drop cached responses
    ClearCache {
        /// Only drop expired entries
        #[arg(long)]
        expired: bool,
    },
    /// Run background probing and cache sweeping until interrupted
    Monitor,
}

#[derive(Serialize)]
struct TileOutput {
    tile: String,
    bytes: usize,
    output: Option<PathBuf>,
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => {
            let mut config = GatewayConfig::default();
            apply_env_overrides(&mut config);
            config
        }
    };

    logging::init_logging(&config.observability)?;
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "geo-gateway starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let gateway = GeoGateway::new(config)?;
    if cli.offline {
        gateway.gate().set_online(false);
    }

    match cli.command {
        Commands::Geocode { query, near } => {
            let bias = near.map(LocationBias::near);
            print_json(&gateway.geocode(&query, bias.as_ref()).await?)?;
        }
        Commands::Reverse { coordinate } => {
            print_json(&gateway.reverse_geocode(coordinate).await?)?;
        }
        Commands::Route {
            from,
            to,
            via,
            optimize,
        } => {
            let mut waypoints = vec![from];
            waypoints.extend(via);
            waypoints.push(to);
            let request = RouteRequest {
                waypoints,
                optimize_waypoints: optimize,
            };
            print_json(&gateway.route(&request).await?)?;
        }
        Commands::Tile { z, x, y, output } => {
            let tile = TileCoord::new(z, x, y);
            let data = gateway.tile(tile).await?;
            if let Some(path) = &output {
                std::fs::write(path, data.as_bytes())?;
            }
            print_json(&TileOutput {
                tile: tile.to_string(),
                bytes: data.len(),
                output,
            })?;
        }
        Commands::Fare {
            from,
            to,
            km,
            minutes,
        } => match (from, to, km, minutes) {
            (Some(from), Some(to), _, _) => print_json(&gateway.plan_trip(from, to).await?)?,
            (_, _, Some(km), Some(minutes)) => {
                let route = Route {
                    distance_m: km * 1000.0,
                    duration_s: minutes * 60.0,
                    polyline: None,
                    geometry: Vec::new(),
                    steps: Vec::new(),
                    provider: "cli".to_string(),
                    source: RouteSource::Estimated,
                };
                print_json(&gateway.estimate_fare(&route).await)?;
            }
            _ => return Err("fare needs FROM and TO, or --km and --minutes".into()),
        },
        Commands::Probe => {
            let online = gateway.check_connectivity().await;
            print_json(&serde_json::json!({ "online": online }))?;
        }
        Commands::Stats => {
            print_json(&serde_json::json!({
                "cache": gateway.cache_stats(),
                "analytics": gateway.analytics_summary(),
                "health": gateway.health_report(),
            }))?;
        }
        Commands::ClearCache { expired } => {
            if expired {
                let removed = gateway.clear_expired();
                print_json(&serde_json::json!({ "removed": removed }))?;
            } else {
                gateway.clear_cache();
                print_json(&gateway.cache_stats())?;
            }
        }
        Commands::Monitor => {
            let shutdown = Shutdown::new();
            let handles = gateway.spawn_background_tasks(&shutdown);
            tracing::info!("Monitoring connectivity and cache, press Ctrl-C to stop");

            shutdown_signal().await;
            shutdown.trigger();
            for handle in handles {
                if let Err(e) = handle.await {
                    tracing::error!(error = %e, "Background task failed");
                }
            }
            print_json(&gateway.cache_stats())?;
            tracing::info!("Shutdown complete");
        }
    }

    Ok(())
}
