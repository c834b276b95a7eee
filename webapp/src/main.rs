use anyhow::*;
use clap::Parser;
use log::{info, warn};
use std::io::{BufRead, Write};
use std::sync::Arc;
use webapp::config::Config;
use webapp::{Reply, Service};

const REFRESH_COMMAND: &str = "refresh-cache";

fn refresh_in_background(service: &Service, config: &Config) -> Reply {
    match service.cache().spawn_refresh(&config.dump) {
        Some(_) => Reply {
            status: 202,
            body: json::json!({ "refresh": "started" }),
        },
        None => Reply {
            status: 409,
            body: json::json!({ "refresh": "already running" }),
        },
    }
}

fn main() -> Result<()> {
    let config = Config::parse();
    env_logger::Builder::new()
        .parse_filters(&config.log_level)
        .init();

    let service = Service::new(Arc::new(cache::CacheHandle::new()));
    if !config.no_preload {
        if let Err(e) = service.cache().refresh(&config.dump) {
            warn!("Starting without a cache: {}", e);
        }
    }
    info!("Serving requests from stdin");

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for line in stdin.lock().lines() {
        let line = line.context("Reading request")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let reply = if line == REFRESH_COMMAND {
            refresh_in_background(&service, &config)
        } else {
            service.handle_line(line)
        };
        json::to_writer(&mut out, &reply)?;
        out.write_all(b"\n")?;
        out.flush()?;
    }
    Ok(())
}
