// main.rs

mod blynk;
mod config;
#[cfg(feature = "testing")]
mod dummy_node;
mod forwarder;
mod publisher;
mod serial_link;
mod telemetry_decode;

use crate::blynk::BlynkClient;
use crate::config::BridgeConfig;
use crate::forwarder::{Forwarder, get_system_timestamp_ms};
use crate::serial_link::{LineSource, SerialLink};
use anyhow::Context;
use std::io;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn main() -> anyhow::Result<()> {
    let cfg = BridgeConfig::from_env()?;

    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Sensor node ---
    let opened = SerialLink::open(&cfg.serial_port, cfg.serial_baud, cfg.serial_timeout);
    let lines: LineSource = match opened {
        Ok(link) => {
            // ESP32 may reset when serial opens
            std::thread::sleep(cfg.serial_settle);
            Box::new(link.lines())
        }
        Err(e) => {
            #[cfg(feature = "testing")]
            {
                tracing::warn!("sensor node missing, using DummyNode: {e:#}");
                Box::new(dummy_node::DummyNode::new(cfg.serial_timeout))
            }
            #[cfg(not(feature = "testing"))]
            return Err(e);
        }
    };
    println!("Listening on {} @ {}...\n", cfg.serial_port, cfg.serial_baud);

    // --- Dashboard ---
    let sink = BlynkClient::new(&cfg.batch_url(), &cfg.blynk_token, cfg.http_timeout)?;
    tracing::info!(
        "pushing to {} every {} ms",
        cfg.blynk_server,
        cfg.push_interval.as_millis()
    );

    let mut forwarder = Forwarder::new(sink, get_system_timestamp_ms, cfg.push_interval);
    forwarder
        .run(lines, &mut io::stdout())
        .context("telemetry forwarding stopped")?;

    tracing::info!("serial stream closed");
    Ok(())
}
