//! # PWS Bridge Entry Point
//!
//! Loads configuration, wires the Signal K bus and the PWSWeather client
//! into a bridge instance, and runs it until Ctrl-C.

use anyhow::Context;
use log::info;
use pws_bridge::bridge::Bridge;
use pws_bridge::bus::SignalKBus;
use pws_bridge::config::Config;
use pws_bridge::pws::PwsClient;
use std::env;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Optional config path argument, defaulting to ./pws-bridge.toml
    let config = match env::args().nth(1) {
        Some(path) => Config::load_from_path(&path)
            .with_context(|| format!("loading configuration from {path}"))?,
        None => Config::load().context("loading configuration from pws-bridge.toml")?,
    };
    info!(
        "starting bridge for station {} against {}",
        config.station.id, config.host.url
    );

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let http = reqwest::Client::new();
        let bus = SignalKBus::new(http.clone(), &config.host.url);
        let bridge = Bridge::new(config.station, bus, PwsClient::new(http));

        tokio::select! {
            _ = bridge.run() => {}
            result = tokio::signal::ctrl_c() => {
                result.context("waiting for shutdown signal")?;
                info!("bridge stopped");
            }
        }
        anyhow::Ok(())
    })?;

    Ok(())
}
