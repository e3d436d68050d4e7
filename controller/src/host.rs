use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::Context;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    net::TcpListener,
};
use tracing::{debug, info, warn};

use heatnode_common::{
    pipeline, serial, ButtonPress, CommandProcessor, ControlStore, IndicatorPattern, NodeConfig,
};

use crate::plant::SimulatedPlant;

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config_path = data_dir().join("node.json");
    let mut config = NodeConfig::load(&config_path).unwrap_or_else(|err| {
        warn!("failed to load {}: {err:#}", config_path.display());
        NodeConfig::default()
    });
    if let Ok(addr) = std::env::var("HEATNODE_SERIAL_ADDR") {
        config.serial.listen_addr = addr;
    }

    let store = Arc::new(ControlStore::new(&config.initial));
    let plant = SimulatedPlant::new(config.plant.clone(), config.initial.current_temp_c as f32);

    let pipeline = pipeline::spawn(
        store.clone(),
        plant.sensor(),
        plant.heater(),
        config.sample_period(),
        config.pid_dt_s(),
    );
    spawn_indicator_loop(
        store.clone(),
        Duration::from_millis(config.indicator_period_ms),
    );
    spawn_status_loop(
        store.clone(),
        plant.clone(),
        Duration::from_millis(config.status_period_ms),
    );
    spawn_button_loop(store.clone(), config.clone());

    let addr: SocketAddr = config
        .serial
        .listen_addr
        .parse()
        .with_context(|| format!("invalid serial listen address {}", config.serial.listen_addr))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind serial link at {addr}"))?;
    info!("serial link listening on {addr}");

    let processor = CommandProcessor::new(store, config.limits);
    tokio::select! {
        result = accept_loop(listener, processor, config.serial.rx_capacity) => result?,
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for shutdown signal")?;
            info!("shutting down");
        }
    }

    pipeline.abort();
    Ok(())
}

fn data_dir() -> PathBuf {
    std::env::var_os("HEATNODE_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| Path::new(".heatnode").to_path_buf())
}

async fn accept_loop(
    listener: TcpListener,
    processor: CommandProcessor,
    rx_capacity: usize,
) -> anyhow::Result<()> {
    loop {
        let (stream, peer) = listener
            .accept()
            .await
            .context("serial link accept failed")?;
        info!("serial peer connected: {peer}");

        let processor = processor.clone();
        tokio::spawn(async move {
            match serial::serve(stream, &processor, rx_capacity).await {
                Ok(()) => info!("serial peer disconnected: {peer}"),
                Err(err) => warn!("serial link to {peer} failed: {err}"),
            }
        });
    }
}

fn spawn_indicator_loop(store: Arc<ControlStore>, period: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        let mut shown: Option<IndicatorPattern> = None;
        loop {
            interval.tick().await;
            let pattern = IndicatorPattern::read(&store);
            if shown != Some(pattern) {
                info!(
                    "leds: power={} at_temp={} below={} above={}",
                    pattern.power, pattern.at_temp, pattern.below, pattern.above
                );
                shown = Some(pattern);
            }
        }
    });
}

fn spawn_status_loop(store: Arc<ControlStore>, plant: SimulatedPlant, period: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            match serde_json::to_string(&store.snapshot()) {
                Ok(status) => info!("status {status}"),
                Err(err) => warn!("failed to serialize status: {err}"),
            }
            debug!("plant temperature {:.2} C", plant.temperature());
        }
    });
}

fn spawn_button_loop(store: Arc<ControlStore>, config: NodeConfig) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    debug!("stdin closed, buttons disabled");
                    return;
                }
                Err(err) => {
                    warn!("stdin read failed: {err}");
                    return;
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            let Some(button) = ButtonPress::parse(&line) else {
                warn!("unknown button {:?}, expected power, up or down", line.trim());
                continue;
            };
            let limits = config.limits;
            if button.apply(&store, limits.min_desired_c, limits.max_desired_c) {
                info!(
                    "button {button:?}: system {}, desired {} C",
                    if store.system_on() { "on" } else { "off" },
                    store.desired_temp()
                );
            }
        }
    });
}
