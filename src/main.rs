//! Volumetric recording inspector

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use color_eyre::{eyre::bail, eyre::WrapErr, Result};
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use kvid::{Config, VolumetricVideo};

const USAGE: &str = "usage: kvid <file> [merge <output>]";

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kvid=info"));
    let fmt = tracing_subscriber::fmt::layer().with_timer(tracing_subscriber::fmt::time::uptime());
    let registry = tracing_subscriber::registry().with(filter).with(fmt);

    #[cfg(feature = "profiling")]
    let registry = registry.with(tracing_tracy::TracyLayer::default());

    registry.init();
}

fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let config_path = env::var_os("KVID_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("kvid.toml"));
    let config = Config::load(Some(&config_path)).wrap_err("Failed to load configuration")?;
    kvid::CONFIG.store(Arc::new(config.clone()));

    let args: Vec<String> = env::args().skip(1).collect();
    let input = match args.first() {
        Some(input) => Path::new(input),
        None => bail!(USAGE),
    };

    let mut video = VolumetricVideo::new(Arc::new(config.codecs()));
    let start = Instant::now();
    video
        .load_mapped(input)
        .wrap_err_with(|| format!("Failed to load {}", input.display()))?;
    info!(
        devices = video.nb_devices(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Loaded {}",
        input.display()
    );

    match args.get(1).map(String::as_str) {
        None => describe(&video),
        Some("merge") => {
            let Some(output) = args.get(2) else {
                bail!(USAGE)
            };
            video.merge_all_devices(&config.fusion, config.codec.cloud_compression)?;
            video
                .save(output)
                .wrap_err_with(|| format!("Failed to save {output}"))?;
            info!("Saved merged video to {output}");
            Ok(())
        }
        Some(other) => bail!("unknown command `{other}`\n{USAGE}"),
    }
}

fn describe(video: &VolumetricVideo) -> Result<()> {
    println!(
        "{} device(s), {} frame(s), {} ms",
        video.nb_devices(),
        video.count_frames_from_all_devices(),
        video.duration_ms()
    );

    for (id, device) in video.devices().iter().enumerate() {
        let mode = device
            .common_mode()
            .map(|m| m.map_or("none".to_string(), |m| format!("{m:?} ({})", m.info())))
            .unwrap_or_else(|_| "mixed".to_string());
        println!(
            "device {id}: {} frame(s), {} ms, mode {mode}",
            device.len(),
            device.duration_ms()
        );

        let Ok(first) = device.first() else {
            continue;
        };
        for (key, value) in first.image_buffers() {
            println!(
                "  image  {key:?} {}x{} {:?} {} bytes",
                value.width,
                value.height,
                value.compression,
                value.payload.len()
            );
        }
        for (key, value) in first.volume_buffers() {
            println!(
                "  volume {key:?} {:?} {} bytes, {} vertices",
                value.compression,
                value.payload.len(),
                first.valid_vertex_count
            );
        }
        for (key, value) in first.data_buffers() {
            println!("  data   {key:?} {:?} {} bytes", value.compression, value.payload.len());
        }
        for (key, value) in first.infos() {
            println!("  info   {key:?} = {value}");
        }
    }
    Ok(())
}
