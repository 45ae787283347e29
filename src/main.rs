mod core;
mod gui;
mod hotkeys;
mod protocol;
mod video;

#[cfg(test)]
mod test_utils;

use eframe::egui;
use std::path::PathBuf;
use std::sync::Arc;
use crate::core::PlayerConfig;
use gui::SyncwatchApp;
use video::FfmpegEngine;

const HELP: &str = "\
syncwatch-player

USAGE:
  syncwatch-player [--config <path>] [SOURCE]

Control lines are read from stdin; requests to the controller are written to stdout.

OPTIONS:
  --config <path>   Use this settings file instead of the default one
  -h, --help        Print help
";

struct Args {
    config_path: Option<PathBuf>,
    source: Option<String>,
}

fn parse_args() -> anyhow::Result<Option<Args>> {
    let mut pargs = pico_args::Arguments::from_env();
    if pargs.contains(["-h", "--help"]) {
        print!("{}", HELP);
        return Ok(None);
    }

    let args = Args {
        config_path: pargs.opt_value_from_str("--config")?,
        source: pargs.opt_free_from_str()?,
    };

    let remaining = pargs.finish();
    if !remaining.is_empty() {
        log::warn!("Ignoring unused arguments: {:?}", remaining);
    }
    Ok(Some(args))
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Some(args) = parse_args()? else {
        return Ok(());
    };

    let config = match &args.config_path {
        Some(path) => PlayerConfig::load_from(path)?,
        None => PlayerConfig::load()?,
    };

    let engine = match FfmpegEngine::new(config.engine.clone()) {
        Ok(engine) => Arc::new(engine),
        Err(e) => {
            log::error!("Failed to start media engine: {}", e);
            std::process::exit(1);
        }
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([config.window.width, config.window.height])
            .with_fullscreen(config.window.start_fullscreen)
            .with_title("Syncwatch"),
        ..Default::default()
    };

    eframe::run_native(
        "Syncwatch",
        options,
        Box::new(move |cc| {
            match SyncwatchApp::new(cc, config, engine, args.source) {
                Ok(app) => Ok(Box::new(app)),
                Err(e) => {
                    log::error!("Failed to initialize player: {:#}", e);
                    std::process::exit(1);
                }
            }
        }),
    ).map_err(|e| anyhow::anyhow!("Failed to run player: {}", e))?;

    Ok(())
}
