//! Meshforge headless driver
//!
//! Runs a scripted editing session against the in-memory render surface and
//! prints the resulting scene document.
//!
//! Usage: `meshforge [OUTPUT.json] [--config CONFIG.json]`

use meshforge::config::EditorConfig;
use std::path::PathBuf;
use std::process::ExitCode;

fn load_config(path: Option<PathBuf>) -> EditorConfig {
    let Some(path) = path else {
        return EditorConfig::default();
    };
    match std::fs::read_to_string(&path)
        .map_err(|err| err.to_string())
        .and_then(|json| EditorConfig::from_json_str(&json).map_err(|err| err.to_string()))
    {
        Ok(config) => {
            log::info!("Loaded config from {}", path.display());
            config
        }
        Err(err) => {
            log::warn!("Ignoring config {}: {}", path.display(), err);
            EditorConfig::default()
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut output = None;
    let mut config_path = None;
    let mut args = std::env::args_os().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            config_path = args.next().map(PathBuf::from);
        } else {
            output = Some(PathBuf::from(arg));
        }
    }

    log::info!("Meshforge - headless scene session");
    let config = load_config(config_path);
    match meshforge::app::run(config, output.as_deref()) {
        Ok(document) => {
            log::info!("Scene '{}' done ({} meshes)", document.name, document.meshes.len());
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!("Session failed: {}", err);
            ExitCode::FAILURE
        }
    }
}
