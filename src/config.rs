use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub render: RenderConfig,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub bpm: Option<f64>,
    #[serde(default = "default_samples_per_beat")]
    pub samples_per_beat: u32,
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default = "default_low_mid")]
    pub low_mid_hz: f64,
    #[serde(default = "default_mid_high")]
    pub mid_high_hz: f64,
    #[serde(default)]
    pub channel: usize,
}

#[derive(Debug, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_colormap")]
    pub colormap: String,
    #[serde(default)]
    pub output: Option<PathBuf>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            bpm: None,
            samples_per_beat: default_samples_per_beat(),
            window_size: default_window_size(),
            mode: default_mode(),
            low_mid_hz: default_low_mid(),
            mid_high_hz: default_mid_high(),
            channel: 0,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            colormap: default_colormap(),
            output: None,
        }
    }
}

fn default_samples_per_beat() -> u32 { 64 }
fn default_window_size() -> usize { 1024 }
fn default_mode() -> String { "mono".into() }
fn default_low_mid() -> f64 { 250.0 }
fn default_mid_high() -> f64 { 4000.0 }
fn default_colormap() -> String { "magma".into() }

/// Explicit path, else `mortonbeat.toml` in the working directory, else the
/// user config directory.
pub fn find_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from("mortonbeat.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("mortonbeat").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("mortonbeat").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Failed to parse config: {}", path.display()))
}

fn parse_config(content: &str) -> Result<Config> {
    Ok(toml::from_str(content)?)
}
