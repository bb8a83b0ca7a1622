//! Runtime configuration, loaded from a TOML file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub motion: MotionConfig,
    #[serde(default)]
    pub cube: CubeConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// WebSocket endpoint, e.g. `wss://cursordanceparty.com`.
    pub uri: String,
    /// HTTP origin used for the polling handshake and the Origin header.
    pub origin: String,
    /// Optional peer id whose cursor drives the projection center.
    #[serde(default)]
    pub center: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MotionConfig {
    /// Motion model name, or "cube" for the hypercube swarm.
    #[serde(default = "default_model")]
    pub model: String,
    /// Animation tick rate in frames per second.
    #[serde(default = "default_fps")]
    pub fps: f64,
    /// Number of bots when running a motion model (the cube swarm sizes
    /// itself from the geometry).
    #[serde(default = "default_bots")]
    pub bots: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CubeConfig {
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
    /// Points per edge; `resolution - 2` interpolated bots on each edge.
    #[serde(default = "default_resolution")]
    pub resolution: usize,
    #[serde(default = "default_size")]
    pub size: f64,
    /// Degrees added to every rotation plane per tick.
    #[serde(default = "default_speed")]
    pub speed: f64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            fps: default_fps(),
            bots: default_bots(),
        }
    }
}

impl Default for CubeConfig {
    fn default() -> Self {
        Self {
            dimensions: default_dimensions(),
            resolution: default_resolution(),
            size: default_size(),
            speed: default_speed(),
        }
    }
}

fn default_model() -> String {
    "cube".to_string()
}

fn default_fps() -> f64 {
    10.0
}

fn default_bots() -> usize {
    1
}

fn default_dimensions() -> usize {
    3
}

fn default_resolution() -> usize {
    2
}

fn default_size() -> f64 {
    0.1
}

fn default_speed() -> f64 {
    1.5
}

impl Config {
    /// Loads configuration from a TOML file at the given path.
    pub fn load_from_file(path: &str) -> Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("read config file {path}"))?;
        let config: Config = toml::from_str(&content).context("parse config")?;
        Ok(config)
    }
}
