//! Configuration module - environment variable parsing

use std::env;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Seed for the deterministic world rng
    pub world_seed: u64,
    /// Terrain grid resolution (posts per side)
    pub terrain_size: usize,
    /// World-space spacing between terrain posts
    pub terrain_cell_size: f32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            world_seed: parse_or("WORLD_SEED", 0)?,
            terrain_size: parse_or("TERRAIN_SIZE", 32)?,
            terrain_cell_size: parse_or("TERRAIN_CELL_SIZE", 64.0)?,
        })
    }
}

fn parse_or<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
