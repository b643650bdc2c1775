//! Tunables for the pixelator and the upload channel.

use serde::{Deserialize, Serialize};

/// Pipeline tunables that are not part of the user-facing parameter set
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PixelatorConfig {
    /// Seed for the disperser noise; identical seeds give identical output
    pub dither_seed: u64,
    /// K-Means iterations for palette refinement
    pub kmeans_iterations: usize,
    /// Number of rows and of columns sampled by the grid detector
    pub grid_scan_lines: usize,
    /// Maximum per-channel difference still counted as the same run
    pub grid_tolerance: u8,
}

impl Default for PixelatorConfig {
    fn default() -> Self {
        Self {
            dither_seed: 0x5eed,
            kmeans_iterations: 6,
            grid_scan_lines: 32,
            grid_tolerance: 8,
        }
    }
}

/// Upload channel settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Maximum payload bytes carried by a single upload message
    pub max_chunk_size: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self { max_chunk_size: 30_000 }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pixelator: PixelatorConfig,
    pub transfer: TransferConfig,
}

impl Config {
    /// Parse a JSON config; missing fields keep their defaults.
    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = Config::from_json_str(r#"{ "transfer": { "max_chunk_size": 1024 } }"#).unwrap();
        assert_eq!(config.transfer.max_chunk_size, 1024);
        assert_eq!(config.pixelator, PixelatorConfig::default());
    }

    #[test]
    fn test_empty_json() {
        assert_eq!(Config::from_json_str("{}").unwrap(), Config::default());
    }
}
