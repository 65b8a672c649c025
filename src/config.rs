// src/config.rs
use crate::fabric::DEFAULT_FIFO_DEPTH;
use serde::Deserialize;
use std::{fs, path::Path};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: General,
    #[serde(default)]
    pub fabric: Fabric,
    #[serde(default)]
    pub book: Book,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct General {
    #[serde(default)]
    pub json_logs: bool, // structured JSON logs to stdout
}

#[derive(Debug, Clone, Deserialize)]
pub struct Fabric {
    #[serde(default = "default_fifo_depth")]
    pub max_depth_bytes: usize, // e.g., 4096
}

#[derive(Debug, Clone, Deserialize)]
pub struct Book {
    #[serde(default = "default_depth_levels")]
    pub depth_levels: usize, // reporting depth for logs
}

fn default_fifo_depth() -> usize {
    DEFAULT_FIFO_DEPTH
}

fn default_depth_levels() -> usize {
    5
}

impl Default for Fabric {
    fn default() -> Self {
        Self {
            max_depth_bytes: default_fifo_depth(),
        }
    }
}

impl Default for Book {
    fn default() -> Self {
        Self {
            depth_levels: default_depth_levels(),
        }
    }
}

impl AppConfig {
    pub fn from_file(p: &Path) -> anyhow::Result<Self> {
        let s = fs::read_to_string(p)?;
        let cfg: AppConfig = toml::from_str(&s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.fabric.max_depth_bytes == 0 {
            anyhow::bail!("fabric.max_depth_bytes must be > 0");
        }
        if self.book.depth_levels == 0 {
            anyhow::bail!("book.depth_levels must be > 0");
        }
        Ok(())
    }
}
