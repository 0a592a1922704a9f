use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::classifier::KnnParams;

pub static CONFIG_PATH: Lazy<&'static Path> = Lazy::new(|| {
    Path::new(option_env!("FACEVAL_CONFIG_PATH").unwrap_or("faceval.toml"))
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub k: usize,
    pub threshold: f32,
    pub batch_size: usize,
    pub model: PathBuf,
    pub print_dist: bool,
}

impl Default for Config {
    fn default() -> Self {
        let knn = KnnParams::default();
        Self {
            k: knn.k,
            threshold: knn.threshold,
            batch_size: 32,
            model: PathBuf::from(faceval_vision::model::DEFAULT_RECOGNITION_MODEL),
            print_dist: false,
        }
    }
}

impl Config {
    pub fn knn_params(&self) -> KnnParams {
        KnnParams::new(self.k, self.threshold).with_print_dist(self.print_dist)
    }
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = path.unwrap_or(&CONFIG_PATH);
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config at {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
}

pub fn save_config(cfg: &Config, path: Option<&Path>) -> Result<()> {
    let path = path.unwrap_or(&CONFIG_PATH);
    let data = toml::to_string_pretty(cfg)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, data)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let cfg: Config = toml::from_str("k = 3\nthreshold = 1.25\n").unwrap();
        assert_eq!(cfg.k, 3);
        assert_eq!(cfg.threshold, 1.25);
        assert_eq!(cfg.batch_size, 32);
        assert!(!cfg.print_dist);
    }

    #[test]
    fn test_missing_file_is_default() {
        let cfg = load_config(Some(Path::new("/nonexistent/faceval.toml"))).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.knn_params(), KnnParams::default());
    }

    #[test]
    fn test_save_then_load() {
        let path = std::env::temp_dir().join(format!("faceval-{}.toml", uuid::Uuid::new_v4()));
        let cfg = Config {
            k: 1,
            threshold: 0.25,
            print_dist: true,
            ..Config::default()
        };
        save_config(&cfg, Some(&path)).unwrap();
        assert_eq!(load_config(Some(&path)).unwrap(), cfg);
        std::fs::remove_file(&path).ok();
    }
}
