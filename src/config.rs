use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::{fs, net::SocketAddr, path::Path, time::Duration};

/// How the confidence attached to an ETA is produced.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ConfidenceModel {
    /// Constant confidence, regardless of the vehicle's history.
    Fixed { value: f64 },
    /// `1 / (1 + stddev(delays))`; 0.5 until two delay samples exist.
    DelayDispersion,
}

impl Default for ConfidenceModel {
    fn default() -> Self {
        ConfidenceModel::Fixed { value: 0.85 }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Speed assumed for a vehicle with no recorded history (km/h).
    pub default_speed_kmh: f64,
    /// Floor applied to a tracked average speed before dividing by it (km/h).
    pub min_speed_kmh: f64,
    /// Number of delay observations kept per vehicle.
    pub delay_window: usize,
    /// Upper bound on the number of tracked vehicles.
    pub max_vehicles: usize,
    /// Histories not observed for this many seconds are dropped. `None` keeps them forever.
    pub stale_after_secs: Option<u64>,
    pub confidence: ConfidenceModel,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            default_speed_kmh: 25.0,
            min_speed_kmh: 1.0,
            delay_window: 10,
            max_vehicles: 10_000,
            stale_after_secs: Some(3600),
            confidence: ConfidenceModel::default(),
        }
    }
}

impl EstimatorConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        Self::from_json(&data).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_json(data: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(data).context("failed to parse config JSON")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn stale_after(&self) -> Option<Duration> {
        self.stale_after_secs.map(Duration::from_secs)
    }

    fn validate(&self) -> Result<()> {
        if !(self.default_speed_kmh.is_finite() && self.default_speed_kmh > 0.0) {
            bail!("default_speed_kmh must be positive, got {}", self.default_speed_kmh);
        }
        if !(self.min_speed_kmh.is_finite() && self.min_speed_kmh > 0.0) {
            bail!("min_speed_kmh must be positive, got {}", self.min_speed_kmh);
        }
        if self.delay_window == 0 {
            bail!("delay_window must be at least 1");
        }
        if self.max_vehicles == 0 {
            bail!("max_vehicles must be at least 1");
        }
        if let ConfidenceModel::Fixed { value } = self.confidence {
            if !(0.0..=1.0).contains(&value) {
                bail!("fixed confidence must be within 0..=1, got {}", value);
            }
        }
        Ok(())
    }
}

/// Process-level settings read from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub estimator: EstimatorConfig,
}

impl ServerConfig {
    /// Reads `BIND_ADDR`, `PORT` and the optional `ETA_CONFIG` file.
    pub fn from_env() -> Result<Self> {
        let host = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8080);
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", host, port))?;

        let estimator = match std::env::var("ETA_CONFIG") {
            Ok(path) => EstimatorConfig::load(Path::new(&path))?,
            Err(_) => EstimatorConfig::default(),
        };

        Ok(Self { addr, estimator })
    }
}
