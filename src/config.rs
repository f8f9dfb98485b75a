use crate::error::{self, Error};
use crate::threshold::{ForgettingRange, ThresholdParams};
use crate::window::SumMaintenance;
use knuffel::{Decode, DecodeScalar};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Highest sample rate accepted for a single ECG lead, in Hz.
pub const MAX_SAMPLE_RATE: f64 = 100_000.0;

/// What the detector does with a NaN or infinite sample.
#[derive(DecodeScalar, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvalidSamplePolicy {
    /// Return an error and leave all state untouched.
    Skip,
    /// Substitute the last valid sample.
    HoldLast,
}

#[derive(DecodeScalar, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Maintenance {
    Incremental,
    Recompute,
    Compensated,
}

/// Runtime parameters of a [`QrsDetector`](crate::detector::QrsDetector).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    pub high_pass_window: usize,
    pub energy_window: usize,
    pub warmup_len: usize,
    pub adaptation_window: usize,
    pub refractory_len: usize,
    pub gamma: f64,
    pub alpha_min: f64,
    pub alpha_max: f64,
    pub sum_maintenance: SumMaintenance,
    pub invalid_samples: InvalidSamplePolicy,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            high_pass_window: 5,
            energy_window: 30,
            warmup_len: 200,
            adaptation_window: 200,
            refractory_len: 100,
            gamma: 0.175,
            alpha_min: 0.01,
            alpha_max: 0.1,
            sum_maintenance: SumMaintenance::default(),
            invalid_samples: InvalidSamplePolicy::Skip,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> error::Result<()> {
        let lengths = [
            ("high-pass window", self.high_pass_window),
            ("energy window", self.energy_window),
            ("warm-up length", self.warmup_len),
            ("adaptation window", self.adaptation_window),
            ("refractory length", self.refractory_len),
        ];
        for (name, value) in lengths {
            if value == 0 {
                return Err(Error::config(format!("{} must be positive", name)));
            }
        }
        if !self.gamma.is_finite() || self.gamma <= 0.0 {
            return Err(Error::config(format!("gamma must be positive, got {}", self.gamma)));
        }
        if !self.alpha_min.is_finite() || !self.alpha_max.is_finite() {
            return Err(Error::config("forgetting factor bounds must be finite"));
        }
        if self.alpha_min < 0.0 || self.alpha_max > 1.0 {
            return Err(Error::config(format!(
                "forgetting factor bounds [{}, {}] must lie within [0, 1]",
                self.alpha_min, self.alpha_max
            )));
        }
        if self.alpha_min >= self.alpha_max {
            return Err(Error::config(format!(
                "forgetting factor lower bound {} must be below upper bound {}",
                self.alpha_min, self.alpha_max
            )));
        }
        if let SumMaintenance::Recompute { interval: 0 } = self.sum_maintenance {
            return Err(Error::config("recompute interval must be positive"));
        }
        Ok(())
    }

    pub fn threshold_params(&self) -> ThresholdParams {
        ThresholdParams {
            warmup_len: self.warmup_len,
            adaptation_window: self.adaptation_window,
            refractory_len: self.refractory_len,
            gamma: self.gamma,
            alpha: ForgettingRange {
                min: self.alpha_min,
                max: self.alpha_max,
            },
        }
    }
}

/// Everything a run needs once the config file and CLI overrides are merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub detector: DetectorConfig,
    pub sample_rate: f64,
    pub bpm_window: usize,
    pub seed: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            detector: DetectorConfig::default(),
            sample_rate: 200.0,
            bpm_window: 5,
            seed: None,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> error::Result<()> {
        self.detector.validate()?;
        if !(self.sample_rate > 0.0 && self.sample_rate <= MAX_SAMPLE_RATE) {
            return Err(Error::config(format!(
                "sample rate must be in (0, {}] Hz, got {}",
                MAX_SAMPLE_RATE, self.sample_rate
            )));
        }
        if self.bpm_window == 0 {
            return Err(Error::config("bpm window must be positive"));
        }
        Ok(())
    }
}

#[derive(Decode, Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[knuffel(child)]
    pub detector: Option<DetectorNode>,
    #[knuffel(child)]
    pub adaptation: Option<AdaptationNode>,
    #[knuffel(child)]
    pub sums: Option<SumsNode>,
    #[knuffel(child)]
    pub sampling: Option<SamplingNode>,
    #[knuffel(child)]
    pub bpm: Option<BpmNode>,
}

#[derive(Decode, Debug, Clone, Serialize, Deserialize)]
pub struct DetectorNode {
    #[knuffel(property)]
    pub high_pass_window: Option<usize>,
    #[knuffel(property)]
    pub energy_window: Option<usize>,
    #[knuffel(property)]
    pub warmup: Option<usize>,
    #[knuffel(property)]
    pub adaptation_window: Option<usize>,
    #[knuffel(property)]
    pub refractory: Option<usize>,
}

#[derive(Decode, Debug, Clone, Serialize, Deserialize)]
pub struct AdaptationNode {
    #[knuffel(property)]
    pub gamma: Option<f64>,
    #[knuffel(property)]
    pub alpha_min: Option<f64>,
    #[knuffel(property)]
    pub alpha_max: Option<f64>,
    #[knuffel(property)]
    pub seed: Option<u64>,
}

#[derive(Decode, Debug, Clone, Serialize, Deserialize)]
pub struct SumsNode {
    #[knuffel(property)]
    pub maintenance: Option<Maintenance>,
    #[knuffel(property)]
    pub interval: Option<usize>,
}

#[derive(Decode, Debug, Clone, Serialize, Deserialize)]
pub struct SamplingNode {
    #[knuffel(property)]
    pub rate: Option<f64>,
    #[knuffel(property)]
    pub invalid: Option<InvalidSamplePolicy>,
}

#[derive(Decode, Debug, Clone, Serialize, Deserialize)]
pub struct BpmNode {
    #[knuffel(property)]
    pub window: Option<usize>,
}

impl ConfigFile {
    pub fn load<P: AsRef<Path>>(path: P) -> error::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Self::parse(&path.display().to_string(), &content)
    }

    pub fn parse(name: &str, content: &str) -> error::Result<Self> {
        knuffel::parse(name, content).map_err(|e| Error::config(e.to_string()))
    }

    /// Overlays this file on the built-in defaults and validates the result.
    pub fn resolve(&self) -> error::Result<Settings> {
        let mut settings = Settings::default();
        let det = &mut settings.detector;

        if let Some(node) = &self.detector {
            det.high_pass_window = node.high_pass_window.unwrap_or(det.high_pass_window);
            det.energy_window = node.energy_window.unwrap_or(det.energy_window);
            det.warmup_len = node.warmup.unwrap_or(det.warmup_len);
            det.adaptation_window = node.adaptation_window.unwrap_or(det.adaptation_window);
            det.refractory_len = node.refractory.unwrap_or(det.refractory_len);
        }
        if let Some(node) = &self.adaptation {
            det.gamma = node.gamma.unwrap_or(det.gamma);
            det.alpha_min = node.alpha_min.unwrap_or(det.alpha_min);
            det.alpha_max = node.alpha_max.unwrap_or(det.alpha_max);
            settings.seed = node.seed;
        }
        if let Some(node) = &self.sums {
            let interval = match det.sum_maintenance {
                SumMaintenance::Recompute { interval } => interval,
                _ => 4096,
            };
            let interval = node.interval.unwrap_or(interval);
            det.sum_maintenance = match node.maintenance {
                Some(Maintenance::Incremental) => SumMaintenance::Incremental,
                Some(Maintenance::Compensated) => SumMaintenance::Compensated,
                Some(Maintenance::Recompute) | None => SumMaintenance::Recompute { interval },
            };
        }
        if let Some(node) = &self.sampling {
            settings.sample_rate = node.rate.unwrap_or(settings.sample_rate);
            det.invalid_samples = node.invalid.unwrap_or(det.invalid_samples);
        }
        if let Some(node) = &self.bpm {
            settings.bpm_window = node.window.unwrap_or(settings.bpm_window);
        }

        settings.validate()?;
        Ok(settings)
    }
}
