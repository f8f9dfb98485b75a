use log::{debug, trace};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Below any evaluation point a real signal can produce.
const WINDOW_MAX_SENTINEL: f64 = f64::NEG_INFINITY;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectorState {
    Idle,
    Refractory,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForgettingRange {
    pub min: f64,
    pub max: f64,
}

impl ForgettingRange {
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        rng.gen_range(self.min..=self.max)
    }
}

impl Default for ForgettingRange {
    fn default() -> Self {
        Self { min: 0.01, max: 0.1 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdParams {
    pub warmup_len: usize,
    pub adaptation_window: usize,
    pub refractory_len: usize,
    pub gamma: f64,
    pub alpha: ForgettingRange,
}

#[derive(Debug, Clone)]
pub struct AdaptiveThreshold {
    params: ThresholdParams,
    threshold: f64,
    window_max: f64,
    window_pos: usize,
    seen: usize,
    state: DetectorState,
    elapsed: usize,
    last_alpha: Option<f64>,
}

impl AdaptiveThreshold {
    pub fn new(params: ThresholdParams) -> Self {
        Self {
            params,
            threshold: 0.0,
            window_max: WINDOW_MAX_SENTINEL,
            window_pos: 0,
            seen: 0,
            state: DetectorState::Idle,
            elapsed: 0,
            last_alpha: None,
        }
    }

    /// Runs one tick of the state machine. Returns `true` when `eval` marks a new beat.
    pub fn evaluate<R: Rng + ?Sized>(&mut self, eval: f64, rng: &mut R) -> bool {
        if self.seen < self.params.warmup_len {
            if eval > self.threshold {
                self.threshold = eval;
            }
            self.seen += 1;
        }

        if self.state == DetectorState::Refractory {
            self.elapsed += 1;
            if self.elapsed >= self.params.refractory_len {
                trace!("hold-off expired");
                self.state = DetectorState::Idle;
                self.elapsed = 0;
            }
        }

        if eval > self.window_max {
            self.window_max = eval;
        }

        if eval > self.threshold && self.state == DetectorState::Idle {
            self.state = DetectorState::Refractory;
            self.elapsed = 0;
            return true;
        }

        self.window_pos += 1;
        if self.window_pos >= self.params.adaptation_window {
            self.adapt(rng);
        }
        false
    }

    fn adapt<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let alpha = self.params.alpha.sample(rng);
        let previous = self.threshold;
        self.threshold =
            alpha * self.params.gamma * self.window_max + (1.0 - alpha) * self.threshold;
        debug!(
            "threshold {:.3} -> {:.3} (window max {:.3}, alpha {:.4})",
            previous, self.threshold, self.window_max, alpha
        );
        self.last_alpha = Some(alpha);
        self.window_pos = 0;
        self.window_max = WINDOW_MAX_SENTINEL;
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    pub fn last_alpha(&self) -> Option<f64> {
        self.last_alpha
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.params);
    }
}
