use crate::config::{DetectorConfig, InvalidSamplePolicy};
use crate::energy::EnergyStage;
use crate::error::{Error, Result};
use crate::highpass::HighPass;
use crate::threshold::{AdaptiveThreshold, DetectorState};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub struct QrsDetector<R = StdRng> {
    config: DetectorConfig,
    high_pass: HighPass,
    energy: EnergyStage,
    threshold: AdaptiveThreshold,
    rng: R,
    last_valid: f64,
    last_evaluation: f64,
    ticks: u64,
}

impl QrsDetector<StdRng> {
    pub fn new(config: DetectorConfig) -> Result<Self> {
        Self::with_rng(config, StdRng::from_entropy())
    }

    pub fn seeded(config: DetectorConfig, seed: u64) -> Result<Self> {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> QrsDetector<R> {
    pub fn with_rng(config: DetectorConfig, rng: R) -> Result<Self> {
        config.validate()?;
        info!(
            "QRS detector: M={} N={} warm-up={} adaptation={} hold-off={} gamma={} alpha=[{}, {}]",
            config.high_pass_window,
            config.energy_window,
            config.warmup_len,
            config.adaptation_window,
            config.refractory_len,
            config.gamma,
            config.alpha_min,
            config.alpha_max
        );
        Ok(Self {
            high_pass: HighPass::new(config.high_pass_window, config.sum_maintenance),
            energy: EnergyStage::new(config.energy_window, config.sum_maintenance),
            threshold: AdaptiveThreshold::new(config.threshold_params()),
            config,
            rng,
            last_valid: 0.0,
            last_evaluation: 0.0,
            ticks: 0,
        })
    }

    /// Returns `true` when this sample completes a new QRS detection.
    pub fn tick(&mut self, sample: f64) -> Result<bool> {
        let sample = if sample.is_finite() {
            sample
        } else {
            match self.config.invalid_samples {
                InvalidSamplePolicy::Skip => return Err(Error::InvalidSample { value: sample }),
                InvalidSamplePolicy::HoldLast => self.last_valid,
            }
        };
        self.last_valid = sample;
        self.ticks += 1;

        // the energy stage only sees real high-pass output, so its own warm-up starts
        // once the high-pass stage is full
        let eval = match self.high_pass.process(sample) {
            Some(hp) => self.energy.process_hp(hp),
            None => 0.0,
        };
        self.last_evaluation = eval;

        let beat = self.threshold.evaluate(eval, &mut self.rng);
        if beat {
            debug!(
                "QRS at tick {} (eval {:.3}, threshold {:.3})",
                self.ticks - 1,
                eval,
                self.threshold.threshold()
            );
        }
        Ok(beat)
    }

    // the rng keeps its stream across resets
    pub fn reset(&mut self) {
        self.high_pass.reset();
        self.energy.reset();
        self.threshold.reset();
        self.last_valid = 0.0;
        self.last_evaluation = 0.0;
        self.ticks = 0;
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn threshold(&self) -> f64 {
        self.threshold.threshold()
    }

    pub fn state(&self) -> DetectorState {
        self.threshold.state()
    }

    pub fn last_alpha(&self) -> Option<f64> {
        self.threshold.last_alpha()
    }

    pub fn last_evaluation(&self) -> f64 {
        self.last_evaluation
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::impulse_train;

    fn run(detector: &mut QrsDetector, samples: &[f64]) -> Vec<usize> {
        samples
            .iter()
            .enumerate()
            .filter_map(|(i, &x)| detector.tick(x).unwrap().then_some(i))
            .collect()
    }

    #[test]
    fn test_silence_never_detects() {
        let mut detector = QrsDetector::seeded(DetectorConfig::default(), 1).unwrap();
        for _ in 0..10_000 {
            assert!(!detector.tick(0.0).unwrap());
        }
        assert_eq!(detector.threshold(), 0.0);
    }

    #[test]
    fn test_evaluation_silent_through_both_warmups() {
        let config = DetectorConfig::default();
        let silent = config.high_pass_window + config.energy_window;
        let mut detector = QrsDetector::seeded(config, 2).unwrap();
        for i in 0..silent {
            detector.tick(1000.0 * ((i * 7) % 13) as f64).unwrap();
            assert_eq!(detector.last_evaluation(), 0.0, "tick {}", i);
        }
        detector.tick(5000.0).unwrap();
        assert!(detector.last_evaluation() > 0.0);
    }

    #[test]
    fn test_periodic_impulses_detected_once_each() {
        let samples = impulse_train(2000, 200, 1000.0);
        for seed in 0..20 {
            let mut detector = QrsDetector::seeded(DetectorConfig::default(), seed).unwrap();
            let beats = run(&mut detector, &samples);

            // the impulse at sample 0 falls inside the filter warm-up
            assert_eq!(beats.len(), 9, "seed {}: {:?}", seed, beats);
            assert!((200..=202).contains(&beats[0]), "seed {}: {:?}", seed, beats);
            for pair in beats.windows(2) {
                let spacing = pair[1] - pair[0];
                assert!((198..=202).contains(&spacing), "seed {}: {:?}", seed, beats);
            }
        }
    }

    #[test]
    fn test_refractory_gap_is_respected() {
        let mut rng = StdRng::seed_from_u64(99);
        let samples: Vec<f64> = (0..20_000)
            .map(|i| {
                let spike = if i % 37 == 0 { 800.0 } else { 0.0 };
                spike + rng.gen_range(-50.0..50.0)
            })
            .collect();
        let mut detector = QrsDetector::seeded(DetectorConfig::default(), 3).unwrap();
        let beats = run(&mut detector, &samples);
        assert!(!beats.is_empty());
        for pair in beats.windows(2) {
            assert!(pair[1] - pair[0] >= 100, "{:?}", pair);
        }
    }

    #[test]
    fn test_identical_seeds_give_identical_output() {
        let mut rng = StdRng::seed_from_u64(7);
        let samples: Vec<f64> = (0..5_000)
            .map(|i| if i % 170 == 0 { 900.0 } else { rng.gen_range(-20.0..20.0) })
            .collect();
        let mut a = QrsDetector::seeded(DetectorConfig::default(), 42).unwrap();
        let mut b = QrsDetector::seeded(DetectorConfig::default(), 42).unwrap();
        assert_eq!(run(&mut a, &samples), run(&mut b, &samples));
        assert_eq!(a.threshold(), b.threshold());
    }

    #[test]
    fn test_threshold_never_negative() {
        let mut rng = StdRng::seed_from_u64(8);
        let mut detector = QrsDetector::seeded(DetectorConfig::default(), 8).unwrap();
        for _ in 0..50_000 {
            detector.tick(rng.gen_range(-500.0..500.0)).unwrap();
            assert!(detector.last_evaluation() >= 0.0);
            assert!(detector.threshold() >= 0.0);
        }
    }

    #[test]
    fn test_invalid_samples_skip_or_hold() {
        let mut detector = QrsDetector::seeded(DetectorConfig::default(), 4).unwrap();
        detector.tick(1.0).unwrap();
        assert!(matches!(
            detector.tick(f64::NAN),
            Err(Error::InvalidSample { .. })
        ));
        assert!(detector.tick(f64::INFINITY).is_err());
        assert_eq!(detector.ticks(), 1);

        let config = DetectorConfig {
            invalid_samples: InvalidSamplePolicy::HoldLast,
            ..Default::default()
        };
        let mut held = QrsDetector::seeded(config, 4).unwrap();
        for _ in 0..300 {
            held.tick(3.0).unwrap();
        }
        assert!(!held.tick(f64::NAN).unwrap());
        assert_eq!(held.ticks(), 301);
        assert_eq!(held.last_evaluation(), 0.0);
    }

    #[test]
    fn test_construction_rejects_bad_config() {
        let config = DetectorConfig {
            alpha_min: 0.5,
            alpha_max: 0.5,
            ..Default::default()
        };
        assert!(matches!(
            QrsDetector::seeded(config, 0),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_reset_matches_fresh_detector() {
        let samples = impulse_train(1200, 200, 1000.0);
        let mut used = QrsDetector::seeded(DetectorConfig::default(), 5).unwrap();
        run(&mut used, &impulse_train(777, 150, 3000.0));
        used.reset();
        assert_eq!(used.ticks(), 0);
        assert_eq!(used.state(), DetectorState::Idle);
        assert_eq!(used.threshold(), 0.0);

        let mut fresh = QrsDetector::seeded(DetectorConfig::default(), 6).unwrap();
        // the first adaptation in this span multiplies a zero window max, so the
        // different random streams cannot diverge before the first beat
        let a = run(&mut used, &samples);
        let b = run(&mut fresh, &samples);
        assert_eq!(a.first(), b.first());
        assert_eq!(a.first(), Some(&200));
    }
}
